// Example runner for the `backdrop_sprites` library: segments one photograph,
// places a batch of sprites on its background and prints the result as JSON.
//
// Usage: backdrop_sprites <image> [debug.png]

use anyhow::{Context, bail};
use backdrop_sprites::adapters::segmentation::{SegmentationClient, SourceImage};
use backdrop_sprites::adapters::sprites::HttpSpriteProvider;
use backdrop_sprites::config::OverlayConfig;
use backdrop_sprites::core_modules::placement::PlacementEngine;
use backdrop_sprites::core_modules::utils::image_helper::image_helper;
use backdrop_sprites::pipeline::{BoundingBox, MaskUpdate, OverlaySession, PlacementReport};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("backdrop_sprites=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        bail!("usage: backdrop_sprites <image> [debug.png]");
    };
    let debug_path = args.next();

    let config = OverlayConfig::from_env()?;
    let segmenter = SegmentationClient::new(&config)?;
    match segmenter.health().await {
        Ok(health) => info!(
            status = %health.status,
            service = %health.service,
            model_loaded = health.model_loaded,
            "segmentation service is up"
        ),
        Err(err) => warn!(error = %err, "segmentation health check failed"),
    }

    let image = SourceImage::open(&image_path)
        .await
        .with_context(|| format!("could not load {image_path}"))?;
    let mut session = OverlaySession::from_config(&config);
    if let MaskUpdate::Ready(coverage) = session
        .load_image(&segmenter, &image)
        .await
        .context("segmentation failed")?
    {
        info!(
            subject = coverage.subject,
            sky = coverage.sky,
            ground = coverage.ground,
            other = coverage.other,
            "mask loaded"
        );
    }

    let provider = HttpSpriteProvider::new(&config)?;
    let engine = PlacementEngine::new(provider, config.placement.clone());
    let mut rng = StdRng::from_entropy();

    let placed = match session.generate(&engine, None, &mut rng).await {
        PlacementReport::Placed(items) => {
            println!("{}", serde_json::to_string_pretty(&items)?);
            items
        }
        PlacementReport::NoSuitableArea => {
            println!("No suitable area found. Try a different threshold or image.");
            Vec::new()
        }
        PlacementReport::MaskUnavailable => {
            bail!("no mask is available for {image_path}");
        }
        // `generate` borrows the session for the whole batch, so no newer image
        // can be selected meanwhile. Only split begin/install callers see this.
        PlacementReport::Stale => {
            warn!("placement batch was superseded by a newer image");
            Vec::new()
        }
    };

    if let (Some(path), Some(mask)) = (debug_path, session.mask()) {
        // Placements live in image pixels; the debug image is drawn at mask resolution.
        let sx = mask.width() as f64 / image.width() as f64;
        let sy = mask.height() as f64 / image.height() as f64;
        let boxes: Vec<BoundingBox> = placed
            .iter()
            .map(|item| {
                let b = item.bounds;
                BoundingBox::new(b.x * sx, b.y * sy, b.width * sx, b.height * sy)
            })
            .collect();
        image_helper::save_debug_overlay(&path, mask, &boxes)
            .with_context(|| format!("could not write {path}"))?;
        info!(%path, "debug overlay written");
    }

    Ok(())
}
