// THEORY:
// The `pipeline` module is the top-level API of the overlay engine. It wraps the
// whole stack (acquisition, classification, placement) in one owning context,
// the `OverlaySession`, so callers never juggle buffers and masks themselves.
//
// Key architectural principles:
// 1.  **One Owner**: The session holds the mode, the threshold, the cached
//     buffer, the derived mask and the last placed batch. Nothing else mutates
//     them, and each is replaced wholesale, never edited in place.
// 2.  **Generations**: Every new photograph bumps a generation counter. Work that
//     suspends (segmentation, sprite lookups) captures the generation it started
//     under, and its result is dropped if the session has moved on since.
// 3.  **Cheap Sensitivity**: Changing the threshold re-runs the pure classifier
//     on the cached buffer. It never goes back to the segmentation service.
// 4.  **Split Or Whole**: `load_image` and `generate` are convenience wrappers
//     around begin/snapshot, the async call, and install. Callers that must stay
//     responsive while a request is in flight can drive the steps themselves.

use std::sync::Arc;

use crate::adapters::segmentation::{MaskSource, SourceImage};
use crate::config::OverlayConfig;
use crate::core_modules::category_mask::{self, CategoryMask, MaskCoverage, MaskMode};
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use crate::core_modules::placement::PlacementEngine;
use crate::core_modules::sprite::SpriteProvider;
use crate::error::AcquisitionError;
use rand::Rng;
use tracing::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::bounding_box::BoundingBox;
pub use crate::core_modules::category_mask::Category;
pub use crate::core_modules::placement::{PlacedItem, PlacementConfig};

/// Identifies one base-image selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}

/// Outcome of handing a segmentation result to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaskUpdate {
    Ready(MaskCoverage),
    /// The result belonged to an earlier image and was discarded.
    Stale,
}

/// The outcome of one "generate" request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementReport {
    /// No mask is loaded, so there is nothing to place onto.
    MaskUnavailable,
    /// The batch ran to completion without placing anything.
    NoSuitableArea,
    Placed(Vec<PlacedItem>),
    /// A new image was selected while the batch was running.
    Stale,
}

/// Everything a placement batch reads, captured at the start of the batch.
#[derive(Debug, Clone)]
pub struct PlacementSnapshot {
    pub generation: Generation,
    pub mask: Arc<CategoryMask>,
    pub image_width: u32,
    pub image_height: u32,
}

#[derive(Debug)]
pub struct OverlaySession {
    mode: MaskMode,
    threshold: f64,
    generation: Generation,
    /// Pixel size of the displayed photograph.
    image_size: Option<(u32, u32)>,
    buffer: Option<Arc<PixelBuffer>>,
    mask: Option<Arc<CategoryMask>>,
    placed: Vec<PlacedItem>,
}

impl OverlaySession {
    pub fn new(mode: MaskMode, threshold: f64) -> Self {
        Self {
            mode,
            threshold: threshold.clamp(0.0, 1.0),
            generation: Generation::default(),
            image_size: None,
            buffer: None,
            mask: None,
            placed: Vec::new(),
        }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(config.mode, config.threshold)
    }

    /// Starts a new photograph: clears all derived state and invalidates any
    /// work still in flight for the previous one.
    pub fn begin_image(&mut self, width: u32, height: u32) -> Generation {
        self.generation = self.generation.next();
        self.image_size = Some((width, height));
        self.buffer = None;
        self.mask = None;
        self.placed.clear();
        debug!(generation = self.generation.0, width, height, "began image");
        self.generation
    }

    /// Installs a segmentation result captured under `generation`. Stale
    /// results are dropped, failures leave the mask empty.
    pub fn install_buffer(
        &mut self,
        generation: Generation,
        result: Result<PixelBuffer, AcquisitionError>,
    ) -> Result<MaskUpdate, AcquisitionError> {
        if generation != self.generation {
            debug!(
                stale = generation.0,
                current = self.generation.0,
                "discarding stale segmentation result"
            );
            return Ok(MaskUpdate::Stale);
        }
        let buffer = match result {
            Ok(buffer) => Arc::new(buffer),
            Err(err) => {
                warn!(error = %err, "segmentation failed");
                self.buffer = None;
                self.mask = None;
                return Err(err);
            }
        };
        self.buffer = Some(buffer);
        let coverage = self.reclassify().unwrap_or_default();
        Ok(MaskUpdate::Ready(coverage))
    }

    /// Selects `image`, acquires its buffer from `source` and installs it.
    pub async fn load_image<S: MaskSource + ?Sized>(
        &mut self,
        source: &S,
        image: &SourceImage,
    ) -> Result<MaskUpdate, AcquisitionError> {
        let generation = self.begin_image(image.width(), image.height());
        let result = source.acquire(image, self.mode).await;
        self.install_buffer(generation, result)
    }

    /// Stores a new sensitivity and recomputes the mask from the cached
    /// buffer. Returns the new coverage, or `None` when no buffer is loaded.
    pub fn set_threshold(&mut self, threshold: f64) -> Option<MaskCoverage> {
        self.threshold = threshold.clamp(0.0, 1.0);
        self.reclassify()
    }

    fn reclassify(&mut self) -> Option<MaskCoverage> {
        let buffer = self.buffer.as_ref()?;
        let mask = category_mask::classify(buffer, self.threshold, self.mode);
        let coverage = mask.coverage();
        info!(
            threshold = self.threshold,
            placeable = coverage.placeable(),
            total = coverage.total(),
            fraction = coverage.placeable_fraction(),
            "mask ready"
        );
        self.mask = Some(Arc::new(mask));
        Some(coverage)
    }

    pub fn placement_snapshot(&self) -> Option<PlacementSnapshot> {
        let mask = self.mask.clone()?;
        let (image_width, image_height) = self
            .image_size
            .unwrap_or((mask.width(), mask.height()));
        Some(PlacementSnapshot {
            generation: self.generation,
            mask,
            image_width,
            image_height,
        })
    }

    /// Replaces the placed sequence with a finished batch, unless it is stale.
    pub fn install_placements(
        &mut self,
        generation: Generation,
        items: Vec<PlacedItem>,
    ) -> PlacementReport {
        if generation != self.generation {
            debug!(stale = generation.0, "discarding stale placement batch");
            return PlacementReport::Stale;
        }
        self.placed = items;
        if self.placed.is_empty() {
            info!("no suitable area found");
            PlacementReport::NoSuitableArea
        } else {
            PlacementReport::Placed(self.placed.clone())
        }
    }

    /// Runs one placement batch against the current mask.
    pub async fn generate<P: SpriteProvider, R: Rng>(
        &mut self,
        engine: &PlacementEngine<P>,
        count: Option<usize>,
        rng: &mut R,
    ) -> PlacementReport {
        let Some(snapshot) = self.placement_snapshot() else {
            return PlacementReport::MaskUnavailable;
        };
        let items = engine
            .place_batch(
                &snapshot.mask,
                snapshot.image_width,
                snapshot.image_height,
                count,
                rng,
            )
            .await;
        self.install_placements(snapshot.generation, items)
    }

    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn buffer(&self) -> Option<&Arc<PixelBuffer>> {
        self.buffer.as_ref()
    }

    pub fn mask(&self) -> Option<&Arc<CategoryMask>> {
        self.mask.as_ref()
    }

    pub fn placed(&self) -> &[PlacedItem] {
        &self.placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::pixel::Pixel;
    use crate::core_modules::sprite::{Sprite, SpriteReference};
    use crate::error::SpriteError;
    use futures::future::BoxFuture;
    use image::{ImageFormat, Rgba, RgbaImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out a fixed buffer and counts how often it was asked.
    struct FixedSource {
        buffer: PixelBuffer,
        calls: AtomicUsize,
    }

    impl MaskSource for FixedSource {
        fn acquire<'a>(
            &'a self,
            _image: &'a SourceImage,
            _mode: MaskMode,
        ) -> BoxFuture<'a, Result<PixelBuffer, AcquisitionError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let buffer = self.buffer.clone();
            Box::pin(async move { Ok(buffer) })
        }
    }

    struct SquareSprites;

    impl SpriteProvider for SquareSprites {
        fn fetch_sprite(&self, id: u32) -> BoxFuture<'_, Result<Sprite, SpriteError>> {
            Box::pin(async move {
                Ok(Sprite {
                    reference: SpriteReference {
                        id,
                        name: Some(format!("sprite-{id}")),
                        image_url: format!("memory://{id}"),
                    },
                    tags: vec!["ground".to_string()],
                    width: 40,
                    height: 40,
                })
            })
        }
    }

    fn source_image(width: u32, height: u32) -> SourceImage {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(width, height, Rgba([90, 90, 90, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        SourceImage::from_bytes("photo.png", bytes).unwrap()
    }

    /// Left half transparent, right half opaque.
    fn half_cutout(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, _| {
            let alpha = if x < width / 2 { 0 } else { 255 };
            Pixel::new(10, 10, 10, alpha)
        })
        .unwrap()
    }

    /// Alpha rises left to right, 0..=255.
    fn alpha_ramp() -> PixelBuffer {
        PixelBuffer::from_fn(256, 1, |x, _| Pixel::new(0, 0, 0, x as u8)).unwrap()
    }

    #[test]
    fn stale_buffers_are_discarded() {
        let mut session = OverlaySession::new(MaskMode::AlphaCutout, 0.5);
        let first = session.begin_image(8, 8);
        let second = session.begin_image(8, 8);
        assert_ne!(first, second);

        let update = session.install_buffer(first, Ok(half_cutout(8, 8))).unwrap();
        assert_eq!(update, MaskUpdate::Stale);
        assert!(session.mask().is_none());

        let update = session.install_buffer(second, Ok(half_cutout(8, 8))).unwrap();
        assert!(matches!(update, MaskUpdate::Ready(coverage) if coverage.placeable() == 32));
        assert!(session.mask().is_some());
    }

    #[test]
    fn failed_acquisition_leaves_mask_empty() {
        let mut session = OverlaySession::new(MaskMode::ColorCoded, 0.5);
        let generation = session.begin_image(4, 4);
        session
            .install_buffer(generation, Ok(half_cutout(4, 4)))
            .unwrap();
        assert!(session.mask().is_some());

        let generation = session.begin_image(4, 4);
        let result = session.install_buffer(generation, Err(AcquisitionError::EmptyBody));
        assert!(matches!(result, Err(AcquisitionError::EmptyBody)));
        assert!(session.buffer().is_none());
        assert!(session.mask().is_none());
        assert!(session.placement_snapshot().is_none());
    }

    #[test]
    fn threshold_changes_recompute_from_cache() {
        let mut session = OverlaySession::new(MaskMode::AlphaCutout, 0.5);
        assert_eq!(session.set_threshold(0.3), None);

        let generation = session.begin_image(256, 1);
        session.install_buffer(generation, Ok(alpha_ramp())).unwrap();
        let low = session.set_threshold(0.1).unwrap().placeable();
        let high = session.set_threshold(0.9).unwrap().placeable();
        assert!(high > low);
        assert_eq!(session.set_threshold(7.0).unwrap().placeable(), 255);
        assert_eq!(session.threshold(), 1.0);
    }

    #[tokio::test]
    async fn load_image_goes_to_the_source_once() {
        let source = FixedSource {
            buffer: alpha_ramp(),
            calls: AtomicUsize::new(0),
        };
        let mut session = OverlaySession::new(MaskMode::AlphaCutout, 0.5);
        let update = session.load_image(&source, &source_image(256, 1)).await.unwrap();
        assert!(matches!(update, MaskUpdate::Ready(_)));
        assert_eq!(session.image_size(), Some((256, 1)));

        session.set_threshold(0.2);
        session.set_threshold(0.8);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generate_without_mask_reports_unavailable() {
        let mut session = OverlaySession::new(MaskMode::ColorCoded, 0.5);
        let engine = PlacementEngine::new(SquareSprites, PlacementConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            session.generate(&engine, Some(2), &mut rng).await,
            PlacementReport::MaskUnavailable
        );
    }

    #[tokio::test]
    async fn generate_places_on_background_and_keeps_the_batch() {
        let mut session = OverlaySession::new(MaskMode::AlphaCutout, 0.5);
        let generation = session.begin_image(400, 400);
        session
            .install_buffer(generation, Ok(half_cutout(400, 400)))
            .unwrap();

        let engine = PlacementEngine::new(SquareSprites, PlacementConfig::default());
        let mut rng = StdRng::seed_from_u64(9);
        let items = match session.generate(&engine, Some(3), &mut rng).await {
            PlacementReport::Placed(items) => items,
            other => panic!("expected placements, got {other:?}"),
        };
        assert_eq!(session.placed(), items.as_slice());
        for item in &items {
            assert!(item.bounds.right() <= 200.0, "{:?} crosses the subject", item.bounds);
            assert!(item.bounds.y >= 200.0);
        }
    }

    #[tokio::test]
    async fn subject_only_image_reports_no_suitable_area() {
        let mut session = OverlaySession::new(MaskMode::AlphaCutout, 0.5);
        let generation = session.begin_image(50, 50);
        let opaque = PixelBuffer::from_fn(50, 50, |_, _| Pixel::new(1, 2, 3, 255)).unwrap();
        session.install_buffer(generation, Ok(opaque)).unwrap();

        let engine = PlacementEngine::new(SquareSprites, PlacementConfig::default());
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            session.generate(&engine, Some(2), &mut rng).await,
            PlacementReport::NoSuitableArea
        );
    }

    #[test]
    fn placements_for_an_old_image_are_dropped() {
        let mut session = OverlaySession::new(MaskMode::AlphaCutout, 0.5);
        let generation = session.begin_image(10, 10);
        session
            .install_buffer(generation, Ok(half_cutout(10, 10)))
            .unwrap();
        let snapshot = session.placement_snapshot().unwrap();

        session.begin_image(10, 10);
        let item = PlacedItem {
            sprite: SpriteReference {
                id: 1,
                name: None,
                image_url: String::new(),
            },
            scale: 0.3,
            bounds: BoundingBox::new(0.0, 5.0, 2.0, 2.0),
        };
        assert_eq!(
            session.install_placements(snapshot.generation, vec![item]),
            PlacementReport::Stale
        );
        assert!(session.placed().is_empty());
    }
}
