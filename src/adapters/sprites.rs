// THEORY:
// The HTTP sprite provider. It reads PokeAPI-shaped records: one JSON document
// per numeric id, carrying a name, a set of image URLs and a list of type tags.
// The official artwork is preferred over the small default sprite. The chosen
// image is then fetched once so the placement engine knows its natural size;
// only the header is decoded.

use std::collections::HashMap;
use std::io::Cursor;

use crate::config::OverlayConfig;
use crate::core_modules::sprite::{Sprite, SpriteProvider, SpriteReference};
use crate::error::SpriteError;
use futures::future::BoxFuture;
use image::{ImageError, ImageReader};
use serde::Deserialize;
use tracing::debug;

const OFFICIAL_ARTWORK: &str = "official-artwork";

#[derive(Debug, Deserialize)]
struct SpriteRecord {
    name: Option<String>,
    sprites: SpriteImages,
    #[serde(default)]
    types: Vec<TypeSlot>,
}

#[derive(Debug, Deserialize)]
struct SpriteImages {
    front_default: Option<String>,
    #[serde(default)]
    other: HashMap<String, ArtworkSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtworkSet {
    front_default: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TypeSlot {
    #[serde(rename = "type")]
    kind: NamedResource,
}

#[derive(Debug, Deserialize)]
struct NamedResource {
    name: String,
}

/// Extracts the reference and tags from one metadata record.
pub fn parse_sprite_record(
    id: u32,
    body: &[u8],
) -> Result<(SpriteReference, Vec<String>), SpriteError> {
    let record: SpriteRecord =
        serde_json::from_slice(body).map_err(|source| SpriteError::Malformed { id, source })?;

    let artwork = record
        .sprites
        .other
        .get(OFFICIAL_ARTWORK)
        .and_then(|set| set.front_default.clone());
    let image_url = artwork
        .or(record.sprites.front_default)
        .filter(|url| !url.is_empty())
        .ok_or(SpriteError::MissingImageUrl { id })?;

    let tags = record.types.into_iter().map(|slot| slot.kind.name).collect();
    Ok((
        SpriteReference {
            id,
            name: record.name,
            image_url,
        },
        tags,
    ))
}

/// Natural pixel size of an encoded image, read from its header.
pub fn image_dimensions(id: u32, bytes: &[u8]) -> Result<(u32, u32), SpriteError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| SpriteError::Image {
            id,
            source: ImageError::IoError(err),
        })?
        .into_dimensions()
        .map_err(|source| SpriteError::Image { id, source })?;
    if width == 0 || height == 0 {
        return Err(SpriteError::InvalidDimensions { id, width, height });
    }
    Ok((width, height))
}

#[derive(Debug, Clone)]
pub struct HttpSpriteProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpriteProvider {
    pub fn new(config: &OverlayConfig) -> Result<Self, SpriteError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("backdrop_sprites/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.sprite_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_bytes(&self, id: u32, url: &str) -> Result<Vec<u8>, SpriteError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpriteError::Status { id, status });
        }
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn lookup(&self, id: u32) -> Result<Sprite, SpriteError> {
        let record = self.get_bytes(id, &format!("{}/{id}", self.base_url)).await?;
        let (reference, tags) = parse_sprite_record(id, &record)?;
        let image = self.get_bytes(id, &reference.image_url).await?;
        let (width, height) = image_dimensions(id, &image)?;
        debug!(id, name = ?reference.name, ?tags, width, height, "sprite resolved");
        Ok(Sprite {
            reference,
            tags,
            width,
            height,
        })
    }
}

impl SpriteProvider for HttpSpriteProvider {
    fn fetch_sprite(&self, id: u32) -> BoxFuture<'_, Result<Sprite, SpriteError>> {
        Box::pin(self.lookup(id))
    }
}
