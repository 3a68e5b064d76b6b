// THEORY:
// The `sprite` module is the seam between the placement engine and whatever
// supplies overlay art. The engine only needs three things per item: a
// reference it can hand to the renderer, the category tags that decide its
// vertical band, and its natural pixel size. How those are obtained (an HTTP
// API, a local catalogue, a test script) is hidden behind `SpriteProvider`.

use crate::error::SpriteError;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// What the renderer needs to draw a placed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteReference {
    pub id: u32,
    pub name: Option<String>,
    pub image_url: String,
}

/// Metadata for one randomly chosen sprite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    pub reference: SpriteReference,
    /// Category tags, e.g. "flying" or "grass".
    pub tags: Vec<String>,
    /// Natural width of the sprite image in pixels.
    pub width: u32,
    /// Natural height of the sprite image in pixels.
    pub height: u32,
}

/// Looks up sprite metadata by identifier.
pub trait SpriteProvider: Send + Sync {
    fn fetch_sprite(&self, id: u32) -> BoxFuture<'_, Result<Sprite, SpriteError>>;
}
