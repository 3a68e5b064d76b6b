// THEORY:
// The `placement` module is the Placement Orchestrator, the top of the
// algorithmic stack. It turns "generate" into an ordered list of placed items:
// draw how many items to place, look each one up, decide its vertical band
// from its tags, and ask the `PositionSampler` for a spot, shrinking the item
// when no spot exists.
//
// Key architectural principles:
// 1.  **Sequential Context**: Items are placed one after another. Each success
//     is appended to the running sequence, and that sequence is the collision
//     context for every later item. Lookups are therefore never concurrent.
// 2.  **Scale Back-off**: A failed item is retried at 0.8x its previous scale,
//     at most five times, and never below a scale of 0.05. The band constraint
//     stays fixed while the item shrinks.
// 3.  **Partial Results, Not Errors**: A sprite lookup failure skips that item.
//     An item that fits nowhere is simply omitted. The batch always runs to
//     completion and returns 0..=count items.
// 4.  **Finite Cost**: At most `count * (1 + retries)` sampler calls, each with
//     at most `max_candidate_draws` draws.

use std::ops::{Range, RangeInclusive};

use crate::core_modules::bounding_box::{BoundingBox, DEFAULT_PADDING};
use crate::core_modules::category_mask::CategoryMask;
use crate::core_modules::position_sampler::{
    MAX_CANDIDATE_DRAWS, PlacementConstraint, PositionSampler,
};
use crate::core_modules::sprite::{SpriteProvider, SpriteReference};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Tunable behavior of one placement batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementConfig {
    /// Smallest item count drawn when the caller does not fix one.
    pub min_items: usize,
    /// Largest item count drawn when the caller does not fix one.
    pub max_items: usize,
    /// Range the first attempted scale is drawn from.
    pub initial_scale: Range<f64>,
    /// Multiplier applied to the scale after each failed attempt.
    pub backoff_factor: f64,
    pub max_retries: u32,
    /// No attempt is ever made below this scale.
    pub min_scale: f64,
    pub padding: f64,
    pub max_candidate_draws: usize,
    /// Identifiers the sprite provider is asked for.
    pub sprite_ids: RangeInclusive<u32>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            min_items: 1,
            max_items: 5,
            initial_scale: 0.2..0.6,
            backoff_factor: 0.8,
            max_retries: 5,
            min_scale: 0.05,
            padding: DEFAULT_PADDING,
            max_candidate_draws: MAX_CANDIDATE_DRAWS,
            sprite_ids: 1..=1025,
        }
    }
}

/// One item that found a home.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedItem {
    pub sprite: SpriteReference,
    /// The scale actually used, after any back-off.
    pub scale: f64,
    pub bounds: BoundingBox,
}

/// The sequence of scales tried for one item: the initial scale, then up to
/// `max_retries` successively smaller ones, stopping before `min_scale`.
#[derive(Debug, Clone)]
pub struct ScaleBackoff {
    next: Option<f64>,
    retries_left: u32,
    factor: f64,
    min_scale: f64,
}

impl ScaleBackoff {
    pub fn new(initial: f64, factor: f64, max_retries: u32, min_scale: f64) -> Self {
        Self {
            next: (initial >= min_scale).then_some(initial),
            retries_left: max_retries,
            factor,
            min_scale,
        }
    }

    pub fn from_config(initial: f64, config: &PlacementConfig) -> Self {
        Self::new(
            initial,
            config.backoff_factor,
            config.max_retries,
            config.min_scale,
        )
    }
}

impl Iterator for ScaleBackoff {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let current = self.next.take()?;
        if self.retries_left > 0 {
            let smaller = current * self.factor;
            if smaller >= self.min_scale && smaller < current {
                self.next = Some(smaller);
                self.retries_left -= 1;
            }
        }
        Some(current)
    }
}

/// Places batches of sprites on a category mask.
pub struct PlacementEngine<P> {
    provider: P,
    config: PlacementConfig,
}

impl<P: SpriteProvider> PlacementEngine<P> {
    pub fn new(provider: P, config: PlacementConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Draws an item count uniformly from the configured range.
    pub fn draw_count<R: Rng>(&self, rng: &mut R) -> usize {
        let max = self.config.max_items;
        rng.gen_range(self.config.min_items.min(max)..=max)
    }

    /// Places up to `count` items (drawn at random when `None`). Never fails:
    /// lookups that error are skipped and items that fit nowhere are omitted.
    pub async fn place_batch<R: Rng>(
        &self,
        mask: &CategoryMask,
        image_width: u32,
        image_height: u32,
        count: Option<usize>,
        rng: &mut R,
    ) -> Vec<PlacedItem> {
        let count = count.unwrap_or_else(|| self.draw_count(rng));
        let sampler = PositionSampler::new(mask, image_width, image_height)
            .with_padding(self.config.padding)
            .with_max_draws(self.config.max_candidate_draws);
        info!(count, image_width, image_height, "placing batch");

        let mut placed: Vec<PlacedItem> = Vec::with_capacity(count);
        for index in 0..count {
            let id = rng.gen_range(self.config.sprite_ids.clone());
            let sprite = match self.provider.fetch_sprite(id).await {
                Ok(sprite) => sprite,
                Err(err) => {
                    warn!(index, id, error = %err, "sprite lookup failed, skipping item");
                    continue;
                }
            };

            let constraint = PlacementConstraint::from_tags(&sprite.tags);
            let initial = rng.gen_range(self.config.initial_scale.clone());
            let occupied: Vec<BoundingBox> = placed.iter().map(|item| item.bounds).collect();

            let mut found = None;
            for scale in ScaleBackoff::from_config(initial, &self.config) {
                let width = sprite.width as f64 * scale;
                let height = sprite.height as f64 * scale;
                match sampler.find_position(width, height, constraint, &occupied, rng) {
                    Some(bounds) => {
                        found = Some((scale, bounds));
                        break;
                    }
                    None => debug!(index, id, scale, ?constraint, "no position at scale"),
                }
            }

            match found {
                Some((scale, bounds)) => {
                    debug!(index, id, scale, x = bounds.x, y = bounds.y, "placed item");
                    placed.push(PlacedItem {
                        sprite: sprite.reference,
                        scale,
                        bounds,
                    });
                }
                None => info!(index, id, "no suitable area for item"),
            }
        }

        info!(placed = placed.len(), requested = count, "batch complete");
        placed
    }
}
