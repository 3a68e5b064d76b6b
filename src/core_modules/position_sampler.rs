// THEORY:
// The `PositionSampler` answers one question for one item: "where can a box of
// this size go?" It is backed by the current `CategoryMask` and the boxes that
// have already been placed, and it either returns a rectangle or gives up.
//
// Key architectural principles:
// 1.  **Bounded Search**: Candidates are a finite stream of independent uniform
//     draws of a top-left corner inside the search region. There are never more
//     than `max_draws` of them, so one call has a hard cost ceiling.
// 2.  **Conservative Validity**: A candidate is sampled on a grid whose density
//     grows with the item's size. A single sample landing on the subject (or off
//     the mask) rejects the whole rectangle. Items land entirely on background.
// 3.  **Collision Context**: A valid candidate is then checked against every box
//     already placed, using the padded overlap test.
// 4.  **Unbiased Pick**: All surviving candidates go into a pool and one is
//     chosen uniformly at random. Taking the first one would skew repeated
//     placements toward wherever the draws happened to hit first.

use crate::core_modules::bounding_box::{BoundingBox, DEFAULT_PADDING};
use crate::core_modules::category_mask::CategoryMask;
use rand::Rng;

/// Upper bound on top-left draws per call.
pub const MAX_CANDIDATE_DRAWS: usize = 500;
/// Minimum samples per axis when validating a rectangle.
pub const MIN_SAMPLES_PER_AXIS: usize = 5;
/// One extra sample per this many pixels of the item's shorter side.
const PIXELS_PER_SAMPLE: f64 = 10.0;

/// Tags that send an item to the top half of the image.
const SKYWARD_TAGS: [&str; 2] = ["flying", "dragon"];

/// Optional restriction of the vertical search band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementConstraint {
    #[default]
    None,
    TopHalfOnly,
    BottomHalfOnly,
}

impl PlacementConstraint {
    /// "flying" or "dragon" keeps an item in the top half; everything else
    /// belongs in the bottom half.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Self {
        let skyward = tags.iter().any(|tag| {
            SKYWARD_TAGS
                .iter()
                .any(|skyward| tag.as_ref().eq_ignore_ascii_case(skyward))
        });
        if skyward {
            PlacementConstraint::TopHalfOnly
        } else {
            PlacementConstraint::BottomHalfOnly
        }
    }

    /// The `[top, bottom)` band of an image of the given height.
    pub fn band(self, image_height: f64) -> (f64, f64) {
        let middle = image_height / 2.0;
        match self {
            PlacementConstraint::None => (0.0, image_height),
            PlacementConstraint::TopHalfOnly => (0.0, middle),
            PlacementConstraint::BottomHalfOnly => (middle, image_height),
        }
    }
}

/// Inclusive range of legal top-left corners for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRegion {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

/// A finite stream of `count` independent uniform draws inside `region`.
pub fn candidate_draws<R: Rng>(
    rng: &mut R,
    region: SearchRegion,
    count: usize,
) -> impl Iterator<Item = (u32, u32)> {
    std::iter::repeat_with(move || {
        (
            rng.gen_range(region.min_x..=region.max_x),
            rng.gen_range(region.min_y..=region.max_y),
        )
    })
    .take(count)
}

/// Grid density for an item: at least five per axis, more for larger items.
pub fn samples_per_axis(item_width: f64, item_height: f64) -> usize {
    let by_size = (item_width.min(item_height) / PIXELS_PER_SAMPLE).ceil();
    MIN_SAMPLES_PER_AXIS.max(by_size as usize)
}

/// Finds valid, non-colliding top-left corners on a category mask.
pub struct PositionSampler<'a> {
    mask: &'a CategoryMask,
    /// The width of the displayed image in pixels. May differ from the mask's.
    image_width: u32,
    /// The height of the displayed image in pixels.
    image_height: u32,
    padding: f64,
    max_draws: usize,
}

impl<'a> PositionSampler<'a> {
    pub fn new(mask: &'a CategoryMask, image_width: u32, image_height: u32) -> Self {
        Self {
            mask,
            image_width,
            image_height,
            padding: DEFAULT_PADDING,
            max_draws: MAX_CANDIDATE_DRAWS,
        }
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_max_draws(mut self, max_draws: usize) -> Self {
        self.max_draws = max_draws;
        self
    }

    /// Legal top-left corners for an item, or `None` if it cannot fit the band.
    pub fn search_region(
        &self,
        item_width: f64,
        item_height: f64,
        constraint: PlacementConstraint,
    ) -> Option<SearchRegion> {
        if self.image_width == 0 || self.image_height == 0 {
            return None;
        }
        if !(item_width > 0.0 && item_height > 0.0) {
            return None;
        }
        let width = self.image_width as f64;
        let (top, bottom) = constraint.band(self.image_height as f64);
        if bottom - top <= 0.0 || item_width > width || item_height > bottom - top {
            return None;
        }

        let min_y = top.ceil() as u32;
        let max_y = (bottom - item_height).floor() as u32;
        if max_y < min_y {
            return None;
        }
        Some(SearchRegion {
            min_x: 0,
            max_x: (width - item_width).floor() as u32,
            min_y,
            max_y,
        })
    }

    /// A point is valid when its mask cell is placeable background.
    pub fn point_is_background(&self, x: f64, y: f64) -> bool {
        if x < 0.0 || y < 0.0 || self.image_width == 0 || self.image_height == 0 {
            return false;
        }
        let mask_x = (x * self.mask.width() as f64 / self.image_width as f64).floor();
        let mask_y = (y * self.mask.height() as f64 / self.image_height as f64).floor();
        self.mask.is_placeable(mask_x as u32, mask_y as u32)
    }

    /// Every grid sample across the box must be background.
    pub fn rect_is_background(&self, bounds: &BoundingBox) -> bool {
        let samples = samples_per_axis(bounds.width, bounds.height);
        let last = (samples - 1) as f64;
        // Spread from the first to the last covered pixel. A fractional far
        // edge still covers part of its pixel, so that pixel is sampled too.
        let span_x = ((bounds.right().ceil() - 1.0).max(bounds.x)) - bounds.x;
        let span_y = ((bounds.bottom().ceil() - 1.0).max(bounds.y)) - bounds.y;
        (0..samples).all(|row| {
            let y = bounds.y + span_y * row as f64 / last;
            (0..samples).all(|col| {
                let x = bounds.x + span_x * col as f64 / last;
                self.point_is_background(x, y)
            })
        })
    }

    pub fn find_position<R: Rng>(
        &self,
        item_width: f64,
        item_height: f64,
        constraint: PlacementConstraint,
        already_placed: &[BoundingBox],
        rng: &mut R,
    ) -> Option<BoundingBox> {
        let region = self.search_region(item_width, item_height, constraint)?;

        let pool: Vec<BoundingBox> = candidate_draws(rng, region, self.max_draws)
            .map(|(x, y)| BoundingBox::new(x as f64, y as f64, item_width, item_height))
            .filter(|candidate| self.rect_is_background(candidate))
            .filter(|candidate| {
                !already_placed
                    .iter()
                    .any(|placed| candidate.overlaps(placed, self.padding))
            })
            .collect();

        if pool.is_empty() {
            return None;
        }
        Some(pool[rng.gen_range(0..pool.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::category_mask::{Category, MaskMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn all_background(width: u32, height: u32) -> CategoryMask {
        CategoryMask::from_fn(width, height, MaskMode::ColorCoded, |_, _| Category::Sky)
    }

    #[test]
    fn constraint_follows_tags() {
        assert_eq!(
            PlacementConstraint::from_tags(&["normal", "flying"]),
            PlacementConstraint::TopHalfOnly
        );
        assert_eq!(
            PlacementConstraint::from_tags(&["Dragon"]),
            PlacementConstraint::TopHalfOnly
        );
        assert_eq!(
            PlacementConstraint::from_tags(&["grass", "poison"]),
            PlacementConstraint::BottomHalfOnly
        );
        let none: [&str; 0] = [];
        assert_eq!(
            PlacementConstraint::from_tags(&none),
            PlacementConstraint::BottomHalfOnly
        );
    }

    #[test]
    fn sample_density_grows_with_item_size() {
        assert_eq!(samples_per_axis(20.0, 20.0), 5);
        assert_eq!(samples_per_axis(49.0, 300.0), 5);
        assert_eq!(samples_per_axis(120.0, 200.0), 12);
    }

    #[test]
    fn open_field_places_first_item() {
        let mask = all_background(100, 100);
        let sampler = PositionSampler::new(&mask, 100, 100);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let bounds = sampler
                .find_position(20.0, 20.0, PlacementConstraint::None, &[], &mut rng)
                .expect("an all-background mask always has room");
            assert!(bounds.x >= 0.0 && bounds.right() <= 100.0);
            assert!(bounds.y >= 0.0 && bounds.bottom() <= 100.0);
        }
    }

    #[test]
    fn oversized_items_fail_immediately() {
        let mask = all_background(100, 100);
        let sampler = PositionSampler::new(&mask, 100, 100);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sampler
            .find_position(101.0, 10.0, PlacementConstraint::None, &[], &mut rng)
            .is_none());
        assert!(sampler
            .find_position(10.0, 60.0, PlacementConstraint::TopHalfOnly, &[], &mut rng)
            .is_none());
    }

    #[test]
    fn degenerate_images_have_no_region() {
        let mask = all_background(1, 1);
        let sampler = PositionSampler::new(&mask, 1, 0);
        assert!(sampler
            .search_region(1.0, 1.0, PlacementConstraint::None)
            .is_none());
        let sampler = PositionSampler::new(&mask, 1, 1);
        assert!(sampler
            .search_region(0.5, 0.5, PlacementConstraint::BottomHalfOnly)
            .is_none());
    }

    #[test]
    fn respects_vertical_band() {
        let mask = all_background(100, 100);
        let sampler = PositionSampler::new(&mask, 100, 100);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let top = sampler
                .find_position(10.0, 10.0, PlacementConstraint::TopHalfOnly, &[], &mut rng)
                .expect("top half is open");
            assert!(top.bottom() <= 50.0);
            let bottom = sampler
                .find_position(10.0, 10.0, PlacementConstraint::BottomHalfOnly, &[], &mut rng)
                .expect("bottom half is open");
            assert!(bottom.y >= 50.0 && bottom.bottom() <= 100.0);
        }
    }

    #[test]
    fn never_lands_on_the_subject() {
        // Subject occupies the central 40x40 block.
        let mask = CategoryMask::from_fn(100, 100, MaskMode::ColorCoded, |x, y| {
            if (30..70).contains(&x) && (30..70).contains(&y) {
                Category::Subject
            } else {
                Category::Ground
            }
        });
        let sampler = PositionSampler::new(&mask, 100, 100);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            if let Some(bounds) =
                sampler.find_position(12.0, 12.0, PlacementConstraint::None, &[], &mut rng)
            {
                let clear_x = bounds.right() <= 30.0 || bounds.x >= 70.0;
                let clear_y = bounds.bottom() <= 30.0 || bounds.y >= 70.0;
                assert!(clear_x || clear_y, "{bounds:?} touches the subject");
            }
        }
    }

    #[test]
    fn subject_only_mask_yields_nothing() {
        let mask = CategoryMask::from_fn(50, 50, MaskMode::AlphaCutout, |_, _| Category::Subject);
        let sampler = PositionSampler::new(&mask, 50, 50);
        let mut rng = StdRng::seed_from_u64(11);
        assert!(sampler
            .find_position(5.0, 5.0, PlacementConstraint::None, &[], &mut rng)
            .is_none());
    }

    #[test]
    fn avoids_already_placed_boxes() {
        let mask = all_background(100, 100);
        let sampler = PositionSampler::new(&mask, 100, 100);
        let occupied = [BoundingBox::new(0.0, 0.0, 60.0, 100.0)];
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..30 {
            let bounds = sampler
                .find_position(15.0, 15.0, PlacementConstraint::None, &occupied, &mut rng)
                .expect("right strip is open");
            assert!(!bounds.overlaps(&occupied[0], DEFAULT_PADDING));
            assert!(bounds.x >= 70.0);
        }
    }

    #[test]
    fn scales_image_coordinates_down_to_mask_resolution() {
        // 10x10 mask behind a 100x100 image: left half background.
        let mask = CategoryMask::from_fn(10, 10, MaskMode::ColorCoded, |x, _| {
            if x < 5 { Category::Sky } else { Category::Subject }
        });
        let sampler = PositionSampler::new(&mask, 100, 100);
        assert!(sampler.point_is_background(49.9, 10.0));
        assert!(!sampler.point_is_background(50.0, 10.0));
        assert!(!sampler.point_is_background(-1.0, 10.0));
        assert!(!sampler.point_is_background(10.0, 100.0));
    }

    #[test]
    fn partly_covered_edge_pixels_are_sampled() {
        // Only the bottom-left 10x10 corner is background.
        let mask = CategoryMask::from_fn(100, 100, MaskMode::ColorCoded, |x, y| {
            if x < 10 && y >= 90 { Category::Ground } else { Category::Subject }
        });
        let sampler = PositionSampler::new(&mask, 100, 100);
        assert!(sampler.rect_is_background(&BoundingBox::new(0.0, 90.0, 9.6, 9.6)));
        assert!(sampler.rect_is_background(&BoundingBox::new(0.0, 90.0, 10.0, 10.0)));
        assert!(!sampler.rect_is_background(&BoundingBox::new(1.0, 90.0, 9.6, 9.6)));
        assert!(!sampler.rect_is_background(&BoundingBox::new(0.0, 91.0, 9.6, 9.6)));

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            if let Some(bounds) = sampler.find_position(
                9.6,
                9.6,
                PlacementConstraint::BottomHalfOnly,
                &[],
                &mut rng,
            ) {
                assert!(bounds.right() <= 10.0, "{bounds:?} leaves the background");
                assert!(bounds.y >= 90.0 && bounds.bottom() <= 100.0);
            }
        }
    }

    #[test]
    fn draws_are_bounded_and_inside_region() {
        let region = SearchRegion {
            min_x: 3,
            max_x: 9,
            min_y: 50,
            max_y: 52,
        };
        let mut rng = StdRng::seed_from_u64(99);
        let draws: Vec<(u32, u32)> = candidate_draws(&mut rng, region, 500).collect();
        assert_eq!(draws.len(), 500);
        assert!(draws
            .iter()
            .all(|&(x, y)| (3..=9).contains(&x) && (50..=52).contains(&y)));
    }
}
