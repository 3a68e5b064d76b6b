// THEORY:
// The `category_mask` module is the Mask Classifier. It turns the raw signal
// cached from the segmentation service (a `PixelBuffer`) plus one sensitivity
// value into a per-pixel category map the placement layer can query.
//
// Key architectural principles:
// 1.  **Pure Function**: `classify` has no hidden state. The same buffer and
//     threshold always yield an identical mask, so moving the sensitivity slider
//     only ever re-runs this function on the cached buffer. It never goes back
//     to the network.
// 2.  **Two Signals, One Map**: An alpha cutout collapses to foreground versus
//     background. A color-coded image is decoded through four reserved marker
//     colors, with a heuristic fallback (`color_rules`) for pixels that match
//     none of them.
// 3.  **Replace, Never Mutate**: A `CategoryMask` is built once and then only
//     read. A threshold change produces a new mask that replaces the old one.
// 4.  **Placeable Background**: Every category except `Subject` can host an
//     overlay item. This combined indicator is all the position sampler needs.

use crate::core_modules::color_rules::{self, HeuristicBounds};
use crate::core_modules::pixel::pixel::{Channel, Pixel};
use crate::core_modules::pixel_buffer::pixel_buffer::PixelBuffer;
use tracing::debug;

/// Per-channel distance within which a pixel counts as a marker color.
pub const MARKER_TOLERANCE: u8 = 40;

/// Marker colors emitted by the segmentation service, in match order.
pub const MARKERS: [(Category, (Channel, Channel, Channel)); 4] = [
    (Category::Subject, (255, 0, 255)),
    (Category::Sky, (0, 255, 255)),
    (Category::Ground, (255, 165, 0)),
    (Category::Other, (255, 255, 0)),
];

/// The label held by every cell of a `CategoryMask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The photograph's main subject. Never placeable.
    Subject,
    Sky,
    Ground,
    /// Background that is neither sky nor ground (walls, buildings, objects).
    Other,
    /// Background of unknown kind. Produced by the alpha-cutout classifier.
    BackgroundUnknown,
}

impl Category {
    /// True for every background category.
    pub fn is_placeable(self) -> bool {
        !matches!(self, Category::Subject)
    }

    pub fn marker_color(self) -> Option<(Channel, Channel, Channel)> {
        MARKERS
            .iter()
            .find(|(category, _)| *category == self)
            .map(|(_, color)| *color)
    }
}

/// Which kind of signal the segmentation service produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// RGBA cutout: transparent pixels are background.
    AlphaCutout,
    /// Four-color marker image: subject, sky, ground, other.
    #[default]
    ColorCoded,
}

impl MaskMode {
    /// Path on the segmentation service that produces this kind of signal.
    pub fn endpoint(self) -> &'static str {
        match self {
            MaskMode::AlphaCutout => "remove-background",
            MaskMode::ColorCoded => "segment",
        }
    }
}

/// Label counts for one mask, used for logging and for quick sanity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskCoverage {
    pub subject: usize,
    pub sky: usize,
    pub ground: usize,
    pub other: usize,
    pub background_unknown: usize,
}

impl MaskCoverage {
    pub fn total(&self) -> usize {
        self.subject + self.sky + self.ground + self.other + self.background_unknown
    }

    pub fn placeable(&self) -> usize {
        self.total() - self.subject
    }

    pub fn placeable_fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.placeable() as f64 / total as f64
    }
}

/// A width x height grid of categories in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMask {
    width: u32,
    height: u32,
    mode: MaskMode,
    cells: Vec<Category>,
}

impl CategoryMask {
    /// Builds a mask where each cell comes from `f(x, y)`.
    pub fn from_fn(
        width: u32,
        height: u32,
        mode: MaskMode,
        mut f: impl FnMut(u32, u32) -> Category,
    ) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            mode,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    pub fn cells(&self) -> &[Category] {
        &self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Category> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Combined background indicator. Cells outside the mask are never placeable.
    pub fn is_placeable(&self, x: u32, y: u32) -> bool {
        self.get(x, y).is_some_and(Category::is_placeable)
    }

    pub fn coverage(&self) -> MaskCoverage {
        let mut coverage = MaskCoverage::default();
        for category in &self.cells {
            match category {
                Category::Subject => coverage.subject += 1,
                Category::Sky => coverage.sky += 1,
                Category::Ground => coverage.ground += 1,
                Category::Other => coverage.other += 1,
                Category::BackgroundUnknown => coverage.background_unknown += 1,
            }
        }
        coverage
    }
}

/// Classifies an alpha-cutout pixel: background iff `alpha / 255 < threshold`.
pub fn classify_alpha(pixel: &Pixel, threshold: f64) -> Category {
    if pixel.opacity() < threshold {
        Category::BackgroundUnknown
    } else {
        Category::Subject
    }
}

/// Classifies a color-coded pixel: marker match first, heuristic fallback second.
pub fn classify_marker(pixel: &Pixel, bounds: &HeuristicBounds) -> Category {
    MARKERS
        .iter()
        .find(|(_, color)| pixel.matches_marker(*color, MARKER_TOLERANCE))
        .map(|(category, _)| *category)
        .unwrap_or_else(|| color_rules::reclassify(pixel, bounds))
}

/// Derives the category map for a cached buffer at a given sensitivity.
/// The threshold is clamped to [0,1].
pub fn classify(buffer: &PixelBuffer, threshold: f64, mode: MaskMode) -> CategoryMask {
    let threshold = threshold.clamp(0.0, 1.0);
    let cells: Vec<Category> = match mode {
        MaskMode::AlphaCutout => buffer
            .pixels()
            .map(|pixel| classify_alpha(&pixel, threshold))
            .collect(),
        MaskMode::ColorCoded => {
            let bounds = HeuristicBounds::for_sensitivity(threshold);
            buffer
                .pixels()
                .map(|pixel| classify_marker(&pixel, &bounds))
                .collect()
        }
    };
    let mask = CategoryMask {
        width: buffer.width(),
        height: buffer.height(),
        mode,
        cells,
    };
    debug!(
        width = mask.width,
        height = mask.height,
        threshold,
        ?mode,
        placeable = mask.coverage().placeable(),
        "classified mask"
    );
    mask
}
