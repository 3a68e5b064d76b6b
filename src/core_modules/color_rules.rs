// THEORY:
// The `color_rules` module is the fallback "lens" of the mask classifier. The
// segmentation service paints every pixel with one of four marker colors, but
// resampling and anti-aliasing leave edge pixels that match none of them.
// Those pixels are reclassified here from their color alone.
//
// Key architectural principles:
// 1.  **Ordered Rules**: The reclassifier is an ordered list of named predicate
//     rules evaluated top to bottom with early exit. Sky comes before ground, so
//     a pixel that looks like both is sky. Anything left over is `Other`.
// 2.  **Sensitivity-Driven Bounds**: The bounds that decide sky and ground are
//     derived from a single sensitivity value in [0,1]. Raising it loosens every
//     bound, admitting more pixels into sky and ground rather than `Other`.
// 3.  **Never Subject**: The heuristic never produces `Subject`. Only an exact
//     marker match can, because the upstream model owns the subject region.

use crate::core_modules::category_mask::Category;
use crate::core_modules::pixel::pixel::Pixel;

/// Sensitivity at which the derived bounds equal the service's own constants.
const NEUTRAL_SENSITIVITY: f64 = 0.5;

const SKY_BLUE_MARGIN: i32 = 5;
const GREEN_DOMINANCE_MARGIN: i32 = 20;
const GRASS_MAX_BRIGHTNESS: f64 = 230.0;
const BROWN_MAX_BRIGHTNESS: f64 = 200.0;
const EARTH_MAX_BRIGHTNESS: f64 = 210.0;
const DARK_EARTH_MAX_BRIGHTNESS: f64 = 190.0;

/// The sensitivity-dependent bounds used by the sky and ground rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicBounds {
    /// Brightness a sky pixel must exceed.
    pub sky_min_brightness: f64,
    /// Blue level a sky pixel must exceed.
    pub sky_min_blue: f64,
    /// Saturation a sky pixel must stay below.
    pub sky_max_saturation: f64,
    /// Blue level a ground pixel must stay below.
    pub ground_max_blue: f64,
    /// Green level a grassy pixel must exceed.
    pub grass_min_green: f64,
}

impl HeuristicBounds {
    /// Derives the bounds for a sensitivity in [0,1]. Out-of-range values are clamped.
    pub fn for_sensitivity(sensitivity: f64) -> Self {
        let t = sensitivity.clamp(0.0, 1.0);
        let loosen = t - NEUTRAL_SENSITIVITY;
        Self {
            sky_min_brightness: 80.0 - loosen * 60.0,
            sky_min_blue: 80.0 - loosen * 60.0,
            sky_max_saturation: 180.0 + loosen * 60.0,
            ground_max_blue: 90.0 + loosen * 40.0,
            grass_min_green: 100.0 - loosen * 40.0,
        }
    }
}

/// A named predicate that claims a pixel for one category.
#[derive(Clone, Copy)]
pub struct ColorRule {
    pub name: &'static str,
    pub category: Category,
    pub test: fn(&Pixel, &HeuristicBounds) -> bool,
}

impl std::fmt::Debug for ColorRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .finish()
    }
}

/// Evaluated in order; the first rule that matches wins.
pub const RULES: [ColorRule; 2] = [
    ColorRule {
        name: "sky",
        category: Category::Sky,
        test: is_sky,
    },
    ColorRule {
        name: "ground",
        category: Category::Ground,
        test: is_ground,
    },
];

/// Bright, blue-leaning and not too colorful.
pub fn is_sky(pixel: &Pixel, bounds: &HeuristicBounds) -> bool {
    let (r, g, b) = pixel.signed();
    pixel.brightness() > bounds.sky_min_brightness
        && b as f64 > bounds.sky_min_blue
        && (b > r + SKY_BLUE_MARGIN || b > g + SKY_BLUE_MARGIN)
        && pixel.saturation() < bounds.sky_max_saturation
}

/// Low blue plus one of the grass, dirt or earth-tone profiles.
pub fn is_ground(pixel: &Pixel, bounds: &HeuristicBounds) -> bool {
    let (_, _, b) = pixel.signed();
    (b as f64) < bounds.ground_max_blue
        && (is_grassy(pixel, bounds)
            || is_brownish(pixel)
            || is_earth_tone(pixel)
            || is_dark_earth(pixel))
}

fn is_grassy(pixel: &Pixel, bounds: &HeuristicBounds) -> bool {
    let (r, g, b) = pixel.signed();
    g > r + GREEN_DOMINANCE_MARGIN
        && g > b + GREEN_DOMINANCE_MARGIN
        && g as f64 > bounds.grass_min_green
        && pixel.brightness() < GRASS_MAX_BRIGHTNESS
}

// Dirt and roads: red and green both up, close to each other, blue low.
fn is_brownish(pixel: &Pixel) -> bool {
    let (r, g, b) = pixel.signed();
    r > 100 && g > 80 && b < 100 && (r - g).abs() < 30 && pixel.brightness() < BROWN_MAX_BRIGHTNESS
}

fn is_earth_tone(pixel: &Pixel) -> bool {
    let (r, g, b) = pixel.signed();
    g > 90 && r > 70 && b < 80 && b < r && b < g && pixel.brightness() < EARTH_MAX_BRIGHTNESS
}

fn is_dark_earth(pixel: &Pixel) -> bool {
    let (r, g, b) = pixel.signed();
    r > 80 && g > 70 && b < 70 && pixel.brightness() < DARK_EARTH_MAX_BRIGHTNESS
}

/// Runs the rule list against a pixel that matched no marker color.
pub fn reclassify(pixel: &Pixel, bounds: &HeuristicBounds) -> Category {
    RULES
        .iter()
        .find(|rule| (rule.test)(pixel, bounds))
        .map(|rule| rule.category)
        .unwrap_or(Category::Other)
}
