// THEORY:
// The `bounding_box` module holds the geometry shared by the placement layer
// and the (external) rendering layer: an axis-aligned rectangle in image-pixel
// coordinates, plus the one question the placement engine keeps asking of it:
// "would these two items touch?"
//
// Collision is a padded separating-axis test. Both boxes are grown by the
// padding on every side; they collide unless the grown boxes are disjoint on
// the X axis or on the Y axis. The test is symmetric in its arguments.

use serde::{Deserialize, Serialize};

/// Spacing kept between placed items unless the caller asks for another value.
pub const DEFAULT_PADDING: f64 = 10.0;

/// A simple 2D point in image-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top_left(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// The box grown by `padding` on all four sides.
    pub fn expanded(&self, padding: f64) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + 2.0 * padding,
            height: self.height + 2.0 * padding,
        }
    }

    pub fn overlaps(&self, other: &BoundingBox, padding: f64) -> bool {
        overlaps(self, other, padding)
    }
}

/// Padded AABB overlap: true iff the expanded boxes intersect on both axes.
pub fn overlaps(a: &BoundingBox, b: &BoundingBox, padding: f64) -> bool {
    let a = a.expanded(padding);
    let b = b.expanded(padding);
    let disjoint_x = a.right() <= b.x || b.right() <= a.x;
    let disjoint_y = a.bottom() <= b.y || b.bottom() <= a.y;
    !disjoint_x && !disjoint_y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_boxes_overlap() {
        let a = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        assert!(overlaps(&a, &a, 0.0));
    }

    #[test]
    fn distant_boxes_do_not_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(100.0, 100.0, 10.0, 10.0);
        assert!(!overlaps(&a, &b, DEFAULT_PADDING));
    }

    #[test]
    fn padding_turns_a_near_miss_into_a_collision() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(25.0, 0.0, 10.0, 10.0);
        assert!(!overlaps(&a, &b, 0.0));
        assert!(!overlaps(&a, &b, 7.5));
        assert!(overlaps(&a, &b, 8.0));
        assert!(overlaps(&a, &b, DEFAULT_PADDING));
    }

    #[test]
    fn separation_on_one_axis_is_enough() {
        let a = BoundingBox::new(0.0, 0.0, 50.0, 10.0);
        let b = BoundingBox::new(10.0, 40.0, 10.0, 10.0);
        assert!(!overlaps(&a, &b, 5.0));
    }

    #[test]
    fn overlap_is_symmetric() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(5.0, 5.0, 3.0, 30.0),
            BoundingBox::new(18.0, 2.0, 6.0, 6.0),
            BoundingBox::new(40.0, 40.0, 1.0, 1.0),
            BoundingBox::new(-5.0, 12.0, 50.0, 2.0),
        ];
        for padding in [0.0, 2.5, 10.0] {
            for a in &boxes {
                for b in &boxes {
                    assert_eq!(overlaps(a, b, padding), overlaps(b, a, padding));
                }
            }
        }
    }

    #[test]
    fn geometry_helpers() {
        let bounds = BoundingBox::new(2.0, 4.0, 6.0, 8.0);
        assert_eq!(bounds.right(), 8.0);
        assert_eq!(bounds.bottom(), 12.0);
        assert_eq!(bounds.center(), Point { x: 5.0, y: 8.0 });
        assert_eq!(bounds.expanded(1.0), BoundingBox::new(1.0, 3.0, 8.0, 10.0));
    }
}
