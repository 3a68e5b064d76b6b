// Debug rendering: turn a category mask and a placement batch back into a PNG
// that can be opened next to the source photograph.

pub mod image_helper {
    use crate::core_modules::bounding_box::BoundingBox;
    use crate::core_modules::category_mask::{Category, CategoryMask};
    use image::{ImageEncoder, Rgba, RgbaImage};
    use std::path::Path;

    /// Gray used for background of unknown kind.
    pub const UNKNOWN_BACKGROUND: Rgba<u8> = Rgba([128, 128, 128, 255]);
    /// Outline color for placed items.
    pub const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);

    pub fn save(
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
        buffer: &[u8],
    ) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = image::codecs::png::PngEncoder::new(output);

        encoder.write_image(buffer, width, height, image::ExtendedColorType::Rgba8)?;

        Ok(())
    }

    pub fn category_color(category: Category) -> Rgba<u8> {
        match category.marker_color() {
            Some((r, g, b)) => Rgba([r, g, b, 255]),
            None => UNKNOWN_BACKGROUND,
        }
    }

    /// Paints every mask cell in its marker color.
    pub fn render_mask(mask: &CategoryMask) -> RgbaImage {
        RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
            mask.get(x, y)
                .map(category_color)
                .unwrap_or(UNKNOWN_BACKGROUND)
        })
    }

    /// Draws a one-pixel outline for each box, clipped to the image.
    pub fn outline_boxes(image: &mut RgbaImage, boxes: &[BoundingBox], color: Rgba<u8>) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let clamp_x = |v: f64| v.max(0.0).min((width - 1) as f64) as u32;
        let clamp_y = |v: f64| v.max(0.0).min((height - 1) as f64) as u32;

        for bounds in boxes {
            if bounds.right() <= 0.0 || bounds.bottom() <= 0.0 {
                continue;
            }
            if bounds.x >= width as f64 || bounds.y >= height as f64 {
                continue;
            }
            let (x0, x1) = (clamp_x(bounds.x), clamp_x(bounds.right() - 1.0));
            let (y0, y1) = (clamp_y(bounds.y), clamp_y(bounds.bottom() - 1.0));
            for x in x0..=x1 {
                image.put_pixel(x, y0, color);
                image.put_pixel(x, y1, color);
            }
            for y in y0..=y1 {
                image.put_pixel(x0, y, color);
                image.put_pixel(x1, y, color);
            }
        }
    }

    /// Mask colors with the placement outlines on top, written as PNG.
    pub fn save_debug_overlay(
        path: impl AsRef<Path>,
        mask: &CategoryMask,
        boxes: &[BoundingBox],
    ) -> Result<(), image::error::ImageError> {
        let mut image = render_mask(mask);
        outline_boxes(&mut image, boxes, OUTLINE);
        save(path, image.width(), image.height(), image.as_raw())
    }
}
