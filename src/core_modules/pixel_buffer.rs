// THEORY:
// The `PixelBuffer` is the raw classification signal handed back by the
// segmentation service: a width x height grid of RGBA samples. Like `Pixel`,
// it is a "dumb", immutable data container. It validates its own layout once,
// at construction, so the classifier downstream can treat every buffer it
// receives as well formed and stay a total function.
//
// A buffer is never edited. When the user picks a new photograph, the session
// drops the old buffer and installs a new one wholesale.

pub mod pixel_buffer {
    use crate::core_modules::pixel::pixel::{CHANNELS, Pixel};
    use crate::error::BufferError;
    use image::{DynamicImage, RgbaImage};

    /// An immutable RGBA grid in row-major order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PixelBuffer {
        /// The width of the buffer in pixels.
        width: u32,
        /// The height of the buffer in pixels.
        height: u32,
        /// Flattened RGBA bytes, `width * height * 4` long.
        data: Vec<u8>,
    }

    impl PixelBuffer {
        pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, BufferError> {
            if width == 0 || height == 0 {
                return Err(BufferError::ZeroSized { width, height });
            }
            let expected = width as usize * height as usize * CHANNELS;
            if data.len() != expected {
                return Err(BufferError::LengthMismatch {
                    expected,
                    actual: data.len(),
                });
            }
            Ok(Self {
                width,
                height,
                data,
            })
        }

        /// Builds a buffer where every pixel comes from `f(x, y)`.
        pub fn from_fn(
            width: u32,
            height: u32,
            mut f: impl FnMut(u32, u32) -> Pixel,
        ) -> Result<Self, BufferError> {
            let mut data = Vec::with_capacity(width as usize * height as usize * CHANNELS);
            for y in 0..height {
                for x in 0..width {
                    let p = f(x, y);
                    data.extend_from_slice(&[p.red, p.green, p.blue, p.alpha]);
                }
            }
            Self::new(width, height, data)
        }

        pub fn from_rgba_image(image: RgbaImage) -> Result<Self, BufferError> {
            let (width, height) = image.dimensions();
            Self::new(width, height, image.into_raw())
        }

        pub fn from_image(image: DynamicImage) -> Result<Self, BufferError> {
            Self::from_rgba_image(image.into_rgba8())
        }

        pub fn width(&self) -> u32 {
            self.width
        }

        pub fn height(&self) -> u32 {
            self.height
        }

        pub fn as_bytes(&self) -> &[u8] {
            &self.data
        }

        pub fn len(&self) -> usize {
            self.width as usize * self.height as usize
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
            if x >= self.width || y >= self.height {
                return None;
            }
            let start = (y as usize * self.width as usize + x as usize) * CHANNELS;
            Some(Pixel::from(&self.data[start..start + CHANNELS]))
        }

        /// All pixels in row-major order.
        pub fn pixels(&self) -> impl Iterator<Item = Pixel> + '_ {
            self.data.chunks_exact(CHANNELS).map(Pixel::from)
        }
    }
}
