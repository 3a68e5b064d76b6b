// THEORY:
// The `Pixel` module is the most fundamental unit of the classifier. It is a
// "dumb" data container for a single RGBA sample plus the handful of
// single-pixel heuristics the mask classifier needs. Nothing here looks at
// neighbours; anything that needs more than one pixel lives in higher layers.
//
// Heuristic families (all single-pixel):
// - Brightness:  arithmetic mean of R, G, B (0..255)
// - Saturation:  max(R,G,B) - min(R,G,B), a cheap chroma proxy (0..255)
// - Opacity:     alpha normalized to 0..1, used by the cutout classifier
// - Marker match: per-channel distance to one of the reserved marker colors

pub mod pixel {
    pub type Byte = u8;
    pub type Bytes = Vec<Byte>;
    pub type Channel = Byte;
    pub type Brightness = f64;
    pub type Saturation = f64;
    pub type Opacity = f64;

    pub const CHANNELS: usize = 4;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub const fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        pub const fn opaque(red: Channel, green: Channel, blue: Channel) -> Self {
            Self::new(red, green, blue, 255)
        }

        /// Mean of the three color channels.
        pub fn brightness(&self) -> Brightness {
            (self.red as f64 + self.green as f64 + self.blue as f64) / 3.0
        }

        /// Spread between the strongest and weakest color channel.
        pub fn saturation(&self) -> Saturation {
            let max = self.red.max(self.green).max(self.blue);
            let min = self.red.min(self.green).min(self.blue);
            (max - min) as Saturation
        }

        pub fn opacity(&self) -> Opacity {
            self.alpha as Opacity / 255.0
        }

        /// Channels widened to signed integers so offsets like `g > r + 20`
        /// can be written without overflow.
        pub fn signed(&self) -> (i32, i32, i32) {
            (self.red as i32, self.green as i32, self.blue as i32)
        }

        /// True when every color channel is within `tolerance` of `marker`.
        /// Alpha is ignored.
        pub fn matches_marker(&self, marker: (Channel, Channel, Channel), tolerance: u8) -> bool {
            self.red.abs_diff(marker.0) <= tolerance
                && self.green.abs_diff(marker.1) <= tolerance
                && self.blue.abs_diff(marker.2) <= tolerance
        }
    }

    impl From<&[Byte]> for Pixel {
        fn from(bytes: &[Byte]) -> Self {
            if bytes.len() != CHANNELS {
                panic!("Cannot convert {} bytes into pixel.", bytes.len());
            }
            Pixel::new(bytes[0], bytes[1], bytes[2], bytes[3])
        }
    }

    impl From<Pixel> for Bytes {
        fn from(pixel: Pixel) -> Self {
            vec![pixel.red, pixel.green, pixel.blue, pixel.alpha]
        }
    }
}
