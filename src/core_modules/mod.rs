pub mod bounding_box;
pub mod category_mask;
pub mod color_rules;
pub mod pixel;
pub mod pixel_buffer;
pub mod placement;
pub mod position_sampler;
pub mod sprite;
pub mod utils;
