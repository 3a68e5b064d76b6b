pub mod segmentation;
pub mod sprites;
