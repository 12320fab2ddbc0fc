pub mod convolve;
pub mod gaussian_blur;
pub mod resample;

pub use resample::{resize_plane, ResampleFilter};
