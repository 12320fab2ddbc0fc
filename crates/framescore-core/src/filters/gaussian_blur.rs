use ndarray::Array2;
use num_traits::Float;

use super::convolve::separable_convolve;

/// Gaussian filter whose kernel extends `truncate` standard deviations.
pub fn gaussian_filter<T>(data: &Array2<T>, sigma: f64, truncate: f64) -> Array2<T>
where
    T: Float + Send + Sync,
{
    let radius = (truncate * sigma + 0.5) as usize;
    let kernel = make_gaussian_kernel::<T>(sigma, radius);
    separable_convolve(data, &kernel)
}

/// Normalized Gaussian kernel of `2 * radius + 1` taps.
pub fn make_gaussian_kernel<T: Float>(sigma: f64, radius: usize) -> Vec<T> {
    let size = 2 * radius + 1;
    let s2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / s2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter()
        .map(|v| T::from(v / sum).unwrap_or_else(T::zero))
        .collect()
}
