use ndarray::{s, Array2, Zip};
use num_traits::Float;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Map an out-of-range index back into `0..len` by half-sample symmetric
/// reflection (`d c b a | a b c d | d c b a`), repeating for long kernels.
pub fn reflect_index(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = index.rem_euclid(period);
    if m < len as isize {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Convolve every row with a 1D kernel (edges reflected).
pub fn convolve_rows<T>(data: &Array2<T>, kernel: &[T]) -> Array2<T>
where
    T: Float + Send + Sync,
{
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<T>::zeros((h, w));

    let tap = |(row, col): (usize, usize), out: &mut T| {
        let mut sum = T::zero();
        for (ki, &kv) in kernel.iter().enumerate() {
            let src_col = reflect_index(col as isize + ki as isize - radius as isize, w);
            sum = sum + data[[row, src_col]] * kv;
        }
        *out = sum;
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        Zip::indexed(&mut result).par_for_each(tap);
    } else {
        Zip::indexed(&mut result).for_each(tap);
    }
    result
}

/// Convolve every column with a 1D kernel (edges reflected).
pub fn convolve_cols<T>(data: &Array2<T>, kernel: &[T]) -> Array2<T>
where
    T: Float + Send + Sync,
{
    let (h, w) = data.dim();
    let radius = kernel.len() / 2;
    let mut result = Array2::<T>::zeros((h, w));

    let tap = |(row, col): (usize, usize), out: &mut T| {
        let mut sum = T::zero();
        for (ki, &kv) in kernel.iter().enumerate() {
            let src_row = reflect_index(row as isize + ki as isize - radius as isize, h);
            sum = sum + data[[src_row, col]] * kv;
        }
        *out = sum;
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        Zip::indexed(&mut result).par_for_each(tap);
    } else {
        Zip::indexed(&mut result).for_each(tap);
    }
    result
}

pub fn separable_convolve<T>(data: &Array2<T>, kernel: &[T]) -> Array2<T>
where
    T: Float + Send + Sync,
{
    convolve_cols(&convolve_rows(data, kernel), kernel)
}

/// Full 3x3 correlation with a row-major kernel, edges reflected.
pub fn convolve_3x3<T>(data: &Array2<T>, kernel: &[T; 9]) -> Array2<T>
where
    T: Float + Send + Sync,
{
    let (h, w) = data.dim();
    let mut result = Array2::<T>::zeros((h, w));

    let tap = |(row, col): (usize, usize), out: &mut T| {
        let mut sum = T::zero();
        for dy in 0..3 {
            let r = reflect_index(row as isize + dy as isize - 1, h);
            for dx in 0..3 {
                let c = reflect_index(col as isize + dx as isize - 1, w);
                sum = sum + data[[r, c]] * kernel[dy * 3 + dx];
            }
        }
        *out = sum;
    };

    if h * w >= PARALLEL_PIXEL_THRESHOLD {
        Zip::indexed(&mut result).par_for_each(tap);
    } else {
        Zip::indexed(&mut result).for_each(tap);
    }
    result
}

/// Mean over a `size` x `size` neighbourhood.
pub fn box_average<T>(data: &Array2<T>, size: usize) -> Array2<T>
where
    T: Float + Send + Sync,
{
    if size <= 1 {
        return data.clone();
    }
    let weight = T::one() / T::from(size).unwrap_or_else(T::one);
    let kernel = vec![weight; size];
    // Even sizes are centred one sample to the left, like MATLAB's 'same'.
    separable_convolve(data, &kernel)
}

/// Keep every `step`-th sample along both axes, starting at the origin.
pub fn subsample<T: Clone>(data: &Array2<T>, step: usize) -> Array2<T> {
    if step <= 1 {
        return data.clone();
    }
    data.slice(s![..;step, ..;step]).to_owned()
}

/// 2x2 mean downsample; odd trailing rows/columns are dropped.
pub fn downsample_2x<T: Float>(data: &Array2<T>) -> Array2<T> {
    let (h, w) = data.dim();
    let (nh, nw) = ((h / 2).max(1), (w / 2).max(1));
    let quarter = T::from(0.25).unwrap_or_else(T::zero);
    Array2::from_shape_fn((nh, nw), |(r, c)| {
        let r0 = (2 * r).min(h - 1);
        let r1 = (2 * r + 1).min(h - 1);
        let c0 = (2 * c).min(w - 1);
        let c1 = (2 * c + 1).min(w - 1);
        (data[[r0, c0]] + data[[r0, c1]] + data[[r1, c0]] + data[[r1, c1]]) * quarter
    })
}

/// Prewitt gradient magnitude (kernels divided by 3).
pub fn prewitt_magnitude<T>(data: &Array2<T>) -> Array2<T>
where
    T: Float + Send + Sync,
{
    let third = T::one() / T::from(3.0).unwrap_or_else(T::one);
    let zero = T::zero();
    let kx = [third, zero, -third, third, zero, -third, third, zero, -third];
    let ky = [third, third, third, zero, zero, zero, -third, -third, -third];
    let gx = convolve_3x3(data, &kx);
    let gy = convolve_3x3(data, &ky);
    Zip::from(&gx).and(&gy).map_collect(|&x, &y| (x * x + y * y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_index() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(-5, 4), 3);
        assert_eq!(reflect_index(8, 4), 0);
        assert_eq!(reflect_index(3, 1), 0);
    }

    #[test]
    fn test_wide_kernel_reflects_at_border() {
        let data = Array2::from_shape_fn((2, 5), |(_, c)| c as f32);
        // Picks the sample two to the right of each output.
        let shift = [0.0, 0.0, 0.0, 0.0, 1.0f32];
        let out = convolve_rows(&data, &shift);
        assert_eq!(out[[0, 2]], 4.0);
        assert_eq!(out[[0, 3]], 4.0);
        assert_eq!(out[[0, 4]], 3.0);

        let cols = convolve_cols(&data.t().to_owned(), &shift);
        assert_eq!(cols[[4, 1]], 3.0);
    }
}
