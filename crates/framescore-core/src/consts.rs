/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-10;

/// Default number of frames requested ahead of consumption while rendering.
pub const DEFAULT_READ_AHEAD: usize = 1;

/// Colorimetric plane weights for RGB input (R, G, B).
pub const RGB_PLANE_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Plane weights for YUV input (Y, U, V); chroma is down-weighted.
pub const YUV_PLANE_WEIGHTS: [f64; 3] = [0.7, 0.15, 0.15];

/// Side length of the SSIM Gaussian window.
pub const SSIM_WINDOW: usize = 11;

/// Standard deviation of the SSIM Gaussian window.
pub const SSIM_SIGMA: f32 = 1.5;

/// Plane size the automatic SSIM/MDSI downsampling factor aims for.
pub const AUTO_DOWNSAMPLE_TARGET: f64 = 256.0;

/// Number of dyadic scales in the VIF decomposition.
pub const VIF_SCALES: usize = 4;

/// Floor applied to degenerate VIF variance estimates.
pub const VIF_VARIANCE_FLOOR: f64 = 1e-5;

/// Number of CAMBI scales (and per-scale banding maps).
pub const CAMBI_SCALES: usize = 5;

/// Bit depth CAMBI quantizes luma to.
pub const CAMBI_BIT_DEPTH: u32 = 10;

/// Side of the box used to decide whether a pixel lies in a flat region.
pub const CAMBI_MASK_FILTER_SIZE: usize = 7;

/// Per-scale weights for the CAMBI frame score (finest scale first).
pub const CAMBI_SCALE_WEIGHTS: [f64; CAMBI_SCALES] = [16.0, 8.0, 4.0, 2.0, 1.0];

/// 3x3 smoothing kernel applied to the composed banding mask.
pub const BANDING_SMOOTHING_KERNEL: [f32; 9] = [
    1.0 / 16.0,
    2.0 / 16.0,
    1.0 / 16.0,
    2.0 / 16.0,
    4.0 / 16.0,
    2.0 / 16.0,
    1.0 / 16.0,
    2.0 / 16.0,
    1.0 / 16.0,
];

/// Smallest tile width hybrid tiling accepts.
pub const MIN_TILE_WIDTH: usize = 320;

/// Smallest tile height hybrid tiling accepts.
pub const MIN_TILE_HEIGHT: usize = 180;

/// Alignment (in pixels) of crop and downsample dimensions.
pub const DIMENSION_ALIGNMENT: usize = 4;

/// Learned-model inputs are resized to a multiple of this block size.
pub const MODEL_BLOCK_SIZE: usize = 32;

/// Default upper bound of frames dispatched to an inference backend at once.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 16;

/// Number of column samples in the perceptual hash.
pub const HASH_COLUMNS: usize = 31;

/// Number of row samples in the perceptual hash.
pub const HASH_ROWS: usize = 17;
