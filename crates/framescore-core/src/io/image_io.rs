use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::Array2;

use crate::error::{MetricError, Result};
use crate::frame::{ColorFamily, Frame, PixelLayout};

/// Save plane 0 (Gray) or all three planes (RGB) as 16-bit TIFF.
pub fn save_tiff(frame: &Frame, path: &Path) -> Result<()> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let quantize = |v: f32| (v.clamp(0.0, 1.0) * 65535.0).round() as u16;
    match frame.layout.family {
        ColorFamily::Rgb => {
            let mut pixels = Vec::with_capacity((w * h * 3) as usize);
            for ((r, g), b) in frame.planes[0]
                .iter()
                .zip(frame.planes[1].iter())
                .zip(frame.planes[2].iter())
            {
                pixels.extend_from_slice(&[quantize(*r), quantize(*g), quantize(*b)]);
            }
            let img = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w, h, pixels)
                .ok_or(MetricError::InvalidDimensions {
                    width: w as usize,
                    height: h as usize,
                })?;
            img.save_with_format(path, ImageFormat::Tiff)?;
        }
        _ => {
            let pixels: Vec<u16> = frame.planes[0].iter().map(|&v| quantize(v)).collect();
            let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w, h, pixels)
                .ok_or(MetricError::InvalidDimensions {
                    width: w as usize,
                    height: h as usize,
                })?;
            img.save_with_format(path, ImageFormat::Tiff)?;
        }
    }
    Ok(())
}

/// Save plane 0 (Gray) or all three planes (RGB) as 8-bit PNG.
pub fn save_png(frame: &Frame, path: &Path) -> Result<()> {
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let quantize = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match frame.layout.family {
        ColorFamily::Rgb => {
            let mut img = RgbImage::new(w, h);
            for (x, y, pixel) in img.enumerate_pixels_mut() {
                let (r, c) = (y as usize, x as usize);
                *pixel = Rgb([
                    quantize(frame.planes[0][[r, c]]),
                    quantize(frame.planes[1][[r, c]]),
                    quantize(frame.planes[2][[r, c]]),
                ]);
            }
            img.save_with_format(path, ImageFormat::Png)?;
        }
        _ => {
            let mut img = GrayImage::new(w, h);
            for (x, y, pixel) in img.enumerate_pixels_mut() {
                *pixel = Luma([quantize(frame.planes[0][[y as usize, x as usize]])]);
            }
            img.save_with_format(path, ImageFormat::Png)?;
        }
    }
    Ok(())
}

/// Save a frame, choosing the format from the file extension.
pub fn save_image(frame: &Frame, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(frame, path),
        _ => save_tiff(frame, path),
    }
}

/// Load an image file as a GRAY8/GRAY16 or RGB24/RGB48 frame.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let is_color = img.color().has_color();
    let wide = img.color().bytes_per_pixel() / img.color().channel_count() > 1;

    if is_color {
        let rgb = img.to_rgb16();
        let planes = (0..3)
            .map(|c| Array2::from_shape_fn((h, w), |(r, col)| {
                rgb.get_pixel(col as u32, r as u32).0[c] as f32 / 65535.0
            }))
            .collect();
        let layout = if wide {
            PixelLayout::RGB48
        } else {
            PixelLayout::RGB24
        };
        Frame::new(planes, layout)
    } else {
        let gray = match img {
            DynamicImage::ImageLuma16(g) => g,
            other => other.to_luma16(),
        };
        let data = Array2::from_shape_fn((h, w), |(r, c)| {
            gray.get_pixel(c as u32, r as u32).0[0] as f32 / 65535.0
        });
        let layout = if wide {
            PixelLayout::GRAY16
        } else {
            PixelLayout::GRAY8
        };
        Frame::new(vec![data], layout)
    }
}
