use crate::error::{MetricError, Result};
use crate::frame::{ColorFamily, PixelLayout};

const YUV_CHANNELS: [&str; 3] = ["y", "u", "v"];
const RGB_CHANNELS: [&str; 3] = ["r", "g", "b"];

/// Channel suffixes in plane order; empty for single-plane layouts.
pub fn channel_suffixes(layout: PixelLayout) -> Result<&'static [&'static str]> {
    match layout.family {
        ColorFamily::Gray => Ok(&[]),
        ColorFamily::Yuv => Ok(&YUV_CHANNELS),
        ColorFamily::Rgb => Ok(&RGB_CHANNELS),
        ColorFamily::Undefined => Err(MetricError::InvalidColorFamily(layout.name())),
    }
}

/// Suffix of a single plane, e.g. `u` for plane 1 of a YUV layout.
pub fn channel_suffix(layout: PixelLayout, plane: usize) -> Result<Option<&'static str>> {
    let suffixes = channel_suffixes(layout)?;
    if suffixes.is_empty() {
        check_planes(layout, &[plane])?;
        return Ok(None);
    }
    suffixes
        .get(plane)
        .copied()
        .map(Some)
        .ok_or_else(|| MetricError::InvalidPlanes {
            planes: vec![plane],
            planes_available: suffixes.len(),
        })
}

/// Metadata keys a metric produces for `planes` of `layout`.
///
/// Gray layouts return the base names unchanged. Multi-channel layouts emit
/// `{base}_{channel}` for each base name (outer) and each requested channel
/// in declared channel order (inner).
pub fn expand<S: AsRef<str>>(
    base_names: &[S],
    layout: PixelLayout,
    planes: &[usize],
) -> Result<Vec<String>> {
    let suffixes = channel_suffixes(layout)?;
    check_planes(layout, planes)?;

    if suffixes.is_empty() {
        return Ok(base_names.iter().map(|b| b.as_ref().to_string()).collect());
    }

    let mut keys = Vec::with_capacity(base_names.len() * planes.len());
    for base in base_names {
        for (i, channel) in suffixes.iter().enumerate() {
            if planes.contains(&i) {
                keys.push(format!("{}_{}", base.as_ref(), channel));
            }
        }
    }
    Ok(keys)
}

/// Requested plane indices must exist in `layout`.
pub fn check_planes(layout: PixelLayout, planes: &[usize]) -> Result<()> {
    let available = layout.num_planes();
    if planes.iter().any(|&p| p >= available) {
        return Err(MetricError::InvalidPlanes {
            planes: planes.to_vec(),
            planes_available: available,
        });
    }
    Ok(())
}
