use std::fmt;

use crate::error::{MetricError, Result};
use crate::frame::PixelLayout;
use crate::sequence::Sequence;

/// The exact set of pixel layouts a metric accepts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayoutSet(Vec<PixelLayout>);

impl LayoutSet {
    pub fn new(layouts: impl IntoIterator<Item = PixelLayout>) -> Self {
        let mut set = Vec::new();
        for layout in layouts {
            if !set.contains(&layout) {
                set.push(layout);
            }
        }
        Self(set)
    }

    /// Every named Gray/YUV/RGB layout.
    pub fn known() -> Self {
        let mut set = Self::integer();
        set.0.extend(Self::float().0);
        set
    }

    /// Integer-sample layouts.
    pub fn integer() -> Self {
        Self::new([
            PixelLayout::GRAY8,
            PixelLayout::GRAY10,
            PixelLayout::GRAY12,
            PixelLayout::GRAY16,
            PixelLayout::YUV410P8,
            PixelLayout::YUV411P8,
            PixelLayout::YUV420P8,
            PixelLayout::YUV422P8,
            PixelLayout::YUV440P8,
            PixelLayout::YUV444P8,
            PixelLayout::YUV420P10,
            PixelLayout::YUV422P10,
            PixelLayout::YUV444P10,
            PixelLayout::YUV420P12,
            PixelLayout::YUV444P16,
            PixelLayout::RGB24,
            PixelLayout::RGB30,
            PixelLayout::RGB48,
        ])
    }

    /// 32-bit float layouts.
    pub fn float() -> Self {
        Self::new([
            PixelLayout::GRAYS,
            PixelLayout::YUV420PS,
            PixelLayout::YUV422PS,
            PixelLayout::YUV444PS,
            PixelLayout::RGBS,
        ])
    }

    pub fn contains(&self, layout: &PixelLayout) -> bool {
        self.0.contains(layout)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PixelLayout> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LayoutSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|l| l.name()).collect();
        f.write_str(&names.join(", "))
    }
}

impl From<PixelLayout> for LayoutSet {
    fn from(layout: PixelLayout) -> Self {
        Self(vec![layout])
    }
}

impl From<&[PixelLayout]> for LayoutSet {
    fn from(layouts: &[PixelLayout]) -> Self {
        Self::new(layouts.iter().copied())
    }
}

impl<const N: usize> From<[PixelLayout; N]> for LayoutSet {
    fn from(layouts: [PixelLayout; N]) -> Self {
        Self::new(layouts)
    }
}

impl From<Vec<PixelLayout>> for LayoutSet {
    fn from(layouts: Vec<PixelLayout>) -> Self {
        Self::new(layouts)
    }
}

impl From<&LayoutSet> for LayoutSet {
    fn from(set: &LayoutSet) -> Self {
        set.clone()
    }
}

/// Fail with `UnsupportedFormat` unless `layout` is in `allowed`.
pub fn validate_layout(layout: PixelLayout, allowed: impl Into<LayoutSet>) -> Result<()> {
    let allowed = allowed.into();
    if allowed.contains(&layout) {
        Ok(())
    } else {
        Err(MetricError::UnsupportedFormat {
            actual: layout.name(),
            expected: allowed.to_string(),
        })
    }
}

/// Check a sequence's layout against a single layout or a set of layouts.
pub fn validate(sequence: &Sequence, allowed: impl Into<LayoutSet>) -> Result<()> {
    validate_layout(sequence.layout(), allowed)
}

/// Full-reference inputs must agree on dimensions, layout family and length.
pub fn validate_pair(reference: &Sequence, distorted: &Sequence) -> Result<()> {
    if reference.width() != distorted.width()
        || reference.height() != distorted.height()
        || reference.len() != distorted.len()
        || reference.layout().family != distorted.layout().family
    {
        return Err(MetricError::DimensionMismatch {
            reference: reference.describe(),
            distorted: distorted.describe(),
        });
    }
    Ok(())
}
