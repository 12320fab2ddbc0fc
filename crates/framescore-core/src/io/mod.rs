pub mod image_io;
pub mod ser;
pub mod ser_writer;

use std::path::Path;

use crate::error::Result;
use crate::sequence::Sequence;

/// Open a `.ser` file as a lazy sequence, or any other image as a
/// single-frame sequence.
pub fn open_sequence(path: &Path) -> Result<Sequence> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("ser") => {
            Ok(ser::SerReader::open(path)?.into_sequence())
        }
        _ => Sequence::from_frames(vec![image_io::load_image(path)?]),
    }
}
