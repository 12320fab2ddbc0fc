#[allow(dead_code)]
mod common;

use ndarray::Array2;

use framescore_core::error::MetricError;
use framescore_core::filters::ResampleFilter;
use framescore_core::frame::{Frame, PixelLayout};
use framescore_core::sequence::Sequence;

use common::{color_sequence, gray_sequence, position_frame};

fn tagged_sequence(frames: usize, tag: i64) -> Sequence {
    let frames = (0..frames)
        .map(|i| {
            let mut frame = Frame::gray(Array2::zeros((4, 4)));
            frame.set_prop("tag", tag * 100 + i as i64);
            frame
        })
        .collect();
    Sequence::from_frames(frames).unwrap()
}

fn tag(seq: &Sequence, index: usize) -> i64 {
    seq.frame(index)
        .unwrap()
        .prop("tag")
        .and_then(|v| v.as_f64())
        .unwrap() as i64
}

#[test]
fn test_out_of_range_frame() {
    let seq = gray_sequence(8, 8, 3);
    match seq.frame(3).unwrap_err() {
        MetricError::FrameIndexOutOfRange { index, total } => {
            assert_eq!((index, total), (3, 3));
        }
        other => panic!("expected FrameIndexOutOfRange, got {other:?}"),
    }
}

#[test]
fn test_from_frames_requires_uniform_frames() {
    let a = Frame::gray(Array2::zeros((4, 4)));
    let b = Frame::gray(Array2::zeros((4, 5)));
    assert!(Sequence::from_frames(vec![a, b]).is_err());
}

#[test]
fn test_frame_new_checks_chroma_dims() {
    let luma = Array2::<f32>::zeros((8, 8));
    let chroma = Array2::<f32>::zeros((4, 4));
    assert!(Frame::new(
        vec![luma.clone(), chroma.clone(), chroma.clone()],
        PixelLayout::YUV420P8
    )
    .is_ok());
    assert!(Frame::new(vec![luma.clone(), chroma.clone(), chroma], PixelLayout::YUV444P8).is_err());
    assert!(Frame::new(vec![luma], PixelLayout::YUV444P8).is_err());
}

#[test]
fn test_interleave_round_robin() {
    let a = tagged_sequence(3, 1);
    let b = tagged_sequence(3, 2);
    let merged = Sequence::interleave(&[a, b]).unwrap();
    assert_eq!(merged.len(), 6);
    let tags: Vec<i64> = (0..6).map(|i| tag(&merged, i)).collect();
    assert_eq!(tags, vec![100, 200, 101, 201, 102, 202]);
}

#[test]
fn test_interleave_requires_equal_lengths() {
    let a = tagged_sequence(3, 1);
    let b = tagged_sequence(2, 2);
    assert!(Sequence::interleave(&[a, b]).is_err());
    assert!(matches!(
        Sequence::interleave(&[]).unwrap_err(),
        MetricError::EmptySequence
    ));
}

#[test]
fn test_select_every() {
    let seq = tagged_sequence(7, 1);
    let every_third = seq.select_every(3, 1).unwrap();
    assert_eq!(every_third.len(), 2);
    assert_eq!(tag(&every_third, 0), 101);
    assert_eq!(tag(&every_third, 1), 104);
    assert!(seq.select_every(0, 0).is_err());
    assert!(seq.select_every(2, 2).is_err());
}

#[test]
fn test_crop_and_resize() {
    let seq = Sequence::from_frames(vec![position_frame(16, 8)]).unwrap();
    let cropped = seq.crop(2, 1, 4, 3).unwrap();
    assert_eq!((cropped.width(), cropped.height()), (10, 4));
    assert_eq!(
        cropped.frame(0).unwrap().plane(0)[[0, 0]],
        position_frame(16, 8).plane(0)[[1, 2]]
    );
    assert!(seq.crop(8, 0, 8, 0).is_err());

    let resized = seq.resize(32, 16, ResampleFilter::Bicubic).unwrap();
    assert_eq!(resized.frame(0).unwrap().plane(0).dim(), (16, 32));
    assert!(seq.resize(0, 16, ResampleFilter::Bicubic).is_err());
}

#[test]
fn test_resize_keeps_chroma_grid() {
    let seq = color_sequence(PixelLayout::YUV420PS, 32, 32, 1);
    let resized = seq.resize(16, 8, ResampleFilter::Lanczos3).unwrap();
    let frame = resized.frame(0).unwrap();
    assert_eq!(frame.plane(0).dim(), (8, 16));
    assert_eq!(frame.plane(1).dim(), (4, 8));
    assert!(seq.resize(15, 8, ResampleFilter::Lanczos3).is_err());
}

#[test]
fn test_convert_quantizes() {
    let data = Array2::from_elem((2, 2), 0.5f32);
    let seq = Sequence::from_frames(vec![Frame::gray(data)]).unwrap();
    let converted = seq.convert(PixelLayout::GRAY8).unwrap();
    let frame = converted.frame(0).unwrap();
    assert_eq!(frame.layout, PixelLayout::GRAY8);
    assert_eq!(frame.plane(0)[[0, 0]], 128.0 / 255.0);
    assert!(seq.convert(PixelLayout::RGB24).is_err());
}

#[test]
fn test_describe() {
    let seq = gray_sequence(8, 4, 2);
    assert_eq!(seq.describe(), "8x4 GRAYS, 2 frames");
}
