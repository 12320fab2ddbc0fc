#[allow(dead_code)]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use framescore_core::aggregate::render::render;
use framescore_core::aggregate::table::ResultTable;
use framescore_core::error::{MetricError, Result};
use framescore_core::frame::{Frame, PixelLayout};
use framescore_core::metrics::{Metric, Psnr};
use framescore_core::sequence::{FrameSource, Sequence};

use common::{distorted_sequence, gray_sequence, textured_plane};

/// Source that counts generated frames and fails at one index.
struct Probe {
    produced: Arc<AtomicUsize>,
    len: usize,
    fail_at: Option<usize>,
}

impl FrameSource for Probe {
    fn len(&self) -> usize {
        self.len
    }

    fn width(&self) -> usize {
        8
    }

    fn height(&self) -> usize {
        8
    }

    fn layout(&self) -> PixelLayout {
        PixelLayout::GRAYS
    }

    fn frame(&self, index: usize) -> Result<Frame> {
        if self.fail_at == Some(index) {
            return Err(MetricError::Backend(format!("frame {index} unavailable")));
        }
        self.produced.fetch_add(1, Ordering::SeqCst);
        let mut frame = Frame::gray(textured_plane(8, 8, index as f32));
        frame.set_prop("index", index as i64);
        Ok(frame)
    }
}

#[test]
fn test_frames_arrive_in_order() {
    let seq = Sequence::new(Probe {
        produced: Arc::new(AtomicUsize::new(0)),
        len: 40,
        fail_at: None,
    });
    let indices: Vec<usize> = render(&seq, 8).unwrap().map(|r| r.unwrap().0).collect();
    assert_eq!(indices, (0..40).collect::<Vec<_>>());

    for item in render(&seq, 3).unwrap() {
        let (index, frame) = item.unwrap();
        let tagged = frame.prop("index").and_then(|v| v.as_f64()).unwrap();
        assert_eq!(tagged as usize, index);
    }
}

#[test]
fn test_read_ahead_does_not_change_results() {
    let reference = gray_sequence(24, 24, 50);
    let distorted = distorted_sequence(&reference, 0.05);
    let scored = Psnr::default().compute(&reference, Some(&distorted)).unwrap();
    let columns = scored.props().to_vec();

    let serial = ResultTable::materialize(scored.primary(), &columns, 1).unwrap();
    let parallel = ResultTable::materialize(scored.primary(), &columns, 8).unwrap();
    assert_eq!(serial, parallel);
    assert_eq!(serial.len(), 50);

    let mut a = Vec::new();
    let mut b = Vec::new();
    serial.write_to(&mut a).unwrap();
    parallel.write_to(&mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_zero_read_ahead_still_renders() {
    let seq = gray_sequence(8, 8, 5);
    assert_eq!(render(&seq, 0).unwrap().count(), 5);
}

#[test]
fn test_error_stops_iteration() {
    let seq = Sequence::new(Probe {
        produced: Arc::new(AtomicUsize::new(0)),
        len: 10,
        fail_at: Some(3),
    });
    let results: Vec<_> = render(&seq, 4).unwrap().collect();
    assert_eq!(results.len(), 4);
    assert!(results[..3].iter().all(|r| r.is_ok()));
    assert!(matches!(results[3], Err(MetricError::Backend(_))));
}

#[test]
fn test_early_drop_bounds_work() {
    let produced = Arc::new(AtomicUsize::new(0));
    let seq = Sequence::new(Probe {
        produced: produced.clone(),
        len: 1000,
        fail_at: None,
    });
    let taken: Vec<_> = render(&seq, 4).unwrap().take(2).collect();
    assert_eq!(taken.len(), 2);
    // Dispatch never runs more than `read_ahead` frames past the consumer.
    assert!(produced.load(Ordering::SeqCst) <= 2 + 4);
}

#[test]
fn test_missing_prop_fails_materialization() {
    let seq = gray_sequence(8, 8, 2);
    let err = ResultTable::materialize(&seq, &["psnr_gray".to_string()], 2).unwrap_err();
    match err {
        MetricError::MissingProperty { index, name } => {
            assert_eq!(index, 0);
            assert_eq!(name, "psnr_gray");
        }
        other => panic!("expected MissingProperty, got {other:?}"),
    }
}

#[test]
fn test_render_inside_single_thread_pool() {
    let reference = gray_sequence(16, 16, 12);
    let distorted = distorted_sequence(&reference, 0.05);
    let scored = Psnr::default().compute(&reference, Some(&distorted)).unwrap();
    let expected = ResultTable::materialize(scored.primary(), scored.props(), 1).unwrap();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .unwrap();
    let table = pool.install(|| scored.table(4)).unwrap();
    assert_eq!(*table, expected);
}

#[test]
fn test_render_from_parallel_callers() {
    use rayon::prelude::*;

    let clips: Vec<Sequence> = (0..4).map(|i| gray_sequence(16, 16, 6 + i)).collect();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(2)
        .build()
        .unwrap();
    let lengths: Vec<usize> = pool.install(|| {
        clips
            .par_iter()
            .map(|clip| render(clip, 3).unwrap().filter(|r| r.is_ok()).count())
            .collect()
    });
    assert_eq!(lengths, vec![6, 7, 8, 9]);
}
