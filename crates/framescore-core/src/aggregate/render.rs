use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{MetricError, Result};
use crate::frame::Frame;
use crate::sequence::Sequence;

type Rendered = (usize, Result<Frame>);

/// Pull every frame of `sequence` with at most `read_ahead` frames in
/// flight, yielding them in index order.
///
/// Frames are computed on a pool of `read_ahead` threads owned by the
/// iterator, so rendering from inside another rayon pool (including a
/// single-threaded one) cannot starve its own workers.
///
/// Dropping the iterator stops dispatch; tasks that are already queued see
/// the cancellation flag and return without computing. Results still in
/// flight are discarded.
pub fn render(sequence: &Sequence, read_ahead: usize) -> Result<RenderIter> {
    let read_ahead = read_ahead.max(1);
    let pool = build_pool(read_ahead)?;
    let (tx, rx) = mpsc::channel();
    Ok(RenderIter {
        sequence: sequence.clone(),
        read_ahead,
        pool,
        next_dispatch: 0,
        next_deliver: 0,
        pending: BTreeMap::new(),
        tx,
        rx,
        cancelled: Arc::new(AtomicBool::new(false)),
        failed: false,
    })
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("framescore-render-{i}"))
        .build()
        .map_err(|e| MetricError::Backend(format!("failed to build render thread pool: {e}")))
}

pub struct RenderIter {
    sequence: Sequence,
    read_ahead: usize,
    pool: ThreadPool,
    next_dispatch: usize,
    next_deliver: usize,
    pending: BTreeMap<usize, Result<Frame>>,
    tx: Sender<Rendered>,
    rx: Receiver<Rendered>,
    cancelled: Arc<AtomicBool>,
    failed: bool,
}

impl RenderIter {
    fn dispatch(&mut self) {
        let total = self.sequence.len();
        while self.next_dispatch < total && self.next_dispatch < self.next_deliver + self.read_ahead
        {
            let index = self.next_dispatch;
            let sequence = self.sequence.clone();
            let tx = self.tx.clone();
            let cancelled = self.cancelled.clone();
            self.pool.spawn(move || {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                let result = sequence.frame(index);
                // The receiver is gone once the iterator is dropped.
                let _ = tx.send((index, result));
            });
            self.next_dispatch += 1;
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Iterator for RenderIter {
    type Item = Result<(usize, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_deliver >= self.sequence.len() {
            return None;
        }
        self.dispatch();

        let result = loop {
            if let Some(result) = self.pending.remove(&self.next_deliver) {
                break result;
            }
            match self.rx.recv() {
                Ok((index, result)) => {
                    self.pending.insert(index, result);
                }
                Err(_) => {
                    break Err(MetricError::Backend(
                        "render worker disconnected".to_string(),
                    ))
                }
            }
        };

        let index = self.next_deliver;
        self.next_deliver += 1;
        match result {
            Ok(frame) => Some(Ok((index, frame))),
            Err(e) => {
                debug!(index, error = %e, "Render failed, cancelling outstanding frames");
                self.failed = true;
                self.cancel();
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sequence.len().saturating_sub(self.next_deliver);
        (0, Some(remaining))
    }
}

impl Drop for RenderIter {
    fn drop(&mut self) {
        self.cancel();
    }
}
