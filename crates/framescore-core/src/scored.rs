use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing::info;

use crate::aggregate::table::ResultTable;
use crate::error::{MetricError, Result};
use crate::sequence::Sequence;

/// Output of one `Metric::compute` call.
///
/// Holds the annotated primary sequence, any auxiliary map sequences the
/// metric exposes, and the lazily materialized result table.
pub struct ScoredSequence {
    metric: String,
    props: Vec<String>,
    primary: Sequence,
    auxiliary: BTreeMap<String, Sequence>,
    table: Mutex<Option<Arc<ResultTable>>>,
}

impl fmt::Debug for ScoredSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoredSequence")
            .field("metric", &self.metric)
            .field("props", &self.props)
            .field("primary", &self.primary)
            .field("auxiliary", &self.auxiliary.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScoredSequence {
    pub fn new(metric: impl Into<String>, props: Vec<String>, primary: Sequence) -> Self {
        Self {
            metric: metric.into(),
            props,
            primary,
            auxiliary: BTreeMap::new(),
            table: Mutex::new(None),
        }
    }

    pub fn with_auxiliary(mut self, name: impl Into<String>, sequence: Sequence) -> Self {
        self.auxiliary.insert(name.into(), sequence);
        self
    }

    pub fn metric_name(&self) -> &str {
        &self.metric
    }

    /// Metadata keys every primary frame carries; the table's columns.
    pub fn props(&self) -> &[String] {
        &self.props
    }

    pub fn primary(&self) -> &Sequence {
        &self.primary
    }

    pub fn auxiliary(&self, name: &str) -> Result<&Sequence> {
        self.auxiliary
            .get(name)
            .ok_or_else(|| MetricError::NoSuchAuxiliaryOutput {
                metric: self.metric.clone(),
                name: name.to_string(),
            })
    }

    pub fn auxiliary_names(&self) -> impl Iterator<Item = &str> {
        self.auxiliary.keys().map(String::as_str)
    }

    /// Materialize (once) and return the result table.
    ///
    /// Later calls return the same `Arc` until [`invalidate`](Self::invalidate).
    pub fn table(&self, read_ahead: usize) -> Result<Arc<ResultTable>> {
        self.table_with_progress(read_ahead, |_| {})
    }

    /// Like [`table`](Self::table), calling `on_progress(frames_done)` per row.
    pub fn table_with_progress(
        &self,
        read_ahead: usize,
        on_progress: impl Fn(usize),
    ) -> Result<Arc<ResultTable>> {
        let mut cached = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(table) = cached.as_ref() {
            return Ok(table.clone());
        }
        let table = Arc::new(ResultTable::materialize_with_progress(
            &self.primary,
            &self.props,
            read_ahead,
            on_progress,
        )?);
        *cached = Some(table.clone());
        Ok(table)
    }

    /// Drop the cached table; the next `table` call recomputes.
    pub fn invalidate(&self) {
        *self.table.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn write_csv(
        &self,
        path: &Path,
        overwrite: bool,
        read_ahead: usize,
    ) -> Result<Arc<ResultTable>> {
        let table = self.table(read_ahead)?;
        table.persist(path, overwrite)?;
        Ok(table)
    }

    /// Reuse a table persisted at `path`, or compute and persist it.
    ///
    /// A persisted table is only reused when its columns are this sequence's
    /// props and it has one row per primary frame; otherwise the call fails
    /// with [`MetricError::TableMismatch`] and the file is left untouched.
    pub fn load_or_materialize(&self, path: &Path, read_ahead: usize) -> Result<Arc<ResultTable>> {
        let mut cached = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(table) = cached.as_ref() {
            return Ok(table.clone());
        }
        let table = if path.exists() {
            let table = ResultTable::read_csv(path)?;
            self.check_persisted(path, &table)?;
            info!(path = %path.display(), "Reusing persisted result table");
            Arc::new(table)
        } else {
            let table = Arc::new(ResultTable::materialize(
                &self.primary,
                &self.props,
                read_ahead,
            )?);
            table.persist(path, false)?;
            table
        };
        *cached = Some(table.clone());
        Ok(table)
    }

    fn check_persisted(&self, path: &Path, table: &ResultTable) -> Result<()> {
        let mismatch = |reason: String| MetricError::TableMismatch {
            path: path.to_path_buf(),
            reason,
        };
        if table.columns() != self.props.as_slice() {
            return Err(mismatch(format!(
                "columns {:?}, expected {:?} from {}",
                table.columns(),
                self.props,
                self.metric
            )));
        }
        if table.len() != self.primary.len() {
            return Err(mismatch(format!(
                "{} rows for {} frames",
                table.len(),
                self.primary.len()
            )));
        }
        Ok(())
    }
}
