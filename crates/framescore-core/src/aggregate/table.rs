use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{MetricError, Result};
use crate::sequence::Sequence;

use super::render::render;

/// Label of the frame-index column in persisted tables.
const INDEX_LABEL: &str = "Frame";

/// Per-frame metric values: one row per frame, one column per metadata key.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(MetricError::Parse(format!(
                "row {i} has {} values for {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Render every frame of `sequence` once, in index order, collecting
    /// the numeric value of each `columns` prop.
    pub fn materialize(sequence: &Sequence, columns: &[String], read_ahead: usize) -> Result<Self> {
        Self::materialize_with_progress(sequence, columns, read_ahead, |_| {})
    }

    pub fn materialize_with_progress(
        sequence: &Sequence,
        columns: &[String],
        read_ahead: usize,
        on_progress: impl Fn(usize),
    ) -> Result<Self> {
        info!(
            frames = sequence.len(),
            columns = columns.len(),
            read_ahead,
            "Materializing result table"
        );
        let mut rows = Vec::with_capacity(sequence.len());
        for item in render(sequence, read_ahead)? {
            let (index, frame) = item?;
            let row = columns
                .iter()
                .map(|name| {
                    frame
                        .prop(name)
                        .and_then(|v| v.as_f64())
                        .ok_or_else(|| MetricError::MissingProperty {
                            index,
                            name: name.clone(),
                        })
                })
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
            on_progress(rows.len());
        }
        Ok(Self {
            columns: columns.to_vec(),
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| MetricError::UnknownColumn(name.to_string()))
    }

    /// Values of one column in frame order.
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| row[idx]).collect())
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(MetricError::Parse(format!(
                "row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Write as comma-separated text: a header row, then one row per frame
    /// whose first cell is the frame index.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write!(writer, "{INDEX_LABEL}")?;
        for column in &self.columns {
            write!(writer, ",{column}")?;
        }
        writeln!(writer)?;
        for (index, row) in self.rows.iter().enumerate() {
            write!(writer, "{index}")?;
            for value in row {
                write!(writer, ",{value}")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Persist to `path`; an existing file is only replaced with `overwrite`.
    pub fn persist(&self, path: &Path, overwrite: bool) -> Result<()> {
        if path.exists() && !overwrite {
            return Err(MetricError::FileExists(path.to_path_buf()));
        }
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), rows = self.len(), "Wrote result table");
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::read_from(BufReader::new(File::open(path)?))
    }

    pub fn read_from<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .ok_or_else(|| MetricError::Parse("missing header row".to_string()))??;
        let mut fields = header.trim_end().split(',');
        fields.next();
        let columns: Vec<String> = fields.map(str::to_string).collect();

        let mut table = Self::new(columns);
        for (line_no, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let mut cells = line.split(',');
            let index = cells.next().unwrap_or_default();
            if index.parse::<usize>().ok() != Some(table.len()) {
                return Err(MetricError::Parse(format!(
                    "line {}: expected frame {} but found '{index}'",
                    line_no + 2,
                    table.len()
                )));
            }
            let row = cells
                .map(|cell| {
                    cell.trim().parse::<f64>().map_err(|_| {
                        MetricError::Parse(format!("line {}: bad value '{cell}'", line_no + 2))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            table.push_row(row)?;
        }
        Ok(table)
    }
}
