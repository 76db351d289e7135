//! The Signal Table: a header row followed by `[timestamp, value]` rows.

use serde::{Deserialize, Serialize};

use crate::{Result, SignalError};

/// One `[timestamp, value]` sample.
pub type Row = [f64; 2];

/// Column labels carried in row 0 of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Header {
    pub time_label: String,
    pub value_label: String,
}

impl Header {
    pub fn new(time_label: impl Into<String>, value_label: impl Into<String>) -> Self {
        Self {
            time_label: time_label.into(),
            value_label: value_label.into(),
        }
    }
}

/// An ordered time series. Serializes as `[[timeLabel, valueLabel], [t, v], ...]`.
///
/// Timestamps are expected to be non-decreasing but this is not enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<serde_json::Value>", try_from = "Vec<serde_json::Value>")]
pub struct SignalTable {
    header: Header,
    rows: Vec<Row>,
}

/// Where timestamps come from when building a table out of CSV records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimestampColumn {
    /// Read timestamps from the given zero-based column.
    Index(usize),
    /// No timestamp column; generate `i / sampling_rate`.
    Synthetic { sampling_rate: f64 },
}

/// The columns a user picked from an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSelection {
    pub timestamp: TimestampColumn,
    pub value: usize,
}

const SYNTHETIC_TIME_LABEL: &str = "Timestamp (calc)";

impl SignalTable {
    pub fn new(header: Header, rows: Vec<Row>) -> Self {
        Self { header, rows }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Data rows, header excluded.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of data rows (the header is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r[0])
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().map(|r| r[1])
    }

    /// A new table that keeps this table's header and replaces the data rows.
    pub fn with_rows(&self, rows: Vec<Row>) -> Self {
        Self {
            header: self.header.clone(),
            rows,
        }
    }

    /// Sampling rate inferred as `1 / mean(diff(timestamps))`.
    ///
    /// Returns `None` with fewer than two rows or when the mean delta is not positive.
    pub fn sampling_rate(&self) -> Option<f64> {
        if self.rows.len() < 2 {
            return None;
        }
        let deltas: Vec<f64> = self.rows.windows(2).map(|w| w[1][0] - w[0][0]).collect();
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        if mean > 0.0 && mean.is_finite() {
            Some(1.0 / mean)
        } else {
            None
        }
    }

    /// The first `limit` data rows formatted with four decimals, as shown on node cards.
    pub fn preview(&self, limit: usize) -> Vec<[String; 2]> {
        self.rows
            .iter()
            .take(limit)
            .map(|r| [format!("{:.4}", r[0]), format!("{:.4}", r[1])])
            .collect()
    }

    /// Build a table from parsed CSV records.
    ///
    /// Row 0 is treated as a header when its first cell does not parse as a number.
    /// Blank records are skipped.
    pub fn from_records(records: &[Vec<String>], columns: ColumnSelection) -> Result<Self> {
        // Keep each record's 1-based line so errors point at the file, not
        // at the filtered list.
        let records: Vec<(usize, &Vec<String>)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.iter().any(|c| !c.trim().is_empty()))
            .map(|(i, r)| (i + 1, r))
            .collect();
        let (_, first) = records
            .first()
            .copied()
            .ok_or_else(|| SignalError::InvalidTable("file contains no rows".into()))?;

        let has_header = first
            .first()
            .map(|cell| cell.trim().parse::<f64>().is_err())
            .unwrap_or(false);
        let label = |col: usize| -> Result<String> {
            if has_header {
                first.get(col).map(|s| s.trim().to_string()).ok_or_else(|| {
                    SignalError::InvalidTable(format!("header has no column {}", col + 1))
                })
            } else {
                Ok(format!("Column {}", col + 1))
            }
        };

        let value_label = label(columns.value)?;
        let time_label = match columns.timestamp {
            TimestampColumn::Index(col) => label(col)?,
            TimestampColumn::Synthetic { sampling_rate } => {
                if !(sampling_rate > 0.0 && sampling_rate.is_finite()) {
                    return Err(SignalError::Validation(format!(
                        "sampling rate must be positive, got {sampling_rate}"
                    )));
                }
                SYNTHETIC_TIME_LABEL.to_string()
            }
        };

        let skip = usize::from(has_header);
        let mut rows = Vec::with_capacity(records.len().saturating_sub(skip));
        for (n, &(line, record)) in records.iter().skip(skip).enumerate() {
            let value = numeric_cell(record, columns.value, line)?;
            let timestamp = match columns.timestamp {
                TimestampColumn::Index(col) => numeric_cell(record, col, line)?,
                TimestampColumn::Synthetic { sampling_rate } => n as f64 / sampling_rate,
            };
            rows.push([timestamp, value]);
        }

        Ok(Self::new(Header::new(time_label, value_label), rows))
    }
}

fn numeric_cell(record: &[String], col: usize, line: usize) -> Result<f64> {
    let cell = record.get(col).ok_or_else(|| {
        SignalError::InvalidTable(format!("row {line} has no column {}", col + 1))
    })?;
    cell.trim().parse::<f64>().map_err(|_| {
        SignalError::InvalidTable(format!(
            "row {line}, column {}: '{}' is not a number",
            col + 1,
            cell.trim()
        ))
    })
}

impl From<SignalTable> for Vec<serde_json::Value> {
    fn from(table: SignalTable) -> Self {
        let mut out = Vec::with_capacity(table.rows.len() + 1);
        out.push(serde_json::json!([table.header.time_label, table.header.value_label]));
        out.extend(table.rows.iter().map(|r| serde_json::json!([r[0], r[1]])));
        out
    }
}

impl TryFrom<Vec<serde_json::Value>> for SignalTable {
    type Error = SignalError;

    fn try_from(raw: Vec<serde_json::Value>) -> Result<Self> {
        let mut iter = raw.into_iter();
        let header: [String; 2] = iter
            .next()
            .ok_or_else(|| SignalError::InvalidTable("missing header row".into()))
            .and_then(|v| serde_json::from_value(v).map_err(SignalError::from))?;
        let rows = iter
            .map(|v| serde_json::from_value::<Row>(v).map_err(SignalError::from))
            .collect::<Result<Vec<_>>>()?;
        let [time_label, value_label] = header;
        Ok(Self::new(Header::new(time_label, value_label), rows))
    }
}
