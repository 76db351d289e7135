//! Client-side export of a Signal Table as delimited text.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use signal_types::{Result, SignalError, SignalTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Txt,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub delimiter: char,
    pub include_header: bool,
    /// Write only the value column.
    pub values_only: bool,
    pub format: ExportFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
            values_only: false,
            format: ExportFormat::Csv,
        }
    }
}

/// Render `table` one row per line.
pub fn export_table(table: &SignalTable, options: &ExportOptions) -> String {
    let delimiter = options.delimiter;
    let mut out = String::new();
    if options.include_header {
        let header = table.header();
        if options.values_only {
            out.push_str(&header.value_label);
        } else {
            let _ = write!(out, "{}{delimiter}{}", header.time_label, header.value_label);
        }
        out.push('\n');
    }
    for [t, v] in table.rows() {
        if options.values_only {
            let _ = writeln!(out, "{v}");
        } else {
            let _ = writeln!(out, "{t}{delimiter}{v}");
        }
    }
    out
}

/// `{name}_signal.csv` or `{name}_signal.txt`.
pub fn export_file_name(name: &str, format: ExportFormat) -> String {
    format!("{name}_signal.{}", format.extension())
}

/// Write the export into `dir` and return the file's path.
pub fn write_export(
    dir: &Path,
    name: &str,
    table: &SignalTable,
    options: &ExportOptions,
) -> Result<PathBuf> {
    if name.trim().is_empty() {
        return Err(SignalError::Validation("export name must not be empty".into()));
    }
    let path = dir.join(export_file_name(name, options.format));
    std::fs::write(&path, export_table(table, options))?;
    tracing::info!(path = %path.display(), rows = table.len(), "signal exported");
    Ok(path)
}
