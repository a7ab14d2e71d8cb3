//! CSV export of frequency records and weighted summaries.
//!
//! Output is deterministic: the count table carries the header
//! `section,category,bucket,count` with rows pre-sorted by the aggregator
//! (section label, category, bucket configuration order); the weighted
//! table mirrors the results view (`section,<rate columns...>,total`).
//! Both writes stage to a temp file and rename into place, so an I/O
//! failure never leaves a partial artifact at the destination.

use std::io;
use std::path::{Path, PathBuf};

use crate::aggregate::FrequencyRecord;
use crate::config::ExportOptions;
use crate::io::{atomic_write, csv_line};
use crate::rates::WeightedSummary;

/// Header of the frequency count CSV.
pub const FREQUENCY_CSV_HEADER: &str = "section,category,bucket,count";

/// Export failure; the destination file is untouched.
#[derive(Debug)]
pub enum ExportError {
    Io { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::Io { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io { source, .. } => Some(source),
        }
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), ExportError> {
    atomic_write(path, contents.as_bytes()).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the frequency count table as CSV text.
pub fn frequency_csv(record: &FrequencyRecord, options: ExportOptions) -> String {
    let rows = if options.include_zero_counts {
        record.dense_rows()
    } else {
        record.rows().to_vec()
    };
    let mut out = String::from(FREQUENCY_CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&csv_line(&[
            row.section.as_str(),
            row.category.as_str(),
            row.bucket.as_str(),
            &row.count.to_string(),
        ]));
        out.push('\n');
    }
    out
}

/// Write the frequency count table to `path`.
pub fn export_frequency_csv(
    record: &FrequencyRecord,
    path: &Path,
    options: ExportOptions,
) -> Result<(), ExportError> {
    write_atomic(path, &frequency_csv(record, options))
}

/// Render weighted summaries as CSV text in results-table shape.
pub fn weighted_csv(summaries: &[WeightedSummary], columns: &[String]) -> String {
    let mut header: Vec<String> = Vec::with_capacity(columns.len() + 2);
    header.push("section".to_string());
    header.extend(columns.iter().cloned());
    header.push("total".to_string());

    let mut out = csv_line(&header);
    out.push('\n');
    for summary in summaries {
        let mut fields: Vec<String> = Vec::with_capacity(columns.len() + 2);
        fields.push(summary.section.clone());
        fields.extend(summary.per_column.iter().map(|v| v.to_string()));
        fields.push(summary.total.to_string());
        out.push_str(&csv_line(&fields));
        out.push('\n');
    }
    out
}

/// Write weighted summaries to `path`.
pub fn export_weighted_csv(
    summaries: &[WeightedSummary],
    columns: &[String],
    path: &Path,
) -> Result<(), ExportError> {
    write_atomic(path, &weighted_csv(summaries, columns))
}
