//! File I/O helpers shared by export and project persistence.
//!
//! - `atomic_write`: stage to a sibling temp file, then rename into place,
//!   so a failed export never leaves a truncated artifact behind.
//! - `write_json_file`: pretty-printed JSON through the same atomic path.
//! - Minimal CSV plumbing (RFC-4180 quoting plus a forgiving reader); the
//!   tables involved are small and the dialect fixed, so this stays local
//!   instead of pulling in a parser dependency.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` via a temporary sibling file and an atomic
/// rename. On failure the temp file is removed and `path` is untouched.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let tmp = temp_sibling(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Pretty-print a serializable value to disk atomically.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    atomic_write(path, json.as_bytes())
}

/// Quote a CSV field when it contains the delimiter, quotes, or newlines.
pub fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Join fields into one CSV line (without the trailing newline).
pub fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse CSV content into records, honouring quoted fields (including
/// embedded delimiters and line breaks). A leading BOM is dropped.
pub fn parse_csv(contents: &str) -> Vec<Vec<String>> {
    let contents = contents.trim_start_matches('\u{feff}');
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = contents.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    // Drop fully empty trailing records produced by blank lines.
    records.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    records
}
