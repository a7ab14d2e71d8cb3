//! Leak-frequency rate table and weighted per-section summaries.
//!
//! Reliability data arrives as a CSV table: one row per (category, size
//! range) with a frequency value per hole-size column. The weighted
//! summary multiplies each detection's applicable rate row by its
//! multiplicity and sums per section, giving the expected-frequency table
//! the results view displays.
//!
//! Row lookup keeps the table's own conventions rather than the bucket
//! classifier's: ranges are closed (`min <= v <= max`) and a size above
//! every range clamps to the row with the largest `max`, because the last
//! column is defined as "greater than".

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::io::parse_csv;
use crate::sections::{SectionId, SectionRegistry, UNASSIGNED_LABEL};
use crate::store::DetectionStore;

/// One (category, size-range) row of per-column rates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub category: String,
    pub min_size: f64,
    pub max_size: f64,
    /// Aligned with [`FrequencyRateTable::columns`].
    pub rates: Vec<f64>,
}

/// Failures while computing weighted summaries.
#[derive(Clone, Debug, PartialEq)]
pub enum RateError {
    MissingCategory { category: String },
}

impl std::fmt::Display for RateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateError::MissingCategory { category } => {
                write!(f, "no rate rows for category '{category}'")
            }
        }
    }
}

impl std::error::Error for RateError {}

/// Session-static rate table loaded from CSV.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRateTable {
    columns: Vec<String>,
    rows: Vec<RateRow>,
}

impl FrequencyRateTable {
    pub fn new(columns: Vec<String>, rows: Vec<RateRow>) -> Self {
        Self { columns, rows }
    }

    /// Hole-size column labels in table order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[RateRow] {
        &self.rows
    }

    /// Rate row for a category and size: first row whose closed range
    /// contains the size, else the category's largest-range row.
    pub fn lookup(&self, category: &str, size: f64) -> Option<&RateRow> {
        let category = category.trim();
        let mut best: Option<&RateRow> = None;
        for row in self.rows.iter().filter(|r| r.category == category) {
            if row.min_size <= size && size <= row.max_size {
                return Some(row);
            }
            if best.map_or(true, |b| row.max_size > b.max_size) {
                best = Some(row);
            }
        }
        best
    }
}

/// Parse rate-table CSV content.
///
/// Expected header: `Category,min_size_mm,max_size_mm,<rate columns...>`
/// (names matched case-insensitively, surrounding whitespace ignored).
pub fn parse_rate_table(contents: &str) -> Result<FrequencyRateTable, String> {
    let records = parse_csv(contents);
    let mut records = records.into_iter();
    let header = records.next().ok_or("rate table is empty")?;
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();

    let col = |name: &str| {
        normalized
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("rate table header is missing '{name}'"))
    };
    let category_col = col("category")?;
    let min_col = col("min_size_mm")?;
    let max_col = col("max_size_mm")?;

    let rate_cols: Vec<usize> = (0..header.len())
        .filter(|&i| i != category_col && i != min_col && i != max_col)
        .collect();
    if rate_cols.is_empty() {
        return Err("rate table has no rate columns".to_string());
    }
    let columns: Vec<String> = rate_cols
        .iter()
        .map(|&i| header[i].trim().to_string())
        .collect();

    let parse_num = |record: usize, value: &str| {
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("rate table row {record}: '{value}' is not a number"))
    };

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record_no = index + 2; // header is line 1
        if record.len() != header.len() {
            return Err(format!(
                "rate table row {record_no}: expected {} fields, found {}",
                header.len(),
                record.len()
            ));
        }
        let mut rates = Vec::with_capacity(rate_cols.len());
        for &i in &rate_cols {
            rates.push(parse_num(record_no, &record[i])?);
        }
        rows.push(RateRow {
            category: record[category_col].trim().to_string(),
            min_size: parse_num(record_no, &record[min_col])?,
            max_size: parse_num(record_no, &record[max_col])?,
            rates,
        });
    }
    Ok(FrequencyRateTable::new(columns, rows))
}

/// Load a rate table from a CSV file.
pub fn load_rate_table(path: &Path) -> Result<FrequencyRateTable, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read rate table {}: {e}", path.display()))?;
    parse_rate_table(&contents)
}

/// Expected-frequency sums for one section scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedSummary {
    pub section: String,
    /// Aligned with the rate table's columns.
    pub per_column: Vec<f64>,
    pub total: f64,
    /// Detections skipped because no usable size was available.
    pub skipped: usize,
}

/// Sum `rate × count` per section and rate column.
///
/// Sections appear in creation order; an `Unassigned` row is appended when
/// unassigned detections exist. Detections without a usable size are
/// skipped (and counted per summary); a category absent from the table is
/// an error, matching the table's role as exhaustive reliability data.
pub fn compute_weighted(
    store: &DetectionStore,
    registry: &SectionRegistry,
    table: &FrequencyRateTable,
) -> Result<Vec<WeightedSummary>, RateError> {
    let mut scopes: Vec<(Option<SectionId>, String)> = registry
        .iter()
        .map(|s| (Some(s.id), s.name.clone()))
        .collect();
    scopes.push((None, UNASSIGNED_LABEL.to_string()));

    let mut out = Vec::with_capacity(scopes.len());
    for (section_id, label) in scopes {
        let mut per_column = vec![0.0; table.columns().len()];
        let mut skipped = 0usize;
        let mut seen = 0usize;
        let line_size = section_id
            .and_then(|id| registry.get(id))
            .and_then(|s| s.line_size);

        for det in store.iter() {
            if registry.section_of(det.id) != section_id {
                continue;
            }
            seen += 1;
            let Some(size) = det.size.or(line_size) else {
                warn!("detection {} has no usable size, skipped in rate summary", det.id);
                skipped += 1;
                continue;
            };
            let row = table.lookup(&det.category, size).ok_or_else(|| {
                RateError::MissingCategory {
                    category: det.category.clone(),
                }
            })?;
            for (acc, rate) in per_column.iter_mut().zip(&row.rates) {
                *acc += rate * f64::from(det.count);
            }
        }

        // The unassigned row only appears when it has content.
        if section_id.is_none() && seen == 0 {
            continue;
        }
        let total = per_column.iter().sum();
        out.push(WeightedSummary {
            section: label,
            per_column,
            total,
            skipped,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::NewDetection;
    use crate::geometry::Boundary;
    use nalgebra::Point2;

    const TABLE_CSV: &str = "\
Category,min_size_mm,max_size_mm,Tiny,Small
Manual Valves,0,50,1.0,2.0
Manual Valves,50,150,3.0,4.0
Steel Pipes,0,150,0.5,0.5
";

    #[test]
    fn parses_columns_and_rows() {
        let table = parse_rate_table(TABLE_CSV).unwrap();
        assert_eq!(table.columns(), ["Tiny", "Small"]);
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.rows()[1].rates, vec![3.0, 4.0]);
    }

    #[test]
    fn parse_rejects_malformed_tables() {
        assert!(parse_rate_table("").is_err());
        assert!(parse_rate_table("Category,min_size_mm,max_size_mm\n").is_err());
        assert!(
            parse_rate_table("Category,min_size_mm,max_size_mm,Tiny\nX,0,nope,1\n").is_err()
        );
    }

    #[test]
    fn lookup_prefers_containing_range_then_clamps() {
        let table = parse_rate_table(TABLE_CSV).unwrap();
        assert_eq!(table.lookup("Manual Valves", 25.0).unwrap().rates, [1.0, 2.0]);
        assert_eq!(table.lookup("Manual Valves", 150.0).unwrap().rates, [3.0, 4.0]);
        assert_eq!(
            table.lookup("Manual Valves", 9999.0).unwrap().rates,
            [3.0, 4.0],
            "clamps to the largest range"
        );
        assert!(table.lookup("Degasser", 10.0).is_none());
    }

    #[test]
    fn weighted_summary_multiplies_counts_and_inherits_sizes() {
        let table = parse_rate_table(TABLE_CSV).unwrap();
        let mut store = DetectionStore::new();
        let mut registry = SectionRegistry::new();
        let s = registry
            .create_section(Some("Inlet"), Boundary::rect(0.0, 0.0, 10.0, 10.0).unwrap())
            .unwrap();
        registry.set_line_size(s, Some(25.0)).unwrap();

        // Inherits 25mm -> first row; count 2 doubles the rates.
        let a = store.add(NewDetection::manual("Manual Valves", Point2::new(1.0, 1.0)).with_count(2));
        // Own 100mm -> second row.
        let b = store.add(
            NewDetection::manual("Manual Valves", Point2::new(2.0, 2.0)).with_size(100.0),
        );
        registry.assign(a, s).unwrap();
        registry.assign(b, s).unwrap();

        let summaries = compute_weighted(&store, &registry, &table).unwrap();
        assert_eq!(summaries.len(), 1, "no unassigned row without content");
        let inlet = &summaries[0];
        assert_eq!(inlet.section, "Inlet");
        assert_eq!(inlet.per_column, vec![1.0 * 2.0 + 3.0, 2.0 * 2.0 + 4.0]);
        assert_eq!(inlet.total, inlet.per_column.iter().sum::<f64>());
        assert_eq!(inlet.skipped, 0);
    }

    #[test]
    fn unknown_categories_fail_and_sizeless_detections_skip() {
        let table = parse_rate_table(TABLE_CSV).unwrap();
        let mut store = DetectionStore::new();
        let registry = SectionRegistry::new();

        store.add(NewDetection::manual("Manual Valves", Point2::new(0.0, 0.0)));
        let summaries = compute_weighted(&store, &registry, &table).unwrap();
        assert_eq!(summaries[0].skipped, 1);

        store.add(NewDetection::manual("Degasser", Point2::new(0.0, 0.0)).with_size(10.0));
        assert_eq!(
            compute_weighted(&store, &registry, &table),
            Err(RateError::MissingCategory {
                category: "Degasser".to_string()
            })
        );
    }
}
