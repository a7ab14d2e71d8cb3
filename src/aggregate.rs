//! Frequency aggregation: counts per (section, category, bucket).
//!
//! The aggregator is a pure function of the current detection and section
//! state plus the immutable session configuration. It never fails:
//! detections whose effective size misses every bucket (or who have no
//! usable size at all) land in the reserved `Unclassified` slot, so the
//! summed bucket counts of any scope always equal the summed detection
//! multiplicities of that scope.
//!
//! Effective size resolution follows the drawing convention: a detection's
//! own size wins, otherwise the owning section's line size applies,
//! otherwise the size is unknown.
//!
//! Results are materialized as a [`FrequencyRecord`], an ordering-stable
//! row table: rows sort by section label, then category, then bucket in
//! configuration order with `Unclassified` last. The record also carries
//! the full label axes so a dense (zero-including) grid can be produced
//! without consulting the configuration again.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buckets::BucketKey;
use crate::config::AnalysisConfig;
use crate::sections::{SectionRegistry, UNASSIGNED_LABEL};
use crate::store::DetectionStore;

/// One count cell of the frequency table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub section: String,
    pub category: String,
    pub bucket: String,
    pub count: u64,
}

/// Derived count table, regenerated from scratch on demand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyRecord {
    /// Non-zero cells, sorted by section, category, bucket order.
    rows: Vec<FrequencyRow>,
    /// Every known scope label: section names plus the unassigned pool.
    section_labels: Vec<String>,
    /// Canonical categories, sorted.
    categories: Vec<String>,
    /// Bucket labels in configuration order, `Unclassified` last.
    bucket_labels: Vec<String>,
    total: u64,
}

impl FrequencyRecord {
    /// Non-zero rows in export order.
    pub fn rows(&self) -> &[FrequencyRow] {
        &self.rows
    }

    /// Dense section × category × bucket grid including zero cells.
    pub fn dense_rows(&self) -> Vec<FrequencyRow> {
        let mut lookup: BTreeMap<(&str, &str, &str), u64> = BTreeMap::new();
        for row in &self.rows {
            lookup.insert(
                (row.section.as_str(), row.category.as_str(), row.bucket.as_str()),
                row.count,
            );
        }
        let mut out = Vec::with_capacity(
            self.section_labels.len() * self.categories.len() * self.bucket_labels.len(),
        );
        for section in &self.section_labels {
            for category in &self.categories {
                for bucket in &self.bucket_labels {
                    let count = lookup
                        .get(&(section.as_str(), category.as_str(), bucket.as_str()))
                        .copied()
                        .unwrap_or(0);
                    out.push(FrequencyRow {
                        section: section.clone(),
                        category: category.clone(),
                        bucket: bucket.clone(),
                        count,
                    });
                }
            }
        }
        out
    }

    /// Count in one cell; absent combinations are zero.
    pub fn count(&self, section: &str, category: &str, bucket: &str) -> u64 {
        self.rows
            .iter()
            .find(|r| r.section == section && r.category == category && r.bucket == bucket)
            .map_or(0, |r| r.count)
    }

    /// Summed counts of one scope (a section name or the unassigned pool).
    pub fn section_total(&self, section: &str) -> u64 {
        self.rows
            .iter()
            .filter(|r| r.section == section)
            .map(|r| r.count)
            .sum()
    }

    /// Document-wide total across assigned and unassigned detections.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn section_labels(&self) -> &[String] {
        &self.section_labels
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn bucket_labels(&self) -> &[String] {
        &self.bucket_labels
    }
}

/// Computes [`FrequencyRecord`]s from store and registry state.
#[derive(Clone, Debug)]
pub struct FrequencyAggregator {
    config: Arc<AnalysisConfig>,
}

impl FrequencyAggregator {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// From-scratch aggregation of the current document state.
    pub fn compute(&self, store: &DetectionStore, registry: &SectionRegistry) -> FrequencyRecord {
        let buckets = &self.config.buckets;
        // Bucket slot index doubles as the sort position; the unclassified
        // slot sorts after every named bucket.
        let slot = |key: BucketKey| match key {
            BucketKey::Named(i) => i,
            BucketKey::Unclassified => buckets.len(),
        };

        let mut counts: BTreeMap<(String, String, usize), u64> = BTreeMap::new();
        let mut total = 0u64;
        for det in store.iter() {
            let owner = registry.section_of(det.id).and_then(|id| registry.get(id));
            let (section_label, line_size) = match owner {
                Some(section) => (section.name.as_str(), section.line_size),
                None => (UNASSIGNED_LABEL, None),
            };
            let effective_size = det.size.or(line_size);
            let bucket = buckets.classify(effective_size);
            let key = (
                section_label.to_string(),
                det.category.clone(),
                slot(bucket),
            );
            *counts.entry(key).or_default() += u64::from(det.count);
            total += u64::from(det.count);
        }

        let bucket_labels = buckets.labels();
        let rows = counts
            .into_iter()
            .map(|((section, category, slot), count)| FrequencyRow {
                section,
                category,
                bucket: bucket_labels[slot].clone(),
                count,
            })
            .collect();

        let mut section_labels: Vec<String> =
            registry.iter().map(|s| s.name.clone()).collect();
        section_labels.push(UNASSIGNED_LABEL.to_string());
        section_labels.sort();

        let mut categories = self.config.taxonomy.names();
        categories.sort();

        FrequencyRecord {
            rows,
            section_labels,
            categories,
            bucket_labels,
            total,
        }
    }
}
