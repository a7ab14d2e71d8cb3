//! Serializable reports describing what the core did.
//!
//! Hosts surface these in status bars, logs, or JSON artifacts; nothing in
//! here feeds back into the computation.

use serde::{Deserialize, Serialize};

use crate::aggregate::FrequencyRecord;
use crate::detection::DetectionId;

/// One rejected input record with the rendered rejection reason.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedDetection {
    /// Position of the record in the ingested batch.
    pub index: usize,
    pub label: String,
    pub reason: String,
}

/// Outcome of one ingestion batch: what entered, what was turned away.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub added: Vec<DetectionId>,
    pub rejected: Vec<RejectedDetection>,
}

impl IngestReport {
    pub fn accepted(&self) -> usize {
        self.added.len()
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Counters from one automatic membership recomputation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDiagnostics {
    pub evaluated: usize,
    pub assigned: usize,
    pub unassigned: usize,
    /// Entries skipped because an explicit assignment pinned them.
    pub pinned: usize,
    pub changed: usize,
}

/// Per-section roll-up for the analysis report.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub name: String,
    pub detections: usize,
    /// Summed multiplicities of the member detections.
    pub total_count: u64,
}

/// Snapshot of the document plus its current frequency table.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub detections: usize,
    pub sections: usize,
    pub assigned: usize,
    pub unassigned: usize,
    pub section_summaries: Vec<SectionSummary>,
    pub record: FrequencyRecord,
    pub latency_ms: f64,
}
