#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod aggregate;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod export;
pub mod geometry;
pub mod project;

// Building blocks – public, but expected to be reached through `document`
// in most host code.
pub mod buckets;
pub mod detection;
pub mod io;
pub mod rates;
pub mod sections;
pub mod store;
pub mod taxonomy;

// --- High-level re-exports -------------------------------------------------

// Main entry points: the document facade + its results.
pub use crate::aggregate::{FrequencyAggregator, FrequencyRecord, FrequencyRow};
pub use crate::document::{Document, DocumentError, SharedDocument};

// Session configuration.
pub use crate::config::{load_config, AnalysisConfig, ExportOptions, MembershipPolicy};

// Reports returned alongside mutations and computations.
pub use crate::diagnostics::{AnalysisReport, IngestReport, MembershipDiagnostics};

// Persistence helpers that are generally useful.
pub use crate::project::{import_sections_csv, load_project, save_project};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```
/// use pid_census::prelude::*;
///
/// let config = AnalysisConfig::new(
///     BucketSet::new(vec![
///         SizeBucket::new("small", 0.0, 1.0),
///         SizeBucket::open_ended("large", 1.0),
///     ])
///     .unwrap(),
///     CategoryTaxonomy::new(vec![Category::new("Manual Valves")])
///         .with_alias("manual valve", "Manual Valves"),
/// );
///
/// let mut doc = Document::new(config);
/// doc.ingest(vec![RawDetection::new("manual valve", 120.0, 80.0).with_size(0.5)]);
/// let record = doc.compute_frequencies();
/// assert_eq!(record.total(), 1);
/// ```
pub mod prelude {
    pub use crate::buckets::{BucketSet, SizeBucket};
    pub use crate::config::{AnalysisConfig, ExportOptions, MembershipPolicy};
    pub use crate::detection::{DetectionId, NewDetection, RawDetection};
    pub use crate::document::{Document, SharedDocument};
    pub use crate::geometry::{Boundary, DocPoint};
    pub use crate::sections::SectionId;
    pub use crate::taxonomy::{Category, CategoryTaxonomy};
}
