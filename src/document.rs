//! Document facade: one drawing's detections, sections, and results.
//!
//! All operations are synchronous and run to completion; hosts driving the
//! core from a background task wrap the document in [`SharedDocument`],
//! which provides the single mutual-exclusion boundary per document — one
//! mutation or computation in flight at a time, no finer locking.
//!
//! The frequency record is memoized per document generation: any mutation
//! (including undo/redo) bumps the generation, so a served record is
//! always identical to a fresh from-scratch computation.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::debug;

use crate::aggregate::{FrequencyAggregator, FrequencyRecord};
use crate::config::{AnalysisConfig, MembershipPolicy};
use crate::detection::{
    validate, Detection, DetectionId, NewDetection, RawDetection, ValidationError,
};
use crate::diagnostics::{
    AnalysisReport, IngestReport, MembershipDiagnostics, RejectedDetection, SectionSummary,
};
use crate::export::{export_frequency_csv, ExportError};
use crate::geometry::{Boundary, DocPoint};
use crate::rates::{compute_weighted, FrequencyRateTable, RateError, WeightedSummary};
use crate::sections::{RegistryError, Section, SectionId, SectionRegistry};
use crate::store::{DetectionStore, DetectionUpdate, StoreError};

/// Snapshots kept for undo and redo.
const HISTORY_DEPTH: usize = 64;

/// Failures of document-level operations.
#[derive(Debug)]
pub enum DocumentError {
    Validation(ValidationError),
    Store(StoreError),
    Registry(RegistryError),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::Validation(err) => write!(f, "{err}"),
            DocumentError::Store(err) => write!(f, "{err}"),
            DocumentError::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocumentError::Validation(err) => Some(err),
            DocumentError::Store(err) => Some(err),
            DocumentError::Registry(err) => Some(err),
        }
    }
}

impl From<ValidationError> for DocumentError {
    fn from(err: ValidationError) -> Self {
        DocumentError::Validation(err)
    }
}

impl From<StoreError> for DocumentError {
    fn from(err: StoreError) -> Self {
        DocumentError::Store(err)
    }
}

impl From<RegistryError> for DocumentError {
    fn from(err: RegistryError) -> Self {
        DocumentError::Registry(err)
    }
}

/// Narrowing of document queries to one membership scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SectionScope {
    In(SectionId),
    Unassigned,
}

/// Optional category/section filter for detection queries.
#[derive(Clone, Debug, Default)]
pub struct DetectionFilter {
    pub category: Option<String>,
    pub scope: Option<SectionScope>,
}

#[derive(Clone)]
struct Snapshot {
    store: DetectionStore,
    registry: SectionRegistry,
}

/// One drawing's worth of analysis state.
pub struct Document {
    store: DetectionStore,
    registry: SectionRegistry,
    aggregator: FrequencyAggregator,
    config: Arc<AnalysisConfig>,
    /// Bumped by every state change; the record cache keys on it.
    generation: u64,
    cache: Option<(u64, Arc<FrequencyRecord>)>,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl Document {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<AnalysisConfig>) -> Self {
        Self::from_parts(config, DetectionStore::new(), SectionRegistry::new())
    }

    pub(crate) fn from_parts(
        config: Arc<AnalysisConfig>,
        store: DetectionStore,
        registry: SectionRegistry,
    ) -> Self {
        Self {
            store,
            registry,
            aggregator: FrequencyAggregator::new(config.clone()),
            config,
            generation: 0,
            cache: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn store(&self) -> &DetectionStore {
        &self.store
    }

    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            store: self.store.clone(),
            registry: self.registry.clone(),
        }
    }

    fn commit(&mut self, snapshot: Snapshot) {
        self.undo_stack.push(snapshot);
        if self.undo_stack.len() > HISTORY_DEPTH {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
        self.generation += 1;
    }

    /// Run a state-changing operation with undo bookkeeping. The closure
    /// must leave the document untouched when it fails.
    fn mutate<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, DocumentError>,
    ) -> Result<T, DocumentError> {
        let snapshot = self.snapshot();
        let value = op(self)?;
        self.commit(snapshot);
        Ok(value)
    }

    /// Revert the last committed operation.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo_stack.pop() else {
            return false;
        };
        self.redo_stack.push(self.snapshot());
        self.store = snapshot.store;
        self.registry = snapshot.registry;
        self.generation += 1;
        true
    }

    /// Re-apply the last undone operation.
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        self.undo_stack.push(self.snapshot());
        self.store = snapshot.store;
        self.registry = snapshot.registry;
        self.generation += 1;
        true
    }

    fn auto_membership(&mut self) -> Option<MembershipDiagnostics> {
        match self.config.membership {
            MembershipPolicy::Automatic => Some(self.recompute_membership()),
            MembershipPolicy::Manual => None,
        }
    }

    /// Containment-based membership recomputation for unpinned detections.
    pub fn recompute_membership(&mut self) -> MembershipDiagnostics {
        let positions: Vec<(DetectionId, DocPoint)> =
            self.store.iter().map(|d| (d.id, d.position)).collect();
        self.registry.reassign_unpinned(positions.into_iter())
    }

    /// Validate and add a batch of external records.
    ///
    /// Valid records enter the store (and, under the automatic policy, the
    /// membership map); invalid ones are reported back with their reasons
    /// and never touch the document.
    pub fn ingest<I>(&mut self, batch: I) -> IngestReport
    where
        I: IntoIterator<Item = RawDetection>,
    {
        let snapshot = self.snapshot();
        let mut report = IngestReport::default();
        for (index, raw) in batch.into_iter().enumerate() {
            match validate(&raw, &self.config.taxonomy) {
                Ok(new) => report.added.push(self.store.add(new)),
                Err(err) => report.rejected.push(RejectedDetection {
                    index,
                    label: raw.label,
                    reason: err.to_string(),
                }),
            }
        }
        if report.accepted() > 0 {
            self.auto_membership();
            self.commit(snapshot);
        }
        debug!(
            "ingest: {} added, {} rejected",
            report.accepted(),
            report.rejected.len()
        );
        report
    }

    /// Add one validated detection; its category must be canonical.
    pub fn add_detection(&mut self, new: NewDetection) -> Result<DetectionId, DocumentError> {
        if !self.config.taxonomy.contains(&new.category) {
            return Err(ValidationError::UnknownCategory {
                label: new.category,
            }
            .into());
        }
        self.mutate(|doc| {
            let id = doc.store.add(new);
            doc.auto_membership();
            Ok(id)
        })
    }

    /// Remove a detection and its membership entry.
    pub fn remove_detection(&mut self, id: DetectionId) -> Result<Detection, DocumentError> {
        self.mutate(|doc| {
            let removed = doc.store.remove(id)?;
            doc.registry.unassign(id);
            Ok(removed)
        })
    }

    /// Apply a partial update; replacement values are validated first.
    pub fn update_detection(
        &mut self,
        id: DetectionId,
        mut update: DetectionUpdate,
    ) -> Result<(), DocumentError> {
        if let Some(category) = &update.category {
            let canonical = self
                .config
                .taxonomy
                .resolve(category)
                .ok_or_else(|| ValidationError::UnknownCategory {
                    label: category.clone(),
                })?
                .to_string();
            update.category = Some(canonical);
        }
        if let Some(Some(size)) = update.size {
            if !size.is_finite() {
                return Err(ValidationError::NonFiniteSize { value: size }.into());
            }
            if size < 0.0 {
                return Err(ValidationError::NegativeSize { value: size }.into());
            }
        }
        if let Some(position) = update.position {
            if !position.x.is_finite() || !position.y.is_finite() {
                return Err(ValidationError::NonFinitePosition {
                    x: position.x,
                    y: position.y,
                }
                .into());
            }
        }
        if update.count == Some(0) {
            return Err(ValidationError::ZeroCount.into());
        }

        let moved = update.position.is_some();
        self.mutate(|doc| {
            doc.store.update(id, update)?;
            if moved {
                doc.auto_membership();
            }
            Ok(())
        })
    }

    /// Create a drawn section (auto-named when `name` is `None`).
    pub fn create_section(
        &mut self,
        name: Option<&str>,
        boundary: Boundary,
    ) -> Result<SectionId, DocumentError> {
        self.mutate(|doc| {
            let id = doc.registry.create_section(name, boundary)?;
            doc.auto_membership();
            Ok(id)
        })
    }

    /// Create a name-only section for manual assignment.
    pub fn create_named_section(&mut self, name: &str) -> Result<SectionId, DocumentError> {
        self.mutate(|doc| Ok(doc.registry.create_named(name)?))
    }

    /// Delete a section; its detections detach and may re-home under the
    /// automatic policy.
    pub fn delete_section(&mut self, id: SectionId) -> Result<Section, DocumentError> {
        self.mutate(|doc| {
            let removed = doc.registry.delete_section(id)?;
            doc.auto_membership();
            Ok(removed)
        })
    }

    pub fn rename_section(&mut self, id: SectionId, name: &str) -> Result<(), DocumentError> {
        self.mutate(|doc| Ok(doc.registry.rename(id, name)?))
    }

    pub fn set_section_line_size(
        &mut self,
        id: SectionId,
        line_size: Option<f64>,
    ) -> Result<(), DocumentError> {
        self.mutate(|doc| Ok(doc.registry.set_line_size(id, line_size)?))
    }

    pub fn set_section_boundary(
        &mut self,
        id: SectionId,
        boundary: Boundary,
    ) -> Result<(), DocumentError> {
        self.mutate(|doc| {
            doc.registry.set_boundary(id, boundary)?;
            doc.auto_membership();
            Ok(())
        })
    }

    pub fn add_section_point(
        &mut self,
        id: SectionId,
        index: usize,
        p: DocPoint,
    ) -> Result<(), DocumentError> {
        self.mutate(|doc| {
            doc.registry.add_point(id, index, p)?;
            doc.auto_membership();
            Ok(())
        })
    }

    pub fn move_section_point(
        &mut self,
        id: SectionId,
        index: usize,
        p: DocPoint,
    ) -> Result<(), DocumentError> {
        self.mutate(|doc| {
            doc.registry.move_point(id, index, p)?;
            doc.auto_membership();
            Ok(())
        })
    }

    /// Pin a detection to a section.
    pub fn assign(&mut self, det: DetectionId, section: SectionId) -> Result<(), DocumentError> {
        if self.store.get(det).is_none() {
            return Err(StoreError::UnknownDetection(det).into());
        }
        self.mutate(|doc| Ok(doc.registry.assign(det, section)?))
    }

    /// Drop a detection's membership and pin; under the automatic policy
    /// it may immediately re-home by containment.
    pub fn unassign(&mut self, det: DetectionId) -> Result<(), DocumentError> {
        if self.store.get(det).is_none() {
            return Err(StoreError::UnknownDetection(det).into());
        }
        self.mutate(|doc| {
            doc.registry.unassign(det);
            doc.auto_membership();
            Ok(())
        })
    }

    /// Detections matching a category/scope filter, in id order.
    pub fn filtered_detections<'a>(
        &'a self,
        filter: &'a DetectionFilter,
    ) -> impl Iterator<Item = &'a Detection> {
        self.store.iter().filter(move |d| {
            if let Some(category) = &filter.category {
                if &d.category != category {
                    return false;
                }
            }
            match filter.scope {
                Some(SectionScope::In(section)) => {
                    self.registry.section_of(d.id) == Some(section)
                }
                Some(SectionScope::Unassigned) => self.registry.section_of(d.id).is_none(),
                None => true,
            }
        })
    }

    /// Current frequency record, memoized per generation.
    pub fn compute_frequencies(&mut self) -> Arc<FrequencyRecord> {
        if let Some((generation, record)) = &self.cache {
            if *generation == self.generation {
                debug!("frequency record served from cache (generation {generation})");
                return record.clone();
            }
        }
        let record = Arc::new(self.aggregator.compute(&self.store, &self.registry));
        self.cache = Some((self.generation, record.clone()));
        record
    }

    /// Export the current frequency record as CSV.
    pub fn export_csv(&mut self, path: &Path) -> Result<(), ExportError> {
        let options = self.config.export;
        let record = self.compute_frequencies();
        export_frequency_csv(&record, path, options)
    }

    /// Expected-frequency summaries against a rate table.
    pub fn weighted_summaries(
        &self,
        table: &FrequencyRateTable,
    ) -> Result<Vec<WeightedSummary>, RateError> {
        compute_weighted(&self.store, &self.registry, table)
    }

    /// Full serializable snapshot of the document's analysis state.
    pub fn report(&mut self) -> AnalysisReport {
        let start = Instant::now();
        let record = self.compute_frequencies();

        let section_summaries: Vec<SectionSummary> = self
            .registry
            .iter()
            .map(|s| {
                let mut detections = 0usize;
                let mut total_count = 0u64;
                for det_id in self.registry.members(s.id) {
                    if let Some(det) = self.store.get(det_id) {
                        detections += 1;
                        total_count += u64::from(det.count);
                    }
                }
                SectionSummary {
                    name: s.name.clone(),
                    detections,
                    total_count,
                }
            })
            .collect();

        let assigned = self
            .store
            .iter()
            .filter(|d| self.registry.section_of(d.id).is_some())
            .count();

        AnalysisReport {
            detections: self.store.len(),
            sections: self.registry.len(),
            assigned,
            unassigned: self.store.len() - assigned,
            section_summaries,
            record: (*record).clone(),
            latency_ms: start.elapsed().as_secs_f64() * 1e3,
        }
    }
}

/// Mutex-guarded handle for hosts that touch the document from more than
/// one task. Cloning shares the same underlying document.
#[derive(Clone)]
pub struct SharedDocument {
    inner: Arc<Mutex<Document>>,
}

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    /// Exclusive access; a poisoned lock yields the inner state unchanged.
    pub fn lock(&self) -> MutexGuard<'_, Document> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
