//! In-memory detection store.
//!
//! Owns every [`Detection`] in the document, allocates ids, and exposes a
//! restartable iterator over current records. Each mutation bumps a
//! revision counter; cached aggregate results are keyed on it and go stale
//! the moment the store changes.

use std::collections::BTreeMap;

use crate::detection::{Detection, DetectionId, NewDetection};
use crate::geometry::DocPoint;

/// Failures of id-addressed store operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreError {
    UnknownDetection(DetectionId),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UnknownDetection(id) => write!(f, "unknown detection {id}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Partial update applied to a stored detection.
///
/// Unset fields are left untouched; `size` distinguishes "keep" (outer
/// `None`) from "clear the override" (`Some(None)`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionUpdate {
    pub position: Option<DocPoint>,
    pub category: Option<String>,
    pub size: Option<Option<f64>>,
    pub count: Option<u32>,
    pub confidence: Option<f32>,
}

impl DetectionUpdate {
    pub fn position(mut self, p: DocPoint) -> Self {
        self.position = Some(p);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn size(mut self, size: Option<f64>) -> Self {
        self.size = Some(size);
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Document-wide detection container.
#[derive(Clone, Debug, Default)]
pub struct DetectionStore {
    detections: BTreeMap<DetectionId, Detection>,
    next_id: u64,
    revision: u64,
}

impl DetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted records, keeping their ids.
    pub fn restore(detections: Vec<Detection>) -> Self {
        let next_id = detections.iter().map(|d| d.id.0 + 1).max().unwrap_or(0);
        let detections = detections.into_iter().map(|d| (d.id, d)).collect();
        Self {
            detections,
            next_id,
            revision: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Monotonic change counter used for cache invalidation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: DetectionId) -> Option<&Detection> {
        self.detections.get(&id)
    }

    /// All current detections in id order. The iterator borrows the store,
    /// is finite, and can be restarted by calling again.
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.values()
    }

    /// Detections of one canonical category.
    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Detection> {
        self.iter().filter(move |d| d.category == category)
    }

    pub fn add(&mut self, new: NewDetection) -> DetectionId {
        let id = DetectionId(self.next_id);
        self.next_id += 1;
        self.detections.insert(
            id,
            Detection {
                id,
                position: new.position,
                category: new.category,
                size: new.size,
                count: new.count,
                confidence: new.confidence,
                source: new.source,
            },
        );
        self.revision += 1;
        id
    }

    pub fn remove(&mut self, id: DetectionId) -> Result<Detection, StoreError> {
        let removed = self
            .detections
            .remove(&id)
            .ok_or(StoreError::UnknownDetection(id))?;
        self.revision += 1;
        Ok(removed)
    }

    /// Apply a partial update. The caller is responsible for having
    /// validated replacement values (canonical category, finite numbers).
    pub fn update(&mut self, id: DetectionId, update: DetectionUpdate) -> Result<(), StoreError> {
        let det = self
            .detections
            .get_mut(&id)
            .ok_or(StoreError::UnknownDetection(id))?;
        if let Some(position) = update.position {
            det.position = position;
        }
        if let Some(category) = update.category {
            det.category = category;
        }
        if let Some(size) = update.size {
            det.size = size;
        }
        if let Some(count) = update.count {
            det.count = count;
        }
        if let Some(confidence) = update.confidence {
            det.confidence = confidence;
        }
        self.revision += 1;
        Ok(())
    }

    pub fn clear(&mut self) {
        if !self.detections.is_empty() {
            self.detections.clear();
            self.revision += 1;
        }
    }
}
