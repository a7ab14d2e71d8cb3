//! Section registry: named regions that group detections for reporting.
//!
//! Sections either carry a drawn [`Boundary`] or exist name-only (imported
//! lists, manual triage). Membership is owned here, never by the
//! detections themselves:
//!
//! - `assign` records an explicit, *pinned* assignment that survives
//!   geometry edits and automatic recomputation.
//! - `reassign_unpinned` recomputes containment-based membership for every
//!   unpinned detection against the drawn boundaries, first matching
//!   section in creation order wins. The document layer invokes it after
//!   geometry or position changes when the automatic policy is active.
//!
//! Geometry edits validate a candidate boundary first; on error the prior
//! valid outline stays in place. Deleting a section detaches its members
//! but never deletes them.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::detection::DetectionId;
use crate::diagnostics::MembershipDiagnostics;
use crate::geometry::{Boundary, DocPoint, GeometryError};

/// Label of the implicit pool holding detections outside every section.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Identifier unique within one document, allocated by the registry.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SectionId(pub u64);

impl std::fmt::Display for SectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A user-defined reporting region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    /// Line size (mm) inherited by members without their own size.
    pub line_size: Option<f64>,
    /// Drawn outline; `None` for name-only sections.
    pub boundary: Option<Boundary>,
}

/// One detection's membership entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub section: SectionId,
    /// Pinned entries were assigned explicitly and are never recomputed.
    pub pinned: bool,
}

/// Failures of registry operations.
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryError {
    UnknownSection(SectionId),
    DuplicateName { name: String },
    ReservedName,
    EmptyName,
    NoBoundary(SectionId),
    Geometry(GeometryError),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::UnknownSection(id) => write!(f, "unknown section {id}"),
            RegistryError::DuplicateName { name } => {
                write!(f, "section name '{name}' already exists")
            }
            RegistryError::ReservedName => {
                write!(f, "section name '{UNASSIGNED_LABEL}' is reserved")
            }
            RegistryError::EmptyName => write!(f, "section name is empty"),
            RegistryError::NoBoundary(id) => {
                write!(f, "section {id} has no drawn boundary")
            }
            RegistryError::Geometry(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Geometry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GeometryError> for RegistryError {
    fn from(err: GeometryError) -> Self {
        RegistryError::Geometry(err)
    }
}

/// Container for sections and their membership map.
#[derive(Clone, Debug, Default)]
pub struct SectionRegistry {
    sections: BTreeMap<SectionId, Section>,
    membership: BTreeMap<DetectionId, Assignment>,
    next_id: u64,
    revision: u64,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records, keeping ids and membership.
    pub fn restore(sections: Vec<Section>, membership: Vec<(DetectionId, Assignment)>) -> Self {
        let next_id = sections.iter().map(|s| s.id.0 + 1).max().unwrap_or(0);
        Self {
            sections: sections.into_iter().map(|s| (s.id, s)).collect(),
            membership: membership.into_iter().collect(),
            next_id,
            revision: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Monotonic change counter used for cache invalidation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(&id)
    }

    /// Sections in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    pub fn by_name(&self, name: &str) -> Option<&Section> {
        self.iter().find(|s| s.name == name)
    }

    /// First free "Section N" name.
    pub fn fresh_name(&self) -> String {
        let mut i = 1;
        loop {
            let candidate = format!("Section {i}");
            if self.by_name(&candidate).is_none() {
                return candidate;
            }
            i += 1;
        }
    }

    fn check_name(&self, name: &str, except: Option<SectionId>) -> Result<(), RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name == UNASSIGNED_LABEL {
            return Err(RegistryError::ReservedName);
        }
        if self.iter().any(|s| s.name == name && Some(s.id) != except) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn insert(&mut self, name: String, boundary: Option<Boundary>) -> SectionId {
        let id = SectionId(self.next_id);
        self.next_id += 1;
        self.sections.insert(
            id,
            Section {
                id,
                name,
                line_size: None,
                boundary,
            },
        );
        self.revision += 1;
        id
    }

    /// Create a drawn section. A free auto-incremented name is picked when
    /// none is given.
    pub fn create_section(
        &mut self,
        name: Option<&str>,
        boundary: Boundary,
    ) -> Result<SectionId, RegistryError> {
        let name = match name {
            Some(n) => {
                self.check_name(n, None)?;
                n.to_string()
            }
            None => self.fresh_name(),
        };
        Ok(self.insert(name, Some(boundary)))
    }

    /// Create a name-only section; membership is manual-only for these.
    pub fn create_named(&mut self, name: &str) -> Result<SectionId, RegistryError> {
        self.check_name(name, None)?;
        Ok(self.insert(name.to_string(), None))
    }

    /// Remove a section, detaching (not deleting) its member detections.
    pub fn delete_section(&mut self, id: SectionId) -> Result<Section, RegistryError> {
        let removed = self
            .sections
            .remove(&id)
            .ok_or(RegistryError::UnknownSection(id))?;
        let before = self.membership.len();
        self.membership.retain(|_, a| a.section != id);
        debug!(
            "deleted section '{}', detached {} detections",
            removed.name,
            before - self.membership.len()
        );
        self.revision += 1;
        Ok(removed)
    }

    pub fn rename(&mut self, id: SectionId, name: &str) -> Result<(), RegistryError> {
        self.check_name(name, Some(id))?;
        let section = self
            .sections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSection(id))?;
        section.name = name.to_string();
        self.revision += 1;
        Ok(())
    }

    pub fn set_line_size(
        &mut self,
        id: SectionId,
        line_size: Option<f64>,
    ) -> Result<(), RegistryError> {
        let section = self
            .sections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSection(id))?;
        section.line_size = line_size;
        self.revision += 1;
        Ok(())
    }

    /// Replace a section's outline with a validated boundary.
    pub fn set_boundary(&mut self, id: SectionId, boundary: Boundary) -> Result<(), RegistryError> {
        let section = self
            .sections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSection(id))?;
        section.boundary = Some(boundary);
        self.revision += 1;
        Ok(())
    }

    /// Insert a vertex; the prior outline stays when the candidate fails
    /// validation.
    pub fn add_point(
        &mut self,
        id: SectionId,
        index: usize,
        p: DocPoint,
    ) -> Result<(), RegistryError> {
        let section = self
            .sections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSection(id))?;
        let boundary = section
            .boundary
            .as_ref()
            .ok_or(RegistryError::NoBoundary(id))?;
        let candidate = boundary.with_inserted_point(index, p)?;
        section.boundary = Some(candidate);
        self.revision += 1;
        Ok(())
    }

    /// Move a vertex; the prior outline stays when the candidate fails
    /// validation.
    pub fn move_point(
        &mut self,
        id: SectionId,
        index: usize,
        p: DocPoint,
    ) -> Result<(), RegistryError> {
        let section = self
            .sections
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSection(id))?;
        let boundary = section
            .boundary
            .as_ref()
            .ok_or(RegistryError::NoBoundary(id))?;
        let candidate = boundary.with_moved_point(index, p)?;
        section.boundary = Some(candidate);
        self.revision += 1;
        Ok(())
    }

    /// Explicitly (and idempotently) assign a detection; the entry is
    /// pinned and a prior membership is replaced.
    pub fn assign(&mut self, det: DetectionId, section: SectionId) -> Result<(), RegistryError> {
        if !self.sections.contains_key(&section) {
            return Err(RegistryError::UnknownSection(section));
        }
        let entry = Assignment {
            section,
            pinned: true,
        };
        if self.membership.insert(det, entry) != Some(entry) {
            self.revision += 1;
        }
        Ok(())
    }

    /// Drop a detection's membership (and its pin). Returns whether an
    /// assignment existed.
    pub fn unassign(&mut self, det: DetectionId) -> bool {
        let removed = self.membership.remove(&det).is_some();
        if removed {
            self.revision += 1;
        }
        removed
    }

    pub fn assignment(&self, det: DetectionId) -> Option<Assignment> {
        self.membership.get(&det).copied()
    }

    pub fn section_of(&self, det: DetectionId) -> Option<SectionId> {
        self.assignment(det).map(|a| a.section)
    }

    /// Member detections of one section, in id order.
    pub fn members(&self, id: SectionId) -> impl Iterator<Item = DetectionId> + '_ {
        self.membership
            .iter()
            .filter(move |(_, a)| a.section == id)
            .map(|(&det, _)| det)
    }

    /// Recompute containment membership for unpinned detections.
    ///
    /// `positions` must cover every live detection; entries for detections
    /// that were removed elsewhere are dropped from the membership map by
    /// the document layer, not here.
    pub fn reassign_unpinned(
        &mut self,
        positions: impl Iterator<Item = (DetectionId, DocPoint)>,
    ) -> MembershipDiagnostics {
        let mut diag = MembershipDiagnostics::default();
        let mut changed = 0usize;
        for (det, position) in positions {
            diag.evaluated += 1;
            if self.assignment(det).is_some_and(|a| a.pinned) {
                diag.pinned += 1;
                diag.assigned += 1;
                continue;
            }
            let target = self
                .sections
                .values()
                .find(|s| {
                    s.boundary
                        .as_ref()
                        .is_some_and(|b| b.contains(position))
                })
                .map(|s| s.id);
            let previous = self.section_of(det);
            if previous != target {
                changed += 1;
                match target {
                    Some(section) => {
                        self.membership.insert(
                            det,
                            Assignment {
                                section,
                                pinned: false,
                            },
                        );
                    }
                    None => {
                        self.membership.remove(&det);
                    }
                }
            }
            match target {
                Some(_) => diag.assigned += 1,
                None => diag.unassigned += 1,
            }
        }
        if changed > 0 {
            self.revision += 1;
        }
        diag.changed = changed;
        debug!(
            "membership recompute: {} evaluated, {} assigned, {} unassigned, {} changed",
            diag.evaluated, diag.assigned, diag.unassigned, diag.changed
        );
        diag
    }

    /// Persisted membership entries in detection order.
    pub fn membership_entries(&self) -> Vec<(DetectionId, Assignment)> {
        self.membership.iter().map(|(&d, &a)| (d, a)).collect()
    }
}
