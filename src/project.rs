//! Project persistence: save/load a document as a versioned JSON file.
//!
//! A project file carries the mutable document state (sections,
//! detections, membership). The session configuration is *not* embedded;
//! loading re-validates every record against the active configuration and
//! rejects files whose data no longer fits, so the core's well-typed-input
//! guarantee survives the disk round trip.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::detection::{Detection, DetectionId};
use crate::document::Document;
use crate::io::{parse_csv, write_json_file};
use crate::sections::{Assignment, Section, SectionId, SectionRegistry, UNASSIGNED_LABEL};
use crate::store::DetectionStore;

/// Conventional double extension for project files.
pub const PROJECT_EXTENSION: &str = "census.json";

const FORMAT_VERSION: u32 = 1;

/// Failures of project save/load/import.
#[derive(Debug)]
pub enum ProjectError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, message: String },
    UnsupportedVersion { found: u32, supported: u32 },
    InvalidData { message: String },
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::Io { path, source } => {
                write!(f, "project file {}: {source}", path.display())
            }
            ProjectError::Parse { path, message } => {
                write!(f, "project file {}: {message}", path.display())
            }
            ProjectError::UnsupportedVersion { found, supported } => {
                write!(f, "project format v{found} not supported (up to v{supported})")
            }
            ProjectError::InvalidData { message } => write!(f, "invalid project data: {message}"),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MembershipEntry {
    detection: DetectionId,
    section: SectionId,
    pinned: bool,
}

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    sections: Vec<Section>,
    detections: Vec<Detection>,
    membership: Vec<MembershipEntry>,
}

/// Serialize the document state to `path` (atomic write).
pub fn save_project(document: &Document, path: &Path) -> Result<(), ProjectError> {
    let file = ProjectFile {
        version: FORMAT_VERSION,
        sections: document.registry().iter().cloned().collect(),
        detections: document.store().iter().cloned().collect(),
        membership: document
            .registry()
            .membership_entries()
            .into_iter()
            .map(|(detection, a)| MembershipEntry {
                detection,
                section: a.section,
                pinned: a.pinned,
            })
            .collect(),
    };
    write_json_file(path, &file).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        "saved project to {} ({} sections, {} detections)",
        path.display(),
        file.sections.len(),
        file.detections.len()
    );
    Ok(())
}

fn invalid(message: impl Into<String>) -> ProjectError {
    ProjectError::InvalidData {
        message: message.into(),
    }
}

fn check_file(file: &ProjectFile, config: &AnalysisConfig) -> Result<(), ProjectError> {
    let mut det_ids = std::collections::BTreeSet::new();
    for d in &file.detections {
        if !det_ids.insert(d.id) {
            return Err(invalid(format!("duplicate detection id {}", d.id)));
        }
        if !config.taxonomy.contains(&d.category) {
            return Err(invalid(format!(
                "detection {} has category '{}' unknown to this session",
                d.id, d.category
            )));
        }
        if !d.position.x.is_finite() || !d.position.y.is_finite() {
            return Err(invalid(format!("detection {} has a non-finite position", d.id)));
        }
        if d.size.is_some_and(|s| !s.is_finite() || s < 0.0) {
            return Err(invalid(format!("detection {} has an invalid size", d.id)));
        }
        if d.count == 0 {
            return Err(invalid(format!("detection {} has zero count", d.id)));
        }
    }

    let mut sec_ids = std::collections::BTreeSet::new();
    let mut names = std::collections::BTreeSet::new();
    for s in &file.sections {
        if !sec_ids.insert(s.id) {
            return Err(invalid(format!("duplicate section id {}", s.id)));
        }
        if s.name.trim().is_empty() || s.name == UNASSIGNED_LABEL {
            return Err(invalid(format!("section {} has an invalid name", s.id)));
        }
        if !names.insert(s.name.as_str()) {
            return Err(invalid(format!("duplicate section name '{}'", s.name)));
        }
    }

    for m in &file.membership {
        if !det_ids.contains(&m.detection) {
            return Err(invalid(format!(
                "membership references unknown detection {}",
                m.detection
            )));
        }
        if !sec_ids.contains(&m.section) {
            return Err(invalid(format!(
                "membership references unknown section {}",
                m.section
            )));
        }
    }
    Ok(())
}

/// Load a project file and rebuild a document against `config`.
pub fn load_project(path: &Path, config: Arc<AnalysisConfig>) -> Result<Document, ProjectError> {
    let contents = fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ProjectFile =
        serde_json::from_str(&contents).map_err(|e| ProjectError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    if file.version > FORMAT_VERSION {
        return Err(ProjectError::UnsupportedVersion {
            found: file.version,
            supported: FORMAT_VERSION,
        });
    }
    check_file(&file, &config)?;

    let store = DetectionStore::restore(file.detections);
    let registry = SectionRegistry::restore(
        file.sections,
        file.membership
            .into_iter()
            .map(|m| {
                (
                    m.detection,
                    Assignment {
                        section: m.section,
                        pinned: m.pinned,
                    },
                )
            })
            .collect(),
    );
    Ok(Document::from_parts(config, store, registry))
}

/// Import name-only sections from a `name,line_size` CSV.
///
/// Rows whose name already exists are skipped; a malformed line size is
/// treated as absent rather than an error. Returns the number of sections
/// created.
pub fn import_sections_csv(document: &mut Document, path: &Path) -> Result<usize, ProjectError> {
    let contents = fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut imported = 0usize;
    for record in parse_csv(&contents) {
        let Some(name) = record.first().map(|n| n.trim()).filter(|n| !n.is_empty()) else {
            continue;
        };
        if name == UNASSIGNED_LABEL || document.registry().by_name(name).is_some() {
            continue;
        }
        let line_size = record
            .get(1)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0);
        let id = document
            .create_named_section(name)
            .map_err(|e| invalid(e.to_string()))?;
        if line_size.is_some() {
            document
                .set_section_line_size(id, line_size)
                .map_err(|e| invalid(e.to_string()))?;
        }
        imported += 1;
    }
    debug!("imported {imported} sections from {}", path.display());
    Ok(imported)
}
