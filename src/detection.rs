//! Detection records and the ingestion validation boundary.
//!
//! External producers (a remote detector, manual entry, a loaded project)
//! hand over loosely-shaped [`RawDetection`] records. Everything entering
//! the core is validated here and converted into the strict [`Detection`]
//! schema; downstream code assumes only well-typed input.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::geometry::DocPoint;
use crate::taxonomy::CategoryTaxonomy;

/// Identifier unique within one document, allocated by the store.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DetectionId(pub u64);

impl std::fmt::Display for DetectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// How a detection entered the document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionSource {
    #[default]
    Model,
    Manual,
}

/// A located, classified object instance on the drawing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: DetectionId,
    pub position: DocPoint,
    /// Canonical category name, resolved through the taxonomy at ingestion.
    pub category: String,
    /// Per-detection size override (mm); members without one inherit the
    /// owning section's line size.
    pub size: Option<f64>,
    /// Multiplicity of identical objects covered by this mark.
    pub count: u32,
    pub confidence: f32,
    pub source: DetectionSource,
}

/// Validated detection payload, not yet stored (no id).
#[derive(Clone, Debug, PartialEq)]
pub struct NewDetection {
    pub position: DocPoint,
    pub category: String,
    pub size: Option<f64>,
    pub count: u32,
    pub confidence: f32,
    pub source: DetectionSource,
}

impl NewDetection {
    /// Manually entered detection with the usual defaults.
    pub fn manual(category: impl Into<String>, position: DocPoint) -> Self {
        Self {
            position,
            category: category.into(),
            size: None,
            count: 1,
            confidence: 1.0,
            source: DetectionSource::Manual,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

/// Loosely-shaped input record as produced by external detectors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawDetection {
    /// Raw class label; resolved through the taxonomy alias map.
    pub label: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub size: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub count: Option<u32>,
    #[serde(default)]
    pub source: DetectionSource,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            x,
            y,
            ..Default::default()
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }
}

/// Reasons an incoming record is rejected at the boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationError {
    MissingCategory,
    UnknownCategory { label: String },
    NonFinitePosition { x: f64, y: f64 },
    NonFiniteSize { value: f64 },
    NegativeSize { value: f64 },
    ZeroCount,
    ConfidenceOutOfRange { value: f32 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingCategory => write!(f, "missing category label"),
            ValidationError::UnknownCategory { label } => {
                write!(f, "unknown category label '{label}'")
            }
            ValidationError::NonFinitePosition { x, y } => {
                write!(f, "position ({x}, {y}) is not finite")
            }
            ValidationError::NonFiniteSize { value } => {
                write!(f, "size {value} is not finite")
            }
            ValidationError::NegativeSize { value } => {
                write!(f, "size {value} is negative")
            }
            ValidationError::ZeroCount => write!(f, "count must be at least 1"),
            ValidationError::ConfidenceOutOfRange { value } => {
                write!(f, "confidence {value} outside [0, 1]")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a raw record against the session taxonomy.
pub fn validate(
    raw: &RawDetection,
    taxonomy: &CategoryTaxonomy,
) -> Result<NewDetection, ValidationError> {
    if raw.label.trim().is_empty() {
        return Err(ValidationError::MissingCategory);
    }
    let category = taxonomy
        .resolve(&raw.label)
        .ok_or_else(|| ValidationError::UnknownCategory {
            label: raw.label.clone(),
        })?
        .to_string();

    if !raw.x.is_finite() || !raw.y.is_finite() {
        return Err(ValidationError::NonFinitePosition { x: raw.x, y: raw.y });
    }
    if let Some(size) = raw.size {
        if !size.is_finite() {
            return Err(ValidationError::NonFiniteSize { value: size });
        }
        if size < 0.0 {
            return Err(ValidationError::NegativeSize { value: size });
        }
    }
    let count = raw.count.unwrap_or(1);
    if count == 0 {
        return Err(ValidationError::ZeroCount);
    }
    let confidence = raw.confidence.unwrap_or(1.0);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ValidationError::ConfidenceOutOfRange { value: confidence });
    }

    Ok(NewDetection {
        position: Point2::new(raw.x, raw.y),
        category,
        size: raw.size,
        count,
        confidence,
        source: raw.source,
    })
}
