//! Named size buckets used to discretize detection sizes.
//!
//! Buckets are session configuration: an ordered list of named ranges. A
//! size `v` falls into the first bucket (in configuration order) with
//! `lower <= v < upper`; the final bucket may be open-ended (`upper`
//! omitted), matching `v >= lower`. Sizes matching no bucket land in the
//! reserved `Unclassified` slot so that totals always reconcile.

use serde::{Deserialize, Serialize};

/// Label used for sizes outside every configured bucket.
pub const UNCLASSIFIED_LABEL: &str = "Unclassified";

/// One named size range. `upper: None` marks the open-ended tail bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeBucket {
    pub name: String,
    pub lower: f64,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl SizeBucket {
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper: Some(upper),
        }
    }

    pub fn open_ended(name: impl Into<String>, lower: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper: None,
        }
    }

    fn matches(&self, v: f64) -> bool {
        match self.upper {
            Some(upper) => self.lower <= v && v < upper,
            None => v >= self.lower,
        }
    }
}

/// Reasons a bucket list is rejected at configuration time.
#[derive(Clone, Debug, PartialEq)]
pub enum BucketError {
    Empty,
    EmptyName { index: usize },
    NonFiniteBound { name: String },
    InvertedRange { name: String },
    OpenEndedNotLast { name: String },
    ReservedName,
    DuplicateName { name: String },
}

impl std::fmt::Display for BucketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketError::Empty => write!(f, "bucket list is empty"),
            BucketError::EmptyName { index } => write!(f, "bucket {index} has an empty name"),
            BucketError::NonFiniteBound { name } => {
                write!(f, "bucket '{name}' has a non-finite bound")
            }
            BucketError::InvertedRange { name } => {
                write!(f, "bucket '{name}' has lower >= upper")
            }
            BucketError::OpenEndedNotLast { name } => {
                write!(f, "open-ended bucket '{name}' must be last")
            }
            BucketError::ReservedName => {
                write!(f, "bucket name '{UNCLASSIFIED_LABEL}' is reserved")
            }
            BucketError::DuplicateName { name } => {
                write!(f, "bucket name '{name}' appears twice")
            }
        }
    }
}

impl std::error::Error for BucketError {}

/// Where a size landed. Named variants index into the configured order so
/// that downstream sorting follows the configuration, not the labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Named(usize),
    Unclassified,
}

/// Validated, ordered bucket configuration.
///
/// Overlapping ranges are tolerated (first-defined wins); everything else
/// about each bucket is checked up front.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SizeBucket>", into = "Vec<SizeBucket>")]
pub struct BucketSet {
    buckets: Vec<SizeBucket>,
}

impl BucketSet {
    pub fn new(buckets: Vec<SizeBucket>) -> Result<Self, BucketError> {
        if buckets.is_empty() {
            return Err(BucketError::Empty);
        }
        let last = buckets.len() - 1;
        let mut seen = std::collections::HashSet::new();
        for (index, b) in buckets.iter().enumerate() {
            if b.name.trim().is_empty() {
                return Err(BucketError::EmptyName { index });
            }
            if b.name == UNCLASSIFIED_LABEL {
                return Err(BucketError::ReservedName);
            }
            if !seen.insert(b.name.clone()) {
                return Err(BucketError::DuplicateName {
                    name: b.name.clone(),
                });
            }
            if !b.lower.is_finite() || b.upper.is_some_and(|u| !u.is_finite()) {
                return Err(BucketError::NonFiniteBound {
                    name: b.name.clone(),
                });
            }
            if let Some(upper) = b.upper {
                if b.lower >= upper {
                    return Err(BucketError::InvertedRange {
                        name: b.name.clone(),
                    });
                }
            } else if index != last {
                return Err(BucketError::OpenEndedNotLast {
                    name: b.name.clone(),
                });
            }
        }
        Ok(Self { buckets })
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn buckets(&self) -> &[SizeBucket] {
        &self.buckets
    }

    /// Display label for a bucket slot.
    pub fn label(&self, key: BucketKey) -> &str {
        match key {
            BucketKey::Named(i) => &self.buckets[i].name,
            BucketKey::Unclassified => UNCLASSIFIED_LABEL,
        }
    }

    /// Ordered labels including the trailing unclassified slot.
    pub fn labels(&self) -> Vec<String> {
        let mut out: Vec<String> = self.buckets.iter().map(|b| b.name.clone()).collect();
        out.push(UNCLASSIFIED_LABEL.to_string());
        out
    }

    /// Classify a size; `None` (no usable size) is unclassified by definition.
    pub fn classify(&self, size: Option<f64>) -> BucketKey {
        let Some(v) = size else {
            return BucketKey::Unclassified;
        };
        if !v.is_finite() {
            return BucketKey::Unclassified;
        }
        self.buckets
            .iter()
            .position(|b| b.matches(v))
            .map_or(BucketKey::Unclassified, BucketKey::Named)
    }
}

impl TryFrom<Vec<SizeBucket>> for BucketSet {
    type Error = BucketError;

    fn try_from(buckets: Vec<SizeBucket>) -> Result<Self, Self::Error> {
        BucketSet::new(buckets)
    }
}

impl From<BucketSet> for Vec<SizeBucket> {
    fn from(set: BucketSet) -> Self {
        set.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hole_sizes() -> BucketSet {
        BucketSet::new(vec![
            SizeBucket::new("Tiny (1-3 mm)", 1.0, 3.0),
            SizeBucket::new("Small (3-10 mm)", 3.0, 10.0),
            SizeBucket::new("Medium (10-50 mm)", 10.0, 50.0),
            SizeBucket::new("Large (50-150 mm)", 50.0, 150.0),
            SizeBucket::open_ended("FBR (>150 mm)", 150.0),
        ])
        .unwrap()
    }

    #[test]
    fn half_open_ranges_and_open_tail() {
        let set = hole_sizes();
        assert_eq!(set.classify(Some(1.0)), BucketKey::Named(0));
        assert_eq!(set.classify(Some(3.0)), BucketKey::Named(1), "upper bound exclusive");
        assert_eq!(set.classify(Some(149.9)), BucketKey::Named(3));
        assert_eq!(set.classify(Some(150.0)), BucketKey::Named(4));
        assert_eq!(set.classify(Some(9000.0)), BucketKey::Named(4));
    }

    #[test]
    fn misses_are_unclassified() {
        let set = hole_sizes();
        assert_eq!(set.classify(Some(0.5)), BucketKey::Unclassified);
        assert_eq!(set.classify(Some(f64::NAN)), BucketKey::Unclassified);
        assert_eq!(set.classify(None), BucketKey::Unclassified);
    }

    #[test]
    fn overlap_resolves_to_first_defined() {
        let set = BucketSet::new(vec![
            SizeBucket::new("a", 0.0, 10.0),
            SizeBucket::new("b", 5.0, 20.0),
        ])
        .unwrap();
        assert_eq!(set.classify(Some(7.0)), BucketKey::Named(0));
        assert_eq!(set.classify(Some(12.0)), BucketKey::Named(1));
    }

    #[test]
    fn validation_rejects_bad_configurations() {
        assert_eq!(BucketSet::new(vec![]), Err(BucketError::Empty));
        assert!(matches!(
            BucketSet::new(vec![SizeBucket::new("x", 5.0, 5.0)]),
            Err(BucketError::InvertedRange { .. })
        ));
        assert!(matches!(
            BucketSet::new(vec![
                SizeBucket::open_ended("tail", 0.0),
                SizeBucket::new("x", 0.0, 1.0),
            ]),
            Err(BucketError::OpenEndedNotLast { .. })
        ));
        assert!(matches!(
            BucketSet::new(vec![
                SizeBucket::new("x", 0.0, 1.0),
                SizeBucket::new("x", 1.0, 2.0),
            ]),
            Err(BucketError::DuplicateName { .. })
        ));
        assert_eq!(
            BucketSet::new(vec![SizeBucket::new(UNCLASSIFIED_LABEL, 0.0, 1.0)]),
            Err(BucketError::ReservedName)
        );
    }
}
