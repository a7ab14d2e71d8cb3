//! Category taxonomy and raw-label resolution.
//!
//! Detector output labels are free-form ("manual valve", class indices,
//! vendor spellings); reporting wants a fixed canonical category list. The
//! taxonomy holds the ordered canonical categories plus an alias map from
//! raw labels to canonical names. Lookup keys are trimmed and
//! case-folded, so "  Manual Valve " and "manual valve" resolve alike.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

/// One canonical category with an optional human-facing label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub display_label: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_label: None,
        }
    }

    pub fn with_label(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_label: Some(label.into()),
        }
    }

    /// Label shown in tables; falls back to the canonical name.
    pub fn display(&self) -> &str {
        self.display_label.as_deref().unwrap_or(&self.name)
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Ordered canonical categories plus alias resolution.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "TaxonomyFile", into = "TaxonomyFile")]
pub struct CategoryTaxonomy {
    categories: Vec<Category>,
    aliases: HashMap<String, String>,
    by_key: HashMap<String, usize>,
}

/// On-disk shape: the derived lookup table is rebuilt on load.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct TaxonomyFile {
    categories: Vec<Category>,
    #[serde(default)]
    aliases: HashMap<String, String>,
}

impl CategoryTaxonomy {
    pub fn new(categories: Vec<Category>) -> Self {
        let by_key = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (normalize(&c.name), i))
            .collect();
        Self {
            categories,
            aliases: HashMap::new(),
            by_key,
        }
    }

    /// Register a raw-label alias for a canonical category.
    pub fn with_alias(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.insert(normalize(&raw.into()), canonical.into());
        self
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_key.contains_key(&normalize(name))
    }

    /// Resolve a raw detector label to a canonical category name.
    ///
    /// Alias entries are consulted first, then a direct (case-insensitive)
    /// match against the canonical names. Unknown labels return `None` and
    /// leave the decision to the validation boundary.
    pub fn resolve(&self, raw_label: &str) -> Option<&str> {
        let key = normalize(raw_label);
        if key.is_empty() {
            return None;
        }
        let target = self.aliases.get(&key).map(String::as_str).unwrap_or(&key);
        match self.by_key.get(&normalize(target)) {
            Some(&i) => Some(self.categories[i].name.as_str()),
            None => {
                debug!("no category mapping for label '{raw_label}'");
                None
            }
        }
    }
}

impl From<TaxonomyFile> for CategoryTaxonomy {
    fn from(file: TaxonomyFile) -> Self {
        let mut taxonomy = CategoryTaxonomy::new(file.categories);
        for (raw, canonical) in file.aliases {
            taxonomy.aliases.insert(normalize(&raw), canonical);
        }
        taxonomy
    }
}

impl From<CategoryTaxonomy> for TaxonomyFile {
    fn from(taxonomy: CategoryTaxonomy) -> Self {
        Self {
            categories: taxonomy.categories,
            aliases: taxonomy.aliases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> CategoryTaxonomy {
        CategoryTaxonomy::new(vec![
            Category::new("Manual Valves"),
            Category::new("Flanged Joints"),
            Category::with_label("Steel Pipes", "Piping (steel)"),
        ])
        .with_alias("manual valve", "Manual Valves")
        .with_alias("check valve", "Manual Valves")
        .with_alias("flange", "Flanged Joints")
        .with_alias("pipe", "Steel Pipes")
    }

    #[test]
    fn aliases_resolve_case_and_whitespace_insensitively() {
        let t = taxonomy();
        assert_eq!(t.resolve("  Manual Valve "), Some("Manual Valves"));
        assert_eq!(t.resolve("CHECK VALVE"), Some("Manual Valves"));
        assert_eq!(t.resolve("pipe"), Some("Steel Pipes"));
    }

    #[test]
    fn canonical_names_match_directly() {
        let t = taxonomy();
        assert_eq!(t.resolve("flanged joints"), Some("Flanged Joints"));
        assert_eq!(t.resolve("Manual Valves"), Some("Manual Valves"));
    }

    #[test]
    fn unknown_and_empty_labels_are_none() {
        let t = taxonomy();
        assert_eq!(t.resolve("xmas tree"), None);
        assert_eq!(t.resolve("   "), None);
    }

    #[test]
    fn display_falls_back_to_name() {
        let t = taxonomy();
        assert_eq!(t.categories()[0].display(), "Manual Valves");
        assert_eq!(t.categories()[2].display(), "Piping (steel)");
    }
}
