//! Session configuration: size buckets, category taxonomy, policies.
//!
//! Configuration is loaded once per session and stays immutable; the
//! aggregator receives it as an explicit object, never as ambient state.
//! File format is JSON, matching the project files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::buckets::BucketSet;
use crate::taxonomy::CategoryTaxonomy;

/// How detections become members of sections.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipPolicy {
    /// Containment recomputed for unpinned detections after geometry or
    /// position changes; explicit assignment pins.
    #[default]
    Automatic,
    /// Only explicit assignment; geometry edits never move detections.
    Manual,
}

/// Knobs for CSV/JSON artifact generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Emit the dense section × category × bucket grid including zeros.
    pub include_zero_counts: bool,
}

/// Immutable per-session analysis configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub buckets: BucketSet,
    pub taxonomy: CategoryTaxonomy,
    #[serde(default)]
    pub membership: MembershipPolicy,
    #[serde(default)]
    pub export: ExportOptions,
}

impl AnalysisConfig {
    pub fn new(buckets: BucketSet, taxonomy: CategoryTaxonomy) -> Self {
        Self {
            buckets,
            taxonomy,
            membership: MembershipPolicy::default(),
            export: ExportOptions::default(),
        }
    }
}

/// Load a session configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<AnalysisConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    let config: AnalysisConfig = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))?;
    Ok(config)
}

/// Inputs and outputs of the `census_report` tool.
#[derive(Clone, Debug)]
pub struct ReportToolConfig {
    pub config_path: PathBuf,
    pub project_path: PathBuf,
    pub csv_out: Option<PathBuf>,
    pub rates_path: Option<PathBuf>,
    pub rates_out: Option<PathBuf>,
    pub json_out: Option<PathBuf>,
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <config.json> <project.census.json> \
         [--csv <counts.csv>] [--rates <rates.csv> --rates-out <summary.csv>] \
         [--json <report.json>]"
    )
}

/// Parse the report tool's command line from `env::args`.
pub fn parse_cli(program: &str) -> Result<ReportToolConfig, String> {
    parse_args(program, env::args().skip(1))
}

fn parse_args(
    program: &str,
    args: impl Iterator<Item = String>,
) -> Result<ReportToolConfig, String> {
    let mut positional: Vec<PathBuf> = Vec::new();
    let mut csv_out = None;
    let mut rates_path = None;
    let mut rates_out = None;
    let mut json_out = None;

    let mut args = args;
    while let Some(arg) = args.next() {
        let mut flag_value = |name: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{name} expects a path\n{}", usage(program)))
        };
        match arg.as_str() {
            "--csv" => csv_out = Some(flag_value("--csv")?),
            "--rates" => rates_path = Some(flag_value("--rates")?),
            "--rates-out" => rates_out = Some(flag_value("--rates-out")?),
            "--json" => json_out = Some(flag_value("--json")?),
            "-h" | "--help" => return Err(usage(program)),
            other if other.starts_with('-') => {
                return Err(format!("unknown flag '{other}'\n{}", usage(program)));
            }
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    if positional.len() != 2 {
        return Err(usage(program));
    }
    if rates_out.is_some() && rates_path.is_none() {
        return Err(format!("--rates-out requires --rates\n{}", usage(program)));
    }
    let mut positional = positional.into_iter();
    Ok(ReportToolConfig {
        config_path: positional.next().unwrap_or_default(),
        project_path: positional.next().unwrap_or_default(),
        csv_out,
        rates_path,
        rates_out,
        json_out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buckets::SizeBucket;
    use crate::taxonomy::Category;

    #[test]
    fn config_round_trips_through_json() {
        let config = AnalysisConfig::new(
            BucketSet::new(vec![
                SizeBucket::new("small", 0.0, 1.0),
                SizeBucket::open_ended("large", 1.0),
            ])
            .unwrap(),
            CategoryTaxonomy::new(vec![Category::new("Manual Valves")])
                .with_alias("manual valve", "Manual Valves"),
        );
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.buckets, config.buckets);
        assert_eq!(back.membership, MembershipPolicy::Automatic);
        assert_eq!(back.taxonomy.resolve("manual valve"), Some("Manual Valves"));
    }

    #[test]
    fn defaults_apply_to_omitted_policy_fields() {
        let json = r#"{
            "buckets": [{"name": "small", "lower": 0.0, "upper": 1.0}],
            "taxonomy": {"categories": [{"name": "Manual Valves"}]}
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.membership, MembershipPolicy::Automatic);
        assert!(!config.export.include_zero_counts);
    }

    #[test]
    fn cli_parsing_accepts_flags_in_any_order() {
        let parsed = parse_args(
            "census_report",
            ["--csv", "out.csv", "cfg.json", "proj.census.json"]
                .into_iter()
                .map(String::from),
        )
        .unwrap();
        assert_eq!(parsed.config_path, PathBuf::from("cfg.json"));
        assert_eq!(parsed.project_path, PathBuf::from("proj.census.json"));
        assert_eq!(parsed.csv_out, Some(PathBuf::from("out.csv")));

        assert!(parse_args("census_report", std::iter::empty()).is_err());
        assert!(parse_args(
            "census_report",
            ["a", "b", "--rates-out", "x.csv"].into_iter().map(String::from)
        )
        .is_err());
    }
}
