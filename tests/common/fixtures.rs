use pid_census::prelude::*;

/// The hole-size ladder used by the standard reliability tables.
pub fn hole_size_buckets() -> BucketSet {
    BucketSet::new(vec![
        SizeBucket::new("Tiny (1-3 mm)", 1.0, 3.0),
        SizeBucket::new("Small (3-10 mm)", 3.0, 10.0),
        SizeBucket::new("Medium (10-50 mm)", 10.0, 50.0),
        SizeBucket::new("Large (50-150 mm)", 50.0, 150.0),
        SizeBucket::open_ended("FBR (>150 mm)", 150.0),
    ])
    .expect("static bucket ladder is valid")
}

pub fn taxonomy() -> CategoryTaxonomy {
    CategoryTaxonomy::new(vec![
        Category::new("Manual Valves"),
        Category::new("Flanged Joints"),
        Category::new("Steel Pipes"),
    ])
    .with_alias("manual valve", "Manual Valves")
    .with_alias("check valve", "Manual Valves")
    .with_alias("flange", "Flanged Joints")
    .with_alias("pipe", "Steel Pipes")
}

pub fn config() -> AnalysisConfig {
    AnalysisConfig::new(hole_size_buckets(), taxonomy())
}

/// Two-bucket configuration matching the worked example in the docs.
pub fn small_medium_config() -> AnalysisConfig {
    AnalysisConfig::new(
        BucketSet::new(vec![
            SizeBucket::new("small", 0.0, 1.0),
            SizeBucket::new("medium", 1.0, 2.0),
        ])
        .expect("static bucket list is valid"),
        CategoryTaxonomy::new(vec![Category::new("valve")]),
    )
}

pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Boundary {
    Boundary::rect(x0, y0, x1, y1).expect("rectangle is a valid boundary")
}
