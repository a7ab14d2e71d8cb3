use pid_census::buckets::{BucketSet, SizeBucket};
use pid_census::detection::RawDetection;
use pid_census::geometry::Boundary;
use pid_census::taxonomy::{Category, CategoryTaxonomy};
use pid_census::{AnalysisConfig, Document};

fn main() {
    // Demo stub: builds a tiny in-memory document and prints one summary
    let config = AnalysisConfig::new(
        BucketSet::new(vec![
            SizeBucket::new("Small (3-10 mm)", 3.0, 10.0),
            SizeBucket::open_ended("Large (>10 mm)", 10.0),
        ])
        .expect("static bucket list is valid"),
        CategoryTaxonomy::new(vec![Category::new("Manual Valves")])
            .with_alias("manual valve", "Manual Valves"),
    );

    let mut doc = Document::new(config);
    let ingest = doc.ingest(vec![
        RawDetection::new("manual valve", 120.0, 80.0).with_size(5.0),
        RawDetection::new("manual valve", 300.0, 40.0).with_size(25.0),
    ]);
    doc.create_section(
        Some("Inlet"),
        Boundary::rect(0.0, 0.0, 200.0, 200.0).expect("rectangle is a valid boundary"),
    )
    .expect("fresh document accepts the section");

    let report = doc.report();
    println!(
        "detections={} (rejected={}) sections={} assigned={} latency_ms={:.3}",
        report.detections,
        ingest.rejected.len(),
        report.sections,
        report.assigned,
        report.latency_ms
    );
}
