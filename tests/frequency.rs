mod common;

use common::fixtures::{config, rect, small_medium_config};
use pid_census::prelude::*;

#[test]
fn bucket_totals_reconcile_with_section_membership() {
    let mut doc = Document::new(config());
    let report = doc.ingest(vec![
        RawDetection::new("manual valve", 5.0, 5.0).with_size(2.0),
        RawDetection::new("flange", 6.0, 6.0).with_size(7.0),
        RawDetection::new("pipe", 7.0, 7.0).with_size(80.0),
        RawDetection::new("manual valve", 50.0, 50.0).with_size(200.0),
    ]);
    assert!(report.is_clean());
    doc.create_section(Some("Inlet"), rect(0.0, 0.0, 10.0, 10.0))
        .unwrap();

    let record = doc.compute_frequencies();
    assert_eq!(
        record.section_total("Inlet"),
        3,
        "sum over buckets equals detections assigned to the section"
    );
    assert_eq!(record.section_total("Unassigned"), 1);
    assert_eq!(record.total(), 4);
}

#[test]
fn repeated_computation_yields_identical_records() {
    let mut doc = Document::new(config());
    doc.ingest(vec![
        RawDetection::new("manual valve", 1.0, 1.0).with_size(2.0),
        RawDetection::new("flange", 2.0, 2.0).with_size(5.0),
    ]);
    let first = doc.compute_frequencies();
    let second = doc.compute_frequencies();
    assert_eq!(*first, *second);
}

#[test]
fn reassignment_moves_exactly_one_count() {
    let mut doc = Document::new(config());
    let report = doc.ingest(vec![
        RawDetection::new("manual valve", 5.0, 5.0).with_size(2.0)
    ]);
    let det = report.added[0];
    let a = doc
        .create_section(Some("A"), rect(0.0, 0.0, 10.0, 10.0))
        .unwrap();
    let b = doc
        .create_section(Some("B"), rect(20.0, 0.0, 30.0, 10.0))
        .unwrap();
    assert_eq!(doc.registry().section_of(det), Some(a));

    let before = doc.compute_frequencies();
    assert_eq!(before.count("A", "Manual Valves", "Tiny (1-3 mm)"), 1);
    assert_eq!(before.count("B", "Manual Valves", "Tiny (1-3 mm)"), 0);

    doc.assign(det, b).unwrap();
    let after = doc.compute_frequencies();
    assert_eq!(after.count("A", "Manual Valves", "Tiny (1-3 mm)"), 0);
    assert_eq!(after.count("B", "Manual Valves", "Tiny (1-3 mm)"), 1);
    assert_eq!(after.section_total("Unassigned"), before.section_total("Unassigned"));
    assert_eq!(after.total(), before.total());
}

#[test]
fn out_of_range_sizes_count_once_under_unclassified() {
    let mut doc = Document::new(config());
    doc.ingest(vec![
        // 0.5mm sits below the smallest configured bucket.
        RawDetection::new("manual valve", 1.0, 1.0).with_size(0.5),
    ]);
    let record = doc.compute_frequencies();
    assert_eq!(record.count("Unassigned", "Manual Valves", "Unclassified"), 1);
    for bucket in record.bucket_labels().iter().filter(|b| *b != "Unclassified") {
        assert_eq!(
            record.count("Unassigned", "Manual Valves", bucket),
            0,
            "never under a named bucket"
        );
    }
    assert_eq!(record.total(), 1);
}

#[test]
fn worked_example_small_medium_unclassified() {
    let mut doc = Document::new(small_medium_config());
    let report = doc.ingest(vec![
        RawDetection::new("valve", 0.0, 0.0).with_size(0.5),
        RawDetection::new("valve", 1.0, 0.0).with_size(1.5),
        RawDetection::new("valve", 2.0, 0.0).with_size(5.0),
    ]);
    assert_eq!(report.accepted(), 3);

    let record = doc.compute_frequencies();
    assert_eq!(record.count("Unassigned", "valve", "small"), 1);
    assert_eq!(record.count("Unassigned", "valve", "medium"), 1);
    assert_eq!(record.count("Unassigned", "valve", "Unclassified"), 1);
}

#[test]
fn multiplicities_sum_into_bucket_counts() {
    let mut doc = Document::new(small_medium_config());
    doc.ingest(vec![
        RawDetection::new("valve", 0.0, 0.0).with_size(0.5).with_count(3)
    ]);
    let record = doc.compute_frequencies();
    assert_eq!(record.count("Unassigned", "valve", "small"), 3);
    assert_eq!(record.total(), 3);
}

#[test]
fn pinned_assignments_survive_geometry_edits() {
    let mut doc = Document::new(config());
    let report = doc.ingest(vec![
        RawDetection::new("manual valve", 50.0, 50.0).with_size(2.0)
    ]);
    let det = report.added[0];
    let s = doc
        .create_section(Some("Inlet"), rect(0.0, 0.0, 10.0, 10.0))
        .unwrap();

    // Pin the far-away detection, then edit the polygon.
    doc.assign(det, s).unwrap();
    doc.move_section_point(s, 2, DocPoint::new(12.0, 12.0)).unwrap();
    assert_eq!(
        doc.registry().section_of(det),
        Some(s),
        "pinned membership is not recomputed"
    );

    // Unpinning releases it to containment rules.
    doc.unassign(det).unwrap();
    assert_eq!(doc.registry().section_of(det), None);
}

#[test]
fn manual_policy_never_recomputes_membership() {
    let mut cfg = config();
    cfg.membership = MembershipPolicy::Manual;
    let mut doc = Document::new(cfg);
    let report = doc.ingest(vec![
        RawDetection::new("manual valve", 5.0, 5.0).with_size(2.0)
    ]);
    doc.create_section(Some("Inlet"), rect(0.0, 0.0, 10.0, 10.0))
        .unwrap();
    assert_eq!(
        doc.registry().section_of(report.added[0]),
        None,
        "containment does not apply under the manual policy"
    );
}
