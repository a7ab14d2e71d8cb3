use pid_census::config::{self, ReportToolConfig};
use pid_census::export::{export_frequency_csv, export_weighted_csv};
use pid_census::io::write_json_file;
use pid_census::rates::load_rate_table;
use pid_census::{load_project, AnalysisReport};
use std::env;
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let program = env::args()
        .next()
        .unwrap_or_else(|| "census_report".to_string());
    let tool: ReportToolConfig = config::parse_cli(&program)?;

    let session = Arc::new(config::load_config(&tool.config_path)?);
    let export_options = session.export;
    let mut document = load_project(&tool.project_path, session)
        .map_err(|e| format!("Failed to load project: {e}"))?;

    let report = document.report();
    print_text_summary(&report);

    if let Some(path) = &tool.csv_out {
        export_frequency_csv(&report.record, path, export_options)
            .map_err(|e| e.to_string())?;
        println!("Counts CSV written to {}", path.display());
    }

    if let Some(rates_path) = &tool.rates_path {
        let table = load_rate_table(rates_path)?;
        let summaries = document
            .weighted_summaries(&table)
            .map_err(|e| format!("Failed to compute weighted summaries: {e}"))?;
        match &tool.rates_out {
            Some(path) => {
                export_weighted_csv(&summaries, table.columns(), path)
                    .map_err(|e| e.to_string())?;
                println!("Weighted summary written to {}", path.display());
            }
            None => print_weighted_summary(&summaries),
        }
    }

    if let Some(path) = &tool.json_out {
        write_json_file(path, &report)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn print_text_summary(report: &AnalysisReport) {
    println!("Document summary");
    println!("  detections: {}", report.detections);
    println!(
        "  sections: {} ({} assigned, {} unassigned)",
        report.sections, report.assigned, report.unassigned
    );
    println!("  latency_ms: {:.3}", report.latency_ms);
    for summary in &report.section_summaries {
        println!(
            "  [{}] {} detections, total count {}",
            summary.name, summary.detections, summary.total_count
        );
    }
    println!("\nCounts (section / category / bucket):");
    for row in report.record.rows() {
        println!(
            "  {} / {} / {}: {}",
            row.section, row.category, row.bucket, row.count
        );
    }
}

fn print_weighted_summary(
    summaries: &[pid_census::rates::WeightedSummary],
) {
    println!("\nWeighted frequencies:");
    for s in summaries {
        println!("  [{}] total {:.6} (skipped {})", s.section, s.total, s.skipped);
    }
}
