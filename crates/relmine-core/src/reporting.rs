use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::domain::report::{AggregateReport, AnalysisStatus, ReleaseReport};

/// Write any report document as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("serialize report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

fn status_mark(status: Option<AnalysisStatus>) -> &'static str {
    match status {
        Some(AnalysisStatus::Success) | Some(AnalysisStatus::IssuesFound) => "✓",
        Some(AnalysisStatus::Skipped) | None => "–",
        Some(AnalysisStatus::Failed) | Some(AnalysisStatus::TimedOut) => "✗",
    }
}

fn render_release_block(out: &mut String, report: &ReleaseReport, analyzer_ids: &[&str]) {
    out.push_str(&format!(
        "\n{} ({}): {}\n",
        report.tag(),
        report.descriptor.published_date,
        report.stage
    ));
    if let Some(error) = &report.error {
        out.push_str(&format!("  error: {}\n", error));
    }
    let build = match &report.build {
        Some(b) if b.succeeded => "✓".to_string(),
        Some(b) if b.diagnostic.is_empty() => "✗".to_string(),
        Some(b) => format!("✗ ({})", b.diagnostic.replace('\n', " ")),
        None => "–".to_string(),
    };
    out.push_str(&format!("  {:<22}{}\n", "build:", build));
    for id in analyzer_ids {
        let status = report.status_of(id);
        let label = format!("{}:", id);
        let detail = status.map(|s| s.name()).unwrap_or("absent");
        out.push_str(&format!("  {:<22}{} {}\n", label, status_mark(status), detail));
    }
}

/// Render the human-readable run summary (analysis-summary.txt).
pub fn render_aggregate_summary_txt(aggregate: &AggregateReport) -> String {
    let rule = "=".repeat(70);
    let thin = "-".repeat(70);
    let total = aggregate.total();
    let analyzer_ids: Vec<&str> = aggregate
        .per_analyzer_success_count
        .keys()
        .map(String::as_str)
        .collect();

    let mut out = String::new();
    out.push_str(&format!("{rule}\nRELEASE ANALYSIS SUMMARY\n{rule}\n\n"));
    out.push_str(&format!("Repository: {}\n", aggregate.repository));
    out.push_str(&format!("Run: {}\n", aggregate.run_id));
    out.push_str(&format!("Releases analyzed: {}\n\n", total));

    out.push_str(&format!("Results per release:\n{thin}\n"));
    for report in &aggregate.reports {
        render_release_block(&mut out, report, &analyzer_ids);
    }

    out.push_str(&format!("\n{rule}\nSTATISTICS:\n{thin}\n"));
    out.push_str(&format!(
        "{:<22}{}/{}\n",
        "build succeeded:", aggregate.build_success_count, total
    ));
    out.push_str(&format!(
        "{:<22}{}/{}\n",
        "checkout failed:", aggregate.checkout_failure_count, total
    ));
    for (id, count) in &aggregate.per_analyzer_success_count {
        out.push_str(&format!("{:<22}{}/{}\n", format!("{} ok:", id), count, total));
    }
    if let Some(history) = &aggregate.history {
        out.push_str(&format!(
            "{:<22}{} {}\n",
            "history:",
            status_mark(Some(history.status)),
            history.status
        ));
    }
    out
}

/// Write analysis-summary.txt.
pub fn write_aggregate_summary_txt(path: &Path, aggregate: &AggregateReport) -> Result<()> {
    let txt = render_aggregate_summary_txt(aggregate);
    std::fs::write(path, txt).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
