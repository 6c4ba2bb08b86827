//! Markdown report generator, for terminals and ticket systems.

use adaptest_core::statistics::ValidityReport;

/// Render a validity report as GitHub-flavored Markdown.
pub fn generate_markdown(report: &ValidityReport) -> String {
    let mut md = String::new();

    md.push_str("# Validity report\n\n");
    md.push_str(&format!(
        "Generated {} | {} assessments | {} overridden\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.total,
        report.override_count,
    ));

    md.push_str("## Status breakdown\n\n");
    md.push_str("| Status | Count | Share |\n|---|---|---|\n");
    for (status, count) in &report.status_counts {
        let share = if report.total > 0 {
            *count as f64 / report.total as f64 * 100.0
        } else {
            0.0
        };
        md.push_str(&format!("| {status} | {count} | {share:.1}% |\n"));
    }
    md.push('\n');

    md.push_str(&format!(
        "Mean severity score: **{:.2}**, mean confidence: **{:.2}**\n\n",
        report.avg_severity, report.avg_confidence
    ));

    if !report.flag_counts.is_empty() {
        md.push_str("## Flags\n\n");
        md.push_str("| Flag | Count |\n|---|---|\n");
        for (flag, count) in &report.flag_counts {
            md.push_str(&format!("| {flag} | {count} |\n"));
        }
        md.push('\n');
    }

    if let Some(trend) = &report.trend {
        md.push_str("## Trend\n\n");
        md.push_str("| Window | Assessments | Flagged | Flagged rate |\n|---|---|---|---|\n");
        for (label, w) in [("Current", &trend.current), ("Previous", &trend.previous)] {
            md.push_str(&format!(
                "| {} ({} to {}) | {} | {} | {:.1}% |\n",
                label,
                w.from.format("%Y-%m-%d"),
                w.to.format("%Y-%m-%d"),
                w.total,
                w.flagged,
                w.flagged_rate * 100.0,
            ));
        }
        md.push_str(&format!(
            "\nFlagged-rate delta: {:+.1} percentage points\n",
            trend.flagged_rate_delta * 100.0
        ));
    }

    md
}
