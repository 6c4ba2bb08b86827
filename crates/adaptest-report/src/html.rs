//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS inlined.

use anyhow::Result;
use std::path::Path;

use adaptest_core::statistics::ValidityReport;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML page from a validity report.
pub fn generate_html(report: &ValidityReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>adaptest validity report</title>\n");
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>adaptest validity report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">{} assessments | {} overridden | generated {}</p>\n",
        report.total,
        report.override_count,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Status breakdown</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Status</th><th>Count</th><th>Share</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for (status, count) in &report.status_counts {
        let share = if report.total > 0 {
            *count as f64 / report.total as f64 * 100.0
        } else {
            0.0
        };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{:.1}%</td></tr>\n",
            status_class(status),
            html_escape(status),
            count,
            share,
        ));
    }
    html.push_str("</tbody></table>\n");

    html.push_str(&format!(
        "<p>Mean severity score: <strong>{:.2}</strong> | mean confidence: <strong>{:.2}</strong></p>\n",
        report.avg_severity, report.avg_confidence
    ));

    if !report.flag_counts.is_empty() {
        html.push_str(&generate_flag_chart(report));
    }
    html.push_str("</section>\n");

    if let Some(trend) = &report.trend {
        html.push_str("<section class=\"trend\">\n");
        html.push_str("<h2>Trend</h2>\n");
        html.push_str("<table class=\"summary\">\n");
        html.push_str(
            "<thead><tr><th>Window</th><th>Assessments</th><th>Flagged</th><th>Flagged rate</th></tr></thead>\n",
        );
        html.push_str("<tbody>\n");
        for (label, w) in [("Current", &trend.current), ("Previous", &trend.previous)] {
            html.push_str(&format!(
                "<tr><td>{} ({} to {})</td><td>{}</td><td>{}</td><td>{:.1}%</td></tr>\n",
                label,
                w.from.format("%Y-%m-%d"),
                w.to.format("%Y-%m-%d"),
                w.total,
                w.flagged,
                w.flagged_rate * 100.0,
            ));
        }
        html.push_str("</tbody></table>\n");
        let direction = if trend.flagged_rate_delta > 0.0 {
            "up"
        } else if trend.flagged_rate_delta < 0.0 {
            "down"
        } else {
            "flat"
        };
        html.push_str(&format!(
            "<p>Flagged rate is <strong>{}</strong> by {:.1} percentage points.</p>\n",
            direction,
            trend.flagged_rate_delta.abs() * 100.0
        ));
        html.push_str("</section>\n");
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(report)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &ValidityReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    Ok(())
}

fn status_class(status: &str) -> &'static str {
    match status {
        "valid" => "pass",
        "suspect" => "warn",
        "invalid" => "fail",
        _ => "neutral",
    }
}

fn generate_flag_chart(report: &ValidityReport) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 240;

    let max_count = report
        .flag_counts
        .values()
        .copied()
        .max()
        .unwrap_or(1)
        .max(1);
    let total_height = report.flag_counts.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, (flag, count)) in report.flag_counts.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = (*count as f64 / max_count as f64 * max_width as f64) as usize;

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(flag)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#eab308\" rx=\"4\"/>\n",
            label_width, y, width, bar_height
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            count
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --warn: #fef9c3; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --warn: #713f12; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.pass { background: var(--pass); }
.warn { background: var(--warn); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use adaptest_core::assessment::{
        FlagKind, FlagSeverity, ValidityAssessment, ValidityFlag,
    };
    use adaptest_core::statistics::{compute_validity_report, ReportFilters};
    use chrono::Duration;
    use uuid::Uuid;

    fn make_report() -> ValidityReport {
        let assessments = vec![
            ValidityAssessment::from_flags(Uuid::new_v4(), Vec::new()),
            ValidityAssessment::from_flags(
                Uuid::new_v4(),
                vec![ValidityFlag::new(
                    FlagKind::MultipleRapidResponses,
                    FlagSeverity::High,
                    "3 responses under 3s",
                )],
            ),
        ];
        compute_validity_report(
            &assessments,
            &ReportFilters::default(),
            Some(chrono::Utc::now()),
            Duration::days(7),
        )
    }

    #[test]
    fn html_report_contains_required_elements() {
        let html = generate_html(&make_report());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("valid"));
        assert!(html.contains("multiple_rapid_responses"));
        assert!(html.contains("Trend"));
    }

    #[test]
    fn html_report_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.html");

        write_html_report(&make_report(), &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
