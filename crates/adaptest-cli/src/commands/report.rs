//! The `adaptest report` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use comfy_table::{presets::UTF8_FULL, Table};

use adaptest_core::statistics::ReportFilters;
use adaptest_engine::{EngineConfig, TestingService};
use adaptest_report::{generate_markdown, write_html_report};
use adaptest_store::SqliteStore;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    db: PathBuf,
    since: Option<String>,
    until: Option<String>,
    status: Option<String>,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let filters = ReportFilters {
        since: since.as_deref().map(parse_instant).transpose()?,
        until: until.as_deref().map(parse_instant).transpose()?,
        status: status
            .as_deref()
            .map(|s| s.parse().map_err(anyhow::Error::msg))
            .transpose()
            .context("invalid --status")?,
    };

    let config = EngineConfig::load_from(config_path.as_deref())?;
    let store = Arc::new(SqliteStore::open(&db)?);
    let service = TestingService::new(store, config);

    let report = service.report_validity(&filters).await?;

    match format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&report)?;
            emit(&json, output.as_deref())?;
        }
        "markdown" | "md" => {
            emit(&generate_markdown(&report), output.as_deref())?;
        }
        "html" => {
            let path = output
                .context("--output is required for html format")?;
            write_html_report(&report, &path)?;
            println!("Wrote {}", path.display());
        }
        "text" => {
            print_text(&report);
        }
        other => bail!("unknown format: {other} (expected text, json, markdown, html)"),
    }

    Ok(())
}

fn emit(content: &str, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn print_text(report: &adaptest_core::statistics::ValidityReport) {
    println!(
        "{} assessments, {} overridden | mean severity {:.2}, mean confidence {:.2}",
        report.total, report.override_count, report.avg_severity, report.avg_confidence
    );

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Status", "Count"]);
    for (status, count) in &report.status_counts {
        table.add_row(vec![status.clone(), count.to_string()]);
    }
    println!("{table}");

    if !report.flag_counts.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Flag", "Count"]);
        for (flag, count) in &report.flag_counts {
            table.add_row(vec![flag.clone(), count.to_string()]);
        }
        println!("{table}");
    }

    if let Some(trend) = &report.trend {
        println!(
            "Flagged rate: {:.1}% this window vs {:.1}% previous ({:+.1} pp)",
            trend.current.flagged_rate * 100.0,
            trend.previous.flagged_rate * 100.0,
            trend.flagged_rate_delta * 100.0,
        );
    }
}

/// Accept either a full RFC 3339 instant or a bare date (midnight UTC).
fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid instant: {s} (expected RFC 3339 or YYYY-MM-DD)"))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc())
}
