//! The `adaptest assess` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use adaptest_engine::{EngineConfig, TestingService};
use adaptest_store::SqliteStore;

pub async fn execute(
    db: PathBuf,
    session: Uuid,
    force: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfig::load_from(config_path.as_deref())?;
    let store = Arc::new(SqliteStore::open(&db)?);
    let service = TestingService::new(store, config);

    let assessment = service.assess_validity(session, force).await?;

    println!("Session:    {session}");
    println!("Status:     {}", assessment.status);
    println!("Severity:   {}", assessment.severity_score);
    println!("Confidence: {:.2}", assessment.confidence);
    if let Some(record) = &assessment.override_record {
        println!(
            "Override:   by {} at {} (computed status was {})",
            record.admin_id,
            record.overridden_at.format("%Y-%m-%d %H:%M UTC"),
            record.prior_status
        );
    }
    if assessment.flags.is_empty() {
        println!("No flags.");
    } else {
        println!("Flags:");
        for flag in &assessment.flags {
            println!("  [{:?}] {}: {}", flag.severity, flag.kind, flag.details);
        }
    }

    Ok(())
}
