//! The `adaptest override` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use adaptest_core::assessment::ValidityStatus;
use adaptest_engine::{EngineConfig, TestingService};
use adaptest_store::SqliteStore;

pub async fn execute(
    db: PathBuf,
    session: Uuid,
    status: String,
    admin: String,
    reason: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let new_status: ValidityStatus = status
        .parse()
        .map_err(anyhow::Error::msg)
        .context("invalid --status")?;

    let config = EngineConfig::load_from(config_path.as_deref())?;
    let store = Arc::new(SqliteStore::open(&db)?);
    let service = TestingService::new(store, config);

    let assessment = service
        .override_validity(session, new_status, &admin, &reason)
        .await?;

    let record = assessment
        .override_record
        .as_ref()
        .expect("override was just applied");
    println!(
        "Session {session}: {} -> {} (by {})",
        record.prior_status, assessment.status, record.admin_id
    );

    Ok(())
}
