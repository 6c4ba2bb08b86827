//! The `adaptest simulate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Table};

use adaptest_core::pool::parse_pool;
use adaptest_engine::simulate::{run_simulation, SimulationSpec};
use adaptest_engine::EngineConfig;

pub async fn execute(
    pool_path: PathBuf,
    respondents: usize,
    seed: u64,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = EngineConfig::load_from(config_path.as_deref())?;
    let pool = parse_pool(&pool_path)?;
    println!(
        "Simulating {} sessions against pool '{}' ({} items, seed {})",
        respondents,
        pool.name,
        pool.items.len(),
        seed
    );

    let spec = SimulationSpec {
        respondents,
        seed,
        ..SimulationSpec::default()
    };
    let summary = run_simulation(pool.items, config, &spec).await?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "User", "True θ", "Est. θ", "SE", "Items", "Stop", "Validity",
    ]);
    for s in &summary.sessions {
        table.add_row(vec![
            Cell::new(&s.user_id),
            Cell::new(format!("{:+.2}", s.true_theta)),
            Cell::new(format!("{:+.2}", s.estimated_theta)),
            Cell::new(format!("{:.3}", s.se)),
            Cell::new(s.items_administered),
            Cell::new(format!("{:?}", s.stop_reason)),
            Cell::new(s.validity.to_string()),
        ]);
    }
    println!("{table}");
    println!(
        "Mean |true - estimated|: {:.3} | mean items per session: {:.1}",
        summary.mean_abs_error, summary.mean_items
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}
