//! The `adaptest validate-pool` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::pool::{self, ItemPool};

pub fn execute(pool_path: PathBuf) -> Result<()> {
    let pools: Vec<ItemPool> = if pool_path.is_dir() {
        pool::load_pool_directory(&pool_path)?
    } else {
        vec![pool::parse_pool(&pool_path)?]
    };

    let mut total_warnings = 0;

    for p in &pools {
        let warnings = pool::validate_pool(p);
        let verdict = if warnings.is_empty() { "ok" } else { "issues" };
        println!("{}: {} items, {verdict}", p.name, p.items.len());

        for w in &warnings {
            match &w.item_id {
                Some(id) => println!("  {id}: {}", w.message),
                None => println!("  {}", w.message),
            }
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All pools valid.");
    } else {
        println!(
            "\n{total_warnings} warning(s) found across {} pool(s).",
            pools.len()
        );
    }

    Ok(())
}
