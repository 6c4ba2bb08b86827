//! The `adaptest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create adaptest.toml
    if std::path::Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    // Create example item pool
    std::fs::create_dir_all("pools")?;
    let example_path = std::path::Path::new("pools/example.toml");
    if example_path.exists() {
        println!("pools/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_POOL)?;
        println!("Created pools/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Review adaptest.toml and adjust the stopping rules");
    println!("  2. Run: adaptest validate-pool --pool pools/example.toml");
    println!("  3. Run: adaptest simulate --pool pools/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

# Minimum seconds between a completed session and the next start (0 disables).
session_cadence_secs = 0
# Width in days of each trend window in validity reports.
trend_window_days = 7

[estimator]
theta_min = -4.0
theta_max = 4.0
max_iterations = 20
tolerance = 0.001
cold_start_se = 10.0

[selector]
se_threshold = 0.35
max_items = 20
# Raise to keep precision stopping from ending very short sessions.
min_items = 0
"#;

const EXAMPLE_POOL: &str = r#"[pool]
id = "example"
name = "Example Pool"
description = "A small calibrated pool to get started"

[[items]]
id = "pat-001"
text = "Which figure completes the sequence: circle, square, circle, ...?"
category = "pattern"
difficulty = "easy"
a = 1.1
b = -1.4
c = 0.2

[[items]]
id = "pat-002"
text = "Which shape continues the rotation series?"
category = "pattern"
difficulty = "medium"
a = 1.3
b = -0.2
c = 0.2

[[items]]
id = "log-001"
text = "If all A are B and no B is C, can some A be C?"
category = "logic"
difficulty = "medium"
a = 1.2
b = 0.1
c = 0.25

[[items]]
id = "log-002"
text = "Exactly one of three statements is true. Which one?"
category = "logic"
difficulty = "hard"
a = 1.6
b = 1.3
c = 0.25

[[items]]
id = "mat-001"
text = "What is the next number: 2, 6, 18, 54, ...?"
category = "math"
difficulty = "medium"
a = 1.4
b = 0.3
c = 0.2

[[items]]
id = "mat-002"
text = "A train travels 120 km in 90 minutes. What is its speed in km/h?"
category = "math"
difficulty = "easy"
a = 1.0
b = -1.0
c = 0.2

[[items]]
id = "ver-001"
text = "Choose the word closest in meaning to 'tenacious'."
category = "verbal"
difficulty = "medium"
a = 1.2
b = 0.0
c = 0.25

[[items]]
id = "spa-001"
text = "Which net folds into the pictured cube?"
category = "spatial"
difficulty = "hard"
a = 1.5
b = 1.1
c = 0.2

[[items]]
id = "mem-001"
text = "Which symbol appeared third in the sequence shown earlier?"
category = "memory"
difficulty = "easy"
a = 0.9
b = -1.6
c = 0.25

[[items]]
id = "mem-002"
text = "How many red tokens were in the grid you just saw?"
category = "memory"
difficulty = "hard"
a = 1.4
b = 1.5
c = 0.2
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sample_config_parses() {
        let config: adaptest_engine::EngineConfig = toml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.selector.max_items, 20);
    }

    #[test]
    fn example_pool_parses_clean() {
        let pool =
            adaptest_core::pool::parse_pool_str(EXAMPLE_POOL, &PathBuf::from("example.toml"))
                .unwrap();
        assert_eq!(pool.items.len(), 10);
        assert!(adaptest_core::pool::validate_pool(&pool).is_empty());
    }
}
