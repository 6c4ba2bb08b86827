//! TOML item-pool parser.
//!
//! Loads calibrated item pools from TOML files and directories, validates
//! them, and applies the automatic quality rule for items calibration has
//! flagged with negative discrimination.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{Category, DifficultyLabel, IrtParams, Item, QualityFlag};

/// Intermediate TOML structure for pool files.
#[derive(Debug, Deserialize)]
struct TomlPoolFile {
    pool: TomlPoolHeader,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlPoolHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    text: String,
    category: String,
    difficulty: String,
    a: f64,
    b: f64,
    #[serde(default)]
    c: f64,
    #[serde(default)]
    p_value: Option<f64>,
    #[serde(default)]
    response_count: u32,
    #[serde(default)]
    quality: Option<String>,
}

/// A calibrated pool with its items.
#[derive(Debug, Clone)]
pub struct ItemPool {
    pub id: String,
    pub name: String,
    pub description: String,
    pub items: Vec<Item>,
}

/// A non-fatal problem found while validating a pool.
#[derive(Debug, Clone)]
pub struct PoolWarning {
    /// The offending item, when the warning is item-specific.
    pub item_id: Option<String>,
    pub message: String,
}

/// Parse a single TOML file into an `ItemPool`.
pub fn parse_pool(path: &Path) -> Result<ItemPool> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pool file: {}", path.display()))?;
    parse_pool_str(&content, path)
}

/// Parse a TOML string into an `ItemPool` (useful for testing).
pub fn parse_pool_str(content: &str, path: &Path) -> Result<ItemPool> {
    let file: TomlPoolFile = toml::from_str(content)
        .with_context(|| format!("invalid pool TOML: {}", path.display()))?;

    let mut items = Vec::with_capacity(file.items.len());
    for raw in file.items {
        let category: Category = raw
            .category
            .parse()
            .map_err(|e| anyhow::anyhow!("item {}: {e}", raw.id))?;
        let difficulty: DifficultyLabel = raw
            .difficulty
            .parse()
            .map_err(|e| anyhow::anyhow!("item {}: {e}", raw.id))?;
        let quality = match raw.quality.as_deref() {
            None | Some("normal") => QualityFlag::Normal,
            Some("under_review") => QualityFlag::UnderReview,
            Some("deactivated") => QualityFlag::Deactivated,
            Some(other) => anyhow::bail!("item {}: unknown quality flag: {other}", raw.id),
        };

        items.push(Item {
            id: raw.id,
            text: raw.text,
            category,
            difficulty,
            params: IrtParams {
                a: raw.a,
                b: raw.b,
                c: raw.c,
            },
            p_value: raw.p_value,
            response_count: raw.response_count,
            quality,
        });
    }

    Ok(ItemPool {
        id: file.pool.id,
        name: file.pool.name,
        description: file.pool.description,
        items,
    })
}

/// Load every `.toml` pool file in a directory.
pub fn load_pool_directory(dir: &Path) -> Result<Vec<ItemPool>> {
    let mut pools = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read pool directory: {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "toml") {
            pools.push(parse_pool(&path)?);
        }
    }

    pools.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(pools)
}

/// Validate a pool, returning warnings rather than failing.
pub fn validate_pool(pool: &ItemPool) -> Vec<PoolWarning> {
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();

    if pool.items.is_empty() {
        warnings.push(PoolWarning {
            item_id: None,
            message: "pool has no items".into(),
        });
    }

    for item in &pool.items {
        if !seen_ids.insert(item.id.as_str()) {
            warnings.push(PoolWarning {
                item_id: Some(item.id.clone()),
                message: "duplicate item id".into(),
            });
        }
        if item.text.trim().is_empty() {
            warnings.push(PoolWarning {
                item_id: Some(item.id.clone()),
                message: "empty question text".into(),
            });
        }
        if item.params.a <= 0.0 && item.quality == QualityFlag::Normal {
            warnings.push(PoolWarning {
                item_id: Some(item.id.clone()),
                message: format!(
                    "non-positive discrimination a={:.2} on a normal-quality item",
                    item.params.a
                ),
            });
        }
        if !(0.0..1.0).contains(&item.params.c) {
            warnings.push(PoolWarning {
                item_id: Some(item.id.clone()),
                message: format!("guessing floor c={:.2} outside [0, 1)", item.params.c),
            });
        }
        if let Some(p) = item.p_value {
            if !(0.0..=1.0).contains(&p) {
                warnings.push(PoolWarning {
                    item_id: Some(item.id.clone()),
                    message: format!("p_value {p:.2} outside [0, 1]"),
                });
            }
        }
    }

    warnings
}

/// Apply the automatic quality rule: items with negative discrimination and
/// enough responses move to `UnderReview`. Returns how many were moved.
pub fn apply_auto_review(items: &mut [Item]) -> usize {
    let mut moved = 0;
    for item in items.iter_mut() {
        if item.needs_auto_review() {
            tracing::warn!(
                item_id = %item.id,
                a = item.params.a,
                responses = item.response_count,
                "negative discrimination, moving item to under_review"
            );
            item.quality = QualityFlag::UnderReview;
            moved += 1;
        }
    }
    moved
}
