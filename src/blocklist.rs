use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::error::RtbError;

/// A `(package_name, carrier)` pair the selection engine must exclude.
/// Supplemental feature carried forward from the original's
/// `blocklist.go`; spec.md's Non-goals don't mention it, so it's fair
/// game (SPEC_FULL.md §S.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BlockItem {
    package_name: String,
    carrier: String,
}

/// Atomically-swapped set of blocked `(package, carrier)` pairs, reloaded
/// from a flat JSON array of 2-element arrays the same way the rank table
/// is (§4.1 discipline: missing file is a warning, not fatal).
pub struct BlockList {
    items: ArcSwap<HashSet<BlockItem>>,
    path: String,
}

impl BlockList {
    pub fn load(path: &str) -> Self {
        let list = BlockList {
            items: ArcSwap::from_pointee(HashSet::new()),
            path: path.to_string(),
        };
        if let Err(e) = list.reload() {
            tracing::warn!("block list unavailable at startup, starting empty: {e}");
        }
        list
    }

    pub fn reload(&self) -> Result<usize, RtbError> {
        if self.path.is_empty() || !std::path::Path::new(&self.path).exists() {
            self.items.store(Arc::new(HashSet::new()));
            return Ok(0);
        }
        let start = Instant::now();
        let content = std::fs::read_to_string(&self.path)?;
        let rows: Vec<Vec<String>> = serde_json::from_str(&content)?;
        let mut set = HashSet::new();
        for row in rows {
            if row.len() >= 2 {
                set.insert(BlockItem {
                    package_name: row[0].clone(),
                    carrier: row[1].clone(),
                });
            }
        }
        let count = set.len();
        self.items.store(Arc::new(set));
        tracing::info!(
            "block list updated, {count} item(s) loaded, time spent {:?}",
            start.elapsed()
        );
        Ok(count)
    }

    pub fn is_blocked(&self, package_name: &str, carrier: &str) -> bool {
        self.items.load().contains(&BlockItem {
            package_name: package_name.to_string(),
            carrier: carrier.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_starts_empty_and_blocks_nothing() {
        let list = BlockList::load("/nonexistent/blocklist.json");
        assert!(!list.is_blocked("com.a", "12345"));
    }

    #[test]
    fn loaded_pairs_are_blocked_others_are_not() {
        let mut path = std::env::temp_dir();
        path.push(format!("rtb_lite_blocklist_test_{}.json", std::process::id()));
        std::fs::write(&path, r#"[["com.a","12345"]]"#).unwrap();
        let list = BlockList::load(path.to_str().unwrap());
        assert!(list.is_blocked("com.a", "12345"));
        assert!(!list.is_blocked("com.a", "99999"));
        assert!(!list.is_blocked("com.b", "12345"));
        let _ = std::fs::remove_file(&path);
    }
}
