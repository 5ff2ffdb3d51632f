use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde_json::Value;

use crate::error::RtbError;

/// `(package_name, ad_type, country)` → rank, with `country` of `""`
/// matching any country. Stored as a flat map keyed by the two forms we
/// actually look up (§3 "Rank entry", §4.1).
#[derive(Debug, Default)]
struct RankMap {
    exact: HashMap<(String, String, String), usize>,
    any_country: HashMap<(String, String), usize>,
}

impl RankMap {
    fn insert(&mut self, package: String, ad_type: String, country: String, index: usize) {
        if country.is_empty() {
            self.any_country.insert((package, ad_type), index);
        } else {
            self.exact.insert((package, ad_type, country), index);
        }
    }

    fn get(&self, package: &str, ad_type: &str, country: &str) -> Option<usize> {
        self.exact
            .get(&(package.to_string(), ad_type.to_string(), country.to_string()))
            .or_else(|| self.any_country.get(&(package.to_string(), ad_type.to_string())))
            .copied()
    }

    fn len(&self) -> usize {
        self.exact.len() + self.any_country.len()
    }
}

/// Immutable, atomically-swapped view of the current rank data: the
/// default table plus any per-ad-unit overrides. Readers hold an `Arc`
/// obtained from [`RankTable::current`] for the lifetime of one request,
/// same discipline as the inventory snapshot (§9 "Cyclic/shared
/// ownership").
#[derive(Debug, Default)]
struct RankData {
    default: RankMap,
    by_adunit: HashMap<String, RankMap>,
}

pub struct RankTable {
    data: ArcSwap<RankData>,
    default_path: String,
    by_adunit_path: String,
}

impl RankTable {
    /// Loads the default table; a missing default file is fatal (§4.1
    /// failure taxonomy), a missing per-ad-unit file is only a warning.
    pub fn load(default_path: &str, by_adunit_path: &str) -> Result<Self, RtbError> {
        let table = RankTable {
            data: ArcSwap::from_pointee(RankData::default()),
            default_path: default_path.to_string(),
            by_adunit_path: by_adunit_path.to_string(),
        };
        table.reload()?;
        Ok(table)
    }

    /// Re-reads both files from disk and atomically replaces the table.
    /// In-flight readers keep seeing the previous snapshot (§4.1).
    pub fn reload(&self) -> Result<usize, RtbError> {
        let default = parse_default_table(&self.default_path)?;
        let by_adunit = match parse_by_adunit_table(&self.by_adunit_path) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!("rank_by_adunit_table_path unusable, treating as empty: {err}");
                HashMap::new()
            }
        };
        let count = default.len();
        self.data.store(Arc::new(RankData { default, by_adunit }));
        Ok(count)
    }

    /// `(index, present)` for a candidate, checking the per-ad-unit
    /// override table (if one exists for `adunit_id`) before falling back
    /// to the default table.
    pub fn rank_of(
        &self,
        adunit_id: &str,
        package_name: &str,
        ad_type: &str,
        country: &str,
    ) -> (usize, bool) {
        let data = self.data.load();
        if let Some(overrides) = data.by_adunit.get(adunit_id) {
            if let Some(index) = overrides.get(package_name, ad_type, country) {
                return (index, true);
            }
        }
        match data.default.get(package_name, ad_type, country) {
            Some(index) => (index, true),
            None => (data.default.len(), false),
        }
    }

    pub fn len(&self) -> usize {
        self.data.load().default.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The current default table as a JSON map, for the `/rank` endpoint.
    pub fn default_as_json(&self) -> serde_json::Value {
        let data = self.data.load();
        let mut entries: Vec<(String, usize)> = data
            .default
            .any_country
            .iter()
            .map(|((package, ad_type), index)| (format!("{package}:{ad_type}"), *index))
            .chain(
                data.default
                    .exact
                    .iter()
                    .map(|((package, ad_type, country), index)| {
                        (format!("{package}:{ad_type}:{country}"), *index)
                    }),
            )
            .collect();
        entries.sort_by_key(|(_, index)| *index);
        let map: serde_json::Map<String, Value> = entries
            .into_iter()
            .map(|(key, index)| (key, Value::from(index)))
            .collect();
        Value::Object(map)
    }
}

/// Parses a flat JSON array of `[package, type]` or `[package, type,
/// country]` tuples. Entries with the wrong arity are logged and skipped
/// (§4.1).
fn parse_default_table(path: &str) -> Result<RankMap, RtbError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RtbError::Config(format!("missing rank table {path}: {e}")))?;
    let rows: Vec<Vec<String>> = serde_json::from_str(&content)
        .map_err(|e| RtbError::Config(format!("malformed rank table {path}: {e}")))?;

    let mut map = RankMap::default();
    for (index, row) in rows.iter().enumerate() {
        match row.len() {
            2 => map.insert(row[0].clone(), row[1].clone(), String::new(), index),
            3 => map.insert(row[0].clone(), row[1].clone(), row[2].clone(), index),
            other => {
                tracing::warn!("skipping rank row with arity {other}: {row:?}");
            }
        }
    }
    Ok(map)
}

/// Parses `{adunit_id: [[package, type], ...]}`. A missing file is treated
/// as an empty table, not an error (§4.1).
fn parse_by_adunit_table(path: &str) -> Result<HashMap<String, RankMap>, RtbError> {
    if path.is_empty() || !Path::new(path).exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| RtbError::Config(format!("unreadable per-adunit rank table {path}: {e}")))?;
    let raw: HashMap<String, Vec<Vec<String>>> = serde_json::from_str(&content)
        .map_err(|e| RtbError::Config(format!("malformed per-adunit rank table {path}: {e}")))?;

    let mut result = HashMap::new();
    for (adunit_id, rows) in raw {
        let mut map = RankMap::default();
        for (index, row) in rows.iter().enumerate() {
            match row.len() {
                2 => map.insert(row[0].clone(), row[1].clone(), String::new(), index),
                3 => map.insert(row[0].clone(), row[1].clone(), row[2].clone(), index),
                other => {
                    tracing::warn!(
                        "skipping per-adunit rank row ({adunit_id}) with arity {other}: {row:?}"
                    );
                }
            }
        }
        result.insert(adunit_id, map);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> tempfile_path::TempFile {
        tempfile_path::TempFile::new(contents)
    }

    // Minimal scratch-file helper so this module doesn't need a dev-dependency
    // just for two tests.
    mod tempfile_path {
        use std::fs::File;
        use std::io::Write;
        use std::path::PathBuf;

        pub struct TempFile {
            pub path: PathBuf,
        }

        impl TempFile {
            pub fn new(contents: &str) -> Self {
                use std::sync::atomic::{AtomicU64, Ordering};
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                let unique = COUNTER.fetch_add(1, Ordering::Relaxed);
                let mut path = std::env::temp_dir();
                path.push(format!(
                    "rtb_lite_rank_test_{}_{unique}.json",
                    std::process::id()
                ));
                let mut file = File::create(&path).unwrap();
                file.write_all(contents.as_bytes()).unwrap();
                TempFile { path }
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    #[test]
    fn missing_default_file_is_an_error() {
        let result = RankTable::load("/nonexistent/rank.json", "");
        assert!(result.is_err());
    }

    #[test]
    fn two_and_three_element_rows_both_parse() {
        let file = write_temp(r#"[["com.a","bigtree1"],["com.b","bigtree1","US"]]"#);
        let table = RankTable::load(file.path.to_str().unwrap(), "").unwrap();
        assert_eq!(table.len(), 2);
        let (idx_a, present_a) = table.rank_of("1", "com.a", "bigtree1", "FR");
        assert!(present_a);
        assert_eq!(idx_a, 0);
        let (idx_b, present_b) = table.rank_of("1", "com.b", "bigtree1", "US");
        assert!(present_b);
        assert_eq!(idx_b, 1);
        let (_, present_b_wrong_country) = table.rank_of("1", "com.b", "bigtree1", "FR");
        assert!(!present_b_wrong_country);
    }

    #[test]
    fn malformed_arity_rows_are_skipped_not_fatal() {
        let file = write_temp(r#"[["com.a"],["com.b","bigtree1"]]"#);
        let table = RankTable::load(file.path.to_str().unwrap(), "").unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unknown_package_reports_absent_at_table_len() {
        let file = write_temp(r#"[["com.a","bigtree1"]]"#);
        let table = RankTable::load(file.path.to_str().unwrap(), "").unwrap();
        let (index, present) = table.rank_of("1", "com.unknown", "bigtree1", "US");
        assert!(!present);
        assert_eq!(index, 1);
    }
}
