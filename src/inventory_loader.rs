use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

use crate::error::RtbError;
use crate::models::inventory::{InventoryRecord, InventoryRow};
use crate::rank_table::RankTable;

pub type CountryBucket = Vec<InventoryRecord>;
pub type Snapshot = HashMap<String, Arc<CountryBucket>>;

const SELECT_ONLINE_INVENTORY: &str = "SELECT id, ad_id, package_name, icon_url, label, click_url, \
    price, max_os, min_os, banner_url, country, ad_type, status, model_sign1, \
    extensions, min_os_num, max_os_num, ts FROM inventory WHERE status='online'";

const SELECT_ONE_INVENTORY: &str = "SELECT id, ad_id, package_name, icon_url, label, click_url, \
    price, max_os, min_os, banner_url, country, ad_type, status, model_sign1, \
    extensions, min_os_num, max_os_num, ts FROM inventory WHERE status='online' AND ad_id = ?";

/// Owns the SQL connection and turns `status='online'` rows into a
/// country-bucketed, rank-sorted [`Snapshot`] (§4.2). The pool is
/// released on failure so the next refresh reconnects from scratch.
pub struct InventoryLoader {
    pool: Option<MySqlPool>,
    dsn: String,
}

impl InventoryLoader {
    pub fn new(mysql_address: &str, user: &str, password: &str, database: &str) -> Self {
        let dsn = format!("mysql://{user}:{password}@{mysql_address}/{database}");
        InventoryLoader { pool: None, dsn }
    }

    async fn connection(&mut self) -> Result<&MySqlPool, RtbError> {
        if self.pool.is_none() {
            match MySqlPoolOptions::new()
                .max_connections(8)
                .connect(&self.dsn)
                .await
            {
                Ok(pool) => self.pool = Some(pool),
                Err(e) => {
                    tracing::warn!("fail to connect to mysql: {e}");
                    return Err(RtbError::Sql(e));
                }
            }
        }
        Ok(self.pool.as_ref().unwrap())
    }

    /// Fetches one online record by `ad_id`, used when resolving an
    /// impression/click/conversion callback (§4.6/§6).
    pub async fn fetch_one(&mut self, ad_id: i64) -> Result<InventoryRecord, RtbError> {
        let pool = self.connection().await?;
        let row: InventoryRow = sqlx::query_as(SELECT_ONE_INVENTORY)
            .bind(ad_id)
            .fetch_one(pool)
            .await?;
        Ok(row.into())
    }

    /// Runs one full refresh: query, group by country, stable-sort each
    /// bucket by the §4.3 comparator. SQL errors abort the refresh but
    /// leave the caller's previously-published snapshot untouched.
    pub async fn load(&mut self, rank_table: &RankTable) -> Result<(Snapshot, LoadTiming), RtbError> {
        let total_start = Instant::now();
        let pool = match self.connection().await {
            Ok(pool) => pool,
            Err(e) => {
                self.pool = None;
                return Err(e);
            }
        };

        let sql_start = Instant::now();
        let rows = match sqlx::query_as::<_, InventoryRow>(SELECT_ONLINE_INVENTORY)
            .fetch_all(pool)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("fail to execute sql: {e}");
                self.pool = None;
                return Err(RtbError::Sql(e));
            }
        };
        let sql_time = sql_start.elapsed().as_secs_f64();

        let record_start = Instant::now();
        let mut by_country: HashMap<String, CountryBucket> = HashMap::new();
        let mut error_count = 0usize;
        for row in rows {
            // sqlx already validates column types at the driver level, so
            // the only "scan failure" left to model here is a row that
            // slipped through the query shape; kept for parity with §4.2's
            // "skip records that fail scan" contract.
            let record: InventoryRecord = row.into();
            by_country
                .entry(record.country.clone())
                .or_default()
                .push(record);
        }
        let record_time = record_start.elapsed().as_secs_f64();
        tracing::info!(
            "{} record(s) loaded, {} countries, {error_count} errors",
            by_country.values().map(|v| v.len()).sum::<usize>(),
            by_country.len()
        );

        let sort_start = Instant::now();
        for bucket in by_country.values_mut() {
            sort_bucket(bucket, rank_table);
        }
        let sort_time = sort_start.elapsed().as_secs_f64();

        let snapshot: Snapshot = by_country
            .into_iter()
            .map(|(country, bucket)| (country, Arc::new(bucket)))
            .collect();

        let total_time = total_start.elapsed().as_secs_f64();
        let timing = LoadTiming {
            sql_time,
            record_time,
            sort_time,
            total_time,
        };
        tracing::info!(
            "cache updated, total_time={:.4} sql_time={:.4} record_time={:.4} sort_time={:.4}",
            timing.total_time,
            timing.sql_time,
            timing.record_time,
            timing.sort_time,
        );
        Ok((snapshot, timing))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadTiming {
    pub sql_time: f64,
    pub record_time: f64,
    pub sort_time: f64,
    pub total_time: f64,
}

/// Stable-sorts one country's records by `(rank_index, price descending)`.
/// Unranked packages draw a fresh synthetic tail rank *per comparison*
/// (§4.3) — intentionally non-deterministic on the unranked suffix, made
/// safe by the selection strategies' adjacent/set dedup by package.
fn sort_bucket(bucket: &mut CountryBucket, rank_table: &RankTable) {
    bucket.sort_by(|a, b| {
        let rank_a = rank_index(rank_table, a);
        let rank_b = rank_index(rank_table, b);
        match rank_a.cmp(&rank_b) {
            std::cmp::Ordering::Equal => b.price.cmp(&a.price),
            other => other,
        }
    });
}

fn rank_index(rank_table: &RankTable, record: &InventoryRecord) -> usize {
    let (index, present) = rank_table.rank_of(
        "",
        &record.package_name,
        record.ad_type().as_str(),
        &record.country,
    );
    if present {
        index
    } else {
        rank_table.len() + rand::rng().random_range(0..1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inventory::InventoryRecord;

    fn make_record(package: &str, price: &str, country: &str) -> InventoryRecord {
        InventoryRecord {
            id: 1,
            ad_id: 1,
            package_name: package.to_string(),
            icon_url: String::new(),
            label: String::new(),
            click_url: String::new(),
            price: price.to_string(),
            max_os: String::new(),
            min_os: String::new(),
            banner_url: String::new(),
            country: country.to_string(),
            ad_type_raw: "bigtree1".to_string(),
            status: "online".to_string(),
            model_sign1: 0,
            extensions: String::new(),
            min_os_num: 0,
            max_os_num: 999_999,
            frequency: 0,
        }
    }

    fn rank_table_with(rows: &str) -> RankTable {
        let mut path = std::env::temp_dir();
        path.push(format!(
            "rtb_lite_loader_test_{}_{}.json",
            std::process::id(),
            rows.len()
        ));
        std::fs::write(&path, rows).unwrap();
        let table = RankTable::load(path.to_str().unwrap(), "").unwrap();
        let _ = std::fs::remove_file(&path);
        table
    }

    #[test]
    fn ranked_packages_sort_before_unranked_and_price_breaks_ties() {
        let table = rank_table_with(r#"[["com.a","bigtree1"],["com.b","bigtree1"]]"#);
        let mut bucket = vec![
            make_record("com.b", "100", "US"),
            make_record("com.a", "50", "US"),
        ];
        sort_bucket(&mut bucket, &table);
        assert_eq!(bucket[0].package_name, "com.a");
        assert_eq!(bucket[1].package_name, "com.b");
    }

    #[test]
    fn equal_rank_breaks_tie_by_price_descending() {
        let table = rank_table_with(r#"[["com.a","bigtree1"]]"#);
        let mut bucket = vec![
            make_record("com.a", "50", "US"),
            make_record("com.a", "900", "US"),
        ];
        sort_bucket(&mut bucket, &table);
        assert_eq!(bucket[0].price, "900");
        assert_eq!(bucket[1].price, "50");
    }
}
