use redis::AsyncCommands;

use crate::error::RtbError;
use crate::inventory_loader::CountryBucket;

/// Per-`(user, ad)` impression counters in the external KV store (§4.4,
/// §6 "KV out"). Keys are `"<prefix><cid>_<ad_id>"`.
#[derive(Clone)]
pub struct FrequencyClient {
    pool: redis::aio::ConnectionManager,
    prefix: String,
}

impl FrequencyClient {
    pub async fn connect(address: &str, prefix: &str) -> Result<Self, RtbError> {
        let client = redis::Client::open(format!("redis://{address}"))?;
        let pool = client.get_connection_manager().await?;
        Ok(FrequencyClient {
            pool,
            prefix: prefix.to_string(),
        })
    }

    fn key(&self, cid: &str, ad_id: i64) -> String {
        format!("{}{}_{}", self.prefix, cid, ad_id)
    }

    /// Fetches current counters for every candidate in one `MGET`. On a
    /// bus error, the caller logs and proceeds with zeroed counters
    /// (§4.4, §7).
    pub async fn mget_frequencies(&self, cid: &str, creatives: &CountryBucket) -> Vec<i64> {
        if creatives.is_empty() {
            return Vec::new();
        }
        let keys: Vec<String> = creatives.iter().map(|c| self.key(cid, c.ad_id)).collect();
        let mut conn = self.pool.clone();
        match conn.mget::<_, Vec<Option<i64>>>(&keys).await {
            Ok(values) => values.into_iter().map(|v| v.unwrap_or(0)).collect(),
            Err(e) => {
                tracing::warn!("redis error on frequency mget: {e}");
                vec![0; creatives.len()]
            }
        }
    }

    /// Increments the counter for one ad. §9 notes this uses the
    /// returned record's `model_sign1`, not `ad_id` — preserved as-is,
    /// intentional or not (open question pinned).
    pub async fn incr(&self, cid: &str, model_sign1: i64) -> Result<(), RtbError> {
        let mut conn = self.pool.clone();
        let key = self.key(cid, model_sign1);
        let _: i64 = conn.incr(key, 1).await.map_err(|e| {
            tracing::warn!("redis error on frequency incr: {e}");
            RtbError::Kv(e)
        })?;
        Ok(())
    }
}
