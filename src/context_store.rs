use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use redis::AsyncCommands;

use crate::error::RtbError;
use crate::models::request::ParsedRequest;

/// Which stage is extending the context's TTL (§4.6).
#[derive(Debug, Clone, Copy)]
pub enum CallbackStage {
    Impression,
    Click,
    Conversion,
}

/// Serializes, compresses, and persists the request context so later
/// callbacks can resolve a tracker token back to the creatives chosen at
/// serve time (§4.6).
#[derive(Clone)]
pub struct ContextStore {
    pool: redis::aio::ConnectionManager,
    prefix: String,
    impression_timeout: i64,
    click_timeout: i64,
    conversion_timeout: i64,
}

impl ContextStore {
    pub async fn connect(
        address: &str,
        prefix: &str,
        impression_timeout: i64,
        click_timeout: i64,
        conversion_timeout: i64,
    ) -> Result<Self, RtbError> {
        let client = redis::Client::open(format!("redis://{address}"))?;
        let pool = client.get_connection_manager().await?;
        Ok(ContextStore {
            pool,
            prefix: prefix.to_string(),
            impression_timeout,
            click_timeout,
            conversion_timeout,
        })
    }

    fn key(&self, request_id: &str) -> String {
        format!("{}{}", self.prefix, request_id)
    }

    /// Serializes the request as JSON, compresses it at the fastest
    /// deflate level, and stores it with the given TTL (§4.6).
    pub async fn save(&self, request: &ParsedRequest, ttl_secs: i64) -> Result<(), RtbError> {
        let body = compress(&serde_json::to_vec(request)?)?;
        let mut conn = self.pool.clone();
        let _: () = conn
            .set_ex(self.key(&request.id), body, ttl_secs.max(1) as u64)
            .await
            .map_err(|e| {
                tracing::warn!("redis error on context save: {e}");
                RtbError::Kv(e)
            })?;
        Ok(())
    }

    /// Loads and decompresses a context by request id. A 1-second
    /// background sleep should precede this call on the callback path to
    /// tolerate the save/lookup race (§4.6, §5) — callers arrange that,
    /// not this method, so unit tests can call it directly.
    pub async fn load(&self, request_id: &str) -> Result<ParsedRequest, RtbError> {
        let mut conn = self.pool.clone();
        let raw: Vec<u8> = conn.get(self.key(request_id)).await.map_err(|e| {
            tracing::warn!("redis error on context load: {e}");
            RtbError::Kv(e)
        })?;
        let decompressed = decompress(&raw)?;
        Ok(serde_json::from_slice(&decompressed)?)
    }

    /// Extends the context's TTL on a stage transition (§4.6).
    pub async fn extend(&self, request_id: &str, stage: CallbackStage) -> Result<(), RtbError> {
        let ttl = match stage {
            CallbackStage::Impression => self.impression_timeout,
            CallbackStage::Click => self.click_timeout,
            CallbackStage::Conversion => self.conversion_timeout,
        };
        let mut conn = self.pool.clone();
        let _: bool = conn
            .expire(self.key(request_id), ttl.max(1))
            .await
            .map_err(|e| {
                tracing::warn!("redis error on context expire: {e}");
                RtbError::Kv(e)
            })?;
        Ok(())
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>, RtbError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>, RtbError> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::request::SelectedCreative;

    #[test]
    fn compress_then_decompress_round_trips() {
        let request = ParsedRequest {
            id: "abc123".to_string(),
            cid: "user1".to_string(),
            creatives: vec![
                SelectedCreative { ad_id: 1, frequency: 0 },
                SelectedCreative { ad_id: 2, frequency: 3 },
            ],
            ..Default::default()
        };
        let body = compress(&serde_json::to_vec(&request).unwrap()).unwrap();
        let restored_bytes = decompress(&body).unwrap();
        let restored: ParsedRequest = serde_json::from_slice(&restored_bytes).unwrap();
        assert_eq!(restored.id, request.id);
        assert_eq!(restored.cid, request.cid);
        assert_eq!(restored.creatives.len(), 2);
        assert_eq!(restored.creatives[1].ad_id, 2);
        assert_eq!(restored.creatives[1].frequency, 3);
    }
}
