use serde::{Deserialize, Serialize};

use crate::utils::version_to_int;

/// One chosen creative slot, as persisted into the request context (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedCreative {
    pub ad_id: i64,
    pub frequency: i64,
}

/// Raw query-string parameters as received on `/request`, plus everything
/// derived from them. This is the object serialized into the request
/// context store and read back on every callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedRequest {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub placement_id: String,
    #[serde(default)]
    pub l: String,
    #[serde(default)]
    pub m: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub os_version: String,
    #[serde(default)]
    pub client_version: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub hp: String,
    #[serde(default)]
    pub p: String,
    #[serde(default)]
    pub c: String,

    #[serde(default)]
    pub adgroup: String,
    #[serde(default)]
    pub creatives: Vec<SelectedCreative>,

    pub id: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub os_version_num: i64,
}

/// Raw query-string keys understood on `/request`; parsed into
/// [`ParsedRequest`] by [`ParsedRequest::from_query`].
#[derive(Debug, Deserialize)]
pub struct RequestQuery {
    pub limit: Option<String>,
    pub placement_id: Option<String>,
    pub l: Option<String>,
    pub m: Option<String>,
    pub ip: Option<String>,
    pub cid: Option<String>,
    pub os_version: Option<String>,
    pub client_version: Option<String>,
    pub network: Option<String>,
    pub cc: Option<String>,
    pub hp: Option<String>,
    pub p: Option<String>,
    pub c: Option<String>,
}

const DEFAULT_LIMIT: i64 = 8;

impl ParsedRequest {
    /// Build a [`ParsedRequest`] from query params, a fresh request id, and
    /// a GeoIP-resolved country code. An unparseable `limit` defaults to 8
    /// (§7 "Request-shape" error taxonomy).
    pub fn from_query(query: RequestQuery, request_id: String, country_code: String) -> Self {
        let limit = query
            .limit
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_LIMIT);
        let os_version = query.os_version.unwrap_or_default();
        let os_version_num = version_to_int(&os_version);

        ParsedRequest {
            limit,
            placement_id: query.placement_id.unwrap_or_default(),
            l: query.l.unwrap_or_default(),
            m: query.m.unwrap_or_default(),
            ip: query.ip.unwrap_or_default(),
            cid: query.cid.unwrap_or_default(),
            os_version,
            client_version: query.client_version.unwrap_or_default(),
            network: query.network.unwrap_or_default(),
            cc: query.cc.unwrap_or_default(),
            hp: query.hp.unwrap_or_default(),
            p: query.p.unwrap_or_default(),
            c: query.c.unwrap_or_default(),
            adgroup: String::new(),
            creatives: Vec::new(),
            id: request_id,
            country_code,
            os_version_num,
        }
    }

    /// First comma-separated token of `m`, the carrier list — `-1` when
    /// absent, matching the event emitter's substitution rule (§4.7).
    pub fn carrier(&self) -> String {
        match self.m.split(',').next() {
            Some(first) if !first.is_empty() => first.to_string(),
            _ => "-1".to_string(),
        }
    }
}
