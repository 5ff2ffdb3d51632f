use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level config loaded from an optional TOML file, with environment
/// overrides applied on top. Every field carries its own default, so a
/// missing file (or a missing field within it) still produces a fully
/// usable configuration — the Rust-idiomatic stand-in for the original's
/// reflection-over-tagged-struct-fields defaulting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtbConfig {
    #[serde(default = "default_http_address")]
    pub http_address: String,
    #[serde(default = "default_callback_address")]
    pub callback_address: String,
    #[serde(default = "default_click_address")]
    pub click_address: String,

    #[serde(default = "default_mysql_address")]
    pub mysql_address: String,
    #[serde(default = "default_mysql_user")]
    pub mysql_user: String,
    #[serde(default)]
    pub mysql_password: String,
    #[serde(default)]
    pub mysql_database: String,
    #[serde(default = "default_mysql_update_interval")]
    pub mysql_update_interval: u64,

    #[serde(default = "default_true")]
    pub kafka_enable: bool,
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,
    #[serde(default = "default_request_topic")]
    pub kafka_request_topic: String,
    #[serde(default = "default_impression_topic")]
    pub kafka_impression_topic: String,
    #[serde(default = "default_click_topic")]
    pub kafka_click_topic: String,
    #[serde(default = "default_conversion_topic")]
    pub kafka_conversion_topic: String,

    #[serde(default = "default_redis_address")]
    pub redis_frequency_address: String,
    #[serde(default = "default_frequency_prefix")]
    pub redis_frequency_prefix: String,
    #[serde(default = "default_frequency_cap")]
    pub redis_frequency_per_id: i64,

    #[serde(default = "default_redis_address")]
    pub redis_join_address: String,
    #[serde(default = "default_join_prefix")]
    pub redis_join_prefix: String,
    #[serde(default = "default_request_timeout")]
    pub redis_join_request_timeout: i64,
    #[serde(default = "default_impression_timeout")]
    pub redis_join_impression_timeout: i64,
    #[serde(default = "default_click_timeout")]
    pub redis_join_click_timeout: i64,
    #[serde(default = "default_conversion_timeout")]
    pub redis_join_conversion_timeout: i64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_dir: String,

    #[serde(default = "default_true")]
    pub profiler_enable: bool,
    #[serde(default = "default_profiler_interval")]
    pub profiler_interval: u64,

    #[serde(default)]
    pub traffic_random: i32,

    #[serde(default)]
    pub model_data_save_dir: String,

    #[serde(default = "default_rank_table_path")]
    pub rank_table_path: String,
    #[serde(default)]
    pub rank_by_adunit_table_path: String,

    #[serde(default = "default_geoip_path")]
    pub geoip_database_path: String,

    #[serde(default)]
    pub block_list_path: String,
}

fn default_true() -> bool {
    true
}
fn default_http_address() -> String {
    "0.0.0.0:8705".to_string()
}
fn default_callback_address() -> String {
    "localhost:8705".to_string()
}
fn default_click_address() -> String {
    "localhost:8705".to_string()
}
fn default_mysql_address() -> String {
    "localhost:3306".to_string()
}
fn default_mysql_user() -> String {
    "root".to_string()
}
fn default_mysql_update_interval() -> u64 {
    30
}
fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}
fn default_request_topic() -> String {
    "request".to_string()
}
fn default_impression_topic() -> String {
    "impression".to_string()
}
fn default_click_topic() -> String {
    "click".to_string()
}
fn default_conversion_topic() -> String {
    "td_postback".to_string()
}
fn default_redis_address() -> String {
    "localhost:6379".to_string()
}
fn default_frequency_prefix() -> String {
    "fr:".to_string()
}
fn default_frequency_cap() -> i64 {
    100
}
fn default_join_prefix() -> String {
    "param:".to_string()
}
fn default_request_timeout() -> i64 {
    120
}
fn default_impression_timeout() -> i64 {
    86400
}
fn default_click_timeout() -> i64 {
    86400 * 7
}
fn default_conversion_timeout() -> i64 {
    86400 * 30
}
fn default_log_level() -> String {
    "debug".to_string()
}
fn default_profiler_interval() -> u64 {
    10
}
fn default_rank_table_path() -> String {
    "rank.json".to_string()
}
fn default_geoip_path() -> String {
    "/usr/share/GeoIP/GeoLite2-City.mmdb".to_string()
}

impl Default for RtbConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty TOML document deserializes to all-default config")
    }
}

impl RtbConfig {
    /// Load config from a TOML file, falling back to defaults when absent,
    /// then layer environment-variable overrides (`RTB_<FIELD_UPPER>`) on
    /// top — e.g. `RTB_HTTP_ADDRESS`, `RTB_MYSQL_PASSWORD`.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: RtbConfig = toml::from_str(&contents)?;
            tracing::info!("loaded config from {}", path.display());
            config
        } else {
            tracing::info!("config file not found at {}, using defaults", path.display());
            RtbConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        macro_rules! env_override {
            ($field:ident, $env:literal) => {
                if let Ok(value) = std::env::var($env) {
                    self.$field = value;
                }
            };
        }
        macro_rules! env_override_parsed {
            ($field:ident, $env:literal) => {
                if let Ok(value) = std::env::var($env) {
                    if let Ok(parsed) = value.parse() {
                        self.$field = parsed;
                    }
                }
            };
        }
        env_override!(http_address, "RTB_HTTP_ADDRESS");
        env_override!(callback_address, "RTB_CALLBACK_ADDRESS");
        env_override!(click_address, "RTB_CLICK_ADDRESS");
        env_override!(mysql_address, "RTB_MYSQL_ADDRESS");
        env_override!(mysql_user, "RTB_MYSQL_USER");
        env_override!(mysql_password, "RTB_MYSQL_PASSWORD");
        env_override!(mysql_database, "RTB_MYSQL_DATABASE");
        env_override_parsed!(mysql_update_interval, "RTB_MYSQL_UPDATE_INTERVAL");
        env_override_parsed!(kafka_enable, "RTB_KAFKA_ENABLE");
        env_override!(kafka_brokers, "RTB_KAFKA_BROKERS");
        env_override!(redis_frequency_address, "RTB_REDIS_FREQUENCY_ADDRESS");
        env_override!(redis_join_address, "RTB_REDIS_JOIN_ADDRESS");
        env_override_parsed!(redis_frequency_per_id, "RTB_FREQUENCY_CAP");
        env_override!(log_level, "RTB_LOG_LEVEL");
        env_override!(log_dir, "RTB_LOG_DIR");
        env_override_parsed!(profiler_enable, "RTB_PROFILER_ENABLE");
        env_override_parsed!(traffic_random, "RTB_TRAFFIC_RANDOM");
        env_override!(model_data_save_dir, "RTB_MODEL_DATA_SAVE_DIR");
        env_override!(rank_table_path, "RTB_RANK_TABLE_PATH");
        env_override!(rank_by_adunit_table_path, "RTB_RANK_BY_ADUNIT_TABLE_PATH");
        env_override!(geoip_database_path, "RTB_GEOIP_DATABASE_PATH");
        env_override!(block_list_path, "RTB_BLOCK_LIST_PATH");
    }

    /// Mirrors the original's `Configure.String()` — pretty-printed, used by
    /// `--print-example-config` and logged once at startup.
    pub fn to_pretty_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_a_file() {
        let config = RtbConfig::default();
        assert_eq!(config.http_address, "0.0.0.0:8705");
        assert_eq!(config.redis_frequency_prefix, "fr:");
        assert_eq!(config.redis_join_prefix, "param:");
        assert!(config.kafka_enable);
    }

    #[test]
    fn load_falls_back_to_defaults_for_missing_file() {
        let config = RtbConfig::load("/nonexistent/path/rtblite.toml").unwrap();
        assert_eq!(config.mysql_address, "localhost:3306");
    }

    #[test]
    fn partial_toml_fills_remaining_fields_with_defaults() {
        let config: RtbConfig = toml::from_str("traffic_random = 25\n").unwrap();
        assert_eq!(config.traffic_random, 25);
        assert_eq!(config.http_address, "0.0.0.0:8705");
    }
}
