/// Converges §7's error taxonomy into one closed enum for internal
/// library code. HTTP handlers still swallow these after logging — per
/// §7 "handlers never crash the process" — but naming the variants keeps
/// the taxonomy testable instead of an open-ended `anyhow::Error` bag.
#[derive(Debug, thiserror::Error)]
pub enum RtbError {
    #[error("config/bootstrap: {0}")]
    Config(String),

    #[error("sql: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("kv: {0}")]
    Kv(#[from] redis::RedisError),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("request context not found for id {0}")]
    ContextNotFound(String),

    #[error("malformed tracker param: {0}")]
    MalformedParam(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
