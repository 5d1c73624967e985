use thiserror::Error;

/// A subject or category name that is not present in the reference tables.
///
/// This is a configuration problem, not transient upstream noise, so lookups
/// that build request parameters fail fast with it.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("unknown {table} name: {name:?}")]
pub struct LookupError {
    pub table: &'static str,
    pub name: String,
}

/// Why one lot could not be enriched.
///
/// These never escape a single record: the orchestrator logs them and keeps
/// going with the field left absent.
#[derive(Debug, Error)]
pub enum LotError {
    #[error("no match in geometry service")]
    NotFound,

    #[error("no feature carries a readable address")]
    NoCanonicalFeature,

    #[error("unsupported geometry type {0:?}")]
    UnsupportedGeometry(String),

    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("unsupported coordinate reference system {0:?}")]
    UnsupportedCrs(String),

    #[error("projection failed: {0}")]
    Projection(String),

    #[error("unexpected payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("request failed: {0:#}")]
    Request(anyhow::Error),
}

pub type LotResult<T> = Result<T, LotError>;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("unrecognized timestamp {0:?}")]
pub struct TimestampError(pub String);
