use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::scrapers::types::RawResponse;

/// The tender registry: paginated search plus per-lot detail.
///
/// Kept behind a trait so the pipeline can run against canned payloads.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Fetch one search page. Non-success statuses are returned, not raised.
    async fn search_page(&self, query: &[(String, String)], page: u32) -> Result<RawResponse>;

    /// Fetch the detail document of one lot
    async fn lot_detail(&self, lot_id: &str) -> Result<Value>;

    fn source_name(&self) -> &'static str;
}

/// Cadastral geometry search by free text
#[async_trait]
pub trait GeometryApi: Send + Sync {
    async fn search(&self, query: &str) -> Result<Value>;

    fn source_name(&self) -> &'static str;
}
