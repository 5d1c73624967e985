use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::scrapers::throttle::RateLimiter;
use crate::scrapers::traits::RegistryApi;
use crate::scrapers::types::RawResponse;

pub const SEARCH_URL: &str = "https://torgi.gov.ru/new/api/public/lotcards/search";
pub const DETAIL_URL: &str = "https://torgi.gov.ru/new/api/public/lotcards/";

/// HTTP client for the torgi.gov.ru public API
pub struct TorgiClient {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl TorgiClient {
    pub fn new(limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, limiter })
    }
}

#[async_trait]
impl RegistryApi for TorgiClient {
    async fn search_page(&self, query: &[(String, String)], page: u32) -> Result<RawResponse> {
        self.limiter.acquire().await;

        let response = self
            .client
            .get(SEARCH_URL)
            .query(query)
            .query(&[("page", page)])
            .send()
            .await
            .context("Failed to fetch registry search page")?;

        let status = response.status().as_u16();
        // error pages are served without a charset; the registry always writes UTF-8
        let bytes = response.bytes().await.context("Failed to read response body")?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        debug!("Search page {} -> {} ({} bytes)", page, status, body.len());
        Ok(RawResponse { status, body })
    }

    async fn lot_detail(&self, lot_id: &str) -> Result<Value> {
        self.limiter.acquire().await;

        let url = format!("{}{}", DETAIL_URL, lot_id);
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch lot {}", lot_id))?;

        if !response.status().is_success() {
            anyhow::bail!("Lot {} detail returned {}", lot_id, response.status());
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Lot {} detail is not JSON", lot_id))
    }

    fn source_name(&self) -> &'static str {
        "torgi.gov.ru"
    }
}
