use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::scrapers::throttle::RateLimiter;
use crate::scrapers::traits::GeometryApi;

pub const GEOPORTAL_SEARCH_URL: &str = "https://nspd.gov.ru/api/geoportal/v2/search/geoportal";

/// Client for the nspd.gov.ru geoportal search
pub struct NspdClient {
    client: Client,
    limiter: Arc<RateLimiter>,
}

impl NspdClient {
    pub fn new(limiter: Arc<RateLimiter>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"));
        headers.insert(REFERER, HeaderValue::from_static("https://nspd.gov.ru/"));

        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36")
            .default_headers(headers)
            // the geoportal certificate chains to a national root missing from common trust stores
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, limiter })
    }
}

#[async_trait]
impl GeometryApi for NspdClient {
    async fn search(&self, query: &str) -> Result<Value> {
        self.limiter.acquire().await;

        debug!("Geoportal search: {}", query);
        let response = self
            .client
            .get(GEOPORTAL_SEARCH_URL)
            .query(&[("query", query)])
            .send()
            .await
            .context("Failed to reach geoportal")?;

        // "not found" comes back as a JSON body without `data`, sometimes with a 4xx status
        response
            .json::<Value>()
            .await
            .context("Geoportal answer is not JSON")
    }

    fn source_name(&self) -> &'static str {
        "nspd.gov.ru"
    }
}
