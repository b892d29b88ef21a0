//! HTTP client shared by the source collectors
//!
//! Thin wrapper over a single `reqwest::Client` (cookie store, gzip, timeout).
//! There is no retry: the first transport or status failure aborts the run.

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, ClientBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    context_label: String,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn from_config(config: &HttpConfig) -> ScrapeResult<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .build()
            .map_err(|e| ScrapeError::ClientBuild { message: e.to_string() })?;

        Ok(Self {
            client,
            context_label: String::new(),
        })
    }

    /// Human-readable label for log provenance (returns self for chaining)
    pub fn with_context_label(mut self, label: &str) -> Self {
        self.context_label = label.to_string();
        self
    }

    /// GET a page and return its body
    pub async fn get_text(&self, url: &str) -> ScrapeResult<String> {
        debug!("[{}] GET {}", self.context_label, url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, &e))?;

        Self::read_body(url, response).await
    }

    /// POST `application/x-www-form-urlencoded` fields; repeated keys are sent in order
    pub async fn post_form(&self, url: &str, fields: &[(String, String)]) -> ScrapeResult<String> {
        debug!("[{}] POST {} ({} form fields)", self.context_label, url, fields.len());
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, &e))?;

        Self::read_body(url, response).await
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, T>(&self, url: &str, headers: HeaderMap, body: &B) -> ScrapeResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("[{}] POST {} (json)", self.context_label, url);
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, &e))?;

        let text = Self::read_body(url, response).await?;
        serde_json::from_str(&text).map_err(|e| ScrapeError::json(url, &e))
    }

    /// POST without a body, expecting a JSON response
    pub async fn post_empty_json<T: DeserializeOwned>(&self, url: &str) -> ScrapeResult<T> {
        debug!("[{}] POST {} (empty)", self.context_label, url);
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .send()
            .await
            .map_err(|e| ScrapeError::network(url, &e))?;

        let text = Self::read_body(url, response).await?;
        serde_json::from_str(&text).map_err(|e| ScrapeError::json(url, &e))
    }

    async fn read_body(url: &str, response: Response) -> ScrapeResult<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.text().await.map_err(|e| ScrapeError::network(url, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_from_default_config() {
        let client = HttpClient::from_config(&HttpConfig::default())
            .unwrap()
            .with_context_label("롯데마트");
        assert_eq!(client.context_label, "롯데마트");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_error() {
        let config = HttpConfig {
            timeout_seconds: 2,
            ..HttpConfig::default()
        };
        let client = HttpClient::from_config(&config).unwrap();
        let err = client.get_text("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Network { .. }));
    }
}
