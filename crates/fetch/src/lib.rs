//! Fetch abstraction: one contract for retrieving URL bodies, whether the
//! bytes come over a direct HTTP connection or are relayed through the
//! browser-automation host (which carries the browser's cookies and
//! session).
//!
//! Which implementation to use is a construction-time decision made by
//! the caller's environment; the trait never probes or switches per call.

use async_trait::async_trait;
use browserlink_core::{Error, Result};
use browserlink_mcp::{Client, NetworkRequestOptions};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Fetches URL bodies from some source.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET the URL and return the raw body.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// GET the URL and decode the body as JSON.
    async fn get_json(&self, url: &str) -> Result<Value>;

    /// POST the URL with form data and return the raw body.
    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>>;
}

/// URL-encode form pairs into an `application/x-www-form-urlencoded` body.
fn encode_form(form: &[(String, String)]) -> String {
    form.iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// ─── Direct HTTP ─────────────────────────────────────────────────────────────

/// Fetcher over a conventional HTTP client.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// Wrap an already-configured client (proxies, custom cookies).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn check(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "GET {} returned status {}",
                url,
                resp.status().as_u16()
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "http GET");
        let resp = self.http.get(url).send().await?;
        let resp = Self::check(resp, url).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let body = self.get(url).await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::Decode(format!("GET {}: body is not JSON: {}", url, e)))
    }

    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>> {
        debug!(url, "http POST");
        let resp = self
            .http
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(encode_form(form))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Transport(format!(
                "POST {} returned status {}",
                url,
                resp.status().as_u16()
            )));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

// ─── Browser-relayed ─────────────────────────────────────────────────────────

/// Fetcher that relays through the automation host, so requests run with
/// the browser's cookies and session.
pub struct BrowserFetcher {
    client: Arc<Client>,
}

impl BrowserFetcher {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "browser GET");
        let html = self.client.get_web_content_html(url).await?;
        Ok(html.into_bytes())
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url, "browser GET json");
        let content = self.client.get_web_content(url).await?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Decode(format!("GET {}: body is not JSON: {}", url, e)))
    }

    async fn post(&self, url: &str, form: &[(String, String)]) -> Result<Vec<u8>> {
        debug!(url, "browser POST");
        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );

        let result = self
            .client
            .network_request(&NetworkRequestOptions {
                url: url.to_string(),
                method: Some("POST".to_string()),
                headers: Some(headers),
                body: Some(Value::String(encode_form(form))),
            })
            .await?;

        // The host puts the response body in the first content item, under
        // text or data depending on version. Nothing else to fall back to.
        if let Some(item) = result.content.first() {
            if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
                return Ok(text.as_bytes().to_vec());
            }
            if let Some(data) = item.get("data").and_then(|v| v.as_str()) {
                return Ok(data.as_bytes().to_vec());
            }
        }

        error!(url, "browser POST returned no usable content item");
        Err(Error::Decode(
            "failed to extract response from browser".to_string(),
        ))
    }
}
