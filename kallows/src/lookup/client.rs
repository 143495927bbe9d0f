//! Mouser part-number search client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::lookup::{FailureKind, LookupError, LookupOutcome, PartSearch};

pub const DEFAULT_ENDPOINT: &str = "https://api.mouser.com/api/v1/search/partnumber";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the Mouser part-number search endpoint.
pub struct MouserClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl MouserClient {
    /// Create a client; the key must come from the caller's configuration.
    pub fn new(api_key: impl Into<String>, endpoint: Option<&str>) -> Result<Self, LookupError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LookupError::MissingApiKey);
        }
        let raw = endpoint.unwrap_or(DEFAULT_ENDPOINT);
        let endpoint = Url::parse(raw).map_err(|e| LookupError::InvalidEndpoint {
            endpoint: raw.to_string(),
            message: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(LookupError::InvalidEndpoint {
                endpoint: raw.to_string(),
                message: "not an http(s) URL".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Request URL for one part number; the number is percent-encoded.
    pub fn request_url(&self, mpn: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("searchBy", "partnumber")
            .append_pair("partnumber", mpn);
        url
    }
}

#[async_trait]
impl PartSearch for MouserClient {
    async fn search(&self, mpn: &str) -> LookupOutcome {
        let failed = |kind: FailureKind, detail: String| LookupOutcome::Failed {
            mpn: mpn.to_string(),
            kind,
            detail,
        };

        let url = self.request_url(mpn);
        tracing::debug!("GET {}", url);
        let response = match self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return failed(FailureKind::Transport, e.to_string()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("").to_string();
            return failed(FailureKind::Status(status.as_u16()), reason);
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return failed(FailureKind::Transport, e.to_string()),
        };
        match serde_json::from_str(&text) {
            Ok(body) => LookupOutcome::Found {
                mpn: mpn.to_string(),
                body,
            },
            Err(e) => failed(FailureKind::Parse, format!("invalid JSON: {}", e)),
        }
    }
}
