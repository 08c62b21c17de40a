//! Client for the sync service's administrative REST endpoint.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{Error, Result};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Administrative control of a running sync service.
///
/// The supervisor only talks to the service through this trait, which keeps
/// the HTTP client replaceable in tests.
#[async_trait]
pub trait RemoteControl: Send + Sync {
    /// Ask the service to shut down.
    async fn shutdown(&self, api_key: &str) -> Result<()>;

    /// Ask the service to restart itself in place.
    async fn restart(&self, api_key: &str) -> Result<()>;
}

/// HTTP implementation of [`RemoteControl`].
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    endpoint: String,
}

impl RestClient {
    /// Create a client for `endpoint`, e.g. `http://127.0.0.1:8384/rest`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_system(&self, action: &str, api_key: &str) -> Result<()> {
        let url = format!("{}/system/{}", self.endpoint, action);
        debug!(url = %url, "Sending administrative request");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            // No HTTP answer at all: refused, reset or timed out.
            .map_err(|e| Error::RemoteUnreachable(format!("{}: {}", url, e)))?;

        let status = response.status();
        match status {
            s if s.is_success() => {
                info!("Sync service accepted {} request", action);
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(action, status = status.as_u16(), "Sync service rejected the API key");
                Err(Error::RemoteAuth { status: status.as_u16() })
            }
            _ => {
                warn!(action, status = status.as_u16(), "Administrative request failed");
                Err(Error::RemoteStatus { status: status.as_u16() })
            }
        }
    }
}

#[async_trait]
impl RemoteControl for RestClient {
    async fn shutdown(&self, api_key: &str) -> Result<()> {
        self.post_system("shutdown", api_key).await
    }

    async fn restart(&self, api_key: &str) -> Result<()> {
        self.post_system("restart", api_key).await
    }
}
