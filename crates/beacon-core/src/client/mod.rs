//! HTTP client for the session/tracking API.
//!
//! # Usage
//!
//! ```rust,no_run
//! use beacon_core::client::ApiClient;
//! use beacon_core::config::ApiConfig;
//! use beacon_core::api::SessionApi;
//!
//! #[tokio::main]
//! async fn main() -> beacon_core::Result<()> {
//!     let client = ApiClient::new(&ApiConfig::default())?;
//!     let session_id = client.create_session(Some("Wa11et1")).await?;
//!     client.end_session(&session_id).await?;
//!     Ok(())
//! }
//! ```

use crate::api::{EventSink, SessionApi};
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::*;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// API client for the session/tracking service
#[derive(Clone)]
pub struct ApiClient {
    /// Base URL for HTTP requests, without trailing slash
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a client for a base URL with default settings
    pub fn with_url(url: impl Into<String>) -> Result<Self> {
        Self::new(&ApiConfig {
            url: url.into(),
            ..ApiConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the server is available
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("/health").await
    }

    /// Events recorded by the development server
    pub async fn recorded_events(&self) -> Result<Vec<TrackingEvent>> {
        self.get("/events").await
    }

    /// Sessions recorded by the development server
    pub async fn recorded_sessions(&self) -> Result<Vec<SessionRecord>> {
        self.get("/sessions").await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(reqwest::Method::GET, path, Option::<()>::None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.request(reqwest::Method::POST, path, Some(body)).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.request(reqwest::Method::PATCH, path, Some(body)).await
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("API request: {} {}", method, url);

        let mut req = self.client.request(method, &url);
        if let Some(ref b) = body {
            req = req.json(b);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if status.is_success() {
            let data: T = resp
                .json()
                .await
                .map_err(|e| Error::Serialization(format!("Failed to parse response: {}", e)))?;
            Ok(data)
        } else {
            let error_text = resp.text().await.unwrap_or_default();
            Err(Error::api(status.as_u16(), error_text))
        }
    }
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn create_session(&self, wallet_address: Option<&str>) -> Result<String> {
        let req = CreateSessionRequest {
            wallet_address: wallet_address.map(String::from),
        };
        let resp: CreateSessionResponse = self.post("/session", &req).await?;
        Ok(resp.session_id)
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        let req = EndSessionRequest {
            session_id: session_id.to_string(),
        };
        let resp: SuccessResponse = self.patch("/session", &req).await?;
        if resp.success {
            Ok(())
        } else {
            Err(Error::Other(format!("Server refused to end session {}", session_id)))
        }
    }
}

#[async_trait]
impl EventSink for ApiClient {
    async fn send_event(&self, event: &TrackingEvent) -> Result<()> {
        let resp: SuccessResponse = self.post("/track", event).await?;
        if resp.success {
            Ok(())
        } else {
            Err(Error::Other(format!("Server rejected {} event", event.kind)))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
