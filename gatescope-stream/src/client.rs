// Copyright 2025 Gatescope (https://github.com/gatescope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP client for the gateway's debug endpoints.

use std::time::Duration;

use reqwest::header;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use gatescope_core::DebugEntry;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid backend endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Connection settings for one gateway backend.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    pub base_url: String,
    /// Path of the live event stream, joined onto `base_url`.
    pub stream_path: String,
    /// Path of the one-shot entries snapshot.
    pub entries_path: String,
    /// Key sent as `X-API-Key` when no caller credential is forwarded.
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    /// Total timeout for snapshot requests. The stream request is exempt,
    /// it is expected to stay open indefinitely.
    pub request_timeout: Duration,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:4444".to_string(),
            stream_path: "/api/logs".to_string(),
            entries_path: "/debug/entries".to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Cheap-to-clone client wrapping a shared connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    stream_url: Url,
    entries_url: Url,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(options: BackendOptions) -> Result<Self, StreamError> {
        let http = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            stream_url: join_endpoint(&options.base_url, &options.stream_path)?,
            entries_url: join_endpoint(&options.base_url, &options.entries_path)?,
            api_key: options.api_key,
            request_timeout: options.request_timeout,
        })
    }

    pub fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    pub fn entries_url(&self) -> &Url {
        &self.entries_url
    }

    /// Fetches the entries snapshot, resolving every failure to an empty
    /// list. Callers always receive a valid collection.
    ///
    /// `forwarded_auth` is an inbound `Authorization` value passed through
    /// verbatim; without one the configured API key is used, and with
    /// neither the request goes out unauthenticated.
    pub async fn fetch_entries(&self, forwarded_auth: Option<&str>) -> Vec<DebugEntry> {
        match self.try_fetch_entries(forwarded_auth).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%error, url = %self.entries_url, "entries snapshot failed, treating as empty");
                Vec::new()
            }
        }
    }

    async fn try_fetch_entries(
        &self,
        forwarded_auth: Option<&str>,
    ) -> Result<Vec<DebugEntry>, StreamError> {
        let response = self
            .request(self.entries_url.clone(), forwarded_auth)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status));
        }
        let body: Value = response.json().await?;
        let Some(items) = body.as_array() else {
            warn!(url = %self.entries_url, "entries snapshot is not a JSON array, treating as empty");
            return Ok(Vec::new());
        };
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<DebugEntry>(item.clone()) {
                Ok(entry) => entries.push(entry),
                Err(error) => debug!(%error, "skipping malformed snapshot entry"),
            }
        }
        Ok(entries)
    }

    /// Opens the live event stream, verifying the response status before
    /// handing the body to the caller.
    pub async fn open_stream(&self) -> Result<reqwest::Response, StreamError> {
        let response = self
            .request(self.stream_url.clone(), None)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Status(status));
        }
        Ok(response)
    }

    fn request(&self, url: Url, forwarded_auth: Option<&str>) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url);
        if let Some(auth) = forwarded_auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        } else if let Some(key) = &self.api_key {
            builder = builder.header("X-API-Key", key);
        }
        builder
    }
}

/// Joins a configured path onto the base URL by string concatenation, so a
/// base with its own path prefix keeps that prefix.
fn join_endpoint(base_url: &str, path: &str) -> Result<Url, StreamError> {
    let joined = format!("{}{}", base_url.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|error| StreamError::InvalidEndpoint {
        url: joined,
        reason: error.to_string(),
    })
}
