use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::storage::SessionStorage;

/// How the `Authorization` header is chosen for a request
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Auth {
    /// Send the token held in session storage, if any
    #[default]
    Stored,
    /// Send no header at all
    None,
    /// Send this exact header value
    Raw(String),
}

/// One HTTP exchange, attached to the test that issued it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiCall {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub duration_ms: u64,
    #[serde(default)]
    pub response: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub body: Value,
    pub duration_ms: u64,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `message` field of the body, or an empty string
    pub fn message(&self) -> &str {
        self.body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.body.get(name).and_then(|v| v.as_str())
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).with_context(|| {
            format!(
                "Unexpected body for {} {} ({}): {}",
                self.method, self.url, self.status, self.body
            )
        })
    }
}

/// HTTP client for the service under test.
///
/// Clones share the session storage and the call log. Non-2xx statuses are returned as
/// ordinary responses; only transport failures are errors.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    storage: SessionStorage,
    calls: Arc<Mutex<Vec<ApiCall>>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage: SessionStorage::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn create<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, endpoint, &[], Some(&body), Auth::Stored)
            .await
    }

    pub async fn read(&self, endpoint: &str) -> Result<ApiResponse> {
        self.send(Method::GET, endpoint, &[], None, Auth::Stored)
            .await
    }

    pub async fn update<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, endpoint, &[], Some(&body), Auth::Stored)
            .await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, endpoint, &[], None, Auth::Stored)
            .await
    }

    pub async fn list(&self, endpoint: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        self.send(Method::GET, endpoint, query, None, Auth::Stored)
            .await
    }

    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        auth: Auth,
    ) -> Result<ApiResponse> {
        let url = self.url(endpoint);
        let mut req = self.client.request(method.clone(), &url);

        if !query.is_empty() {
            req = req.query(query);
        }

        let header = match auth {
            Auth::Stored => self.storage.token().await,
            Auth::None => None,
            Auth::Raw(value) => Some(value),
        };
        if let Some(value) = header {
            req = req.header(reqwest::header::AUTHORIZATION, value);
        }

        if let Some(body) = body {
            req = req.json(body);
        }

        let timestamp = Utc::now();
        let started = Instant::now();
        let res = req
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;
        let status = res.status().as_u16();
        let final_url = res.url().to_string();
        let text = res
            .text()
            .await
            .with_context(|| format!("Failed to read response body of {} {}", method, url))?;
        let duration_ms = started.elapsed().as_millis() as u64;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        log::debug!("{} {} -> {} ({}ms)", method, final_url, status, duration_ms);

        self.calls.lock().await.push(ApiCall {
            method: method.to_string(),
            url: final_url.clone(),
            status,
            duration_ms,
            response: body.clone(),
            timestamp,
        });

        Ok(ApiResponse {
            method: method.to_string(),
            url: final_url,
            status,
            body,
            duration_ms,
        })
    }

    /// Drain the call log
    pub async fn take_calls(&self) -> Vec<ApiCall> {
        std::mem::take(&mut *self.calls.lock().await)
    }
}
