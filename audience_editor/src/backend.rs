//! src/backend.rs
use std::time::Duration;

use async_trait::async_trait;
use hyper::{
    body::Bytes, client::HttpConnector, header, Body, Client as HyperClient, Method, Request,
    StatusCode,
};
use hyper_rustls::HttpsConnector;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::model::{Client, ContactHistoryEntry, Group, GroupStats, RawClient};

mod memory;
pub use memory::InMemoryBackend;

// -----------------------------------------------------------------------------
// type aliases
type Https = HttpsConnector<HttpConnector>;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The entry already exists server-side (HTTP 409).
    #[error("entry already exists on the server")]
    Conflict,

    #[error("server answered {0}")]
    Status(StatusCode),

    #[error("request timed out")]
    Timeout,

    #[error("cannot build a request path from `{0}`")]
    InvalidUrl(String),

    #[error(transparent)]
    Request(#[from] hyper::http::Error),

    #[error(transparent)]
    Http(#[from] hyper::Error),

    #[error("bad JSON from server: {0}")]
    Json(#[from] serde_json::Error),
}

// -----------------------------------------------------------------------------
// trait

/// Persistence endpoints the editor consumes. All storage lives behind this.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Raw roster of one group, possibly mixing bare emails and records.
    async fn list_clients(&self, group: Group) -> Result<Vec<RawClient>, BackendError>;

    /// Creates `email` in `group` and returns the stored record.
    async fn create_client(&self, group: Group, email: &str) -> Result<Client, BackendError>;

    async fn delete_client(&self, group: Group, email: &str) -> Result<(), BackendError>;

    async fn fetch_history(&self, email: &str) -> Result<Vec<ContactHistoryEntry>, BackendError>;

    /// Dashboard counters for one backed group.
    async fn group_stats(&self, group: Group) -> Result<GroupStats, BackendError>;
}

// -----------------------------------------------------------------------------
// HTTP implementation

/// Appends percent-encoded path segments to `base`.
fn join_path(base: &Url, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BackendError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Record returned by a create call. Some deployments answer with an empty
/// body or a bare acknowledgement; those fall back to the requested email.
fn created_record(body: &[u8], email: &str) -> Client {
    serde_json::from_slice::<Client>(body).unwrap_or_else(|e| {
        debug!(email, error = %e, "create response is not a client record, using the request email");
        Client::new(email)
    })
}

pub struct HttpBackend {
    client:  HyperClient<Https>,
    base:    Url,
    timeout: Duration,
}

impl HttpBackend {
    pub fn new(base: Url, timeout: Duration) -> Self {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = HyperClient::builder().build(https);

        Self { client, base, timeout }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        join_path(&self.base, segments)
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Bytes, BackendError> {
        debug!(%method, %url, "backend request");

        tokio::time::timeout(self.timeout, self.exchange(method, url, body))
            .await
            .map_err(|_| BackendError::Timeout)?
    }

    async fn exchange(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Bytes, BackendError> {
        let builder = Request::builder().method(method).uri(url.as_str());
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                .body(Body::from(serde_json::to_vec(&v)?))?,
            None => builder.body(Body::empty())?,
        };

        let resp   = self.client.request(req).await?;
        let status = resp.status();
        let bytes  = hyper::body::to_bytes(resp.into_body()).await?;

        match status {
            s if s.is_success()  => Ok(bytes),
            StatusCode::CONFLICT => Err(BackendError::Conflict),
            s                    => Err(BackendError::Status(s)),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_clients(&self, group: Group) -> Result<Vec<RawClient>, BackendError> {
        let url   = self.endpoint(&["api", "clients", group.as_str()])?;
        let bytes = self.call(Method::GET, url, None).await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn create_client(&self, group: Group, email: &str) -> Result<Client, BackendError> {
        let url   = self.endpoint(&["api", "clients", group.as_str()])?;
        let bytes = self
            .call(Method::POST, url, Some(json!({ "email": email })))
            .await?;

        Ok(created_record(&bytes, email))
    }

    async fn delete_client(&self, group: Group, email: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["api", "clients", group.as_str(), email])?;
        self.call(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn fetch_history(&self, email: &str) -> Result<Vec<ContactHistoryEntry>, BackendError> {
        let url   = self.endpoint(&["api", "envios", "cliente", email])?;
        let bytes = self.call(Method::GET, url, None).await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn group_stats(&self, group: Group) -> Result<GroupStats, BackendError> {
        let url   = self.endpoint(&["api", "stats", group.as_str()])?;
        let bytes = self.call(Method::GET, url, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
