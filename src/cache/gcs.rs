use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client as HttpClient, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::error::{CacheError, CacheResult};
use super::store::BlobStore;
use crate::upstream::http_client;

const BACKEND: &str = "gcs";
/// Public endpoint of the Cloud Storage JSON API.
pub const GCS_API_BASE: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// [`BlobStore`] backed by a Cloud Storage bucket through the JSON API.
///
/// Authenticates with a fixed bearer token when one is configured, otherwise with
/// the instance service account token from the GCE metadata server.
#[derive(Debug)]
pub struct GcsBlobStore {
    bucket: String,
    base_url: String,
    static_token: Option<String>,
    token: Mutex<Option<CachedToken>>,
    http: HttpClient,
}

impl GcsBlobStore {
    pub fn new(
        bucket: impl Into<String>,
        static_token: Option<String>,
        timeout: Duration,
    ) -> CacheResult<Self> {
        let http = http_client(BACKEND, timeout).map_err(|e| backend_error(e.to_string()))?;
        Ok(Self {
            bucket: bucket.into(),
            base_url: GCS_API_BASE.to_string(),
            static_token,
            token: Mutex::new(None),
            http,
        })
    }

    /// Points the store at another JSON API endpoint (emulators, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `{base}/storage/v1/b/{bucket}/o[/{object}]` with each part percent-encoded.
    pub fn object_url(&self, object: Option<&str>) -> CacheResult<Url> {
        self.url_with_segments(&["storage", "v1", "b", &self.bucket, "o"], object)
    }

    fn upload_url(&self) -> CacheResult<Url> {
        self.url_with_segments(&["upload", "storage", "v1", "b", &self.bucket, "o"], None)
    }

    fn url_with_segments(&self, segments: &[&str], object: Option<&str>) -> CacheResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| backend_error(e.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| backend_error(format!("cannot-be-a-base URL: {}", self.base_url)))?;
            path.pop_if_empty().extend(segments);
            if let Some(object) = object {
                path.push(object);
            }
        }
        Ok(url)
    }

    async fn bearer_token(&self) -> CacheResult<String> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let cached = self.token.lock().clone();
        if let Some(cached) = cached.filter(|t| t.expires_at > Instant::now()) {
            return Ok(cached.value);
        }

        let resp = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| backend_error(format!("metadata token request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(backend_error(format!("metadata error: {}", resp.status())));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| backend_error(format!("failed to read metadata token: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *self.token.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!(expires_in = token.expires_in, "Refreshed GCS access token");
        Ok(token.access_token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> CacheResult<reqwest::Response> {
        let token = self.bearer_token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| backend_error(format!("request failed: {e}")))
    }
}

fn backend_error(reason: String) -> CacheError {
    CacheError::Backend {
        backend: BACKEND,
        reason,
    }
}

fn status_error(status: StatusCode, path: &str) -> CacheError {
    backend_error(format!("HTTP {status} for {path}"))
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn exists_prefix(&self, prefix: &str) -> CacheResult<bool> {
        let url = self.object_url(None)?;
        let resp = self
            .send(
                self.http
                    .get(url)
                    .query(&[("prefix", prefix), ("maxResults", "1")]),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), prefix));
        }
        let listing: ListResponse = resp
            .json()
            .await
            .map_err(|e| backend_error(format!("malformed listing: {e}")))?;
        Ok(!listing.items.is_empty())
    }

    async fn get(&self, path: &str) -> CacheResult<Option<Vec<u8>>> {
        let url = self.object_url(Some(path))?;
        let resp = self
            .send(self.http.get(url).query(&[("alt", "media")]))
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| backend_error(format!("failed to read object: {e}")))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(status_error(status, path)),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> CacheResult<()> {
        let url = self.upload_url()?;
        let resp = self
            .send(
                self.http
                    .post(url)
                    .query(&[("uploadType", "media"), ("name", path)])
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes),
            )
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), path));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        BACKEND
    }
}
