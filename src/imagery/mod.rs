//! Satellite snapshot retrieval.
//!
//! [`ImageryFetcher`] asks an [`ImageryProvider`] for a fixed-size, fixed-zoom
//! snapshot centred on a coordinate and persists it into the request's
//! [`WorkingArea`] under the address's [`LocationKey`].

mod workspace;


pub use workspace::WorkingArea;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use thiserror::Error;
use tracing::debug;

use crate::constants::{SNAPSHOT_SIZE_PX, SNAPSHOT_ZOOM};
use crate::hashing::LocationKey;
use crate::types::Coordinates;
use crate::upstream::{UpstreamError, UpstreamResult, http_client, send_checked};

const SERVICE: &str = "static maps";

#[derive(Debug, Error)]
pub enum ImageryError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("imagery provider returned an empty body")]
    EmptyBody,

    #[error("failed to persist snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
/// Returns the raw encoded image for a coordinate.
pub trait ImageryProvider: Send + Sync {
    async fn snapshot(&self, coords: Coordinates) -> UpstreamResult<Vec<u8>>;
}

/// [`ImageryProvider`] backed by the Google Static Maps API.
#[derive(Debug, Clone)]
pub struct StaticMapsProvider {
    url: String,
    api_key: String,
    http: HttpClient,
}

impl StaticMapsProvider {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> UpstreamResult<Self> {
        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            http: http_client(SERVICE, timeout)?,
        })
    }

    /// Query parameters for a snapshot centred on `coords`.
    pub fn query_params(&self, coords: Coordinates) -> Vec<(&'static str, String)> {
        vec![
            ("center", coords.as_center()),
            ("zoom", SNAPSHOT_ZOOM.to_string()),
            ("size", format!("{SNAPSHOT_SIZE_PX}x{SNAPSHOT_SIZE_PX}")),
            ("maptype", "satellite".to_string()),
            ("key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl ImageryProvider for StaticMapsProvider {
    async fn snapshot(&self, coords: Coordinates) -> UpstreamResult<Vec<u8>> {
        let request = self.http.get(&self.url).query(&self.query_params(coords));
        let response = send_checked(SERVICE, request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Unreachable {
                service: SERVICE,
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

/// Fetches snapshots and writes them into a [`WorkingArea`].
#[derive(Clone)]
pub struct ImageryFetcher {
    provider: Arc<dyn ImageryProvider>,
}

impl std::fmt::Debug for ImageryFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageryFetcher").finish_non_exhaustive()
    }
}

impl ImageryFetcher {
    pub fn new(provider: Arc<dyn ImageryProvider>) -> Self {
        Self { provider }
    }

    /// Fetches the snapshot for `coords`, persists it as `{key}.png` and returns the bytes.
    pub async fn fetch(
        &self,
        coords: Coordinates,
        key: &LocationKey,
        area: &WorkingArea,
    ) -> Result<Vec<u8>, ImageryError> {
        let bytes = self.provider.snapshot(coords).await?;
        if bytes.is_empty() {
            return Err(ImageryError::EmptyBody);
        }

        area.persist(key, &bytes).await?;
        debug!(key = key.short(), bytes = bytes.len(), "Snapshot stored");
        Ok(bytes)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockImageryProvider;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::ImageryProvider;
    use crate::types::Coordinates;
    use crate::upstream::{UpstreamError, UpstreamResult};

    /// [`ImageryProvider`] returning a generated PNG, optionally failing for given coordinates.
    #[derive(Debug, Default)]
    pub struct MockImageryProvider {
        failing: Mutex<Vec<Coordinates>>,
        calls: AtomicUsize,
    }

    impl MockImageryProvider {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the provider answer 500 for `coords`.
        pub fn failing_at(self, coords: Coordinates) -> Self {
            self.failing.lock().push(coords);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// A small solid PNG whose colour is derived from the coordinate.
        pub fn png_for(coords: Coordinates) -> Vec<u8> {
            let shade = ((coords.lat.abs() * 1000.0) as u64 % 200) as u8 + 20;
            let img = image::RgbImage::from_pixel(32, 32, image::Rgb([shade, 90, 60]));
            let mut out = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut out, image::ImageFormat::Png)
                .expect("encoding an in-memory PNG cannot fail");
            out.into_inner()
        }
    }

    #[async_trait]
    impl ImageryProvider for MockImageryProvider {
        async fn snapshot(&self, coords: Coordinates) -> UpstreamResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().contains(&coords) {
                return Err(UpstreamError::Status {
                    service: "static maps",
                    status: 500,
                });
            }
            Ok(Self::png_for(coords))
        }
    }
}
