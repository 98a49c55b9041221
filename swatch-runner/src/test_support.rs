//! Shared fixtures for runner tests

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, RgbaImage};
use swatch_core::{Record, RecordUpdate, Rgb};
use swatch_store::{MemoryRecordStore, RecordStore, StoreError};
use url::Url;

use crate::fetcher::{FetchCause, FetchError, ImageFetcher};
use crate::palette::{ExtractError, PaletteExtractor};

/// Encodes a PNG whose pixels are produced by `pixel(x, y)`
pub fn png_bytes(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| image::Rgba(pixel(x, y)));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Serves a router on an ephemeral local port and returns its base URL
pub async fn serve(router: axum::Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

pub fn record(id: &str, image_url: Option<&str>) -> Record {
    Record::new(id, image_url.map(String::from))
}

/// Fetcher that answers from a fixed URL -> status table
///
/// URLs absent from the table return a body of their own URL bytes.
/// Counts concurrent fetches and can delay each one.
#[derive(Default)]
pub struct FakeFetcher {
    failures: HashMap<String, u16>,
    panics: Vec<String>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: &str, status: u16) -> Self {
        self.failures.insert(url.to_string(), status);
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.panics.push(url.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panics.iter().any(|u| u == url.as_str()) {
            panic!("fetcher exploded on {}", url);
        }

        match self.failures.get(url.as_str()) {
            Some(status) => Err(FetchError::new(url, FetchCause::Status(*status))),
            None => Ok(url.as_str().as_bytes().to_vec()),
        }
    }
}

/// Extractor returning the same palette for every input
pub struct FixedPalette(pub Vec<Rgb>);

impl PaletteExtractor for FixedPalette {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<Rgb>, ExtractError> {
        if bytes.is_empty() {
            return Err(ExtractError::Decode("empty input".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Store wrapper that fails updates for selected ids, or all updates
pub struct FailingStore {
    pub inner: Arc<MemoryRecordStore>,
    reject: Vec<String>,
    unavailable: bool,
}

impl FailingStore {
    pub fn rejecting(inner: Arc<MemoryRecordStore>, ids: &[&str]) -> Self {
        Self {
            inner,
            reject: ids.iter().map(|s| s.to_string()).collect(),
            unavailable: false,
        }
    }

    pub fn unavailable(inner: Arc<MemoryRecordStore>) -> Self {
        Self {
            inner,
            reject: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn fetch_all(&self) -> swatch_store::Result<Vec<Record>> {
        self.inner.fetch_all().await
    }

    async fn update_fields(&self, id: &str, update: RecordUpdate) -> swatch_store::Result<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        if self.reject.iter().any(|r| r == id) {
            return Err(StoreError::Rejected(format!("update of {} denied", id)));
        }
        self.inner.update_fields(id, update).await
    }
}

/// Store whose snapshot read always fails
pub struct BrokenSnapshotStore;

#[async_trait]
impl RecordStore for BrokenSnapshotStore {
    async fn fetch_all(&self) -> swatch_store::Result<Vec<Record>> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn update_fields(&self, _id: &str, _update: RecordUpdate) -> swatch_store::Result<()> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// Store whose snapshot read or updates never complete
pub struct HangingStore {
    inner: Arc<MemoryRecordStore>,
    hang_snapshot: bool,
}

impl HangingStore {
    /// Snapshot works, every update hangs
    pub fn updates(inner: Arc<MemoryRecordStore>) -> Self {
        Self {
            inner,
            hang_snapshot: false,
        }
    }

    /// Snapshot read hangs
    pub fn snapshot() -> Self {
        Self {
            inner: Arc::new(MemoryRecordStore::new()),
            hang_snapshot: true,
        }
    }
}

#[async_trait]
impl RecordStore for HangingStore {
    async fn fetch_all(&self) -> swatch_store::Result<Vec<Record>> {
        if self.hang_snapshot {
            std::future::pending::<()>().await;
        }
        self.inner.fetch_all().await
    }

    async fn update_fields(&self, _id: &str, _update: RecordUpdate) -> swatch_store::Result<()> {
        std::future::pending().await
    }
}
