//! In-process providers for tests and local runs without external services.

use super::{
    AccessToken, CatalogError, ContentCatalog, MembershipVerifier, ProviderError,
    VerificationProof,
};
use crate::models::ContentItem;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Verifier with scripted outcomes.
pub struct MockVerifier {
    exchange_succeeds: AtomicBool,
    subscribed: AtomicBool,
    delay: Mutex<Option<Duration>>,
    exchange_calls: AtomicU64,
    subscription_calls: AtomicU64,
}

impl MockVerifier {
    pub fn new(exchange_succeeds: bool, subscribed: bool) -> Self {
        Self {
            exchange_succeeds: AtomicBool::new(exchange_succeeds),
            subscribed: AtomicBool::new(subscribed),
            delay: Mutex::new(None),
            exchange_calls: AtomicU64::new(0),
            subscription_calls: AtomicU64::new(0),
        }
    }

    /// Accepts every proof and reports a subscription.
    pub fn approving() -> Self {
        Self::new(true, true)
    }

    pub fn set_subscribed(&self, subscribed: bool) {
        self.subscribed.store(subscribed, Ordering::SeqCst);
    }

    /// Make every exchange take `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = delay;
        }
    }

    pub fn exchange_calls(&self) -> u64 {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn subscription_calls(&self) -> u64 {
        self.subscription_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MembershipVerifier for MockVerifier {
    async fn exchange_proof(&self, proof: &VerificationProof) -> Result<AccessToken, ProviderError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if !self.exchange_succeeds.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected(400));
        }

        tracing::info!("[MOCK] Authorization code exchanged");
        Ok(AccessToken::new(format!("mock-token-{}", proof.expose().len())))
    }

    async fn is_subscribed(&self, _token: &AccessToken) -> bool {
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        self.subscribed.load(Ordering::SeqCst)
    }
}

/// Catalog backed by fixed items and stream sources.
#[derive(Default)]
pub struct StaticCatalog {
    items: Mutex<Vec<ContentItem>>,
    streams: Mutex<HashMap<String, String>>,
    listing_fails: AtomicBool,
    listing_calls: AtomicU64,
}

impl StaticCatalog {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Default::default()
        }
    }

    /// Give the detail page at `detail_url` an embedded stream.
    pub fn with_stream(self, detail_url: impl Into<String>, stream_url: impl Into<String>) -> Self {
        if let Ok(mut streams) = self.streams.lock() {
            streams.insert(detail_url.into(), stream_url.into());
        }
        self
    }

    pub fn set_listing_fails(&self, fails: bool) {
        self.listing_fails.store(fails, Ordering::SeqCst);
    }

    pub fn listing_calls(&self) -> u64 {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentCatalog for StaticCatalog {
    async fn list_latest(&self) -> Result<Vec<ContentItem>, CatalogError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);

        if self.listing_fails.load(Ordering::SeqCst) {
            return Err(CatalogError::Connection("mock catalog offline".to_string()));
        }

        self.items
            .lock()
            .map(|items| items.clone())
            .map_err(|_| CatalogError::Connection("mock catalog poisoned".to_string()))
    }

    async fn resolve_stream(&self, detail_url: &str) -> Result<Option<String>, CatalogError> {
        self.streams
            .lock()
            .map(|streams| streams.get(detail_url).cloned())
            .map_err(|_| CatalogError::Connection("mock catalog poisoned".to_string()))
    }
}
