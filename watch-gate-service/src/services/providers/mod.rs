pub mod catalog;
pub mod mock;
pub mod youtube;

use crate::models::ContentItem;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use thiserror::Error;

pub use catalog::ScrapedCatalog;
pub use mock::{MockVerifier, StaticCatalog};
pub use youtube::GoogleMembershipVerifier;

/// Failure of the authorization-code exchange.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Token exchange rejected with status {0}")]
    Rejected(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
}

/// Failure to fetch or read a catalog page.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to reach catalog: {0}")]
    Connection(String),

    #[error("Catalog returned status {0}")]
    Status(u16),

    #[error("Unparseable catalog page: {0}")]
    Parse(String),
}

/// One-time authorization code presented by the user. Never persisted.
pub struct VerificationProof(Secret<String>);

impl VerificationProof {
    pub fn new(code: impl Into<String>) -> Self {
        Self(Secret::new(code.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Short-lived provider credential, used for a single membership query.
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Identity provider plus membership service.
#[async_trait]
pub trait MembershipVerifier: Send + Sync {
    /// Trade a proof for an access token.
    async fn exchange_proof(&self, proof: &VerificationProof) -> Result<AccessToken, ProviderError>;

    /// Whether the token's owner belongs to the sponsored group.
    ///
    /// Implementations fail closed: any error yields `false`.
    async fn is_subscribed(&self, token: &AccessToken) -> bool;
}

/// Source of watchable content.
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Latest items, newest first, at most the configured limit.
    async fn list_latest(&self) -> Result<Vec<ContentItem>, CatalogError>;

    /// Embedded stream URL of a detail page; `Ok(None)` when the page has none.
    async fn resolve_stream(&self, detail_url: &str) -> Result<Option<String>, CatalogError>;
}
