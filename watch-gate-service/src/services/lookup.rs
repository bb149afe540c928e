//! Catalog lookups, translated into user-facing outcomes.

use crate::models::content::find_by_title;
use crate::models::{ContentItem, Reply};
use crate::services::metrics::record_content_request;
use crate::services::providers::ContentCatalog;
use std::sync::Arc;

/// Result of resolving a selection against the current listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Stream { title: String, url: String },
    /// The page exists but has no embedded player, or could not be fetched.
    Unavailable,
    NotFound,
    /// The listing itself could not be produced.
    CatalogDown,
}

impl LookupOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Stream { .. } => "stream",
            LookupOutcome::Unavailable => "unavailable",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::CatalogDown => "catalog_down",
        }
    }

    pub fn into_reply(self) -> Reply {
        match self {
            LookupOutcome::Stream { title, url } => Reply::Stream { title, url },
            LookupOutcome::Unavailable => Reply::ContentUnavailable,
            LookupOutcome::NotFound => Reply::ItemNotFound,
            LookupOutcome::CatalogDown => Reply::NoContent,
        }
    }
}

#[derive(Clone)]
pub struct ContentLookup {
    catalog: Arc<dyn ContentCatalog>,
}

impl ContentLookup {
    pub fn new(catalog: Arc<dyn ContentCatalog>) -> Self {
        Self { catalog }
    }

    /// Current listing; fetch failures collapse to an empty one.
    pub async fn latest(&self) -> Vec<ContentItem> {
        match self.catalog.list_latest().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Catalog listing unavailable");
                Vec::new()
            }
        }
    }

    pub async fn listing_reply(&self) -> Reply {
        let items = self.latest().await;
        if items.is_empty() {
            return Reply::NoContent;
        }
        Reply::Catalog {
            titles: items.into_iter().map(|item| item.title).collect(),
        }
    }

    /// Look `title` up in a freshly fetched listing and resolve its stream.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, title: &str) -> LookupOutcome {
        let outcome = self.resolve_inner(title).await;
        record_content_request(outcome.label());
        outcome
    }

    async fn resolve_inner(&self, title: &str) -> LookupOutcome {
        let items = match self.catalog.list_latest().await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => return LookupOutcome::CatalogDown,
            Err(e) => {
                tracing::warn!(error = %e, "Catalog listing unavailable");
                return LookupOutcome::CatalogDown;
            }
        };

        let Some(item) = find_by_title(&items, title) else {
            return LookupOutcome::NotFound;
        };

        match self.catalog.resolve_stream(&item.detail_url).await {
            Ok(Some(url)) => LookupOutcome::Stream {
                title: item.title.clone(),
                url,
            },
            Ok(None) => LookupOutcome::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, detail_url = %item.detail_url, "Detail page fetch failed");
                LookupOutcome::Unavailable
            }
        }
    }
}
