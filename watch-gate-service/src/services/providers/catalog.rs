//! HTML catalog scraper.
//!
//! The listing page exposes items as `.film_list-wrap .flw-item`, each with a
//! `.film-name a` title link. Detail pages embed the player as an `iframe`.

use super::{CatalogError, ContentCatalog};
use crate::config::CatalogConfig;
use crate::models::ContentItem;
use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Client};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const ITEM_SELECTOR: &str = ".film_list-wrap .flw-item";
const TITLE_LINK_SELECTOR: &str = ".film-name a";
const PLAYER_SELECTOR: &str = "iframe[src]";

pub struct ScrapedCatalog {
    client: Client,
    base_url: Url,
    listing_url: Url,
    limit: usize,
    user_agent: String,
}

impl ScrapedCatalog {
    pub fn new(config: &CatalogConfig, timeout: Duration) -> Result<Self, CatalogError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| CatalogError::Parse(format!("invalid catalog base URL: {}", e)))?;
        let listing_url = base_url
            .join(&config.listing_path)
            .map_err(|e| CatalogError::Parse(format!("invalid listing path: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            listing_url,
            limit: config.limit,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn fetch_page(&self, url: Url) -> Result<String, CatalogError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CatalogError::Status(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| CatalogError::Connection(e.to_string()))
    }
}

#[async_trait]
impl ContentCatalog for ScrapedCatalog {
    async fn list_latest(&self) -> Result<Vec<ContentItem>, CatalogError> {
        let html = self.fetch_page(self.listing_url.clone()).await?;
        let items = parse_listing(&html, &self.base_url, self.limit)?;
        tracing::debug!(count = items.len(), "Fetched catalog listing");
        Ok(items)
    }

    async fn resolve_stream(&self, detail_url: &str) -> Result<Option<String>, CatalogError> {
        let page_url = Url::parse(detail_url)
            .map_err(|e| CatalogError::Parse(format!("invalid detail URL: {}", e)))?;
        let html = self.fetch_page(page_url.clone()).await?;
        parse_stream_source(&html, &page_url)
    }
}

fn selector(css: &str) -> Result<Selector, CatalogError> {
    Selector::parse(css).map_err(|e| CatalogError::Parse(format!("bad selector {}: {}", css, e)))
}

/// Extract up to `limit` items with a title and a link, resolving links
/// against `base`. Items missing either are skipped; repeated titles keep
/// their first occurrence.
pub fn parse_listing(html: &str, base: &Url, limit: usize) -> Result<Vec<ContentItem>, CatalogError> {
    let document = Html::parse_document(html);
    let item_selector = selector(ITEM_SELECTOR)?;
    let link_selector = selector(TITLE_LINK_SELECTOR)?;

    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for element in document.select(&item_selector) {
        if items.len() >= limit {
            break;
        }
        let Some(link) = element.select(&link_selector).next() else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        if title.is_empty() || href.is_empty() {
            continue;
        }
        let Ok(detail_url) = base.join(href) else {
            continue;
        };
        if seen.insert(title.clone()) {
            items.push(ContentItem::new(title, detail_url.to_string()));
        }
    }

    Ok(items)
}

/// First embedded player source on a detail page, resolved against the page.
pub fn parse_stream_source(html: &str, page_url: &Url) -> Result<Option<String>, CatalogError> {
    let document = Html::parse_document(html);
    let player_selector = selector(PLAYER_SELECTOR)?;

    Ok(document
        .select(&player_selector)
        .filter_map(|frame| frame.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .and_then(|src| page_url.join(src).ok())
        .map(|url| url.to_string()))
}
