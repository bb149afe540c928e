use serde::{Deserialize, Serialize};

/// One entry of the latest-content listing.
///
/// Rebuilt on every lookup; `title` is the exact, case-sensitive key a user
/// replies with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    pub detail_url: String,
}

impl ContentItem {
    pub fn new(title: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail_url: detail_url.into(),
        }
    }
}

/// Exact-match lookup of a user's selection in a listing.
pub fn find_by_title<'a>(items: &'a [ContentItem], title: &str) -> Option<&'a ContentItem> {
    items.iter().find(|item| item.title == title)
}
