use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display value used when no title could be recovered
pub const TITLE_PLACEHOLDER: &str = "No title";

/// Display value used when no price could be recovered
pub const PRICE_PLACEHOLDER: &str = "Price on request";

/// Display value used when no location could be recovered
pub const LOCATION_PLACEHOLDER: &str = "Unknown";

/// One classified ad discovered on a search-results page.
///
/// `id` and `url` are never empty. `title`, `price` and `location` always
/// carry a display value; the placeholders above stand in for missing data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub url: String,
    pub price: String,
    pub location: String,
    pub image_url: Option<String>,
}

/// A listing id that has already been notified (or seeded on first run).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeenEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default = "Utc::now")]
    pub seen_at: DateTime<Utc>,
}

impl SeenEntry {
    /// Entry carrying only the id, stamped with the current time
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            title: None,
            price: None,
            seen_at: Utc::now(),
        }
    }

    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            id: listing.id.clone(),
            url: Some(listing.url.clone()),
            title: Some(listing.title.clone()),
            price: Some(listing.price.clone()),
            seen_at: Utc::now(),
        }
    }
}

/// Cut `text` to at most `max_chars` characters, ending with `…` when cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}
