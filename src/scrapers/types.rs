use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Parameters controlling how a search-results page is turned into listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Scheme and host prefixed to relative listing links
    pub base_origin: String,
    /// Path segment that marks listing detail pages
    pub listing_path: String,
    /// Maximum number of listings kept per page
    pub max_results: usize,
    /// Case-insensitive title filter; empty keeps everything
    pub keywords: Vec<String>,
    /// Currency appended to prices that lack one
    pub default_currency: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            base_origin: "https://www.olx.pl".to_string(),
            listing_path: "/oferta/".to_string(),
            max_results: 50,
            keywords: Vec::new(),
            default_currency: "zł".to_string(),
        }
    }
}

/// Returns `scheme://host[:port]` of an absolute http(s) URL.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed.origin().ascii_serialization())
}
