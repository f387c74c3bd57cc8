use crate::error::FetchError;
use async_trait::async_trait;

/// Where search-results markup comes from.
/// The HTTP client implements it; tests substitute canned pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the raw markup of the page at `url`
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;

    /// Get the name of the source
    fn source_name(&self) -> &'static str;
}
