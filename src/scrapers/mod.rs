pub mod olx;
pub mod strategy;
pub mod traits;
pub mod types;

pub use olx::OlxExtractor;
pub use traits::PageSource;
pub use types::ExtractConfig;
