pub mod extract;
pub mod olx;

mod error;
mod utils;

pub use error::CrawlerError;

use olx::OlxAd;

/// The narrow storage seam the crawl path depends on. Everything else
/// about persistence (schema, lifecycle, dumps) belongs to the
/// implementation.
#[async_trait::async_trait]
pub trait AdStorage {
    async fn ad_exists(&self, ad_id: i64) -> Result<bool, CrawlerError>;
    async fn save_ad(&self, ad: &OlxAd) -> Result<(), CrawlerError>;
}
