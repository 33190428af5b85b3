//! Paginated source interface consumed by the orchestrator.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CategoryMap, DetailFields, Startup};

/// One page of listing results plus per-record detail lookups.
///
/// Field extraction correctness is entirely the implementor's concern;
/// the orchestrator only sees extracted records. Transport failures
/// surface as errors and are recovered at the call site.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch one page of listing results, optionally filtered by
    /// category slug. An empty vec signals the end of the listing.
    async fn listing_page(&self, page: usize, category: Option<&str>) -> Result<Vec<Startup>>;

    /// Fetch enrichment fields for one record's detail page.
    async fn detail(&self, detail_url: &str) -> Result<DetailFields>;

    /// Discover the available categories. Partial results are valid;
    /// failures inside discovery are swallowed by the implementor.
    async fn categories(&self) -> CategoryMap;
}
