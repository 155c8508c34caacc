//! Web search collaborator. Treated as a capability: callers check
//! [`WebSearch::is_available`] and survive any search failure.

pub mod error;
pub mod searx;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

pub use error::{WebSearchError, WebSearchResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockWebSearch;
pub use searx::{DisabledWebSearch, HttpWebSearch};
pub use types::WebResult;

#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn search(&self, query: &str, max_results: usize) -> WebSearchResult<Vec<WebResult>>;
}
