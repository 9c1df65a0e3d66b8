use super::restaurant_models::{ProviderKind, ProviderQuery, RestaurantRecord};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("timed out")]
    Timeout,
}

/// An external restaurant data source.
#[async_trait]
pub trait RestaurantProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether this provider's cuisine data wins over other providers' when merging.
    fn authoritative_for_menus(&self) -> bool {
        false
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<RestaurantRecord>, ProviderError>;
}
