//! Trait definition for the external search provider.
//!
//! The executor calls [`SearchProvider::search`] once per query variant
//! (more on retry). Implementations classify their own failures as
//! transient or terminal through [`ProviderError`]; the executor only acts
//! on that classification.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ProviderOptions, RawHit};

/// A pluggable search backend.
///
/// Each implementation handles its own:
///
/// - request construction and query encoding
/// - authentication
/// - response decoding into [`RawHit`] values
/// - classification of failures into transient vs terminal
///
/// All implementations must be `Send + Sync`; the executor shares one
/// provider across concurrently running variant tasks.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query and return the provider's hits in its own order.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] whose kind tells the executor whether a
    /// retry is worthwhile.
    async fn search(
        &self,
        query: &str,
        options: &ProviderOptions,
    ) -> Result<Vec<RawHit>, ProviderError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
