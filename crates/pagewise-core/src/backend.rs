//! Extraction backend trait.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::{ExtractError, Extraction, ExtractionRequest};

/// Boxed future returned by [`ExtractionBackend::parse`].
pub type BackendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Extraction, ExtractError>> + Send + 'a>>;

/// Anything that can turn an HTML document into an article.
///
/// The out-of-process worker supervisor is one implementation; an in-process
/// parser can implement the same trait without callers changing.
pub trait ExtractionBackend: Send + Sync {
    /// Short identifier used in logs (e.g. "worker").
    fn name(&self) -> &str;

    /// Extract the article from `request`.
    ///
    /// Returns `Extraction::NoArticle` when the document was understood but
    /// holds no article. Cancelling `cancel` aborts the call with
    /// `TransportError::Cancelled`.
    fn parse<'a>(
        &'a self,
        request: &'a ExtractionRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a>;
}
