//! Merges backend extraction with navigation inference.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use pagewise_core::{CleanDocument, ExtractionBackend, ExtractionRequest};
use pagewise_nav::{NavInferenceEngine, NavLinks};

use crate::IngestError;
use crate::cache::DocumentCache;
use crate::fetch::DocumentFetcher;

/// Cache prefix for assembled documents.
pub const CLEAN_PREFIX: &str = "clean";

/// Produces a [`CleanDocument`] from raw HTML, or from a URL when a fetcher
/// is configured.
pub struct ContentAssembler {
    backend: Arc<dyn ExtractionBackend>,
    engine: Arc<NavInferenceEngine>,
    fetcher: Option<DocumentFetcher>,
    cache: Option<Arc<DocumentCache>>,
}

impl ContentAssembler {
    pub fn new(backend: Arc<dyn ExtractionBackend>) -> Self {
        Self {
            backend,
            engine: Arc::new(NavInferenceEngine::default()),
            fetcher: None,
            cache: None,
        }
    }

    pub fn with_engine(mut self, engine: NavInferenceEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn with_fetcher(mut self, fetcher: DocumentFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_cache(mut self, cache: Arc<DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn backend(&self) -> &dyn ExtractionBackend {
        self.backend.as_ref()
    }

    /// Extract the article and infer navigation over the same HTML.
    ///
    /// `NoArticle` still yields a document: empty title and content, with
    /// whatever navigation links were found.
    pub async fn assemble(
        &self,
        request: &ExtractionRequest,
        cancel: &CancellationToken,
    ) -> Result<CleanDocument, IngestError> {
        let extraction = self.backend.parse(request, cancel).await?;
        if !extraction.is_article() {
            tracing::debug!(
                url = %request.document_url,
                backend = self.backend.name(),
                "backend found no article"
            );
        }

        let links = self.infer_nav(request).await?;
        Ok(CleanDocument::assemble(extraction, links.next, links.prev))
    }

    /// Fetch `url`, then [`assemble`](Self::assemble) it. Results are cached
    /// under [`CLEAN_PREFIX`] when a cache is configured.
    pub async fn assemble_url(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<CleanDocument, IngestError> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(CLEAN_PREFIX, url)) {
            return Ok(cached);
        }

        let fetcher = self.fetcher.as_ref().ok_or(IngestError::NoFetcher)?;
        let body = fetcher.fetch(url, cancel).await?;
        let document = self
            .assemble(&ExtractionRequest::new(body, url), cancel)
            .await?;

        if let Some(cache) = &self.cache {
            cache.insert(CLEAN_PREFIX, url, document.clone());
        }
        Ok(document)
    }

    /// Scraper documents are `!Send`, so inference runs on the blocking pool.
    async fn infer_nav(&self, request: &ExtractionRequest) -> Result<NavLinks, IngestError> {
        let engine = Arc::clone(&self.engine);
        let html = String::from_utf8_lossy(&request.html_body).into_owned();
        let base_url = request.document_url.clone();

        tokio::task::spawn_blocking(move || engine.infer(&html, &base_url))
            .await
            .map_err(|e| IngestError::Nav(e.to_string()))
    }
}
