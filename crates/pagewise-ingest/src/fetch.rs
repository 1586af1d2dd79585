use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;

use pagewise_core::config_file::FetchConfig;

use crate::IngestError;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = concat!("pagewise/", env!("CARGO_PKG_VERSION"));

/// Downloads HTML documents for extraction.
#[derive(Clone, Debug)]
pub struct DocumentFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for DocumentFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT)
    }
}

impl DocumentFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, timeout }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        let timeout = config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT);
        let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        Self::new(timeout, user_agent)
    }

    /// GET `url` and return the body.
    ///
    /// Anything but `200 OK` with a `text/html` content type is rejected.
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Bytes, IngestError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IngestError::Cancelled),
            result = self.fetch_inner(url) => result,
        }
    }

    async fn fetch_inner(&self, url: &str) -> Result<Bytes, IngestError> {
        let fetch_err = |source| IngestError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fetch_err)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_html(&content_type) {
            return Err(IngestError::NotHtml {
                url: url.to_string(),
                content_type,
            });
        }

        let body = response.bytes().await.map_err(fetch_err)?;
        tracing::debug!(url, bytes = body.len(), "fetched document");
        Ok(body)
    }
}

fn is_html(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("text/html"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_content_types() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("Text/HTML;charset=ISO-8859-1"));
        assert!(!is_html("application/json"));
        assert!(!is_html("application/xhtml+xml"));
        assert!(!is_html(""));
    }

    #[test]
    fn config_overrides() {
        let fetcher = DocumentFetcher::from_config(&FetchConfig {
            timeout_secs: Some(5),
            ..Default::default()
        });
        assert_eq!(fetcher.timeout, Duration::from_secs(5));
        assert_eq!(DocumentFetcher::default().timeout, DEFAULT_FETCH_TIMEOUT);
    }
}
