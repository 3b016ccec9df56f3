//! Error taxonomy for the crawl, store and classification paths
//!
//! Every failure a single product can produce is a value of [`CatalogError`];
//! the orchestrator decides per variant whether to retry, degrade or skip.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Fetch timed out: {url}")]
    FetchTimeout { url: String },

    #[error("Fetch failed for {url}: {reason}")]
    FetchUnavailable { url: String, reason: String },

    #[error("Expected element '{element}' not found ({context})")]
    MalformedMarkup { element: String, context: String },

    #[error("Invalid price format: '{text}'")]
    InvalidPriceFormat { text: String },

    #[error("Failed to store variant {id}: {reason}")]
    StoreWriteFailure { id: String, reason: String },

    #[error("Failed to read from the product store: {reason}")]
    StoreReadFailure { reason: String },

    #[error("Browser session could not be started: {reason}")]
    SessionInit { reason: String },

    /// Transport failure, rate limit or server error from the classifier
    #[error("Image classifier call failed: {reason}")]
    Classifier { reason: String },

    /// The classifier refused the request or answered with something unusable
    #[error("Image classifier rejected the request: {reason}")]
    ClassifierRejected { reason: String },
}

impl CatalogError {
    /// Create a fetch-unavailable error for a URL
    pub fn fetch_unavailable(url: &str, reason: impl Into<String>) -> Self {
        Self::FetchUnavailable {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed_markup(element: &str, context: &str) -> Self {
        Self::MalformedMarkup {
            element: element.to_string(),
            context: context.to_string(),
        }
    }

    pub fn invalid_price(text: &str) -> Self {
        Self::InvalidPriceFormat {
            text: text.to_string(),
        }
    }

    /// Transient network or session failures that deserve another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchTimeout { .. } | Self::FetchUnavailable { .. } | Self::Classifier { .. }
        )
    }

    /// Whether the crawl can carry on after this error.
    ///
    /// Only a browser session that cannot be created at all stops a run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SessionInit { .. })
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(CatalogError::FetchTimeout { url: "u".into() }.is_retryable());
        assert!(CatalogError::fetch_unavailable("u", "503").is_retryable());
        assert!(!CatalogError::invalid_price("$").is_retryable());
        assert!(!CatalogError::malformed_markup("li", "detail").is_retryable());
        assert!(CatalogError::Classifier { reason: "HTTP 503".into() }.is_retryable());
        assert!(!CatalogError::ClassifierRejected { reason: "HTTP 401".into() }.is_retryable());
    }

    #[test]
    fn test_only_session_init_is_fatal() {
        assert!(!CatalogError::SessionInit { reason: "no driver".into() }.is_recoverable());
        assert!(CatalogError::StoreWriteFailure { id: "x".into(), reason: "locked".into() }.is_recoverable());
        assert!(CatalogError::invalid_price("free").is_recoverable());
    }
}
