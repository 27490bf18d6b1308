use thiserror::Error;

/// Failure while fetching or decoding listing pages.
///
/// Every variant is recoverable: the cycle controller reacts by refreshing
/// credentials and rolling back to the last known-good snapshot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode page {page}: {source}")]
    Decode {
        page: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed record on page {page}: {reason}")]
    Malformed { page: usize, reason: String },

    #[error("snapshot fetch exceeded {secs}s cycle timeout")]
    Timeout { secs: u64 },

    #[error("credential refresh failed: {0}")]
    Credential(String),
}

/// Per-message notification failure. Logged, never propagated; a failed send
/// does not affect snapshot state or the remaining messages.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("telegram api returned status {0}")]
    Status(u16),
}
