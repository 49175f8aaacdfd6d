//! Shared HTTP plumbing: client, runtime and transport error type.
//!
//! Uses async reqwest internally on a small shared tokio runtime,
//! but callers see a sync interface (one dataset = one thread of control).

use std::sync::{LazyLock, OnceLock};
use std::time::Duration;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Network settings applied process-wide before the first request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// No bytes for this long = stalled transfer
    pub read_timeout: Duration,
    /// Retry attempts for transport errors, 429 and 5xx
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the global HTTP configuration. Only the first call wins.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::warn!("HTTP config already initialized, ignoring {config:?}");
    }
}

/// Current HTTP configuration (defaults if never set).
pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Error types for transport operations
#[derive(Debug)]
pub enum StreamError {
    /// HTTP/transport error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl StreamError {
    /// Create HTTP error from reqwest error
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => match status {
                None => true,
                Some(s) => is_retryable_status(*s),
            },
            // Disk full is not retryable, timeout IS retryable
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }
}

impl From<std::io::Error> for StreamError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// 429 and 5xx are worth another attempt; other 4xx are final.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(4)
        .user_agent(concat!("sdmxline/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn retryable_statuses() {
        for status in [429, 500, 502, 503] {
            assert!(is_retryable_status(status), "{status}");
        }
        for status in [400, 401, 404, 410] {
            assert!(!is_retryable_status(status), "{status}");
        }
    }

    #[test]
    fn transport_errors_without_status_are_retried() {
        let refused = StreamError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(refused.is_retryable());
        assert_eq!(refused.to_string(), "HTTP error: connection refused");

        let not_found = StreamError::Http {
            status: Some(404),
            message: "Not Found".to_string(),
        };
        assert!(!not_found.is_retryable());
        assert_eq!(not_found.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn stalled_read_is_retried_full_disk_is_not() {
        let stall = StreamError::Io(io::Error::new(io::ErrorKind::TimedOut, "stall"));
        assert!(stall.is_retryable());
        let full = StreamError::Io(io::Error::new(io::ErrorKind::StorageFull, "disk full"));
        assert!(!full.is_retryable());
    }

    #[test]
    fn default_http_config() {
        let config = HttpConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.read_timeout >= Duration::from_secs(10));
    }
}
