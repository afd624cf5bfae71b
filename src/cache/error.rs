//! Fetch failures and their classification
//!
//! Every provider reports failures as a [`FetchError`]. The refresh loop never
//! acts on an error beyond logging it, but it needs to know how loudly: a
//! flaky upstream is expected and logged as a warning, anything else means an
//! operator should look at it.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// How a fetch failure should be treated by the refresh loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient upstream or network trouble that resolves on its own
    Ignorable,
    /// Unexpected failure that needs operator attention
    Fatal,
}

/// Errors that can occur while fetching data for a cache
#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch did not complete within the refresh timeout
    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx status
    #[error("{url} returned status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request URL without its query string
        url: String,
    },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// Upstream returned a well-formed response reporting an error
    #[error("Upstream reported an error: {0}")]
    Upstream(String),

    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl FetchError {
    /// Classifies the error as ignorable or fatal
    ///
    /// Timeouts, connection drops and non-2xx statuses are ignorable. A
    /// response that arrived intact but could not be understood is fatal.
    pub fn class(&self) -> ErrorClass {
        match self {
            FetchError::Timeout(_) | FetchError::Status { .. } => ErrorClass::Ignorable,
            FetchError::RequestFailed(err) => classify_request_error(err),
            FetchError::ParseError(_)
            | FetchError::MissingField(_)
            | FetchError::Upstream(_)
            | FetchError::Auth(_) => ErrorClass::Fatal,
        }
    }

    /// Returns true if the error is expected to resolve on its own
    pub fn is_ignorable(&self) -> bool {
        self.class() == ErrorClass::Ignorable
    }
}

fn classify_request_error(err: &reqwest::Error) -> ErrorClass {
    if err.status().is_some_and(|status| !status.is_success()) {
        return ErrorClass::Ignorable;
    }
    if is_transport_failure(err) || has_transient_io_source(err) {
        return ErrorClass::Ignorable;
    }
    ErrorClass::Fatal
}

/// A request that never produced a usable response: the connection failed,
/// stalled, or was closed before the response or its body completed.
fn is_transport_failure(err: &reqwest::Error) -> bool {
    err.is_timeout()
        || err.is_connect()
        || err.is_body()
        || (err.is_request() && err.status().is_none())
}

/// Walks the source chain looking for a transport failure, either an I/O
/// error caused by the peer dropping or stalling the connection or a nested
/// reqwest error that failed while reading the body.
pub(crate) fn has_transient_io_source(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            if is_transient_io_kind(io_err.kind()) {
                return true;
            }
        }
        if let Some(inner) = err.downcast_ref::<reqwest::Error>() {
            if inner.is_body() || inner.is_timeout() || inner.is_connect() {
                return true;
            }
        }
        current = err.source();
    }
    false
}

fn is_transient_io_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
    )
}
