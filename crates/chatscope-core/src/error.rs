//! Error types for chatscope.

use std::time::Duration;

use thiserror::Error;

use crate::locator::WaitState;

#[derive(Error, Debug)]
pub enum Error {
    /// The page spec lacks an element the operation needs.
    #[error("{element} not defined in page spec")]
    MissingElement { element: String },

    #[error("timed out after {timeout:?} waiting for {target} to be {state}")]
    Timeout {
        target: String,
        state: WaitState,
        timeout: Duration,
    },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Extraction nested deeper than {0} levels")]
    DepthExceeded(usize),

    #[error("Spec error: {0}")]
    Spec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn missing(element: impl Into<String>) -> Self {
        Error::MissingElement {
            element: element.into(),
        }
    }

    /// Timeouts and driver hiccups may succeed when re-issued; the caller
    /// decides whether re-issuing a UI action is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Driver(_))
    }

    /// Errors caused by an incomplete or malformed selector spec.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::MissingElement { .. } | Error::Spec(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
