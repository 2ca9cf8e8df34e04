//! Error types for the CDP driver.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// A command returned an error response.
    #[error("CDP error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        data: Option<String>,
    },

    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    /// Serialization failures, dropped connections, unexpected replies.
    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    #[error("JavaScript exception: {message}")]
    JsException { message: String },
}

impl From<CdpError> for chatscope_core::Error {
    fn from(e: CdpError) -> Self {
        chatscope_core::Error::Driver(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_retryable_driver_error() {
        let err: chatscope_core::Error = CdpError::Timeout {
            method: "Runtime.evaluate".into(),
            duration: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, chatscope_core::Error::Driver(_)));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Runtime.evaluate"));
    }
}
