//! Error types shared across the server.

use lsp_server::{ErrorCode, ResponseError};
use thiserror::Error;

/// A malformed message on the wire. The message is dropped; the connection
/// stays up.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A header line without a `name: value` shape.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// The header block ended without a `Content-Length`.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// `Content-Length` is not a number.
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    /// The body exceeds the size limit and was skipped.
    #[error("message body of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Announced body size.
        size: usize,
        /// Maximum accepted size.
        limit: usize,
    },

    /// The body is not UTF-8.
    #[error("message body is not valid UTF-8")]
    InvalidUtf8,

    /// The body is not a JSON-RPC message.
    #[error("invalid JSON-RPC payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A notification whose params do not match its method.
    #[error("invalid params for {method}: {message}")]
    InvalidParams {
        /// The notification method.
        method: String,
        /// Why decoding failed.
        message: String,
    },
}

/// Misuse of the document store contract by the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// The URI is not open.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// The URI is already open.
    #[error("document already open: {0}")]
    DuplicateDocument(String),

    /// A change whose version does not directly follow the current one.
    #[error("stale version for {uri}: expected {expected}, got {received}")]
    StaleVersion {
        /// The document.
        uri: String,
        /// The only version that would have been accepted.
        expected: i32,
        /// The version the client sent.
        received: i32,
    },

    /// Two edits in one change touch the same text.
    #[error("overlapping edits in change to {0}")]
    OverlappingEdits(String),

    /// An edit range outside the document or with its end before its start.
    #[error("invalid range in change to {uri}: {detail}")]
    InvalidRange {
        /// The document.
        uri: String,
        /// What was wrong with the range.
        detail: String,
    },
}

impl DocumentError {
    /// The variant name, sent to clients as `error.data.kind`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownDocument(_) => "UnknownDocument",
            Self::DuplicateDocument(_) => "DuplicateDocument",
            Self::StaleVersion { .. } => "StaleVersion",
            Self::OverlappingEdits(_) => "OverlappingEdits",
            Self::InvalidRange { .. } => "InvalidRange",
        }
    }

    /// JSON-RPC error code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownDocument(_) | Self::OverlappingEdits(_) | Self::InvalidRange { .. } => {
                ErrorCode::InvalidParams
            }
            Self::DuplicateDocument(_) => ErrorCode::InvalidRequest,
            Self::StaleVersion { .. } => ErrorCode::ContentModified,
        }
    }

    /// Convert into a JSON-RPC error object.
    pub fn to_response_error(&self) -> ResponseError {
        ResponseError {
            code: self.code() as i32,
            message: self.to_string(),
            data: Some(serde_json::json!({ "kind": self.kind() })),
        }
    }
}

/// Fatal server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The connection to the client is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// The worker pool could not be started.
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// An I/O thread could not be spawned or panicked.
    #[error("I/O thread failure: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_version_response() {
        let err = DocumentError::StaleVersion {
            uri: "file:///doc1".to_string(),
            expected: 3,
            received: 5,
        };
        let response = err.to_response_error();
        assert_eq!(response.code, ErrorCode::ContentModified as i32);
        assert_eq!(
            response.message,
            "stale version for file:///doc1: expected 3, got 5"
        );
        assert_eq!(response.data, Some(serde_json::json!({"kind": "StaleVersion"})));
    }

    #[test]
    fn test_unknown_document_is_invalid_params() {
        let err = DocumentError::UnknownDocument("file:///gone".to_string());
        assert_eq!(err.code() as i32, ErrorCode::InvalidParams as i32);
        assert_eq!(err.kind(), "UnknownDocument");
    }
}
