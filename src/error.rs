//! Error types for rust-restconf
//!
//! Two layers live here: the internal crate error (`RestconfError`) used by
//! fallible operations, and the NETCONF error records (RFC 6241 appendix A)
//! that are rendered into RESTCONF `errors` containers with their canonical
//! HTTP status mapping.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Main error type for restconf operations
#[derive(Debug, Error)]
pub enum RestconfError {
    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing/serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// XML parsing/serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// Invalid schema manifest or schema metadata
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Resource identifier could not be resolved against the schema
    #[error("unresolvable resource identifier: {0}")]
    UnresolvablePath(String),

    /// Tree query addressed no existing data node
    #[error("data node not found: {0}")]
    DataMissing(String),

    /// Media type not supported for the requested representation
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// RPC invocation error
    #[error("rpc failed: {0}")]
    RpcFailed(String),
}

/// Result type alias for restconf operations
pub type Result<T> = std::result::Result<T, RestconfError>;

/// RFC 6241 4.3 error-type: the conceptual layer the error occurred in.
///
/// * transport (layer: Secure Transport)
/// * rpc (layer: Messages)
/// * protocol (layer: Operations)
/// * application (layer: Content)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// Error related to a schema or data node
    Application,
    /// Error in an operation (including user-defined rpc)
    Protocol,
    /// Error in message format
    Rpc,
    /// Error in HTTP/TLS
    Transport,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Application => "application",
            ErrorType::Protocol => "protocol",
            ErrorType::Rpc => "rpc",
            ErrorType::Transport => "transport",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 6241 appendix A error-tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorTag {
    InUse,
    InvalidValue,
    TooBig,
    MissingAttribute,
    BadAttribute,
    UnknownAttribute,
    MissingElement,
    BadElement,
    UnknownElement,
    UnknownNamespace,
    AccessDenied,
    LockDenied,
    ResourceDenied,
    RollbackFailed,
    DataExists,
    DataMissing,
    OperationNotSupported,
    OperationFailed,
    PartialOperation,
    MalformedMessage,
}

impl ErrorTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorTag::InUse => "in-use",
            ErrorTag::InvalidValue => "invalid-value",
            ErrorTag::TooBig => "too-big",
            ErrorTag::MissingAttribute => "missing-attribute",
            ErrorTag::BadAttribute => "bad-attribute",
            ErrorTag::UnknownAttribute => "unknown-attribute",
            ErrorTag::MissingElement => "missing-element",
            ErrorTag::BadElement => "bad-element",
            ErrorTag::UnknownElement => "unknown-element",
            ErrorTag::UnknownNamespace => "unknown-namespace",
            ErrorTag::AccessDenied => "access-denied",
            ErrorTag::LockDenied => "lock-denied",
            ErrorTag::ResourceDenied => "resource-denied",
            ErrorTag::RollbackFailed => "rollback-failed",
            ErrorTag::DataExists => "data-exists",
            ErrorTag::DataMissing => "data-missing",
            ErrorTag::OperationNotSupported => "operation-not-supported",
            ErrorTag::OperationFailed => "operation-failed",
            ErrorTag::PartialOperation => "partial-operation",
            ErrorTag::MalformedMessage => "malformed-message",
        }
    }

    /// Canonical HTTP status for the tag, one status per tag.
    ///
    /// +-------------------------+------------------+
    /// | error-tag               | status code      |
    /// +-------------------------+------------------+
    /// | in-use                  | 409              |
    /// | invalid-value           | 400              |
    /// | too-big                 | 413              |
    /// | missing-attribute       | 400              |
    /// | bad-attribute           | 400              |
    /// | unknown-attribute       | 400              |
    /// | missing-element         | 400              |
    /// | bad-element             | 400              |
    /// | unknown-element         | 400              |
    /// | unknown-namespace       | 400              |
    /// | access-denied           | 401              |
    /// | lock-denied             | 409              |
    /// | resource-denied         | 409              |
    /// | rollback-failed         | 500              |
    /// | data-exists             | 409              |
    /// | data-missing            | 409              |
    /// | operation-not-supported | 501              |
    /// | operation-failed        | 500              |
    /// | partial-operation       | 500              |
    /// | malformed-message       | 400              |
    /// +-------------------------+------------------+
    pub fn status(self) -> StatusCode {
        match self {
            ErrorTag::InUse => StatusCode::CONFLICT,
            ErrorTag::InvalidValue => StatusCode::BAD_REQUEST,
            ErrorTag::TooBig => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorTag::MissingAttribute => StatusCode::BAD_REQUEST,
            ErrorTag::BadAttribute => StatusCode::BAD_REQUEST,
            ErrorTag::UnknownAttribute => StatusCode::BAD_REQUEST,
            ErrorTag::MissingElement => StatusCode::BAD_REQUEST,
            ErrorTag::BadElement => StatusCode::BAD_REQUEST,
            ErrorTag::UnknownElement => StatusCode::BAD_REQUEST,
            ErrorTag::UnknownNamespace => StatusCode::BAD_REQUEST,
            ErrorTag::AccessDenied => StatusCode::UNAUTHORIZED,
            ErrorTag::LockDenied => StatusCode::CONFLICT,
            ErrorTag::ResourceDenied => StatusCode::CONFLICT,
            ErrorTag::RollbackFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorTag::DataExists => StatusCode::CONFLICT,
            ErrorTag::DataMissing => StatusCode::CONFLICT,
            ErrorTag::OperationNotSupported => StatusCode::NOT_IMPLEMENTED,
            ErrorTag::OperationFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorTag::PartialOperation => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorTag::MalformedMessage => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the RESTCONF `errors/error` list.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    #[serde(rename = "error-type")]
    pub error_type: ErrorType,
    #[serde(rename = "error-tag")]
    pub error_tag: ErrorTag,
    #[serde(rename = "error-path", skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,
    #[serde(rename = "error-message", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ErrorRecord {
    pub fn new(
        error_type: ErrorType,
        error_tag: ErrorTag,
        error_path: Option<String>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            error_type,
            error_tag,
            error_path,
            error_message,
        }
    }

    /// The HTTP status this record maps to.
    pub fn status(&self) -> StatusCode {
        self.error_tag.status()
    }
}

/// Build the `errors` container value for an ordered error sequence.
///
/// The shape is fixed by ietf-restconf: a single `error` list under the
/// `errors` container, entries in the order they were recorded.
pub fn errors_container(errors: &[ErrorRecord]) -> serde_json::Value {
    serde_json::json!({ "error": errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TAGS: [(ErrorTag, u16); 20] = [
        (ErrorTag::InUse, 409),
        (ErrorTag::InvalidValue, 400),
        (ErrorTag::TooBig, 413),
        (ErrorTag::MissingAttribute, 400),
        (ErrorTag::BadAttribute, 400),
        (ErrorTag::UnknownAttribute, 400),
        (ErrorTag::MissingElement, 400),
        (ErrorTag::BadElement, 400),
        (ErrorTag::UnknownElement, 400),
        (ErrorTag::UnknownNamespace, 400),
        (ErrorTag::AccessDenied, 401),
        (ErrorTag::LockDenied, 409),
        (ErrorTag::ResourceDenied, 409),
        (ErrorTag::RollbackFailed, 500),
        (ErrorTag::DataExists, 409),
        (ErrorTag::DataMissing, 409),
        (ErrorTag::OperationNotSupported, 501),
        (ErrorTag::OperationFailed, 500),
        (ErrorTag::PartialOperation, 500),
        (ErrorTag::MalformedMessage, 400),
    ];

    #[test]
    fn test_tag_status_mapping() {
        for (tag, status) in ALL_TAGS {
            assert_eq!(tag.status().as_u16(), status, "tag {}", tag);
        }
    }

    #[test]
    fn test_tag_status_independent_of_type() {
        for etype in [
            ErrorType::Application,
            ErrorType::Protocol,
            ErrorType::Rpc,
            ErrorType::Transport,
        ] {
            let record = ErrorRecord::new(etype, ErrorTag::DataMissing, None, None);
            assert_eq!(record.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_record_serialization() {
        let record = ErrorRecord::new(
            ErrorType::Application,
            ErrorTag::DataMissing,
            Some("/modules-state/module".into()),
            None,
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["error-type"], "application");
        assert_eq!(value["error-tag"], "data-missing");
        assert_eq!(value["error-path"], "/modules-state/module");
        assert!(value.get("error-message").is_none());
    }

    #[test]
    fn test_errors_container_shape() {
        let records = vec![
            ErrorRecord::new(ErrorType::Protocol, ErrorTag::OperationNotSupported, None, None),
            ErrorRecord::new(ErrorType::Application, ErrorTag::DataMissing, None, None),
        ];
        let container = errors_container(&records);
        let list = container["error"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["error-tag"], "operation-not-supported");
        assert_eq!(list[1]["error-tag"], "data-missing");
    }
}
