//! Client error types

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Phase of the multipart protocol that produced a terminal outcome.
///
/// An Init failure leaves no remote state, an Upload failure leaves an
/// allocated upload id and partial parts, and a Complete failure leaves the
/// upload id allocated with all parts uploaded. Callers branch on this tag
/// to decide what remote cleanup or retry is still possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// The Initiate request.
    Init,
    /// Uploading of individual parts.
    Upload,
    /// The Complete request.
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => write!(f, "Init"),
            Stage::Upload => write!(f, "Upload"),
            Stage::Complete => write!(f, "Complete"),
        }
    }
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Structured error reply from the service
    #[error("service error ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
        request_id: Option<String>,
        resource: Option<String>,
    },

    /// Response body did not parse or misses its expected root element
    #[error("malformed response body: {0}")]
    MalformedBody(String),

    /// Part plan cannot be built from the given size and part size
    #[error("invalid part plan: {0}")]
    InvalidPlan(String),

    /// A part exhausted its retries or hit a fatal status
    #[error("part {part_number} upload failed: {reason}")]
    PartUploadFailed { part_number: u32, reason: String },

    /// Manifest requested before every part succeeded
    #[error("upload incomplete: {0}")]
    Incomplete(String),

    /// A single upload attempt exceeded its receive timeout
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// A phase of the multipart protocol failed terminally
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<ClientError>,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Decode an `<Error>` reply body returned with a non-2xx status.
    ///
    /// Falls back to a status-only error when the body is not a well-formed
    /// error document, so a bare 500 with an HTML body still surfaces.
    pub fn from_error_xml(body: &[u8], status: u16) -> Self {
        let root = match crate::decode::decode_xml(body, "Error") {
            Ok(root) => root,
            Err(_) => {
                return Self::Service {
                    status,
                    code: format!("HTTP{}", status),
                    message: "unknown error".to_string(),
                    request_id: None,
                    resource: None,
                };
            }
        };

        let mut code = format!("HTTP{}", status);
        let mut message = String::new();
        let mut request_id = None;
        let mut resource = None;
        for child in &root.children {
            match child.name.as_str() {
                "Code" => code = child.text.clone(),
                "Message" => message = child.text.clone(),
                "RequestId" => request_id = Some(child.text.clone()),
                "Resource" => resource = Some(child.text.clone()),
                "TraceId" => {}
                other => warn!(field = other, "unknown field in Error node"),
            }
        }

        Self::Service {
            status,
            code,
            message,
            request_id,
            resource,
        }
    }

    /// Whether a part worker may retry after this error.
    ///
    /// Network failures, attempt timeouts, server errors and throttling are
    /// transient; any other 4xx is fatal for the attempt cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout(_) => true,
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_xml() {
        let xml = br#"<?xml version="1.0"?>
<Error>
    <Code>NoSuchUpload</Code>
    <Message>The specified upload does not exist.</Message>
    <Resource>bucket-1/big.bin</Resource>
    <RequestId>NTk0MjdmODl</RequestId>
    <TraceId>OGVmYzZiMmQ</TraceId>
</Error>"#;

        let error = ClientError::from_error_xml(xml, 404);

        match error {
            ClientError::Service {
                status,
                code,
                message,
                request_id,
                resource,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "NoSuchUpload");
                assert_eq!(message, "The specified upload does not exist.");
                assert_eq!(request_id.as_deref(), Some("NTk0MjdmODl"));
                assert_eq!(resource.as_deref(), Some("bucket-1/big.bin"));
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[test]
    fn test_error_xml_fallback_on_garbage_body() {
        let error = ClientError::from_error_xml(b"<html>oops</html>", 500);
        match error {
            ClientError::Service { status, code, .. } => {
                assert_eq!(status, 500);
                assert_eq!(code, "HTTP500");
            }
            other => panic!("expected Service error, got {other:?}"),
        }
    }

    #[test]
    fn test_retryable_classification() {
        let throttle = ClientError::Service {
            status: 429,
            code: "SlowDown".into(),
            message: String::new(),
            request_id: None,
            resource: None,
        };
        assert!(throttle.is_retryable());

        let not_found = ClientError::Service {
            status: 404,
            code: "NoSuchKey".into(),
            message: String::new(),
            request_id: None,
            resource: None,
        };
        assert!(!not_found.is_retryable());

        assert!(ClientError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!ClientError::MalformedBody("x".into()).is_retryable());
    }
}
