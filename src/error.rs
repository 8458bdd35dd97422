//! Error types for the SOAP dispatcher.

use crate::soap::{FaultDefinition, SoapVersion};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// SOAP dispatcher errors.
#[derive(Error, Debug)]
pub enum SoapError {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error(
        "Not a valid SOAP message{}: {reason}",
        .version.map(|v| format!(" of version {v}")).unwrap_or_default()
    )]
    InvalidMessage {
        version: Option<SoapVersion>,
        reason: String,
    },

    #[error("Transformation failed: {0}")]
    Transformation(String),

    #[error("Invalid SOAP fault: {0}")]
    InvalidFault(String),

    #[error("WS-Addressing error: {0}")]
    Addressing(String),

    #[error("No endpoint found for {0}")]
    NoEndpointFound(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("Interceptor error: {0}")]
    Interceptor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SoapError {
    /// Construct an [`SoapError::InvalidMessage`] for a known version.
    pub fn invalid_message(version: SoapVersion, reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            version: Some(version),
            reason: reason.into(),
        }
    }

    /// Kind used by the exception registry to look up a fault definition.
    pub fn kind(&self) -> &str {
        match self {
            Self::XmlParse(_) => "xml_parse",
            Self::InvalidMessage { .. } => "invalid_message",
            Self::Transformation(_) => "transformation",
            Self::InvalidFault(_) => "invalid_fault",
            Self::Addressing(_) => "addressing",
            Self::NoEndpointFound(_) => "no_endpoint_found",
            Self::Endpoint(e) => e.kind(),
            Self::Interceptor(_) => "interceptor",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }

    /// Fault declared by the failing endpoint, if any.
    pub fn declared_fault(&self) -> Option<&FaultDefinition> {
        match self {
            Self::Endpoint(e) => e.declared_fault(),
            _ => None,
        }
    }

    /// Message suitable for a fault reason.
    pub fn reason(&self) -> String {
        match self {
            Self::Endpoint(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the inbound message itself was unusable.
    pub fn is_malformed_message(&self) -> bool {
        matches!(self, Self::XmlParse(_) | Self::InvalidMessage { .. })
    }
}

/// Error raised by application endpoints.
///
/// The kind is a dotted path (`validation.range`) so exception mappings
/// registered for a prefix (`validation`) also apply to more specific kinds.
#[derive(Debug)]
pub struct EndpointError {
    kind: String,
    message: String,
    fault: Option<FaultDefinition>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl EndpointError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            fault: None,
            source: None,
        }
    }

    /// Wrap an arbitrary error under the given kind.
    pub fn from_error<E>(kind: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            message: error.to_string(),
            fault: None,
            source: Some(Box::new(error)),
        }
    }

    /// Declare the fault this error maps to.
    pub fn with_fault(mut self, fault: FaultDefinition) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn declared_fault(&self) -> Option<&FaultDefinition> {
        self.fault.as_ref()
    }
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EndpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Violation codes raised by payload validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationCode {
    /// Payload nesting depth exceeded
    BodyDepthExceeded,
    /// Too many elements
    TooManyElements,
    /// Text content too long
    TextTooLong,
    /// CDATA not allowed
    CdataNotAllowed,
    /// Comment not allowed
    CommentNotAllowed,
    /// Missing required namespace
    MissingNamespace,
    /// Body carries no payload
    MissingPayload,
}

impl ViolationCode {
    /// Get the string code for this violation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BodyDepthExceeded => "BODY_DEPTH_EXCEEDED",
            Self::TooManyElements => "TOO_MANY_ELEMENTS",
            Self::TextTooLong => "TEXT_TOO_LONG",
            Self::CdataNotAllowed => "CDATA_NOT_ALLOWED",
            Self::CommentNotAllowed => "COMMENT_NOT_ALLOWED",
            Self::MissingNamespace => "MISSING_NAMESPACE",
            Self::MissingPayload => "MISSING_PAYLOAD",
        }
    }
}

/// A validation violation detected in a message payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Violation code
    pub code: ViolationCode,
    /// Human-readable message
    pub message: String,
    /// Location hint (if available)
    pub location: Option<String>,
}

impl Violation {
    /// Create a new violation.
    pub fn new(code: ViolationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// Create a violation with location.
    pub fn with_location(
        code: ViolationCode,
        message: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_violation_code_as_str() {
        assert_eq!(ViolationCode::TooManyElements.as_str(), "TOO_MANY_ELEMENTS");
        assert_eq!(ViolationCode::BodyDepthExceeded.as_str(), "BODY_DEPTH_EXCEEDED");
    }

    #[test]
    fn test_invalid_message_display() {
        let err = SoapError::invalid_message(SoapVersion::Soap11, "missing Body");
        assert_eq!(
            err.to_string(),
            "Not a valid SOAP message of version SOAP 1.1: missing Body"
        );

        let err = SoapError::InvalidMessage {
            version: None,
            reason: "empty".to_string(),
        };
        assert_eq!(err.to_string(), "Not a valid SOAP message: empty");
        assert!(err.is_malformed_message());
    }

    #[test]
    fn test_endpoint_error_kind_and_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = EndpointError::from_error("storage.io", io);
        assert_eq!(err.kind(), "storage.io");
        assert_eq!(err.message(), "disk on fire");
        assert!(err.source().is_some());

        let wrapped = SoapError::from(err);
        assert_eq!(wrapped.kind(), "storage.io");
        assert_eq!(wrapped.reason(), "disk on fire");
        assert!(wrapped.declared_fault().is_none());
    }

    #[test]
    fn test_declared_fault() {
        let err = EndpointError::new("validation", "boom")
            .with_fault(FaultDefinition::client_or_sender("bad input"));
        let wrapped = SoapError::Endpoint(err);
        assert_eq!(wrapped.declared_fault().unwrap().reason(), Some("bad input"));
    }
}
