//! Protocol constants for SOAP 1.1 and SOAP 1.2.

use crate::qname::QName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SOAP 1.1 envelope namespace.
pub const SOAP_11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// SOAP 1.2 envelope namespace.
pub const SOAP_12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

const SOAP_11_CONTENT_TYPE: &str = "text/xml";
const SOAP_12_CONTENT_TYPE: &str = "application/soap+xml";

const SOAP_11_NEXT_ACTOR: &str = "http://schemas.xmlsoap.org/soap/actor/next";
const SOAP_12_NEXT_ROLE: &str = "http://www.w3.org/2003/05/soap-envelope/role/next";
const SOAP_12_NONE_ROLE: &str = "http://www.w3.org/2003/05/soap-envelope/role/none";
const SOAP_12_ULTIMATE_RECEIVER_ROLE: &str =
    "http://www.w3.org/2003/05/soap-envelope/role/ultimateReceiver";

/// SOAP protocol version.
///
/// Every element of a message tree is built for exactly one version; the
/// version value supplies the names and URIs that differ between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoapVersion {
    /// SOAP 1.1 (namespace: http://schemas.xmlsoap.org/soap/envelope/)
    #[serde(rename = "1.1")]
    Soap11,
    /// SOAP 1.2 (namespace: http://www.w3.org/2003/05/soap-envelope)
    #[serde(rename = "1.2")]
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_11_NS,
            Self::Soap12 => SOAP_12_NS,
        }
    }

    /// Prefix used when writing envelope elements.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Soap11 => "SOAP-ENV",
            Self::Soap12 => "env",
        }
    }

    /// Media type without parameters.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_11_CONTENT_TYPE,
            Self::Soap12 => SOAP_12_CONTENT_TYPE,
        }
    }

    /// The "next" actor (1.1) or role (1.2) URI.
    pub fn next_actor_or_role_uri(&self) -> &'static str {
        match self {
            Self::Soap11 => SOAP_11_NEXT_ACTOR,
            Self::Soap12 => SOAP_12_NEXT_ROLE,
        }
    }

    /// The "none" role. SOAP 1.1 has no such role.
    pub fn none_role_uri(&self) -> Option<&'static str> {
        match self {
            Self::Soap11 => None,
            Self::Soap12 => Some(SOAP_12_NONE_ROLE),
        }
    }

    /// The "ultimateReceiver" role. SOAP 1.1 has no such role.
    pub fn ultimate_receiver_role_uri(&self) -> Option<&'static str> {
        match self {
            Self::Soap11 => None,
            Self::Soap12 => Some(SOAP_12_ULTIMATE_RECEIVER_ROLE),
        }
    }

    fn qname(&self, local: &str) -> QName {
        QName::new(self.envelope_namespace(), local).with_prefix(self.prefix())
    }

    pub fn envelope_name(&self) -> QName {
        self.qname("Envelope")
    }

    pub fn header_name(&self) -> QName {
        self.qname("Header")
    }

    pub fn body_name(&self) -> QName {
        self.qname("Body")
    }

    pub fn fault_name(&self) -> QName {
        self.qname("Fault")
    }

    /// `actor` (1.1) or `role` (1.2) header attribute.
    pub fn actor_or_role_name(&self) -> QName {
        match self {
            Self::Soap11 => self.qname("actor"),
            Self::Soap12 => self.qname("role"),
        }
    }

    pub fn must_understand_attribute_name(&self) -> QName {
        self.qname("mustUnderstand")
    }

    /// The `relay` attribute exists in SOAP 1.2 only.
    pub fn relay_attribute_name(&self) -> Option<QName> {
        match self {
            Self::Soap11 => None,
            Self::Soap12 => Some(self.qname("relay")),
        }
    }

    /// Lexical form written for a true boolean attribute.
    pub fn true_literal(&self) -> &'static str {
        match self {
            Self::Soap11 => "1",
            Self::Soap12 => "true",
        }
    }

    pub fn client_or_sender_fault_name(&self) -> QName {
        match self {
            Self::Soap11 => self.qname("Client"),
            Self::Soap12 => self.qname("Sender"),
        }
    }

    pub fn server_or_receiver_fault_name(&self) -> QName {
        match self {
            Self::Soap11 => self.qname("Server"),
            Self::Soap12 => self.qname("Receiver"),
        }
    }

    pub fn must_understand_fault_name(&self) -> QName {
        self.qname("MustUnderstand")
    }

    pub fn version_mismatch_fault_name(&self) -> QName {
        self.qname("VersionMismatch")
    }

    /// Whether `name` is one of the four standard fault codes of this version.
    pub fn is_standard_fault_code(&self, name: &QName) -> bool {
        name == &self.client_or_sender_fault_name()
            || name == &self.server_or_receiver_fault_name()
            || name == &self.must_understand_fault_name()
            || name == &self.version_mismatch_fault_name()
    }

    /// Whether the SOAP action travels as a `Content-Type` parameter.
    pub fn action_in_content_type(&self) -> bool {
        matches!(self, Self::Soap12)
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP_11_NS => Some(Self::Soap11),
            SOAP_12_NS => Some(Self::Soap12),
            _ => None,
        }
    }

    /// Detect the version from a media type (parameters are ignored).
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let media_type = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match media_type.as_str() {
            SOAP_11_CONTENT_TYPE => Some(Self::Soap11),
            SOAP_12_CONTENT_TYPE => Some(Self::Soap12),
            _ => None,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soap11 => write!(f, "SOAP 1.1"),
            Self::Soap12 => write!(f, "SOAP 1.2"),
        }
    }
}

/// Parse an `xsd:boolean` attribute value.
pub(crate) fn parse_boolean(value: &str) -> bool {
    matches!(value.trim(), "1" | "true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constants() {
        assert_eq!(SoapVersion::Soap11.content_type(), "text/xml");
        assert_eq!(SoapVersion::Soap12.content_type(), "application/soap+xml");
        assert_eq!(
            SoapVersion::Soap11.client_or_sender_fault_name().local_part(),
            "Client"
        );
        assert_eq!(
            SoapVersion::Soap12.server_or_receiver_fault_name().local_part(),
            "Receiver"
        );
        assert_eq!(SoapVersion::Soap11.actor_or_role_name().local_part(), "actor");
        assert_eq!(SoapVersion::Soap12.actor_or_role_name().local_part(), "role");
    }

    #[test]
    fn test_none_role_only_in_soap12() {
        assert!(SoapVersion::Soap11.none_role_uri().is_none());
        assert!(SoapVersion::Soap11.relay_attribute_name().is_none());
        assert!(SoapVersion::Soap12.none_role_uri().is_some());
        assert!(SoapVersion::Soap12.ultimate_receiver_role_uri().is_some());
    }

    #[test]
    fn test_detection() {
        assert_eq!(SoapVersion::from_namespace(SOAP_11_NS), Some(SoapVersion::Soap11));
        assert_eq!(SoapVersion::from_namespace("urn:other"), None);
        assert_eq!(
            SoapVersion::from_media_type("Application/SOAP+XML; charset=utf-8; action=\"urn:a\""),
            Some(SoapVersion::Soap12)
        );
        assert_eq!(
            SoapVersion::from_media_type("text/xml;charset=UTF-8"),
            Some(SoapVersion::Soap11)
        );
        assert_eq!(SoapVersion::from_media_type("application/json"), None);
    }

    #[test]
    fn test_standard_fault_codes() {
        let v = SoapVersion::Soap12;
        assert!(v.is_standard_fault_code(&QName::new(SOAP_12_NS, "Sender")));
        assert!(!v.is_standard_fault_code(&QName::new(SOAP_12_NS, "Client")));
        assert!(!v.is_standard_fault_code(&QName::new("urn:app", "Sender")));
    }

    #[test]
    fn test_parse_boolean() {
        assert!(parse_boolean("1"));
        assert!(parse_boolean(" true "));
        assert!(!parse_boolean("0"));
        assert!(!parse_boolean("false"));
    }
}
