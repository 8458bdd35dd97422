//! Per-version WS-Addressing vocabulary.

use crate::qname::QName;
use crate::soap::HeaderElement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const WSA_200408_NS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
pub const WSA_10_NS: &str = "http://www.w3.org/2005/08/addressing";
pub const WSA_200605_NS: &str = "http://www.w3.org/2006/05/addressing";

/// Supported WS-Addressing versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressingVersion {
    /// August 2004 submission
    #[serde(rename = "200408")]
    V200408,
    /// W3C recommendation (May 2006, namespace dated 2005/08)
    #[serde(rename = "1.0")]
    V10,
    /// W3C candidate recommendation namespace
    #[serde(rename = "200605")]
    V200605,
}

impl AddressingVersion {
    pub const ALL: [AddressingVersion; 3] = [Self::V200408, Self::V10, Self::V200605];

    pub fn namespace_uri(&self) -> &'static str {
        match self {
            Self::V200408 => WSA_200408_NS,
            Self::V10 => WSA_10_NS,
            Self::V200605 => WSA_200605_NS,
        }
    }

    pub fn prefix(&self) -> &'static str {
        "wsa"
    }

    pub fn anonymous_uri(&self) -> String {
        match self {
            Self::V200408 => format!("{WSA_200408_NS}/role/anonymous"),
            _ => format!("{}/anonymous", self.namespace_uri()),
        }
    }

    /// The "none" address. The 2004/08 submission has no such concept.
    pub fn none_uri(&self) -> Option<String> {
        match self {
            Self::V200408 => None,
            _ => Some(format!("{}/none", self.namespace_uri())),
        }
    }

    pub fn default_fault_action(&self) -> String {
        format!("{}/fault", self.namespace_uri())
    }

    /// `To` must be present; later versions default it to anonymous.
    pub fn requires_to(&self) -> bool {
        matches!(self, Self::V200408)
    }

    /// `MessageID` must be present even when no reply is expected.
    pub fn always_requires_message_id(&self) -> bool {
        matches!(self, Self::V200408)
    }

    pub fn supports_reference_properties(&self) -> bool {
        matches!(self, Self::V200408)
    }

    /// Whether echoed reference parameters are marked with
    /// `IsReferenceParameter`.
    pub fn marks_reference_parameters(&self) -> bool {
        !matches!(self, Self::V200408)
    }

    pub fn name(&self, local: &str) -> QName {
        QName::new(self.namespace_uri(), local).with_prefix(self.prefix())
    }

    pub fn to_name(&self) -> QName {
        self.name("To")
    }

    pub fn from_name(&self) -> QName {
        self.name("From")
    }

    pub fn reply_to_name(&self) -> QName {
        self.name("ReplyTo")
    }

    pub fn fault_to_name(&self) -> QName {
        self.name("FaultTo")
    }

    pub fn action_name(&self) -> QName {
        self.name("Action")
    }

    pub fn message_id_name(&self) -> QName {
        self.name("MessageID")
    }

    pub fn relates_to_name(&self) -> QName {
        self.name("RelatesTo")
    }

    pub fn address_name(&self) -> QName {
        self.name("Address")
    }

    pub fn reference_parameters_name(&self) -> QName {
        self.name("ReferenceParameters")
    }

    pub fn reference_properties_name(&self) -> Option<QName> {
        self.supports_reference_properties()
            .then(|| self.name("ReferenceProperties"))
    }

    pub fn is_reference_parameter_name(&self) -> QName {
        self.name("IsReferenceParameter")
    }

    /// Fault detail entry naming the offending header.
    pub fn problem_header_qname_name(&self) -> Option<QName> {
        (!matches!(self, Self::V200408)).then(|| self.name("ProblemHeaderQName"))
    }

    /// Headers this version knows how to process.
    pub fn known_headers(&self) -> [QName; 7] {
        [
            self.to_name(),
            self.from_name(),
            self.reply_to_name(),
            self.fault_to_name(),
            self.action_name(),
            self.message_id_name(),
            self.relates_to_name(),
        ]
    }

    pub fn header_required_fault_subcode(&self) -> QName {
        match self {
            Self::V200408 => self.name("MessageInformationHeaderRequired"),
            _ => self.name("MessageAddressingHeaderRequired"),
        }
    }

    pub fn header_required_fault_reason(&self) -> &'static str {
        match self {
            Self::V200408 => {
                "A required message information header, To, MessageID, or Action, is not present."
            }
            _ => "A required header representing a Message Addressing Property is not present",
        }
    }

    pub fn invalid_header_fault_subcode(&self) -> QName {
        match self {
            Self::V200408 => self.name("InvalidMessageInformationHeader"),
            _ => self.name("InvalidAddressingHeader"),
        }
    }

    pub fn invalid_header_fault_reason(&self) -> &'static str {
        match self {
            Self::V200408 => {
                "A message information header is not valid and the message cannot be processed."
            }
            _ => {
                "A header representing a Message Addressing Property is not valid and the message cannot be processed"
            }
        }
    }

    /// Whether `header` belongs to this version's namespace.
    pub fn understands(&self, header: &HeaderElement) -> bool {
        header.content().name().namespace() == self.namespace_uri()
    }

    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.namespace_uri() == namespace)
    }
}

impl fmt::Display for AddressingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::V200408 => "WS-Addressing 200408",
            Self::V10 => "WS-Addressing 1.0",
            Self::V200605 => "WS-Addressing 200605",
        };
        f.write_str(name)
    }
}

impl FromStr for AddressingVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "200408" => Ok(Self::V200408),
            "1.0" | "10" | "200508" => Ok(Self::V10),
            "200605" => Ok(Self::V200605),
            other => Err(format!("unknown WS-Addressing version: {other}")),
        }
    }
}
