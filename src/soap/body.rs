//! SOAP body: a single payload element or a single fault.

use super::fault::{Fault, FaultCode, FaultDefinition};
use super::{SoapElement, SoapVersion};
use crate::error::SoapError;
use crate::qname::QName;
use crate::xml::{XmlAttribute, XmlElement, XmlNode, XmlSink};

/// Current body content.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BodyContent {
    #[default]
    Empty,
    Payload(XmlElement),
    Fault(Fault),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    version: SoapVersion,
    attributes: Vec<XmlAttribute>,
    namespaces: Vec<(String, String)>,
    content: BodyContent,
}

impl Body {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            content: BodyContent::Empty,
        }
    }

    pub(crate) fn with_parts(
        version: SoapVersion,
        attributes: Vec<XmlAttribute>,
        namespaces: Vec<(String, String)>,
        content: BodyContent,
    ) -> Self {
        Self {
            version,
            attributes,
            namespaces,
            content,
        }
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn content(&self) -> &BodyContent {
        &self.content
    }

    /// The payload element, if the body carries one.
    pub fn payload_source(&self) -> Option<&XmlElement> {
        match &self.content {
            BodyContent::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn payload_mut(&mut self) -> Option<&mut XmlElement> {
        match &mut self.content {
            BodyContent::Payload(payload) => Some(payload),
            _ => None,
        }
    }

    /// Replace the content (payload or fault) with `payload`.
    pub fn set_payload(&mut self, payload: XmlElement) {
        self.content = BodyContent::Payload(payload);
    }

    pub fn take_payload(&mut self) -> Option<XmlElement> {
        match std::mem::take(&mut self.content) {
            BodyContent::Payload(payload) => Some(payload),
            other => {
                self.content = other;
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.content = BodyContent::Empty;
    }

    pub fn has_fault(&self) -> bool {
        matches!(self.content, BodyContent::Fault(_))
    }

    pub fn fault(&self) -> Option<&Fault> {
        match &self.content {
            BodyContent::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn fault_mut(&mut self) -> Option<&mut Fault> {
        match &mut self.content {
            BodyContent::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    fn install_fault(&mut self, fault: Fault) -> Result<&mut Fault, SoapError> {
        self.content = BodyContent::Fault(fault);
        self.fault_mut()
            .ok_or_else(|| SoapError::InvalidFault("fault was not installed".to_string()))
    }

    /// Replace the content with a fault of the given code.
    ///
    /// Custom codes are only accepted for SOAP 1.1.
    pub fn add_fault(
        &mut self,
        code: QName,
        reason: &str,
        locale: Option<&str>,
    ) -> Result<&mut Fault, SoapError> {
        let fault = Fault::new(self.version, code, reason, locale)?;
        self.install_fault(fault)
    }

    pub fn add_must_understand_fault(
        &mut self,
        reason: &str,
        locale: Option<&str>,
    ) -> Result<&mut Fault, SoapError> {
        self.add_fault(self.version.must_understand_fault_name(), reason, locale)
    }

    pub fn add_client_or_sender_fault(
        &mut self,
        reason: &str,
        locale: Option<&str>,
    ) -> Result<&mut Fault, SoapError> {
        self.add_fault(self.version.client_or_sender_fault_name(), reason, locale)
    }

    pub fn add_server_or_receiver_fault(
        &mut self,
        reason: &str,
        locale: Option<&str>,
    ) -> Result<&mut Fault, SoapError> {
        self.add_fault(self.version.server_or_receiver_fault_name(), reason, locale)
    }

    pub fn add_version_mismatch_fault(
        &mut self,
        reason: &str,
        locale: Option<&str>,
    ) -> Result<&mut Fault, SoapError> {
        self.add_fault(self.version.version_mismatch_fault_name(), reason, locale)
    }

    /// Add the fault described by `definition`, using `fallback_reason`
    /// when the definition has no reason of its own.
    pub fn add_fault_from_definition(
        &mut self,
        definition: &FaultDefinition,
        fallback_reason: &str,
    ) -> Result<&mut Fault, SoapError> {
        let reason = definition.reason().unwrap_or(fallback_reason);
        let code = match definition.code() {
            FaultCode::Custom(name) => name.clone(),
            standard => standard.qname(self.version),
        };
        self.add_fault(code, reason, Some(definition.locale()))
    }
}

impl SoapElement for Body {
    fn name(&self) -> QName {
        self.version.body_name()
    }

    fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        &mut self.attributes
    }

    fn to_source(&self) -> XmlElement {
        let mut body = XmlElement::new(self.name());
        *body.attributes_mut() = self.attributes.clone();
        for (prefix, uri) in &self.namespaces {
            body.declare_namespace(prefix.clone(), uri.clone());
        }
        match &self.content {
            BodyContent::Empty => {}
            BodyContent::Payload(payload) => body.push_element(payload.clone()),
            BodyContent::Fault(fault) => body.push_element(fault.to_source()),
        }
        body
    }
}

/// Writing an element into the body sets the payload.
impl XmlSink for Body {
    fn write_node(&mut self, node: XmlNode) -> Result<(), SoapError> {
        match node {
            XmlNode::Element(element) => {
                self.set_payload(element);
                Ok(())
            }
            XmlNode::Text(t) if t.trim().is_empty() => Ok(()),
            XmlNode::Comment(_) => Ok(()),
            _ => Err(SoapError::Transformation(
                "body payload must be a single element".to_string(),
            )),
        }
    }
}
