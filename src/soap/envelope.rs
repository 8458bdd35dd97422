//! The SOAP envelope: root of the message tree.

use super::body::{Body, BodyContent};
use super::fault::Fault;
use super::header::Header;
use super::{SoapElement, SoapVersion};
use crate::error::SoapError;
use crate::qname::QName;
use crate::xml::{NamespaceScope, XmlAttribute, XmlElement, XmlNode};

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    version: SoapVersion,
    attributes: Vec<XmlAttribute>,
    namespaces: Vec<(String, String)>,
    header: Option<Header>,
    body: Body,
}

impl Envelope {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            attributes: Vec::new(),
            namespaces: vec![(
                version.prefix().to_string(),
                version.envelope_namespace().to_string(),
            )],
            header: None,
            body: Body::new(version),
        }
    }

    /// Build an envelope from a parsed document.
    ///
    /// With `expected` set, the root must be an envelope of that version;
    /// otherwise the version is taken from the root namespace.
    pub fn from_xml(root: XmlElement, expected: Option<SoapVersion>) -> Result<Self, SoapError> {
        let detected = SoapVersion::from_namespace(root.name().namespace());
        let version = match (expected, detected) {
            (Some(expected), Some(detected)) if expected == detected => expected,
            (Some(expected), _) => {
                return Err(SoapError::invalid_message(
                    expected,
                    format!("could not find envelope, root element is {}", root.name()),
                ))
            }
            (None, Some(detected)) => detected,
            (None, None) => {
                return Err(SoapError::InvalidMessage {
                    version: None,
                    reason: format!("unknown envelope namespace for root element {}", root.name()),
                })
            }
        };
        if root.name() != &version.envelope_name() {
            return Err(SoapError::invalid_message(
                version,
                format!("root element {} is not an Envelope", root.name()),
            ));
        }

        let mut scope = NamespaceScope::new();
        scope.enter(&root);
        let attributes = root.attributes().to_vec();
        let namespaces = root.namespaces().to_vec();

        let mut header = None;
        let mut body = None;
        for node in root.into_children() {
            let element = match node {
                XmlNode::Element(element) => element,
                XmlNode::Text(t) if !t.trim().is_empty() => {
                    return Err(SoapError::invalid_message(
                        version,
                        "unexpected text inside Envelope",
                    ))
                }
                _ => continue,
            };
            if element.name() == &version.header_name() && header.is_none() && body.is_none() {
                header = Some(Header::from_xml(version, element));
            } else if element.name() == &version.body_name() && body.is_none() {
                body = Some(Self::parse_body(version, element, &scope)?);
            } else {
                return Err(SoapError::invalid_message(
                    version,
                    format!("unexpected element {} inside Envelope", element.name()),
                ));
            }
        }

        let body = body.ok_or_else(|| SoapError::invalid_message(version, "missing Body"))?;
        Ok(Self {
            version,
            attributes,
            namespaces,
            header,
            body,
        })
    }

    fn parse_body(
        version: SoapVersion,
        element: XmlElement,
        scope: &NamespaceScope,
    ) -> Result<Body, SoapError> {
        let mut scope = scope.clone();
        scope.enter(&element);
        let attributes = element.attributes().to_vec();
        let namespaces = element.namespaces().to_vec();

        let mut payloads = Vec::new();
        for node in element.into_children() {
            match node {
                XmlNode::Element(e) => payloads.push(e),
                XmlNode::Text(t) if !t.trim().is_empty() => {
                    return Err(SoapError::invalid_message(version, "unexpected text inside Body"))
                }
                _ => {}
            }
        }
        if payloads.len() > 1 {
            return Err(SoapError::invalid_message(
                version,
                "Body must contain at most one payload element",
            ));
        }

        let content = match payloads.pop() {
            None => BodyContent::Empty,
            Some(e) if e.name() == &version.fault_name() => {
                BodyContent::Fault(Fault::from_xml(version, &e, &scope)?)
            }
            Some(e) => BodyContent::Payload(e),
        };
        Ok(Body::with_parts(version, attributes, namespaces, content))
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The header, created on first use.
    pub fn header_mut(&mut self) -> &mut Header {
        let version = self.version;
        self.header.get_or_insert_with(|| Header::new(version))
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn add_namespace_declaration(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.namespaces.iter_mut().find(|(p, _)| *p == prefix) {
            Some(binding) => binding.1 = uri,
            None => self.namespaces.push((prefix, uri)),
        }
    }
}

impl SoapElement for Envelope {
    fn name(&self) -> QName {
        self.version.envelope_name()
    }

    fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        &mut self.attributes
    }

    fn to_source(&self) -> XmlElement {
        let mut envelope = XmlElement::new(self.name());
        *envelope.attributes_mut() = self.attributes.clone();
        for (prefix, uri) in &self.namespaces {
            envelope.declare_namespace(prefix.clone(), uri.clone());
        }
        if let Some(header) = &self.header {
            envelope.push_element(header.to_source());
        }
        envelope.push_element(self.body.to_source());
        envelope
    }
}
