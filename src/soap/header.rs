//! SOAP header and header elements.

use super::version::parse_boolean;
use super::{SoapElement, SoapVersion};
use crate::error::SoapError;
use crate::qname::QName;
use crate::xml::{XmlAttribute, XmlElement};

/// A single header block.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderElement {
    version: SoapVersion,
    element: XmlElement,
}

impl HeaderElement {
    pub fn new(version: SoapVersion, name: QName) -> Self {
        Self {
            version,
            element: XmlElement::new(name),
        }
    }

    pub(crate) fn from_xml(version: SoapVersion, element: XmlElement) -> Self {
        Self { version, element }
    }

    /// `actor` (1.1) or `role` (1.2); `None` targets the ultimate receiver.
    pub fn actor_or_role(&self) -> Option<&str> {
        self.element
            .attribute(&self.version.actor_or_role_name())
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn set_actor_or_role(&mut self, uri: impl Into<String>) {
        self.element
            .set_attribute(self.version.actor_or_role_name(), uri);
    }

    pub fn must_understand(&self) -> bool {
        self.element
            .attribute(&self.version.must_understand_attribute_name())
            .map(parse_boolean)
            .unwrap_or(false)
    }

    pub fn set_must_understand(&mut self, must_understand: bool) {
        let name = self.version.must_understand_attribute_name();
        if must_understand {
            self.element.set_attribute(name, self.version.true_literal());
        } else {
            self.element.remove_attribute(&name);
        }
    }

    pub fn relay(&self) -> bool {
        self.version
            .relay_attribute_name()
            .and_then(|name| self.element.attribute(&name).map(parse_boolean))
            .unwrap_or(false)
    }

    pub fn set_relay(&mut self, relay: bool) -> Result<(), SoapError> {
        let name = self.version.relay_attribute_name().ok_or_else(|| {
            SoapError::Transformation(format!("relay is not supported by {}", self.version))
        })?;
        if relay {
            self.element.set_attribute(name, "true");
        } else {
            self.element.remove_attribute(&name);
        }
        Ok(())
    }

    pub fn text(&self) -> String {
        self.element.text()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.element.set_text(text);
    }

    /// Readable view of the header block.
    pub fn content(&self) -> &XmlElement {
        &self.element
    }

    /// Writable view for marshallers.
    pub fn sink(&mut self) -> &mut XmlElement {
        &mut self.element
    }
}

impl SoapElement for HeaderElement {
    fn name(&self) -> QName {
        self.element.name().clone()
    }

    fn attributes(&self) -> &[XmlAttribute] {
        self.element.attributes()
    }

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        self.element.attributes_mut()
    }

    fn to_source(&self) -> XmlElement {
        self.element.clone()
    }
}

/// The SOAP header: an ordered list of header blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    version: SoapVersion,
    attributes: Vec<XmlAttribute>,
    namespaces: Vec<(String, String)>,
    elements: Vec<HeaderElement>,
}

impl Header {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub(crate) fn from_xml(version: SoapVersion, element: XmlElement) -> Self {
        let mut header = Self::new(version);
        header.attributes = element.attributes().to_vec();
        header.namespaces = element.namespaces().to_vec();
        header.elements = element
            .into_children()
            .into_iter()
            .filter_map(|node| match node {
                crate::xml::XmlNode::Element(e) => Some(HeaderElement::from_xml(version, e)),
                _ => None,
            })
            .collect();
        header
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// Append a new header block.
    pub fn add_header_element(&mut self, name: QName) -> &mut HeaderElement {
        self.push_header_element(HeaderElement::new(self.version, name))
    }

    pub fn push_header_element(&mut self, element: HeaderElement) -> &mut HeaderElement {
        self.elements.push(element);
        let last = self.elements.len() - 1;
        &mut self.elements[last]
    }

    /// Remove every block with the given name; returns how many were removed.
    pub fn remove_header_element(&mut self, name: &QName) -> usize {
        let before = self.elements.len();
        self.elements.retain(|e| e.element.name() != name);
        before - self.elements.len()
    }

    pub fn examine_all_header_elements(&self) -> impl Iterator<Item = &HeaderElement> {
        self.elements.iter()
    }

    pub fn examine_header_elements<'a>(
        &'a self,
        name: &'a QName,
    ) -> impl Iterator<Item = &'a HeaderElement> {
        self.elements.iter().filter(move |e| e.element.name() == name)
    }

    /// Mandatory blocks addressed to `actor`, the "next" actor, or the
    /// ultimate receiver.
    pub fn examine_must_understand_header_elements(&self, actor: &str) -> Vec<&HeaderElement> {
        let actors = [actor.to_string()];
        self.examine_header_elements_to_process(&actors, true)
            .into_iter()
            .filter(|e| e.must_understand())
            .collect()
    }

    /// Blocks this node has to process, in header order.
    ///
    /// A block is included when its actor/role is one of `actors` or the
    /// "next" role. Blocks without a role, or with the SOAP 1.2
    /// ultimateReceiver role, are included only when `ultimate_receiver`
    /// is set. The SOAP 1.2 "none" role is never processed.
    pub fn examine_header_elements_to_process(
        &self,
        actors: &[String],
        ultimate_receiver: bool,
    ) -> Vec<&HeaderElement> {
        let next = self.version.next_actor_or_role_uri();
        let none = self.version.none_role_uri();
        let ultimate = self.version.ultimate_receiver_role_uri();
        self.elements
            .iter()
            .filter(|e| match e.actor_or_role() {
                None => ultimate_receiver,
                Some(role) if Some(role) == none => false,
                Some(role) if Some(role) == ultimate => ultimate_receiver,
                Some(role) => role == next || actors.iter().any(|a| a == role),
            })
            .collect()
    }

    /// Add a SOAP 1.2 `NotUnderstood` block for `name`.
    pub fn add_not_understood_header_element(&mut self, name: &QName) -> Result<(), SoapError> {
        if self.version != SoapVersion::Soap12 {
            return Err(SoapError::Transformation(format!(
                "NotUnderstood headers are not supported by {}",
                self.version
            )));
        }
        let prefix = name.prefix().unwrap_or("ns").to_string();
        let element = self.add_header_element(
            QName::new(self.version.envelope_namespace(), "NotUnderstood")
                .with_prefix(self.version.prefix()),
        );
        let sink = element.sink();
        sink.declare_namespace(prefix.clone(), name.namespace());
        sink.set_attribute(
            QName::local("qname"),
            format!("{prefix}:{}", name.local_part()),
        );
        Ok(())
    }

    pub fn add_namespace_declaration(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.namespaces.iter_mut().find(|(p, _)| *p == prefix) {
            Some(binding) => binding.1 = uri,
            None => self.namespaces.push((prefix, uri)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl SoapElement for Header {
    fn name(&self) -> QName {
        self.version.header_name()
    }

    fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        &mut self.attributes
    }

    fn to_source(&self) -> XmlElement {
        let mut header = XmlElement::new(self.name());
        *header.attributes_mut() = self.attributes.clone();
        for (prefix, uri) in &self.namespaces {
            header.declare_namespace(prefix.clone(), uri.clone());
        }
        for element in &self.elements {
            header.push_element(element.element.clone());
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: SoapVersion) -> Header {
        let mut header = Header::new(version);
        header
            .add_header_element(QName::new("urn:h", "NoRole"))
            .set_must_understand(true);
        header
            .add_header_element(QName::new("urn:h", "Next"))
            .set_actor_or_role(version.next_actor_or_role_uri());
        header
            .add_header_element(QName::new("urn:h", "Mine"))
            .set_actor_or_role("urn:me");
        header
            .add_header_element(QName::new("urn:h", "Other"))
            .set_actor_or_role("urn:other");
        header
    }

    fn names(elements: &[&HeaderElement]) -> Vec<String> {
        elements
            .iter()
            .map(|e| e.name().local_part().to_string())
            .collect()
    }

    #[test]
    fn test_examine_header_elements_to_process() {
        let header = header(SoapVersion::Soap11);
        let elements = header.examine_header_elements_to_process(&["urn:me".to_string()], true);
        assert_eq!(names(&elements), vec!["NoRole", "Next", "Mine"]);

        let elements = header.examine_header_elements_to_process(&[], false);
        assert_eq!(names(&elements), vec!["Next"]);
    }

    #[test]
    fn test_soap12_none_and_ultimate_receiver_roles() {
        let version = SoapVersion::Soap12;
        let mut header = header(version);
        header
            .add_header_element(QName::new("urn:h", "Nobody"))
            .set_actor_or_role(version.none_role_uri().unwrap());
        header
            .add_header_element(QName::new("urn:h", "Ultimate"))
            .set_actor_or_role(version.ultimate_receiver_role_uri().unwrap());

        let elements = header.examine_header_elements_to_process(&[], true);
        assert_eq!(names(&elements), vec!["NoRole", "Next", "Ultimate"]);

        let elements = header.examine_header_elements_to_process(&[], false);
        assert_eq!(names(&elements), vec!["Next"]);
    }

    #[test]
    fn test_must_understand_attribute() {
        let mut element = HeaderElement::new(SoapVersion::Soap11, QName::new("urn:h", "A"));
        assert!(!element.must_understand());
        element.set_must_understand(true);
        assert!(element.must_understand());
        assert_eq!(
            element.attribute(&SoapVersion::Soap11.must_understand_attribute_name()),
            Some("1")
        );
        element.set_must_understand(false);
        assert!(element.attributes().is_empty());

        let header = header(SoapVersion::Soap11);
        let mandatory = header.examine_must_understand_header_elements("urn:me");
        assert_eq!(names(&mandatory), vec!["NoRole"]);
    }

    #[test]
    fn test_relay_only_in_soap12() {
        let mut element = HeaderElement::new(SoapVersion::Soap11, QName::new("urn:h", "A"));
        assert!(element.set_relay(true).is_err());

        let mut element = HeaderElement::new(SoapVersion::Soap12, QName::new("urn:h", "A"));
        element.set_relay(true).unwrap();
        assert!(element.relay());
    }

    #[test]
    fn test_not_understood_header() {
        let mut header = Header::new(SoapVersion::Soap12);
        header
            .add_not_understood_header_element(&QName::new("urn:h", "Secret").with_prefix("h"))
            .unwrap();
        let element = header.examine_all_header_elements().next().unwrap();
        assert_eq!(element.name().local_part(), "NotUnderstood");
        assert_eq!(element.attribute(&QName::local("qname")), Some("h:Secret"));

        let mut soap11 = Header::new(SoapVersion::Soap11);
        assert!(soap11
            .add_not_understood_header_element(&QName::new("urn:h", "Secret"))
            .is_err());
    }

    #[test]
    fn test_remove_header_element() {
        let mut header = header(SoapVersion::Soap11);
        assert_eq!(header.remove_header_element(&QName::new("urn:h", "Mine")), 1);
        assert_eq!(header.remove_header_element(&QName::new("urn:h", "Mine")), 0);
        assert_eq!(header.examine_all_header_elements().count(), 3);
    }
}
