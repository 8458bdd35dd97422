//! Message addressing properties and their extraction from SOAP headers.

use super::version::AddressingVersion;
use crate::qname::QName;
use crate::soap::{Header, HeaderElement};
use crate::xml::XmlElement;
use std::fmt;
use url::Url;

/// An endpoint reference: an address plus the reference parameters (and,
/// for the 2004/08 submission, reference properties) to echo back.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointReference {
    address: String,
    reference_parameters: Vec<XmlElement>,
    reference_properties: Vec<XmlElement>,
}

impl EndpointReference {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reference_parameters: Vec::new(),
            reference_properties: Vec::new(),
        }
    }

    pub fn with_reference_parameter(mut self, parameter: XmlElement) -> Self {
        self.reference_parameters.push(parameter);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn reference_parameters(&self) -> &[XmlElement] {
        &self.reference_parameters
    }

    pub fn reference_properties(&self) -> &[XmlElement] {
        &self.reference_properties
    }

    pub fn is_anonymous(&self, version: AddressingVersion) -> bool {
        self.address == version.anonymous_uri()
    }

    /// Always false for versions without a "none" address.
    pub fn is_none(&self, version: AddressingVersion) -> bool {
        version.none_uri().is_some_and(|none| self.address == none)
    }
}

impl fmt::Display for EndpointReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// The parsed WS-Addressing header set of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageAddressingProperties {
    version: AddressingVersion,
    to: String,
    from: Option<EndpointReference>,
    reply_to: Option<EndpointReference>,
    fault_to: Option<EndpointReference>,
    action: String,
    message_id: Option<String>,
    relates_to: Option<String>,
}

impl MessageAddressingProperties {
    /// Properties for an outgoing message.
    pub fn new(version: AddressingVersion, to: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            version,
            to: to.into(),
            from: None,
            reply_to: None,
            fault_to: None,
            action: action.into(),
            message_id: None,
            relates_to: None,
        }
    }

    pub fn version(&self) -> AddressingVersion {
        self.version
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn from(&self) -> Option<&EndpointReference> {
        self.from.as_ref()
    }

    pub fn reply_to(&self) -> Option<&EndpointReference> {
        self.reply_to.as_ref()
    }

    pub fn fault_to(&self) -> Option<&EndpointReference> {
        self.fault_to.as_ref()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn relates_to(&self) -> Option<&str> {
        self.relates_to.as_deref()
    }

    pub fn with_reply_to(mut self, epr: EndpointReference) -> Self {
        self.reply_to = Some(epr);
        self
    }

    pub fn with_fault_to(mut self, epr: EndpointReference) -> Self {
        self.fault_to = Some(epr);
        self
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_relates_to(mut self, relates_to: impl Into<String>) -> Self {
        self.relates_to = Some(relates_to.into());
        self
    }

    /// Where a reply (or fault) to this message goes. Faults fall back to
    /// `ReplyTo` and then to the anonymous address; replies have no
    /// fallback.
    pub fn reply_endpoint(&self, is_fault: bool) -> Option<EndpointReference> {
        if is_fault {
            Some(
                self.fault_to
                    .clone()
                    .or_else(|| self.reply_to.clone())
                    .unwrap_or_else(|| EndpointReference::new(self.version.anonymous_uri())),
            )
        } else {
            self.reply_to.clone()
        }
    }

    /// Properties of a reply sent to `epr` in answer to this message.
    pub fn reply_properties(
        &self,
        epr: &EndpointReference,
        action: impl Into<String>,
        message_id: impl Into<String>,
    ) -> ReplyProperties {
        ReplyProperties {
            to: epr.clone(),
            action: action.into(),
            message_id: message_id.into(),
            relates_to: self.message_id.clone(),
        }
    }

    /// Add this message's headers to an outgoing `header`.
    pub fn write_headers(&self, header: &mut Header) {
        let version = self.version;
        header.add_namespace_declaration(version.prefix(), version.namespace_uri());
        header.add_header_element(version.to_name()).set_text(self.to.clone());
        for (name, epr) in [
            (version.from_name(), &self.from),
            (version.reply_to_name(), &self.reply_to),
            (version.fault_to_name(), &self.fault_to),
        ] {
            if let Some(epr) = epr {
                write_endpoint_reference(version, header.add_header_element(name), epr);
            }
        }
        header
            .add_header_element(version.action_name())
            .set_text(self.action.clone());
        if let Some(id) = &self.message_id {
            header
                .add_header_element(version.message_id_name())
                .set_text(id.clone());
        }
        if let Some(relates_to) = &self.relates_to {
            header
                .add_header_element(version.relates_to_name())
                .set_text(relates_to.clone());
        }
    }
}

fn write_endpoint_reference(
    version: AddressingVersion,
    element: &mut HeaderElement,
    epr: &EndpointReference,
) {
    let sink = element.sink();
    sink.push_element(XmlElement::new(version.address_name()).with_text(epr.address.clone()));
    if !epr.reference_parameters.is_empty() {
        let mut parameters = XmlElement::new(version.reference_parameters_name());
        for parameter in &epr.reference_parameters {
            parameters.push_element(parameter.clone());
        }
        sink.push_element(parameters);
    }
    if let Some(name) = version.reference_properties_name() {
        if !epr.reference_properties.is_empty() {
            let mut properties = XmlElement::new(name);
            for property in &epr.reference_properties {
                properties.push_element(property.clone());
            }
            sink.push_element(properties);
        }
    }
}

/// Addressing headers of a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyProperties {
    to: EndpointReference,
    action: String,
    message_id: String,
    relates_to: Option<String>,
}

impl ReplyProperties {
    pub fn to(&self) -> &EndpointReference {
        &self.to
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn relates_to(&self) -> Option<&str> {
        self.relates_to.as_deref()
    }

    /// Write the reply headers: `To` (mandatory), `Action`, `MessageID`,
    /// `RelatesTo` and the reference parameters and properties of the
    /// destination as header blocks of their own.
    pub fn write_headers(&self, version: AddressingVersion, header: &mut Header) {
        header.add_namespace_declaration(version.prefix(), version.namespace_uri());
        let to = header.add_header_element(version.to_name());
        to.set_text(self.to.address.clone());
        to.set_must_understand(true);
        header
            .add_header_element(version.action_name())
            .set_text(self.action.clone());
        header
            .add_header_element(version.message_id_name())
            .set_text(self.message_id.clone());
        if let Some(relates_to) = &self.relates_to {
            header
                .add_header_element(version.relates_to_name())
                .set_text(relates_to.clone());
        }
        let soap_version = header.version();
        for parameter in &self.to.reference_parameters {
            let mut element = parameter.clone();
            if version.marks_reference_parameters() {
                element.set_attribute(version.is_reference_parameter_name(), "true");
            }
            header.push_header_element(HeaderElement::from_xml(soap_version, element));
        }
        for property in &self.to.reference_properties {
            header.push_header_element(HeaderElement::from_xml(soap_version, property.clone()));
        }
    }
}

/// Which addressing fault a violation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    HeaderRequired,
    InvalidHeader,
}

/// A header validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressingViolation {
    pub kind: ViolationKind,
    /// The offending (or missing) header
    pub header: QName,
    pub message: String,
}

impl AddressingViolation {
    pub fn required(header: QName) -> Self {
        let message = format!("missing required header {}", header.qualified());
        Self {
            kind: ViolationKind::HeaderRequired,
            header,
            message,
        }
    }

    pub fn invalid(header: QName, message: impl Into<String>) -> Self {
        Self {
            kind: ViolationKind::InvalidHeader,
            header,
            message: message.into(),
        }
    }
}

impl fmt::Display for AddressingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Addressing headers of one version, collected but not yet validated.
#[derive(Debug, Default)]
pub struct AddressingHeaders<'a> {
    to: Option<&'a HeaderElement>,
    from: Option<&'a HeaderElement>,
    reply_to: Option<&'a HeaderElement>,
    fault_to: Option<&'a HeaderElement>,
    action: Option<&'a HeaderElement>,
    message_id: Option<&'a HeaderElement>,
    relates_to: Option<&'a HeaderElement>,
}

impl<'a> AddressingHeaders<'a> {
    /// Collect the headers in `version`'s namespace. Repeated headers and
    /// unknown mandatory headers in that namespace are violations.
    pub fn extract(
        version: AddressingVersion,
        header: Option<&'a Header>,
    ) -> Result<Self, AddressingViolation> {
        let mut headers = Self::default();
        let Some(header) = header else {
            return Ok(headers);
        };
        for element in header.examine_all_header_elements() {
            if !version.understands(element) {
                continue;
            }
            let name = element.content().name();
            let slot = match name.local_part() {
                "To" => &mut headers.to,
                "From" => &mut headers.from,
                "ReplyTo" => &mut headers.reply_to,
                "FaultTo" => &mut headers.fault_to,
                "Action" => &mut headers.action,
                "MessageID" => &mut headers.message_id,
                "RelatesTo" => &mut headers.relates_to,
                _ => {
                    if element.must_understand() {
                        return Err(AddressingViolation::required(name.clone()));
                    }
                    continue;
                }
            };
            if slot.is_some() {
                return Err(AddressingViolation::invalid(
                    name.clone(),
                    format!("header {} occurs more than once", name.qualified()),
                ));
            }
            *slot = Some(element);
        }
        Ok(headers)
    }

    /// Whether no header of the version was present at all.
    pub fn is_empty(&self) -> bool {
        [
            self.to,
            self.from,
            self.reply_to,
            self.fault_to,
            self.action,
            self.message_id,
            self.relates_to,
        ]
        .iter()
        .all(Option::is_none)
    }

    /// Properties for routing a fault about these headers.
    ///
    /// Headers that fail validation are left unset, so the fault falls back
    /// to `ReplyTo` or the anonymous address.
    pub fn fault_properties(&self, version: AddressingVersion) -> MessageAddressingProperties {
        let valid_uri = |name: QName, element: Option<&HeaderElement>| {
            element.and_then(|e| uri(name, e).ok())
        };
        MessageAddressingProperties {
            version,
            to: valid_uri(version.to_name(), self.to).unwrap_or_else(|| version.anonymous_uri()),
            from: valid_reference(version, version.from_name(), self.from),
            reply_to: valid_reference(version, version.reply_to_name(), self.reply_to),
            fault_to: valid_reference(version, version.fault_to_name(), self.fault_to),
            action: valid_uri(version.action_name(), self.action).unwrap_or_default(),
            message_id: valid_uri(version.message_id_name(), self.message_id),
            relates_to: valid_uri(version.relates_to_name(), self.relates_to),
        }
    }

    /// Validate the collected headers into message addressing properties.
    pub fn validate(
        self,
        version: AddressingVersion,
    ) -> Result<MessageAddressingProperties, AddressingViolation> {
        let action = match self.action {
            Some(element) => uri(version.action_name(), element)?,
            None => return Err(AddressingViolation::required(version.action_name())),
        };
        let to = match self.to {
            Some(element) => uri(version.to_name(), element)?,
            None if version.requires_to() => {
                return Err(AddressingViolation::required(version.to_name()))
            }
            None => version.anonymous_uri(),
        };
        let from = self
            .from
            .map(|e| endpoint_reference(version, version.from_name(), e))
            .transpose()?;
        let reply_to = self
            .reply_to
            .map(|e| endpoint_reference(version, version.reply_to_name(), e))
            .transpose()?;
        let fault_to = self
            .fault_to
            .map(|e| endpoint_reference(version, version.fault_to_name(), e))
            .transpose()?;
        let message_id = self
            .message_id
            .map(|e| uri(version.message_id_name(), e))
            .transpose()?;
        let relates_to = self
            .relates_to
            .map(|e| uri(version.relates_to_name(), e))
            .transpose()?;

        let expects_reply = [&reply_to, &fault_to]
            .into_iter()
            .flatten()
            .any(|epr| !epr.is_none(version));
        if message_id.is_none() && (version.always_requires_message_id() || expects_reply) {
            return Err(AddressingViolation::required(version.message_id_name()));
        }

        Ok(MessageAddressingProperties {
            version,
            to,
            from,
            reply_to,
            fault_to,
            action,
            message_id,
            relates_to,
        })
    }
}

/// Trimmed text of `element`, which must be a non-empty absolute URI.
fn uri(name: QName, element: &HeaderElement) -> Result<String, AddressingViolation> {
    let text = element.text().trim().to_string();
    check_uri(name, text)
}

fn check_uri(name: QName, text: String) -> Result<String, AddressingViolation> {
    if text.is_empty() {
        let message = format!("header {} is empty", name.qualified());
        return Err(AddressingViolation::invalid(name, message));
    }
    if let Err(e) = Url::parse(&text) {
        let message = format!("header {} is not a valid URI: {e}", name.qualified());
        return Err(AddressingViolation::invalid(name, message));
    }
    Ok(text)
}

fn endpoint_reference(
    version: AddressingVersion,
    name: QName,
    element: &HeaderElement,
) -> Result<EndpointReference, AddressingViolation> {
    let content = element.content();
    let address = content
        .find_child(&version.address_name())
        .ok_or_else(|| {
            AddressingViolation::invalid(
                name.clone(),
                format!("endpoint reference {} has no Address", name.qualified()),
            )
        })?
        .text_content()
        .trim()
        .to_string();
    let address = check_uri(name, address)?;
    let children = |name: Option<QName>| -> Vec<XmlElement> {
        name.and_then(|name| content.find_child(&name))
            .map(|e| e.elements().cloned().collect())
            .unwrap_or_default()
    };
    Ok(EndpointReference {
        address,
        reference_parameters: children(Some(version.reference_parameters_name())),
        reference_properties: children(version.reference_properties_name()),
    })
}

fn valid_reference(
    version: AddressingVersion,
    name: QName,
    element: Option<&HeaderElement>,
) -> Option<EndpointReference> {
    element.and_then(|e| endpoint_reference(version, name, e).ok())
}

/// The first addressing version, in `candidates` order, with at least one
/// header in the message.
pub fn detect_version(
    candidates: &[AddressingVersion],
    header: Option<&Header>,
) -> Option<AddressingVersion> {
    let header = header?;
    candidates.iter().copied().find(|version| {
        header
            .examine_all_header_elements()
            .any(|element| version.understands(element))
    })
}
