//! SOAP faults for both protocol versions.

use super::{SoapElement, SoapVersion};
use crate::error::SoapError;
use crate::qname::QName;
use crate::xml::{NamespaceScope, XmlAttribute, XmlElement, XmlNode, XmlSink, XML_NS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Locale used when a reason carries none.
pub const DEFAULT_LOCALE: &str = "en";

/// Fault code, independent of protocol version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultCode {
    /// `Client` in SOAP 1.1, `Sender` in SOAP 1.2
    ClientOrSender,
    /// `Server` in SOAP 1.1, `Receiver` in SOAP 1.2
    ServerOrReceiver,
    MustUnderstand,
    VersionMismatch,
    /// Application-defined code (SOAP 1.1 only)
    Custom(QName),
}

impl FaultCode {
    /// The code's qualified name for the given version.
    pub fn qname(&self, version: SoapVersion) -> QName {
        match self {
            Self::ClientOrSender => version.client_or_sender_fault_name(),
            Self::ServerOrReceiver => version.server_or_receiver_fault_name(),
            Self::MustUnderstand => version.must_understand_fault_name(),
            Self::VersionMismatch => version.version_mismatch_fault_name(),
            Self::Custom(name) => name.clone(),
        }
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientOrSender => write!(f, "SENDER"),
            Self::ServerOrReceiver => write!(f, "RECEIVER"),
            Self::MustUnderstand => write!(f, "MUST_UNDERSTAND"),
            Self::VersionMismatch => write!(f, "VERSION_MISMATCH"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for FaultCode {
    type Err = SoapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" | "SENDER" => Ok(Self::ClientOrSender),
            "SERVER" | "RECEIVER" => Ok(Self::ServerOrReceiver),
            "MUST_UNDERSTAND" => Ok(Self::MustUnderstand),
            "VERSION_MISMATCH" => Ok(Self::VersionMismatch),
            _ => s
                .trim()
                .parse::<QName>()
                .map(Self::Custom)
                .map_err(|e| SoapError::Config(e.to_string())),
        }
    }
}

/// A fault to produce for an error: code, optional reason and locale.
///
/// Written in configuration as `"CODE,reason[,locale]"`, for example
/// `"CLIENT,Invalid input,en"` or `"{urn:app}Quota,Over quota"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FaultDefinition {
    code: FaultCode,
    reason: Option<String>,
    locale: Option<String>,
}

impl FaultDefinition {
    pub fn new(code: FaultCode) -> Self {
        Self {
            code,
            reason: None,
            locale: None,
        }
    }

    pub fn client_or_sender(reason: impl Into<String>) -> Self {
        Self::new(FaultCode::ClientOrSender).with_reason(reason)
    }

    pub fn server_or_receiver(reason: impl Into<String>) -> Self {
        Self::new(FaultCode::ServerOrReceiver).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn code(&self) -> &FaultCode {
        &self.code
    }

    /// Configured reason; callers fall back to the error message.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn locale(&self) -> &str {
        self.locale.as_deref().unwrap_or(DEFAULT_LOCALE)
    }
}

fn looks_like_locale(token: &str) -> bool {
    let token = token.trim();
    (2..=8).contains(&token.len())
        && token.starts_with(|c: char| c.is_ascii_alphabetic())
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl FromStr for FaultDefinition {
    type Err = SoapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split(',').collect();
        let code_token = tokens.first().map(|t| t.trim()).unwrap_or_default();
        if code_token.is_empty() {
            return Err(SoapError::Config(format!(
                "fault definition '{s}' has no fault code"
            )));
        }
        let mut definition = FaultDefinition::new(code_token.parse()?);
        let rest = &tokens[1..];
        let (reason_tokens, locale) = match rest.split_last() {
            Some((last, init)) if !init.is_empty() && looks_like_locale(last) => {
                (init, Some(last.trim().to_string()))
            }
            _ => (rest, None),
        };
        let reason = reason_tokens.join(",").trim().to_string();
        if !reason.is_empty() {
            definition.reason = Some(reason);
        }
        definition.locale = locale;
        Ok(definition)
    }
}

impl fmt::Display for FaultDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(reason) = &self.reason {
            write!(f, ",{reason}")?;
        }
        if let Some(locale) = &self.locale {
            if self.reason.is_none() {
                write!(f, ",")?;
            }
            write!(f, ",{locale}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for FaultDefinition {
    type Error = SoapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FaultDefinition> for String {
    fn from(definition: FaultDefinition) -> Self {
        definition.to_string()
    }
}

/// A localized fault reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReason {
    pub locale: Option<String>,
    pub text: String,
}

/// The fault carried by a SOAP body.
///
/// SOAP 1.1 uses the code, a single reason and the actor. SOAP 1.2 adds
/// subcodes, several localized reasons, the node and the role.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    version: SoapVersion,
    attributes: Vec<XmlAttribute>,
    code: QName,
    subcodes: Vec<QName>,
    reasons: Vec<FaultReason>,
    actor_or_role: Option<String>,
    node: Option<String>,
    detail: Option<FaultDetail>,
}

impl Fault {
    /// Create a fault, rejecting custom top-level codes in SOAP 1.2.
    pub fn new(
        version: SoapVersion,
        code: QName,
        reason: impl Into<String>,
        locale: Option<&str>,
    ) -> Result<Self, SoapError> {
        if version == SoapVersion::Soap12 && !version.is_standard_fault_code(&code) {
            return Err(SoapError::InvalidFault(format!(
                "SOAP 1.2 does not allow custom fault code {code}; use a subcode instead"
            )));
        }
        let locale = match version {
            SoapVersion::Soap12 => Some(locale.unwrap_or(DEFAULT_LOCALE).to_string()),
            SoapVersion::Soap11 => locale.map(str::to_string),
        };
        Ok(Self {
            version,
            attributes: Vec::new(),
            code,
            subcodes: Vec::new(),
            reasons: vec![FaultReason {
                locale,
                text: reason.into(),
            }],
            actor_or_role: None,
            node: None,
            detail: None,
        })
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    pub fn code(&self) -> &QName {
        &self.code
    }

    /// The first reason text (the `faultstring` in SOAP 1.1).
    pub fn reason(&self) -> Option<&str> {
        self.reasons.first().map(|r| r.text.as_str())
    }

    /// Reason text for a locale.
    pub fn reason_for(&self, locale: &str) -> Option<&str> {
        self.reasons
            .iter()
            .find(|r| r.locale.as_deref() == Some(locale))
            .map(|r| r.text.as_str())
    }

    pub fn reasons(&self) -> &[FaultReason] {
        &self.reasons
    }

    /// Add or replace the reason for `locale`. SOAP 1.1 holds a single reason.
    pub fn set_reason(&mut self, locale: &str, text: impl Into<String>) {
        let text = text.into();
        if self.version == SoapVersion::Soap11 {
            self.reasons = vec![FaultReason {
                locale: Some(locale.to_string()),
                text,
            }];
            return;
        }
        match self
            .reasons
            .iter_mut()
            .find(|r| r.locale.as_deref() == Some(locale))
        {
            Some(existing) => existing.text = text,
            None => self.reasons.push(FaultReason {
                locale: Some(locale.to_string()),
                text,
            }),
        }
    }

    /// `faultactor` (1.1) or `Role` (1.2).
    pub fn actor_or_role(&self) -> Option<&str> {
        self.actor_or_role.as_deref()
    }

    pub fn set_actor_or_role(&mut self, uri: impl Into<String>) {
        self.actor_or_role = Some(uri.into());
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn set_node(&mut self, uri: impl Into<String>) -> Result<(), SoapError> {
        self.require_soap12("Node")?;
        self.node = Some(uri.into());
        Ok(())
    }

    /// Subcodes, outermost first.
    pub fn subcodes(&self) -> &[QName] {
        &self.subcodes
    }

    pub fn append_subcode(&mut self, subcode: QName) -> Result<(), SoapError> {
        self.require_soap12("Subcode")?;
        self.subcodes.push(subcode);
        Ok(())
    }

    pub fn detail(&self) -> Option<&FaultDetail> {
        self.detail.as_ref()
    }

    /// The fault detail, created on first use.
    pub fn add_detail(&mut self) -> &mut FaultDetail {
        let version = self.version;
        self.detail.get_or_insert_with(|| FaultDetail::new(version))
    }

    fn require_soap12(&self, what: &str) -> Result<(), SoapError> {
        match self.version {
            SoapVersion::Soap12 => Ok(()),
            SoapVersion::Soap11 => Err(SoapError::InvalidFault(format!(
                "{what} is not supported by {}",
                self.version
            ))),
        }
    }

    fn element(&self, local: &str) -> XmlElement {
        match self.version {
            SoapVersion::Soap11 => XmlElement::new(QName::local(local)),
            SoapVersion::Soap12 => XmlElement::new(
                QName::new(self.version.envelope_namespace(), local)
                    .with_prefix(self.version.prefix()),
            ),
        }
    }

    fn value_element(&self, local: &str, code: &QName) -> XmlElement {
        let mut element = self.element(local);
        let text = qname_text(&mut element, code, self.version);
        element.set_text(text);
        element
    }

    fn lang_attribute() -> QName {
        QName::new(XML_NS, "lang").with_prefix("xml")
    }

    /// Parse a `Fault` element. `scope` holds the bindings in effect
    /// around the fault element.
    pub fn from_xml(
        version: SoapVersion,
        element: &XmlElement,
        scope: &NamespaceScope,
    ) -> Result<Self, SoapError> {
        let mut scope = scope.clone();
        scope.enter(element);
        let child = |local: &str| element.elements().find(|e| e.name().local_part() == local);
        let resolve = |el: &XmlElement, scope: &NamespaceScope| -> Result<QName, SoapError> {
            let mut inner = scope.clone();
            inner.enter(el);
            inner
                .resolve_qname_text(&el.text())
                .ok_or_else(|| SoapError::InvalidFault(format!("unresolvable fault code '{}'", el.text())))
        };

        let mut fault = match version {
            SoapVersion::Soap11 => {
                let code = child("faultcode")
                    .ok_or_else(|| SoapError::InvalidFault("missing faultcode".to_string()))?;
                let string = child("faultstring");
                Self {
                    version,
                    attributes: Vec::new(),
                    code: resolve(code, &scope)?,
                    subcodes: Vec::new(),
                    reasons: string
                        .map(|s| {
                            vec![FaultReason {
                                locale: s.attribute(&Self::lang_attribute()).map(str::to_string),
                                text: s.text(),
                            }]
                        })
                        .unwrap_or_default(),
                    actor_or_role: child("faultactor").map(|a| a.text().trim().to_string()),
                    node: None,
                    detail: None,
                }
            }
            SoapVersion::Soap12 => {
                let code = child("Code")
                    .ok_or_else(|| SoapError::InvalidFault("missing Code".to_string()))?;
                let mut code_scope = scope.clone();
                code_scope.enter(code);
                let value = code
                    .elements()
                    .find(|e| e.name().local_part() == "Value")
                    .ok_or_else(|| SoapError::InvalidFault("missing Code/Value".to_string()))?;
                let top = resolve(value, &code_scope)?;

                let mut subcodes = Vec::new();
                let mut current = code;
                while let Some(sub) = current.elements().find(|e| e.name().local_part() == "Subcode") {
                    code_scope.enter(sub);
                    if let Some(v) = sub.elements().find(|e| e.name().local_part() == "Value") {
                        subcodes.push(resolve(v, &code_scope)?);
                    }
                    current = sub;
                }

                let reasons = child("Reason")
                    .map(|r| {
                        r.elements()
                            .filter(|t| t.name().local_part() == "Text")
                            .map(|t| FaultReason {
                                locale: t.attribute(&Self::lang_attribute()).map(str::to_string),
                                text: t.text(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Self {
                    version,
                    attributes: Vec::new(),
                    code: top,
                    subcodes,
                    reasons,
                    actor_or_role: child("Role").map(|r| r.text().trim().to_string()),
                    node: child("Node").map(|n| n.text().trim().to_string()),
                    detail: None,
                }
            }
        };

        fault.attributes = element.attributes().to_vec();
        let detail_name = match version {
            SoapVersion::Soap11 => "detail",
            SoapVersion::Soap12 => "Detail",
        };
        if let Some(detail) = child(detail_name) {
            fault.detail = Some(FaultDetail::from_xml(version, detail));
        }
        Ok(fault)
    }
}

/// Write `name` as QName text, declaring its namespace on `element`.
fn qname_text(element: &mut XmlElement, name: &QName, version: SoapVersion) -> String {
    if !name.has_namespace() {
        return name.local_part().to_string();
    }
    let prefix = match name.prefix() {
        Some(p) => p.to_string(),
        None if name.namespace() == version.envelope_namespace() => version.prefix().to_string(),
        None => "fc".to_string(),
    };
    element.declare_namespace(prefix.clone(), name.namespace());
    format!("{prefix}:{}", name.local_part())
}

impl SoapElement for Fault {
    fn name(&self) -> QName {
        self.version.fault_name()
    }

    fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        &mut self.attributes
    }

    fn to_source(&self) -> XmlElement {
        let mut fault = XmlElement::new(self.name());
        *fault.attributes_mut() = self.attributes.clone();

        match self.version {
            SoapVersion::Soap11 => {
                fault.push_element(self.value_element("faultcode", &self.code));
                let mut string = self.element("faultstring");
                if let Some(reason) = self.reasons.first() {
                    if let Some(locale) = &reason.locale {
                        string.set_attribute(Self::lang_attribute(), locale.clone());
                    }
                    string.set_text(reason.text.clone());
                }
                fault.push_element(string);
                if let Some(actor) = &self.actor_or_role {
                    fault.push_element(self.element("faultactor").with_text(actor.clone()));
                }
            }
            SoapVersion::Soap12 => {
                let mut code = self.element("Code");
                code.push_element(self.value_element("Value", &self.code));
                let mut nested: Option<XmlElement> = None;
                for subcode in self.subcodes.iter().rev() {
                    let mut sub = self.element("Subcode");
                    sub.push_element(self.value_element("Value", subcode));
                    if let Some(inner) = nested.take() {
                        sub.push_element(inner);
                    }
                    nested = Some(sub);
                }
                if let Some(sub) = nested {
                    code.push_element(sub);
                }
                fault.push_element(code);

                let mut reason = self.element("Reason");
                for r in &self.reasons {
                    reason.push_element(
                        self.element("Text")
                            .with_attribute(
                                Self::lang_attribute(),
                                r.locale.clone().unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
                            )
                            .with_text(r.text.clone()),
                    );
                }
                fault.push_element(reason);
                if let Some(node) = &self.node {
                    fault.push_element(self.element("Node").with_text(node.clone()));
                }
                if let Some(role) = &self.actor_or_role {
                    fault.push_element(self.element("Role").with_text(role.clone()));
                }
            }
        }

        if let Some(detail) = &self.detail {
            fault.push_element(detail.to_source());
        }
        fault
    }
}

/// Fault detail: a list of application-defined entries.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultDetail {
    version: SoapVersion,
    attributes: Vec<XmlAttribute>,
    entries: Vec<FaultDetailElement>,
}

impl FaultDetail {
    fn new(version: SoapVersion) -> Self {
        Self {
            version,
            attributes: Vec::new(),
            entries: Vec::new(),
        }
    }

    fn from_xml(version: SoapVersion, element: &XmlElement) -> Self {
        Self {
            version,
            attributes: element.attributes().to_vec(),
            entries: element
                .elements()
                .cloned()
                .map(|element| FaultDetailElement { element })
                .collect(),
        }
    }

    pub fn add_detail_element(&mut self, name: QName) -> &mut FaultDetailElement {
        self.entries.push(FaultDetailElement {
            element: XmlElement::new(name),
        });
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn entries(&self) -> &[FaultDetailElement] {
        &self.entries
    }
}

impl SoapElement for FaultDetail {
    fn name(&self) -> QName {
        match self.version {
            SoapVersion::Soap11 => QName::local("detail"),
            SoapVersion::Soap12 => QName::new(self.version.envelope_namespace(), "Detail")
                .with_prefix(self.version.prefix()),
        }
    }

    fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        &mut self.attributes
    }

    fn to_source(&self) -> XmlElement {
        let mut detail = XmlElement::new(self.name());
        *detail.attributes_mut() = self.attributes.clone();
        for entry in &self.entries {
            detail.push_element(entry.element.clone());
        }
        detail
    }
}

/// Entries can be written directly into the detail by a marshaller.
impl XmlSink for FaultDetail {
    fn write_node(&mut self, node: XmlNode) -> Result<(), SoapError> {
        match node {
            XmlNode::Element(element) => {
                self.entries.push(FaultDetailElement { element });
                Ok(())
            }
            XmlNode::Text(t) if t.trim().is_empty() => Ok(()),
            _ => Err(SoapError::Transformation(
                "fault detail accepts elements only".to_string(),
            )),
        }
    }
}

/// One entry of a fault detail.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultDetailElement {
    element: XmlElement,
}

impl FaultDetailElement {
    pub fn add_text(&mut self, text: &str) {
        self.element.push_child(XmlNode::Text(text.to_string()));
    }

    pub fn text(&self) -> String {
        self.element.text_content()
    }

    /// Writable view for marshallers.
    pub fn sink(&mut self) -> &mut XmlElement {
        &mut self.element
    }
}

impl SoapElement for FaultDetailElement {
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
