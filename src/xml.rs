//! Namespace-aware XML tree used as the backend of the SOAP model.
//!
//! Parsing uses quick-xml's `NsReader`, which never expands external
//! entities. DOCTYPE declarations are rejected outright. Readers and writers
//! are created per call from an immutable [`XmlOptions`], so a single options
//! value can be shared by any number of concurrent requests.

use crate::error::SoapError;
use crate::qname::QName;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::Writer;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A single attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub name: QName,
    pub value: String,
}

/// A child node of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with its attributes, namespace declarations and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: QName,
    attributes: Vec<XmlAttribute>,
    /// Namespace declarations made on this element (`""` is the default namespace).
    namespaces: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Parse a standalone document with default options.
    pub fn parse_str(xml: &str) -> Result<Self, SoapError> {
        XmlOptions::default().parse(xml.as_bytes())
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    pub fn set_name(&mut self, name: QName) {
        self.name = name;
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute> {
        &mut self.attributes
    }

    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set (or replace) an attribute value.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(XmlAttribute { name, value }),
        }
    }

    pub fn remove_attribute(&mut self, name: &QName) -> Option<String> {
        let index = self.attributes.iter().position(|a| &a.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    /// Declare a namespace on this element, replacing a previous binding of
    /// the same prefix.
    pub fn declare_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.namespaces.iter_mut().find(|(p, _)| *p == prefix) {
            Some(binding) => binding.1 = uri,
            None => self.namespaces.push((prefix, uri)),
        }
    }

    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    pub fn into_children(self) -> Vec<XmlNode> {
        self.children
    }

    pub fn push_child(&mut self, node: XmlNode) {
        self.children.push(node);
    }

    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    pub fn with_child(mut self, element: XmlElement) -> Self {
        self.push_element(element);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn first_element(&self) -> Option<&XmlElement> {
        self.elements().next()
    }

    pub fn find_child(&self, name: &QName) -> Option<&XmlElement> {
        self.elements().find(|e| e.name() == name)
    }

    pub fn find_children<'a>(&'a self, name: &'a QName) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |e| e.name() == name)
    }

    /// Text and CDATA directly under this element.
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => text.push_str(t),
                _ => {}
            }
        }
        text
    }

    /// All descendant text, in document order.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        let text = text.into();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }

    /// Serialize this element (without an XML declaration).
    pub fn to_xml_string(&self) -> Result<String, SoapError> {
        let bytes = XmlOptions::default().write(self, false)?;
        String::from_utf8(bytes).map_err(|e| SoapError::Transformation(e.to_string()))
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for node in &element.children {
        match node {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(e, out),
            XmlNode::Comment(_) => {}
        }
    }
}

/// Writable view over a part of the tree, handed to marshallers.
pub trait XmlSink {
    fn write_node(&mut self, node: XmlNode) -> Result<(), SoapError>;

    fn write_element(&mut self, element: XmlElement) -> Result<(), SoapError> {
        self.write_node(XmlNode::Element(element))
    }
}

impl XmlSink for XmlElement {
    fn write_node(&mut self, node: XmlNode) -> Result<(), SoapError> {
        self.children.push(node);
        Ok(())
    }
}

impl XmlSink for Vec<XmlNode> {
    fn write_node(&mut self, node: XmlNode) -> Result<(), SoapError> {
        self.push(node);
        Ok(())
    }
}

/// In-scope namespace bindings, innermost last.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    bindings: Vec<(String, String)>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the scope in effect inside `chain`, given outermost first.
    pub fn from_chain<'a>(chain: impl IntoIterator<Item = &'a XmlElement>) -> Self {
        let mut scope = Self::new();
        for element in chain {
            scope.enter(element);
        }
        scope
    }

    /// Push the declarations made on `element`.
    pub fn enter(&mut self, element: &XmlElement) {
        for (prefix, uri) in &element.namespaces {
            self.push(prefix.clone(), uri.clone());
        }
    }

    pub fn push(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.push((prefix.into(), uri.into()));
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.bindings.truncate(len);
    }

    /// Namespace bound to `prefix` (`""` for the default namespace).
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// A prefix currently bound to `uri`, preferring `preferred`.
    fn prefix_for(&self, uri: &str, preferred: Option<&str>, allow_default: bool) -> Option<String> {
        if let Some(p) = preferred {
            if self.resolve(p) == Some(uri) {
                return Some(p.to_string());
            }
        }
        self.bindings
            .iter()
            .rev()
            .map(|(p, _)| p)
            .find(|p| (allow_default || !p.is_empty()) && self.resolve(p) == Some(uri))
            .cloned()
    }

    /// Resolve QName-valued text such as `soap:Client`.
    pub fn resolve_qname_text(&self, text: &str) -> Option<QName> {
        let text = text.trim();
        match text.split_once(':') {
            Some((prefix, local)) => {
                let ns = self.resolve(prefix)?;
                Some(QName::new(ns, local).with_prefix(prefix))
            }
            None if text.is_empty() => None,
            None => Some(QName::new(self.resolve("").unwrap_or(""), text)),
        }
    }
}

/// Options for the XML reader and writer.
#[derive(Debug, Clone, Default)]
pub struct XmlOptions {
    /// Keep whitespace-only text nodes when parsing.
    pub preserve_whitespace: bool,
    /// Indent serialized output.
    pub indent: bool,
}

impl XmlOptions {
    /// Parse a complete document into its root element.
    pub fn parse(&self, data: &[u8]) -> Result<XmlElement, SoapError> {
        let mut reader = NsReader::from_reader(data);
        reader.config_mut().check_end_names = true;

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(&reader, e))?;
            match event {
                Event::Start(ref e) => {
                    let element = start_element(&reader, e)?;
                    stack.push(element);
                }
                Event::Empty(ref e) => {
                    let element = start_element(&reader, e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        SoapError::XmlParse("unexpected closing tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(ref t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| SoapError::XmlParse(format!("invalid text content: {e}")))?;
                    if text.trim().is_empty() && !self.preserve_whitespace {
                        continue;
                    }
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Text(text.into_owned())),
                        None => {
                            return Err(SoapError::XmlParse(
                                "text content outside of the document element".to_string(),
                            ))
                        }
                    }
                }
                Event::CData(ref c) => {
                    let text = std::str::from_utf8(c)
                        .map_err(|e| SoapError::XmlParse(format!("invalid UTF-8 in CDATA: {e}")))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::CData(text.to_string()));
                    }
                }
                Event::Comment(ref c) => {
                    let text = std::str::from_utf8(c)
                        .map_err(|e| SoapError::XmlParse(format!("invalid UTF-8 in comment: {e}")))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(XmlNode::Comment(text.to_string()));
                    }
                }
                Event::DocType(_) => {
                    return Err(SoapError::XmlParse(
                        "DOCTYPE declarations are not allowed".to_string(),
                    ));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(SoapError::XmlParse("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| SoapError::XmlParse("document has no root element".to_string()))
    }

    /// Serialize `root`, optionally preceded by an XML declaration.
    pub fn write(&self, root: &XmlElement, declaration: bool) -> Result<Vec<u8>, SoapError> {
        let mut writer = if self.indent {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        if declaration {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(write_error)?;
        }
        let mut scope = NamespaceScope::new();
        write_element(&mut writer, root, &mut scope)?;
        Ok(writer.into_inner())
    }
}

fn xml_error(reader: &NsReader<&[u8]>, error: quick_xml::Error) -> SoapError {
    SoapError::XmlParse(format!(
        "{} at position {}",
        error,
        reader.buffer_position()
    ))
}

fn write_error(error: impl std::fmt::Display) -> SoapError {
    SoapError::Transformation(error.to_string())
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), SoapError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(SoapError::XmlParse(
            "document has more than one root element".to_string(),
        )),
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, SoapError> {
    std::str::from_utf8(bytes).map_err(|e| SoapError::XmlParse(format!("invalid UTF-8: {e}")))
}

fn bound_namespace(result: ResolveResult<'_>) -> Result<String, SoapError> {
    match result {
        ResolveResult::Bound(ns) => Ok(utf8(ns.as_ref())?.to_string()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(SoapError::XmlParse(format!(
            "unbound namespace prefix '{}'",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn start_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<XmlElement, SoapError> {
    let raw_name = start.name();
    let (resolved, local) = reader.resolve_element(raw_name);
    let mut name = QName::new(bound_namespace(resolved)?, utf8(local.as_ref())?);
    if let Some(prefix) = raw_name.prefix() {
        name = name.with_prefix(utf8(prefix.as_ref())?);
    }

    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| SoapError::XmlParse(format!("invalid attribute: {e}")))?;
        let key = utf8(attr.key.as_ref())?;
        let value = attr
            .unescape_value()
            .map_err(|e| SoapError::XmlParse(format!("invalid attribute value: {e}")))?
            .into_owned();

        if key == "xmlns" {
            element.namespaces.push((String::new(), value));
            continue;
        }
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.push((prefix.to_string(), value));
            continue;
        }
        if let Some(local) = key.strip_prefix("xml:") {
            element.attributes.push(XmlAttribute {
                name: QName::new(XML_NS, local).with_prefix("xml"),
                value,
            });
            continue;
        }

        let (resolved, local) = reader.resolve_attribute(attr.key);
        let mut attr_name = QName::new(bound_namespace(resolved)?, utf8(local.as_ref())?);
        if let Some(prefix) = attr.key.prefix() {
            attr_name = attr_name.with_prefix(utf8(prefix.as_ref())?);
        }
        element.attributes.push(XmlAttribute {
            name: attr_name,
            value,
        });
    }
    Ok(element)
}

/// Pick a prefix for `name`, declaring a binding when none is in scope.
fn bind_prefix(
    name: &QName,
    scope: &mut NamespaceScope,
    declared: &mut Vec<(String, String)>,
    allow_default: bool,
) -> String {
    if let Some(prefix) = scope.prefix_for(name.namespace(), name.prefix(), allow_default) {
        return prefix;
    }
    let is_free = |p: &str, declared: &[(String, String)]| !declared.iter().any(|(d, _)| d == p);
    let prefix = match name.prefix() {
        Some(p) if p != "xml" && p != "xmlns" && is_free(p, declared) => p.to_string(),
        _ => {
            let mut index = 0;
            loop {
                let candidate = format!("ns{index}");
                if is_free(&candidate, declared) && scope.resolve(&candidate).is_none() {
                    break candidate;
                }
                index += 1;
            }
        }
    };
    scope.push(prefix.clone(), name.namespace());
    declared.push((prefix.clone(), name.namespace().to_string()));
    prefix
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{prefix}:{local}")
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &XmlElement,
    scope: &mut NamespaceScope,
) -> Result<(), SoapError> {
    let mark = scope.len();
    let mut declared: Vec<(String, String)> = Vec::new();
    for (prefix, uri) in &element.namespaces {
        scope.push(prefix.clone(), uri.clone());
        declared.push((prefix.clone(), uri.clone()));
    }

    let tag = if element.name.has_namespace() {
        let prefix = bind_prefix(&element.name, scope, &mut declared, true);
        qualify(&prefix, element.name.local_part())
    } else {
        if scope.resolve("").is_some_and(|ns| !ns.is_empty()) {
            scope.push("", "");
            declared.push((String::new(), String::new()));
        }
        element.name.local_part().to_string()
    };

    let mut attributes = Vec::with_capacity(element.attributes.len());
    for attr in &element.attributes {
        let key = if !attr.name.has_namespace() {
            attr.name.local_part().to_string()
        } else if attr.name.namespace() == XML_NS {
            qualify("xml", attr.name.local_part())
        } else {
            let prefix = bind_prefix(&attr.name, scope, &mut declared, false);
            qualify(&prefix, attr.name.local_part())
        };
        attributes.push((key, attr.value.as_str()));
    }

    let mut start = BytesStart::new(tag.as_str());
    for (prefix, uri) in &declared {
        let key = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{prefix}")
        };
        start.push_attribute((key.as_str(), uri.as_str()));
    }
    for (key, value) in &attributes {
        start.push_attribute((key.as_str(), *value));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(write_error)?;
    } else {
        writer.write_event(Event::Start(start)).map_err(write_error)?;
        for child in &element.children {
            match child {
                XmlNode::Element(e) => write_element(writer, e, scope)?,
                XmlNode::Text(t) => writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(write_error)?,
                XmlNode::CData(t) => write_cdata(writer, t)?,
                XmlNode::Comment(t) => writer
                    .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                    .map_err(write_error)?,
            }
        }
        writer
            .write_event(Event::End(BytesEnd::new(tag.as_str())))
            .map_err(write_error)?;
    }

    scope.truncate(mark);
    Ok(())
}

/// `]]>` cannot appear inside a CDATA section, so the text is split
/// across adjacent sections between `]]` and `>`.
fn write_cdata<W: std::io::Write>(writer: &mut Writer<W>, text: &str) -> Result<(), SoapError> {
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        let (section, tail) = rest.split_at(pos + 2);
        writer
            .write_event(Event::CData(BytesCData::new(section)))
            .map_err(write_error)?;
        rest = tail;
    }
    writer
        .write_event(Event::CData(BytesCData::new(rest)))
        .map_err(write_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <m:GetPrice xmlns:m="http://example.org/stock" m:currency="EUR">
      <m:Item>Apples &amp; Pears</m:Item>
      <m:Note><![CDATA[<raw>]]></m:Note>
    </m:GetPrice>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn test_parse_resolves_namespaces() {
        let root = XmlElement::parse_str(SAMPLE).unwrap();
        assert_eq!(
            root.name(),
            &QName::new("http://schemas.xmlsoap.org/soap/envelope/", "Envelope")
        );
        assert_eq!(root.name().prefix(), Some("soap"));

        let body = root.first_element().unwrap();
        let payload = body.first_element().unwrap();
        assert_eq!(payload.name(), &QName::new("http://example.org/stock", "GetPrice"));
        assert_eq!(
            payload.attribute(&QName::new("http://example.org/stock", "currency")),
            Some("EUR")
        );
        let item = payload.first_element().unwrap();
        assert_eq!(item.text(), "Apples & Pears");
        assert_eq!(payload.elements().nth(1).unwrap().text(), "<raw>");
    }

    #[test]
    fn test_round_trip_preserves_names_and_text() {
        let root = XmlElement::parse_str(SAMPLE).unwrap();
        let written = root.to_xml_string().unwrap();
        let reparsed = XmlElement::parse_str(&written).unwrap();
        assert_eq!(root, reparsed);
        assert!(written.contains("<soap:Envelope"));
        assert!(written.contains("Apples &amp; Pears"));
    }

    #[test]
    fn test_cdata_end_marker_is_split() {
        let mut note = XmlElement::new(QName::new("urn:test", "note"));
        note.children.push(XmlNode::CData("a]]>b]]>".to_string()));
        let written = note.to_xml_string().unwrap();
        assert!(written.contains("<![CDATA[a]]]]><![CDATA[>b]]]]><![CDATA[>]]>"));

        let reparsed = XmlElement::parse_str(&written).unwrap();
        assert_eq!(reparsed.text(), "a]]>b]]>");
    }

    #[test]
    fn test_doctype_rejected() {
        let xxe = r#"<?xml version="1.0"?>
<!DOCTYPE foo [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<foo>&xxe;</foo>"#;
        let err = XmlElement::parse_str(xxe).unwrap_err();
        assert!(err.to_string().contains("DOCTYPE"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(XmlElement::parse_str("<a><b></a>").is_err());
        assert!(XmlElement::parse_str("<a>").is_err());
        assert!(XmlElement::parse_str("").is_err());
        assert!(XmlElement::parse_str("<a/><b/>").is_err());
        assert!(XmlElement::parse_str("<p:a/>").is_err());
    }

    #[test]
    fn test_writer_declares_missing_namespaces() {
        let element = XmlElement::new(QName::new("urn:a", "root").with_prefix("a"))
            .with_attribute(QName::new("urn:b", "flag"), "1")
            .with_child(XmlElement::new(QName::new("urn:a", "child")).with_text("x"))
            .with_child(XmlElement::new(QName::local("plain")));
        let xml = element.to_xml_string().unwrap();
        let reparsed = XmlElement::parse_str(&xml).unwrap();
        assert_eq!(reparsed, element);
        assert!(xml.starts_with("<a:root"));
        assert!(xml.contains("xmlns:a=\"urn:a\""));
        assert!(xml.contains("<a:child>x</a:child>"));
    }

    #[test]
    fn test_writer_resets_default_namespace_for_unqualified_children() {
        let mut root = XmlElement::new(QName::new("urn:d", "root"));
        root.declare_namespace("", "urn:d");
        root.push_element(XmlElement::new(QName::local("inner")));
        let xml = root.to_xml_string().unwrap();
        let reparsed = XmlElement::parse_str(&xml).unwrap();
        assert_eq!(reparsed.first_element().unwrap().name(), &QName::local("inner"));
    }

    #[test]
    fn test_xml_lang_attribute() {
        let text = XmlElement::new(QName::local("faultstring"))
            .with_attribute(QName::new(XML_NS, "lang").with_prefix("xml"), "en")
            .with_text("oops");
        let xml = text.to_xml_string().unwrap();
        assert!(xml.contains("xml:lang=\"en\""));
        assert!(!xml.contains("xmlns:xml"));
        let reparsed = XmlElement::parse_str(&xml).unwrap();
        assert_eq!(reparsed.attribute(&QName::new(XML_NS, "lang")), Some("en"));
    }

    #[test]
    fn test_resolve_qname_text() {
        let mut scope = NamespaceScope::new();
        scope.push("soap", "http://schemas.xmlsoap.org/soap/envelope/");
        let name = scope.resolve_qname_text(" soap:Client ").unwrap();
        assert_eq!(
            name,
            QName::new("http://schemas.xmlsoap.org/soap/envelope/", "Client")
        );
        assert!(scope.resolve_qname_text("unknown:Client").is_none());
        assert_eq!(scope.resolve_qname_text("Client"), Some(QName::local("Client")));
    }

    #[test]
    fn test_text_content_and_set_text() {
        let mut root = XmlElement::parse_str("<a>one<b>two</b>three</a>").unwrap();
        assert_eq!(root.text(), "onethree");
        assert_eq!(root.text_content(), "onetwothree");
        root.set_text("replaced");
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.text(), "replaced");
    }
}
