//! Object/XML mapping at the endpoint boundary.
//!
//! [`MarshallingEndpoint`] unmarshals the request payload into a typed value,
//! hands it to application code, and marshals the returned value back into
//! the response payload. [`QuickXmlMarshaller`] implements both directions
//! with serde over quick-xml.

use crate::endpoint::{Endpoint, PayloadEndpoint};
use crate::error::SoapError;
use crate::qname::QName;
use crate::xml::{XmlElement, XmlNode, XmlSink};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Reads a typed value from a payload element.
pub trait Unmarshaller<T>: Send + Sync {
    fn unmarshal(&self, source: &XmlElement) -> Result<T, SoapError>;
}

/// Writes a typed value into a sink.
pub trait Marshaller<T>: Send + Sync {
    fn marshal(&self, value: &T, sink: &mut dyn XmlSink) -> Result<(), SoapError>;
}

/// Serde-backed marshaller.
///
/// Unmarshalling matches on local names only. Marshalled elements are
/// placed in the namespace of `root`.
pub struct QuickXmlMarshaller<T> {
    root: QName,
    _marker: PhantomData<fn() -> T>,
}

impl<T> QuickXmlMarshaller<T> {
    pub fn new(root: QName) -> Self {
        Self {
            root,
            _marker: PhantomData,
        }
    }

    pub fn root(&self) -> &QName {
        &self.root
    }
}

impl<T: DeserializeOwned> Unmarshaller<T> for QuickXmlMarshaller<T> {
    fn unmarshal(&self, source: &XmlElement) -> Result<T, SoapError> {
        let xml = local_copy(source).to_xml_string()?;
        quick_xml::de::from_str(&xml).map_err(|e| {
            SoapError::Transformation(format!("cannot unmarshal {}: {e}", source.name()))
        })
    }
}

impl<T: Serialize> Marshaller<T> for QuickXmlMarshaller<T> {
    fn marshal(&self, value: &T, sink: &mut dyn XmlSink) -> Result<(), SoapError> {
        let xml = quick_xml::se::to_string_with_root(self.root.local_part(), value).map_err(|e| {
            SoapError::Transformation(format!("cannot marshal {}: {e}", self.root))
        })?;
        let mut element = XmlElement::parse_str(&xml)?;
        if self.root.has_namespace() {
            qualify(&mut element, &self.root);
        }
        sink.write_element(element)
    }
}

/// Copy of `element` with every name reduced to its local part.
fn local_copy(element: &XmlElement) -> XmlElement {
    let mut copy = XmlElement::new(QName::local(element.name().local_part()));
    for attribute in element.attributes() {
        copy.set_attribute(
            QName::local(attribute.name.local_part()),
            attribute.value.clone(),
        );
    }
    for node in element.children() {
        copy.push_child(match node {
            XmlNode::Element(child) => XmlNode::Element(local_copy(child)),
            other => other.clone(),
        });
    }
    copy
}

/// Move unqualified elements into the namespace (and prefix) of `root`.
fn qualify(element: &mut XmlElement, root: &QName) {
    if !element.name().has_namespace() {
        let mut name = QName::new(root.namespace(), element.name().local_part());
        if let Some(prefix) = root.prefix() {
            name = name.with_prefix(prefix);
        }
        element.set_name(name);
    }
    for child in element.elements_mut() {
        qualify(child, root);
    }
}

/// Endpoint over typed request and response values.
pub struct MarshallingEndpoint<Req, Resp, F> {
    unmarshaller: Arc<dyn Unmarshaller<Req>>,
    marshaller: Arc<dyn Marshaller<Resp>>,
    handler: F,
}

impl<Req, Resp, F> MarshallingEndpoint<Req, Resp, F>
where
    Req: 'static,
    Resp: 'static,
    F: Fn(Req) -> Result<Option<Resp>, SoapError> + Send + Sync + 'static,
{
    pub fn new(
        unmarshaller: Arc<dyn Unmarshaller<Req>>,
        marshaller: Arc<dyn Marshaller<Resp>>,
        handler: F,
    ) -> Self {
        Self {
            unmarshaller,
            marshaller,
            handler,
        }
    }

    pub fn into_endpoint(self) -> Endpoint {
        Endpoint::payload(self)
    }
}

impl<Req, Resp, F> PayloadEndpoint for MarshallingEndpoint<Req, Resp, F>
where
    F: Fn(Req) -> Result<Option<Resp>, SoapError> + Send + Sync,
{
    fn invoke(&self, request: Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> {
        let source = request.ok_or_else(|| {
            SoapError::Transformation("request has no payload to unmarshal".to_string())
        })?;
        let value = self.unmarshaller.unmarshal(source)?;
        let Some(response) = (self.handler)(value)? else {
            return Ok(None);
        };

        let mut nodes: Vec<XmlNode> = Vec::new();
        self.marshaller.marshal(&response, &mut nodes)?;
        Ok(nodes.into_iter().find_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        }))
    }
}
