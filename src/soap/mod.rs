//! SOAP message model.
//!
//! One data model serves both protocol versions; each element carries the
//! [`SoapVersion`] it was built for and takes its names from it.

pub mod attachment;
pub mod body;
pub mod envelope;
pub mod fault;
pub mod header;
pub mod message;
pub mod version;

pub use attachment::Attachment;
pub use body::{Body, BodyContent};
pub use envelope::Envelope;
pub use fault::{Fault, FaultCode, FaultDefinition, FaultDetail, FaultDetailElement, FaultReason};
pub use header::{Header, HeaderElement};
pub use message::{MessageFactory, SoapMessage, SoapMessageFactory};
pub use version::SoapVersion;

use crate::qname::QName;
use crate::xml::{XmlAttribute, XmlElement};

/// Common view over envelope, header, body and fault elements.
pub trait SoapElement {
    fn name(&self) -> QName;

    fn attributes(&self) -> &[XmlAttribute];

    fn attributes_mut(&mut self) -> &mut Vec<XmlAttribute>;

    /// Readable XML view of the element and everything below it.
    fn to_source(&self) -> XmlElement;

    fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    fn set_attribute(&mut self, name: QName, value: String) {
        let attributes = self.attributes_mut();
        match attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => attributes.push(XmlAttribute { name, value }),
        }
    }

    fn remove_attribute(&mut self, name: &QName) {
        self.attributes_mut().retain(|a| &a.name != name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOAP11: &str = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ws="urn:ws">
  <soapenv:Header>
    <ws:Trace soapenv:mustUnderstand="0" soapenv:actor="urn:tracer">t-1</ws:Trace>
  </soapenv:Header>
  <soapenv:Body>
    <ws:order id="7"><ws:line qty="2">widget</ws:line></ws:order>
  </soapenv:Body>
</soapenv:Envelope>"#;

    const SOAP12: &str = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
  <env:Body>
    <env:Fault>
      <env:Code><env:Value>env:Sender</env:Value></env:Code>
      <env:Reason><env:Text xml:lang="en">bad</env:Text></env:Reason>
    </env:Fault>
  </env:Body>
</env:Envelope>"#;

    #[test]
    fn test_parse_serialize_round_trip() {
        for xml in [SOAP11, SOAP12] {
            let message = SoapMessage::parse(xml.as_bytes()).unwrap();
            let written = message.to_bytes(&Default::default()).unwrap();
            let reparsed = SoapMessage::parse(&written).unwrap();
            assert_eq!(reparsed, message);
            assert_eq!(
                reparsed.envelope().to_source(),
                message.envelope().to_source()
            );
        }
    }

    #[test]
    fn test_element_attributes() {
        let mut message = SoapMessage::parse(SOAP11.as_bytes()).unwrap();
        let body = message.body_mut();
        body.set_attribute(QName::new("urn:x", "marker"), "1".to_string());
        assert_eq!(body.attribute(&QName::new("urn:x", "marker")), Some("1"));
        body.remove_attribute(&QName::new("urn:x", "marker"));
        assert!(body.attributes().is_empty());

        let header = message.envelope().header().unwrap();
        let trace = header.examine_all_header_elements().next().unwrap();
        assert_eq!(trace.actor_or_role(), Some("urn:tracer"));
        assert!(!trace.must_understand());
    }
}
