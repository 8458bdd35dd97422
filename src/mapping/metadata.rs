//! Mapping driven by metadata that handlers declare about themselves.

use super::{EndpointMapping, EndpointRegistry, MappingSupport};
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInvocationChain, MessageEndpoint, PayloadEndpoint};
use crate::error::SoapError;
use crate::qname::QName;
use std::sync::Arc;

/// What a handler wants to receive.
pub trait EndpointMetadata {
    fn payload_roots(&self) -> Vec<QName> {
        Vec::new()
    }

    fn soap_actions(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Registers handlers under the payload roots and SOAP actions they
/// declare. Payload roots are matched before SOAP actions.
#[derive(Default)]
pub struct MetadataMapping {
    support: MappingSupport,
    by_root: EndpointRegistry<QName>,
    by_action: EndpointRegistry<String>,
}

impl MetadataMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_payload_handler<H>(&mut self, handler: Arc<H>) -> Result<(), SoapError>
    where
        H: EndpointMetadata + PayloadEndpoint + 'static,
    {
        let metadata = (handler.payload_roots(), handler.soap_actions());
        self.register(metadata, Endpoint::Payload(handler))
    }

    pub fn register_message_handler<H>(&mut self, handler: Arc<H>) -> Result<(), SoapError>
    where
        H: EndpointMetadata + MessageEndpoint + 'static,
    {
        let metadata = (handler.payload_roots(), handler.soap_actions());
        self.register(metadata, Endpoint::Message(handler))
    }

    fn register(
        &mut self,
        (roots, actions): (Vec<QName>, Vec<String>),
        endpoint: Endpoint,
    ) -> Result<(), SoapError> {
        if roots.is_empty() && actions.is_empty() {
            return Err(SoapError::Config(
                "handler declares neither payload roots nor SOAP actions".to_string(),
            ));
        }
        for root in roots {
            self.by_root.register(root, endpoint.clone())?;
        }
        for action in actions {
            self.by_action.register(action, endpoint.clone())?;
        }
        Ok(())
    }

    pub fn support_mut(&mut self) -> &mut MappingSupport {
        &mut self.support
    }
}

impl EndpointMapping for MetadataMapping {
    fn endpoint(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError> {
        let request = context.request();
        let found = request
            .payload_source()
            .and_then(|payload| self.by_root.lookup(payload.name()))
            .or_else(|| {
                request
                    .soap_action()
                    .and_then(|action| self.by_action.lookup(&action.to_string()))
            });
        Ok(self.support.resolve(found))
    }

    fn order(&self) -> i32 {
        self.support.order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::{SoapMessage, SoapMessageFactory, SoapVersion};
    use crate::xml::XmlElement;

    struct Quotes;

    impl EndpointMetadata for Quotes {
        fn payload_roots(&self) -> Vec<QName> {
            vec![QName::new("urn:quotes", "GetQuote")]
        }

        fn soap_actions(&self) -> Vec<String> {
            vec!["urn:quotes:get".to_string()]
        }
    }

    impl PayloadEndpoint for Quotes {
        fn invoke(&self, _request: Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> {
            Ok(Some(XmlElement::new(QName::new("urn:quotes", "Quote")).with_text("42")))
        }
    }

    struct Silent;

    impl EndpointMetadata for Silent {}

    impl PayloadEndpoint for Silent {
        fn invoke(&self, _request: Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> {
            Ok(None)
        }
    }

    fn context(payload: Option<XmlElement>, action: Option<&str>) -> MessageContext {
        let mut request = SoapMessage::new(SoapVersion::Soap11);
        if let Some(payload) = payload {
            request.body_mut().set_payload(payload);
        }
        request.set_soap_action(action.map(str::to_string));
        MessageContext::new(request, Arc::new(SoapMessageFactory::default()))
    }

    #[test]
    fn test_declared_roots_and_actions() {
        let mut mapping = MetadataMapping::new();
        mapping.register_payload_handler(Arc::new(Quotes)).unwrap();

        let by_root = context(Some(XmlElement::new(QName::new("urn:quotes", "GetQuote"))), None);
        assert!(mapping.endpoint(&by_root).unwrap().is_some());

        let by_action = context(None, Some("urn:quotes:get"));
        assert!(mapping.endpoint(&by_action).unwrap().is_some());

        let neither = context(Some(XmlElement::new(QName::local("x"))), Some("urn:other"));
        assert!(mapping.endpoint(&neither).unwrap().is_none());
    }

    #[test]
    fn test_handler_without_metadata_rejected() {
        let mut mapping = MetadataMapping::new();
        assert!(mapping.register_payload_handler(Arc::new(Silent)).is_err());
    }
}
