//! Mapping by SOAP action.

use super::{EndpointMapping, EndpointRegistry, MappingSupport};
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInvocationChain};
use crate::error::SoapError;

#[derive(Default)]
pub struct SoapActionMapping {
    support: MappingSupport,
    endpoints: EndpointRegistry<String>,
}

impl SoapActionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: impl Into<String>, endpoint: Endpoint) -> Result<(), SoapError> {
        self.endpoints.register(action.into(), endpoint)
    }

    pub fn support(&self) -> &MappingSupport {
        &self.support
    }

    pub fn support_mut(&mut self) -> &mut MappingSupport {
        &mut self.support
    }
}

impl EndpointMapping for SoapActionMapping {
    fn endpoint(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError> {
        let found = context
            .request()
            .soap_action()
            .and_then(|action| self.endpoints.lookup(&action.to_string()));
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
    use std::sync::Arc;

    #[test]
    fn test_lookup_by_action() {
        let mut mapping = SoapActionMapping::new();
        mapping
            .register("urn:echo", Endpoint::payload_fn(|_| Ok(None)))
            .unwrap();

        let mut request = SoapMessage::new(SoapVersion::Soap11);
        request.set_soap_action(Some("\"urn:echo\"".to_string()));
        let ctx = MessageContext::new(request, Arc::new(SoapMessageFactory::default()));
        assert!(mapping.endpoint(&ctx).unwrap().is_some());

        let request = SoapMessage::new(SoapVersion::Soap11);
        let ctx = MessageContext::new(request, Arc::new(SoapMessageFactory::default()));
        assert!(mapping.endpoint(&ctx).unwrap().is_none());
    }
}
