//! Mapping by the qualified name of the payload root element.

use super::{EndpointMapping, EndpointRegistry, MappingSupport};
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInvocationChain};
use crate::error::SoapError;
use crate::qname::QName;

#[derive(Default)]
pub struct PayloadRootMapping {
    support: MappingSupport,
    endpoints: EndpointRegistry<QName>,
}

impl PayloadRootMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, root: QName, endpoint: Endpoint) -> Result<(), SoapError> {
        self.endpoints.register(root, endpoint)
    }

    pub fn support(&self) -> &MappingSupport {
        &self.support
    }

    pub fn support_mut(&mut self) -> &mut MappingSupport {
        &mut self.support
    }
}

impl EndpointMapping for PayloadRootMapping {
    fn endpoint(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError> {
        let found = context
            .request()
            .payload_source()
            .and_then(|payload| self.endpoints.lookup(payload.name()));
        Ok(self.support.resolve(found))
    }

    fn order(&self) -> i32 {
        self.support.order()
    }
}
