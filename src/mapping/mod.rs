//! Endpoint mappings: resolve an invocation chain for a request.
//!
//! A mapping that does not recognise a request returns `Ok(None)`; the
//! dispatcher then tries the next mapping in order.

pub mod metadata;
pub mod payload_root;
pub mod soap_action;
pub mod xpath;

pub use metadata::{EndpointMetadata, MetadataMapping};
pub use payload_root::PayloadRootMapping;
pub use soap_action::SoapActionMapping;
pub use xpath::{XPathExpression, XPathMapping};

use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInterceptor, EndpointInvocationChain};
use crate::error::SoapError;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;
use tracing::debug;

/// Resolves the endpoint and interceptors for a request.
pub trait EndpointMapping: Send + Sync {
    fn endpoint(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError>;

    /// Lower values are consulted first.
    fn order(&self) -> i32 {
        i32::MAX
    }
}

/// Settings shared by every mapping: the interceptors and actors/roles
/// attached to each chain, the fallback endpoint and the mapping order.
#[derive(Clone)]
pub struct MappingSupport {
    interceptors: Vec<Arc<dyn EndpointInterceptor>>,
    actors_or_roles: Vec<String>,
    ultimate_receiver: bool,
    default_endpoint: Option<Endpoint>,
    order: i32,
}

impl Default for MappingSupport {
    fn default() -> Self {
        Self {
            interceptors: Vec::new(),
            actors_or_roles: Vec::new(),
            ultimate_receiver: true,
            default_endpoint: None,
            order: i32::MAX,
        }
    }
}

impl MappingSupport {
    pub fn add_interceptor(&mut self, interceptor: Arc<dyn EndpointInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn set_interceptors(&mut self, interceptors: Vec<Arc<dyn EndpointInterceptor>>) {
        self.interceptors = interceptors;
    }

    pub fn interceptors(&self) -> &[Arc<dyn EndpointInterceptor>] {
        &self.interceptors
    }

    pub fn set_actors_or_roles(&mut self, actors_or_roles: Vec<String>) {
        self.actors_or_roles = actors_or_roles;
    }

    pub fn set_ultimate_receiver(&mut self, ultimate_receiver: bool) {
        self.ultimate_receiver = ultimate_receiver;
    }

    pub fn set_default_endpoint(&mut self, endpoint: Endpoint) {
        self.default_endpoint = Some(endpoint);
    }

    pub fn default_endpoint(&self) -> Option<&Endpoint> {
        self.default_endpoint.as_ref()
    }

    pub fn set_order(&mut self, order: i32) {
        self.order = order;
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    /// Wrap `endpoint` in a chain carrying this mapping's settings.
    pub fn create_chain(&self, endpoint: Endpoint) -> EndpointInvocationChain {
        self.create_chain_with(endpoint, self.interceptors.clone())
    }

    pub fn create_chain_with(
        &self,
        endpoint: Endpoint,
        interceptors: Vec<Arc<dyn EndpointInterceptor>>,
    ) -> EndpointInvocationChain {
        EndpointInvocationChain::new(endpoint)
            .with_interceptors(interceptors)
            .with_actors_or_roles(self.actors_or_roles.clone())
            .with_ultimate_receiver(self.ultimate_receiver)
    }

    /// Chain for `found`, falling back to the default endpoint.
    pub fn resolve(&self, found: Option<&Endpoint>) -> Option<EndpointInvocationChain> {
        found
            .or(self.default_endpoint.as_ref())
            .map(|endpoint| self.create_chain(endpoint.clone()))
    }
}

/// Keyed endpoint lookup used by the concrete mappings.
pub struct EndpointRegistry<K> {
    endpoints: HashMap<K, Endpoint>,
}

impl<K> Default for EndpointRegistry<K> {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Display> EndpointRegistry<K> {
    /// Register `endpoint` under `key`. Registering the same endpoint twice
    /// is allowed; mapping a key to a second endpoint is an error.
    pub fn register(&mut self, key: K, endpoint: Endpoint) -> Result<(), SoapError> {
        if let Some(existing) = self.endpoints.get(&key) {
            if existing.same_as(&endpoint) {
                return Ok(());
            }
            return Err(SoapError::Config(format!(
                "cannot map endpoint on key [{key}]: another endpoint is already mapped"
            )));
        }
        debug!(key = %key, "Mapped endpoint");
        self.endpoints.insert(key, endpoint);
        Ok(())
    }

    pub fn lookup(&self, key: &K) -> Option<&Endpoint> {
        self.endpoints.get(key)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;

    fn endpoint() -> Endpoint {
        Endpoint::payload_fn(|_| Ok(None))
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut registry = EndpointRegistry::default();
        let first = endpoint();
        registry.register("a".to_string(), first.clone()).unwrap();
        registry.register("a".to_string(), first).unwrap();
        let err = registry.register("a".to_string(), endpoint()).unwrap_err();
        assert!(matches!(err, SoapError::Config(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_support_resolve_uses_default() {
        let mut support = MappingSupport::default();
        assert!(support.resolve(None).is_none());

        support.set_default_endpoint(endpoint());
        support.set_actors_or_roles(vec!["urn:me".to_string()]);
        support.set_ultimate_receiver(false);
        let chain = support.resolve(None).unwrap();
        assert_eq!(chain.actors_or_roles(), &["urn:me".to_string()]);
        assert!(!chain.is_ultimate_receiver());
    }
}
