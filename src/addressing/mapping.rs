//! Endpoint mapping by WS-Addressing `Action`.

use super::interceptor::{AddressingInterceptor, MessageSender};
use super::map::detect_version;
use super::message_id::{MessageIdStrategy, UuidMessageIdStrategy};
use super::version::AddressingVersion;
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInterceptor, EndpointInvocationChain};
use crate::error::SoapError;
use crate::mapping::{EndpointMapping, EndpointRegistry, MappingSupport};
use crate::qname::QName;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Maps requests on their `Action` header and wraps every chain with an
/// [`AddressingInterceptor`] for the detected version. Interceptors on the
/// [`MappingSupport`] run before it, `post_interceptors` after it.
pub struct ActionMapping {
    support: MappingSupport,
    post_interceptors: Vec<Arc<dyn EndpointInterceptor>>,
    versions: Vec<AddressingVersion>,
    strategy: Arc<dyn MessageIdStrategy>,
    senders: Vec<Arc<dyn MessageSender>>,
    address: Option<String>,
    endpoints: EndpointRegistry<String>,
    reply_actions: HashMap<String, String>,
    output_action_suffix: String,
    fault_action_suffix: String,
}

impl Default for ActionMapping {
    fn default() -> Self {
        Self {
            support: MappingSupport::default(),
            post_interceptors: Vec::new(),
            versions: AddressingVersion::ALL.to_vec(),
            strategy: Arc::new(UuidMessageIdStrategy),
            senders: Vec::new(),
            address: None,
            endpoints: EndpointRegistry::default(),
            reply_actions: HashMap::new(),
            output_action_suffix: "Response".to_string(),
            fault_action_suffix: "Fault".to_string(),
        }
    }
}

impl ActionMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: impl Into<String>, endpoint: Endpoint) -> Result<(), SoapError> {
        self.endpoints.register(action.into(), endpoint)
    }

    /// Register with an explicit reply action.
    pub fn register_with_reply_action(
        &mut self,
        action: impl Into<String>,
        reply_action: impl Into<String>,
        endpoint: Endpoint,
    ) -> Result<(), SoapError> {
        let action = action.into();
        self.endpoints.register(action.clone(), endpoint)?;
        self.reply_actions.insert(action, reply_action.into());
        Ok(())
    }

    pub fn set_versions(&mut self, versions: Vec<AddressingVersion>) {
        self.versions = versions;
    }

    pub fn set_message_id_strategy(&mut self, strategy: Arc<dyn MessageIdStrategy>) {
        self.strategy = strategy;
    }

    pub fn set_message_senders(&mut self, senders: Vec<Arc<dyn MessageSender>>) {
        self.senders = senders;
    }

    pub fn set_post_interceptors(&mut self, interceptors: Vec<Arc<dyn EndpointInterceptor>>) {
        self.post_interceptors = interceptors;
    }

    /// Only accept requests whose `To` equals `address`.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = Some(address.into());
    }

    pub fn set_output_action_suffix(&mut self, suffix: impl Into<String>) {
        self.output_action_suffix = suffix.into();
    }

    pub fn set_fault_action_suffix(&mut self, suffix: impl Into<String>) {
        self.fault_action_suffix = suffix.into();
    }

    pub fn support_mut(&mut self) -> &mut MappingSupport {
        &mut self.support
    }

    fn chain(
        &self,
        endpoint: Endpoint,
        version: AddressingVersion,
        action: Option<&str>,
    ) -> EndpointInvocationChain {
        let mut interceptor = AddressingInterceptor::new(version, self.strategy.clone())
            .with_senders(self.senders.clone())
            .with_output_action_suffix(self.output_action_suffix.clone());
        if let Some(action) = action {
            if let Some(reply_action) = self.reply_actions.get(action) {
                interceptor = interceptor.with_reply_action(reply_action.clone());
            }
            if !self.fault_action_suffix.is_empty() {
                interceptor =
                    interceptor.with_fault_action(format!("{action}{}", self.fault_action_suffix));
            }
        }

        let mut interceptors = self.support.interceptors().to_vec();
        interceptors.push(Arc::new(interceptor));
        interceptors.extend(self.post_interceptors.iter().cloned());
        self.support.create_chain_with(endpoint, interceptors)
    }
}

impl EndpointMapping for ActionMapping {
    fn endpoint(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError> {
        let header = context.request().envelope().header();
        let Some(version) = detect_version(&self.versions, header) else {
            return Ok(None);
        };
        debug!(version = %version, "Request uses WS-Addressing");

        let text_of = |name: QName| {
            header.and_then(|h| {
                h.examine_header_elements(&name)
                    .next()
                    .map(|e| e.text().trim().to_string())
            })
        };
        let action = text_of(version.action_name()).filter(|a| !a.is_empty());

        if let Some(address) = &self.address {
            let to = text_of(version.to_name()).unwrap_or_else(|| version.anonymous_uri());
            if &to != address {
                debug!(to = %to, expected = %address, "Request To does not match mapping address");
                return Ok(None);
            }
        }

        let found = action
            .as_ref()
            .and_then(|action| self.endpoints.lookup(action))
            .or(self.support.default_endpoint());
        Ok(found.map(|endpoint| self.chain(endpoint.clone(), version, action.as_deref())))
    }

    fn order(&self) -> i32 {
        self.support.order()
    }
}
