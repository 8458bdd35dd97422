//! The dispatch loop: mapping, mustUnderstand check, interceptor phases,
//! endpoint invocation and exception resolution.

use crate::addressing::{
    ActionMapping, MessageIdStrategy, RandomGuidMessageIdStrategy, TrackingMessageIdStrategy,
    UuidMessageIdStrategy,
};
use crate::config::{
    AddressingConfig, DispatcherConfig, LogMode, MessageIdStrategyKind, NoEndpointAction,
};
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInterceptor, EndpointInvocationChain, Flow};
use crate::error::SoapError;
use crate::interceptor::{LoggingInterceptor, PayloadValidatingInterceptor};
use crate::mapping::{EndpointMapping, PayloadRootMapping, SoapActionMapping};
use crate::qname::QName;
use crate::resolver::{
    DeclaredFaultExceptionResolver, ExceptionResolver, FaultMappingExceptionResolver,
};
use crate::soap::{SoapElement, SoapVersion};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Log target for requests no mapping accepted.
pub const ENDPOINT_NOT_FOUND_TARGET: &str = "zentinel_soap::endpoint_not_found";

/// Reason of the fault written when no endpoint is found.
pub const NO_ENDPOINT_FAULT_REASON: &str = "No endpoint found";

/// Dispatches requests to endpoints.
///
/// Mappings and resolvers are kept sorted by their order. The dispatcher is
/// configured once and then shared read-only by all requests.
pub struct MessageDispatcher {
    mappings: Vec<Arc<dyn EndpointMapping>>,
    resolvers: Vec<Arc<dyn ExceptionResolver>>,
    no_endpoint: NoEndpointAction,
    must_understand_fault_string: String,
    must_understand_fault_locale: String,
}

impl Default for MessageDispatcher {
    fn default() -> Self {
        Self {
            mappings: Vec::new(),
            resolvers: Vec::new(),
            no_endpoint: NoEndpointAction::Fault,
            must_understand_fault_string:
                "One or more mandatory SOAP header blocks not understood".to_string(),
            must_understand_fault_locale: "en".to_string(),
        }
    }
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mapping(&mut self, mapping: Arc<dyn EndpointMapping>) {
        self.mappings.push(mapping);
        self.mappings.sort_by_key(|m| m.order());
    }

    pub fn with_mapping(mut self, mapping: impl EndpointMapping + 'static) -> Self {
        self.add_mapping(Arc::new(mapping));
        self
    }

    pub fn add_resolver(&mut self, resolver: Arc<dyn ExceptionResolver>) {
        self.resolvers.push(resolver);
        self.resolvers.sort_by_key(|r| r.order());
    }

    pub fn with_resolver(mut self, resolver: impl ExceptionResolver + 'static) -> Self {
        self.add_resolver(Arc::new(resolver));
        self
    }

    pub fn with_no_endpoint_action(mut self, action: NoEndpointAction) -> Self {
        self.no_endpoint = action;
        self
    }

    pub fn with_must_understand_fault(
        mut self,
        reason: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self {
        self.must_understand_fault_string = reason.into();
        self.must_understand_fault_locale = locale.into();
        self
    }

    pub fn mappings(&self) -> &[Arc<dyn EndpointMapping>] {
        &self.mappings
    }

    pub fn resolvers(&self) -> &[Arc<dyn ExceptionResolver>] {
        &self.resolvers
    }

    /// Build a dispatcher from configuration.
    ///
    /// Every configured endpoint must have a handler in `endpoints` under its
    /// name and at least one of `payload_root`, `soap_action` or `action`.
    pub fn from_config(
        config: &DispatcherConfig,
        endpoints: &HashMap<String, Endpoint>,
    ) -> Result<Self, SoapError> {
        let mut interceptors: Vec<Arc<dyn EndpointInterceptor>> = Vec::new();
        if config.settings.log_messages != LogMode::Off {
            interceptors.push(Arc::new(LoggingInterceptor::new(config.settings.log_messages)));
        }
        if config.validation.enabled {
            interceptors.push(Arc::new(PayloadValidatingInterceptor::new(
                config.validation.clone(),
            )));
        }

        let mut by_action = ActionMapping::new();
        by_action.support_mut().set_order(0);
        by_action.support_mut().set_interceptors(interceptors.clone());
        by_action.set_versions(config.addressing.versions.clone());
        by_action.set_message_id_strategy(message_id_strategy(&config.addressing));
        by_action.set_output_action_suffix(config.addressing.output_action_suffix.clone());
        by_action.set_fault_action_suffix(config.addressing.fault_action_suffix.clone());
        if let Some(address) = &config.addressing.address {
            by_action.set_address(address.clone());
        }

        let mut by_root = PayloadRootMapping::new();
        by_root.support_mut().set_order(1);
        by_root.support_mut().set_interceptors(interceptors.clone());

        let mut by_soap_action = SoapActionMapping::new();
        by_soap_action.support_mut().set_order(2);
        by_soap_action.support_mut().set_interceptors(interceptors);

        let (mut actions, mut roots, mut soap_actions) = (0, 0, 0);
        for entry in &config.endpoints {
            let endpoint = endpoints.get(&entry.name).ok_or_else(|| {
                SoapError::Config(format!("no handler registered for endpoint '{}'", entry.name))
            })?;
            if entry.payload_root.is_none() && entry.soap_action.is_none() && entry.action.is_none()
            {
                return Err(SoapError::Config(format!(
                    "endpoint '{}' declares no payload_root, soap_action or action",
                    entry.name
                )));
            }
            if let Some(action) = &entry.action {
                if !config.addressing.enabled {
                    return Err(SoapError::Config(format!(
                        "endpoint '{}' maps a WS-Addressing action but addressing is disabled",
                        entry.name
                    )));
                }
                by_action.register(action.clone(), endpoint.clone())?;
                actions += 1;
            }
            if let Some(root) = &entry.payload_root {
                by_root.register(root.clone(), endpoint.clone())?;
                roots += 1;
            }
            if let Some(soap_action) = &entry.soap_action {
                by_soap_action.register(soap_action.clone(), endpoint.clone())?;
                soap_actions += 1;
            }
            debug!(endpoint = %entry.name, "Registered endpoint");
        }

        let mut dispatcher = Self::new()
            .with_no_endpoint_action(config.settings.no_endpoint)
            .with_must_understand_fault(
                config.settings.must_understand_fault_string.clone(),
                config.settings.must_understand_fault_locale.clone(),
            )
            .with_resolver(DeclaredFaultExceptionResolver);
        if actions > 0 {
            dispatcher.add_mapping(Arc::new(by_action));
        }
        if roots > 0 {
            dispatcher.add_mapping(Arc::new(by_root));
        }
        if soap_actions > 0 {
            dispatcher.add_mapping(Arc::new(by_soap_action));
        }

        if !config.exception_mappings.is_empty() || config.default_fault.is_some() {
            let mut resolver = FaultMappingExceptionResolver::new()
                .with_mappings(config.exception_mappings.clone());
            if let Some(default_fault) = &config.default_fault {
                resolver.set_default_fault(default_fault.clone());
            }
            dispatcher.add_resolver(Arc::new(resolver));
        }

        Ok(dispatcher)
    }

    /// Dispatch one request.
    ///
    /// Returns `Ok` when the context holds the answer (a response, a fault,
    /// or no response at all). Errors no resolver handled are returned and
    /// must be answered at the transport level.
    pub fn dispatch(&self, context: &mut MessageContext) -> Result<(), SoapError> {
        let chain = match self.lookup(context) {
            Ok(Some(chain)) => chain,
            Ok(None) => return self.handle_no_endpoint(context),
            Err(e) => {
                if self.resolve_exception(context, None, &e) {
                    return Ok(());
                }
                return Err(e);
            }
        };

        let endpoint = chain.endpoint();
        debug!(endpoint = ?endpoint, "Endpoint mapped");
        let interceptors: Vec<Arc<dyn EndpointInterceptor>> = chain
            .interceptors()
            .iter()
            .filter(|i| i.should_intercept(context, endpoint))
            .cloned()
            .collect();

        if !self.check_must_understand(context, &chain, &interceptors)? {
            return Ok(());
        }

        let mut executed = 0;
        let mut error = None;
        let mut proceed = true;
        let mut faulted = false;
        for interceptor in &interceptors {
            executed += 1;
            match interceptor.handle_request(context, endpoint) {
                Ok(Flow::Continue) => {}
                Ok(flow) => {
                    debug!(interceptor = interceptor.name(), ?flow, "Request phase short-circuited");
                    faulted = flow == Flow::Fault;
                    proceed = false;
                    break;
                }
                Err(e) => {
                    error = Some(e);
                    proceed = false;
                    break;
                }
            }
        }
        let ran = &interceptors[..executed];

        if proceed {
            if let Err(e) = endpoint.invoke(context) {
                error = Some(e);
            }
        }

        if let Some(e) = error.take() {
            if !self.resolve_exception(context, Some(endpoint), &e) {
                trigger_after_completion(context, endpoint, ran, Some(&e));
                return Err(e);
            }
            error = Some(e);
        }

        if let Err(e) = trigger_handle_response(context, endpoint, ran, faulted) {
            if !self.resolve_exception(context, Some(endpoint), &e) {
                trigger_after_completion(context, endpoint, ran, Some(&e));
                return Err(e);
            }
            error = Some(e);
        }

        trigger_after_completion(context, endpoint, ran, error.as_ref());
        Ok(())
    }

    fn lookup(&self, context: &MessageContext) -> Result<Option<EndpointInvocationChain>, SoapError> {
        for mapping in &self.mappings {
            if let Some(chain) = mapping.endpoint(context)? {
                return Ok(Some(chain));
            }
        }
        Ok(None)
    }

    fn handle_no_endpoint(&self, context: &mut MessageContext) -> Result<(), SoapError> {
        let request = context.request();
        let description = match request.payload_source() {
            Some(payload) => payload.name().to_string(),
            None => "empty body".to_string(),
        };
        warn!(
            target: ENDPOINT_NOT_FOUND_TARGET,
            payload = %description,
            soap_action = request.soap_action().unwrap_or("-"),
            "No endpoint mapping found"
        );
        match self.no_endpoint {
            NoEndpointAction::Fault => {
                context
                    .response()
                    .body_mut()
                    .add_client_or_sender_fault(NO_ENDPOINT_FAULT_REASON, None)?;
                Ok(())
            }
            NoEndpointAction::NotFound => Err(SoapError::NoEndpointFound(description)),
        }
    }

    /// Returns `false` after writing a MustUnderstand fault.
    fn check_must_understand(
        &self,
        context: &mut MessageContext,
        chain: &EndpointInvocationChain,
        interceptors: &[Arc<dyn EndpointInterceptor>],
    ) -> Result<bool, SoapError> {
        let request = context.request();
        let version = request.version();
        let Some(header) = request.envelope().header() else {
            return Ok(true);
        };
        let not_understood: Vec<QName> = header
            .examine_header_elements_to_process(chain.actors_or_roles(), chain.is_ultimate_receiver())
            .into_iter()
            .filter(|h| h.must_understand())
            .filter(|h| !interceptors.iter().any(|i| i.understands(h)))
            .map(|h| h.name())
            .collect();
        if not_understood.is_empty() {
            return Ok(true);
        }

        warn!(headers = ?not_understood, "Mandatory header blocks not understood");
        let response = context.response();
        let fault = response.body_mut().add_must_understand_fault(
            &self.must_understand_fault_string,
            Some(&self.must_understand_fault_locale),
        )?;
        match version {
            SoapVersion::Soap11 => {
                if let Some(actor) = chain.actors_or_roles().first() {
                    fault.set_actor_or_role(actor.clone());
                }
            }
            SoapVersion::Soap12 => {
                let header = response.envelope_mut().header_mut();
                for name in &not_understood {
                    header.add_not_understood_header_element(name)?;
                }
            }
        }
        Ok(false)
    }

    fn resolve_exception(
        &self,
        context: &mut MessageContext,
        endpoint: Option<&Endpoint>,
        error: &SoapError,
    ) -> bool {
        for resolver in &self.resolvers {
            if resolver.resolve_exception(context, endpoint, error) {
                debug!(kind = %error.kind(), "Error resolved into fault");
                return true;
            }
        }
        warn!(kind = %error.kind(), error = %error, "No exception resolver handled error");
        false
    }
}

/// Response or fault phase, reverse order, over the interceptors whose
/// request phase ran. Skipped when there is no response.
///
/// The fault phase runs when the response carries a fault or when the
/// request phase ended with `Flow::Fault`.
fn trigger_handle_response(
    context: &mut MessageContext,
    endpoint: &Endpoint,
    ran: &[Arc<dyn EndpointInterceptor>],
    request_faulted: bool,
) -> Result<(), SoapError> {
    let Some(response) = context.existing_response() else {
        return Ok(());
    };
    let is_fault = request_faulted || response.has_fault();
    for interceptor in ran.iter().rev() {
        let flow = if is_fault {
            interceptor.handle_fault(context, endpoint)?
        } else {
            interceptor.handle_response(context, endpoint)?
        };
        if flow != Flow::Continue {
            debug!(interceptor = interceptor.name(), ?flow, "Response phase short-circuited");
            break;
        }
    }
    Ok(())
}

fn trigger_after_completion(
    context: &mut MessageContext,
    endpoint: &Endpoint,
    ran: &[Arc<dyn EndpointInterceptor>],
    error: Option<&SoapError>,
) {
    for interceptor in ran.iter().rev() {
        if let Err(e) = interceptor.after_completion(context, endpoint, error) {
            warn!(interceptor = interceptor.name(), error = %e, "afterCompletion failed");
        }
    }
}

fn message_id_strategy(config: &AddressingConfig) -> Arc<dyn MessageIdStrategy> {
    fn tracked<S: MessageIdStrategy + 'static>(
        inner: S,
        config: &AddressingConfig,
    ) -> Arc<dyn MessageIdStrategy> {
        if config.detect_duplicates {
            Arc::new(TrackingMessageIdStrategy::with_capacity(
                inner,
                config.duplicate_window,
            ))
        } else {
            Arc::new(inner)
        }
    }

    match config.message_id_strategy {
        MessageIdStrategyKind::Uuid => tracked(UuidMessageIdStrategy, config),
        MessageIdStrategyKind::Random => tracked(RandomGuidMessageIdStrategy::new(), config),
        MessageIdStrategyKind::SecureRandom => {
            tracked(RandomGuidMessageIdStrategy::secure(), config)
        }
    }
}
