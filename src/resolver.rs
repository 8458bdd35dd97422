//! Exception resolution: turn endpoint errors into SOAP faults.

use crate::context::MessageContext;
use crate::endpoint::Endpoint;
use crate::error::SoapError;
use crate::soap::FaultDefinition;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Writes a fault for an error into the response.
pub trait ExceptionResolver: Send + Sync {
    /// Returns `true` when a fault was written and the error is handled.
    fn resolve_exception(
        &self,
        context: &mut MessageContext,
        endpoint: Option<&Endpoint>,
        error: &SoapError,
    ) -> bool;

    /// Lower values are consulted first.
    fn order(&self) -> i32 {
        i32::MAX
    }
}

/// Replace the response body with the fault `definition` describes.
fn write_fault(context: &mut MessageContext, definition: &FaultDefinition, error: &SoapError) -> bool {
    let reason = error.reason();
    match context
        .response()
        .body_mut()
        .add_fault_from_definition(definition, &reason)
    {
        Ok(fault) => {
            debug!(kind = %error.kind(), code = %fault.code(), "Resolved error into fault");
            true
        }
        Err(e) => {
            warn!(kind = %error.kind(), error = %e, "Could not write fault for error");
            false
        }
    }
}

/// Uses the fault an [`EndpointError`](crate::error::EndpointError)
/// declares for itself.
#[derive(Debug, Default)]
pub struct DeclaredFaultExceptionResolver;

impl ExceptionResolver for DeclaredFaultExceptionResolver {
    fn resolve_exception(
        &self,
        context: &mut MessageContext,
        _endpoint: Option<&Endpoint>,
        error: &SoapError,
    ) -> bool {
        match error.declared_fault() {
            Some(definition) => write_fault(context, definition, error),
            None => false,
        }
    }

    fn order(&self) -> i32 {
        0
    }
}

/// Registry of error kinds to faults.
///
/// Kinds are dotted paths: a mapping for `validation` also covers
/// `validation.range`, and the longest matching prefix wins.
#[derive(Debug, Default)]
pub struct FaultMappingExceptionResolver {
    mappings: HashMap<String, FaultDefinition>,
    default_fault: Option<FaultDefinition>,
    order: Option<i32>,
}

impl FaultMappingExceptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(mut self, mappings: HashMap<String, FaultDefinition>) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn add_mapping(&mut self, kind: impl Into<String>, definition: FaultDefinition) {
        self.mappings.insert(kind.into(), definition);
    }

    pub fn set_default_fault(&mut self, definition: FaultDefinition) {
        self.default_fault = Some(definition);
    }

    pub fn set_order(&mut self, order: i32) {
        self.order = Some(order);
    }

    /// The fault for `kind`, if any mapping (or the default) applies.
    pub fn lookup(&self, kind: &str) -> Option<&FaultDefinition> {
        self.mappings
            .iter()
            .filter(|(key, _)| {
                kind == key.as_str()
                    || kind
                        .strip_prefix(key.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            })
            .max_by_key(|(key, _)| key.len())
            .map(|(_, definition)| definition)
            .or(self.default_fault.as_ref())
    }
}

impl ExceptionResolver for FaultMappingExceptionResolver {
    fn resolve_exception(
        &self,
        context: &mut MessageContext,
        _endpoint: Option<&Endpoint>,
        error: &SoapError,
    ) -> bool {
        match self.lookup(error.kind()) {
            Some(definition) => write_fault(context, definition, error),
            None => false,
        }
    }

    fn order(&self) -> i32 {
        self.order.unwrap_or(i32::MAX - 1)
    }
}

/// Maps every error to a generic fault carrying the error message.
/// Receiver/Server unless configured otherwise.
#[derive(Debug)]
pub struct SimpleSoapExceptionResolver {
    definition: FaultDefinition,
}

impl SimpleSoapExceptionResolver {
    pub fn new(definition: FaultDefinition) -> Self {
        Self { definition }
    }
}

impl Default for SimpleSoapExceptionResolver {
    fn default() -> Self {
        Self::new(FaultDefinition::new(crate::soap::FaultCode::ServerOrReceiver))
    }
}

impl ExceptionResolver for SimpleSoapExceptionResolver {
    fn resolve_exception(
        &self,
        context: &mut MessageContext,
        _endpoint: Option<&Endpoint>,
        error: &SoapError,
    ) -> bool {
        write_fault(context, &self.definition, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EndpointError;
    use crate::soap::{FaultCode, SoapMessage, SoapMessageFactory, SoapVersion};
    use std::sync::Arc;

    fn context() -> MessageContext {
        MessageContext::new(
            SoapMessage::new(SoapVersion::Soap11),
            Arc::new(SoapMessageFactory::default()),
        )
    }

    fn fault_of(ctx: &MessageContext) -> (String, String) {
        let fault = ctx.existing_response().unwrap().body().fault().unwrap();
        (
            fault.code().local_part().to_string(),
            fault.reason().unwrap_or_default().to_string(),
        )
    }

    #[test]
    fn test_declared_fault() {
        let error = SoapError::from(
            EndpointError::new("validation", "x out of range")
                .with_fault(FaultDefinition::client_or_sender("bad input")),
        );
        let mut ctx = context();
        assert!(DeclaredFaultExceptionResolver.resolve_exception(&mut ctx, None, &error));
        assert_eq!(fault_of(&ctx), ("Client".to_string(), "bad input".to_string()));

        let plain = SoapError::from(EndpointError::new("validation", "nope"));
        let mut ctx = context();
        assert!(!DeclaredFaultExceptionResolver.resolve_exception(&mut ctx, None, &plain));
        assert!(!ctx.has_response());
    }

    #[test]
    fn test_most_specific_mapping_wins() {
        let mut resolver = FaultMappingExceptionResolver::new();
        resolver.add_mapping("validation", FaultDefinition::client_or_sender("invalid"));
        resolver.add_mapping(
            "validation.range",
            FaultDefinition::client_or_sender("out of range"),
        );

        assert_eq!(
            resolver.lookup("validation.range.max").unwrap().reason(),
            Some("out of range")
        );
        assert_eq!(resolver.lookup("validation.format").unwrap().reason(), Some("invalid"));
        assert!(resolver.lookup("validationx").is_none());
        assert!(resolver.lookup("storage").is_none());

        resolver.set_default_fault(FaultDefinition::new(FaultCode::ServerOrReceiver));
        assert_eq!(
            resolver.lookup("storage").unwrap().code(),
            &FaultCode::ServerOrReceiver
        );
    }

    #[test]
    fn test_mapping_falls_back_to_error_message() {
        let mut resolver = FaultMappingExceptionResolver::new();
        resolver.add_mapping("storage", FaultDefinition::new(FaultCode::ServerOrReceiver));
        let error = SoapError::from(EndpointError::new("storage.io", "disk full"));
        let mut ctx = context();
        assert!(resolver.resolve_exception(&mut ctx, None, &error));
        assert_eq!(fault_of(&ctx), ("Server".to_string(), "disk full".to_string()));
    }

    #[test]
    fn test_simple_resolver() {
        let error = SoapError::Interceptor("boom".to_string());
        let mut ctx = context();
        let resolver = SimpleSoapExceptionResolver::default();
        assert!(resolver.resolve_exception(&mut ctx, None, &error));
        let (code, reason) = fault_of(&ctx);
        assert_eq!(code, "Server");
        assert_eq!(reason, "Interceptor error: boom");
        assert_eq!(resolver.order(), i32::MAX);
    }
}
