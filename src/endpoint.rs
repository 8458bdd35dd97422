//! Endpoints, interceptors and the invocation chain that binds them.

use crate::context::MessageContext;
use crate::error::SoapError;
use crate::soap::HeaderElement;
use crate::xml::XmlElement;
use std::fmt;
use std::sync::Arc;

/// Endpoint that works on the body payload only.
pub trait PayloadEndpoint: Send + Sync {
    /// Handle the request payload (`None` for an empty body) and return the
    /// response payload, if any.
    fn invoke(&self, request: Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError>;
}

impl<F> PayloadEndpoint for F
where
    F: Fn(Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> + Send + Sync,
{
    fn invoke(&self, request: Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> {
        self(request)
    }
}

/// Endpoint with full access to the message context.
pub trait MessageEndpoint: Send + Sync {
    fn invoke(&self, context: &mut MessageContext) -> Result<(), SoapError>;
}

impl<F> MessageEndpoint for F
where
    F: Fn(&mut MessageContext) -> Result<(), SoapError> + Send + Sync,
{
    fn invoke(&self, context: &mut MessageContext) -> Result<(), SoapError> {
        self(context)
    }
}

/// An application handler, by capability.
#[derive(Clone)]
pub enum Endpoint {
    Payload(Arc<dyn PayloadEndpoint>),
    Message(Arc<dyn MessageEndpoint>),
}

impl Endpoint {
    pub fn payload(endpoint: impl PayloadEndpoint + 'static) -> Self {
        Self::Payload(Arc::new(endpoint))
    }

    pub fn message(endpoint: impl MessageEndpoint + 'static) -> Self {
        Self::Message(Arc::new(endpoint))
    }

    pub fn payload_fn<F>(f: F) -> Self
    where
        F: Fn(Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> + Send + Sync + 'static,
    {
        Self::Payload(Arc::new(f))
    }

    pub fn message_fn<F>(f: F) -> Self
    where
        F: Fn(&mut MessageContext) -> Result<(), SoapError> + Send + Sync + 'static,
    {
        Self::Message(Arc::new(f))
    }

    /// Invoke the endpoint; payload results become the response body.
    pub fn invoke(&self, context: &mut MessageContext) -> Result<(), SoapError> {
        match self {
            Self::Payload(endpoint) => {
                let response = endpoint.invoke(context.request().payload_source())?;
                if let Some(payload) = response {
                    context.response().body_mut().set_payload(payload);
                }
                Ok(())
            }
            Self::Message(endpoint) => endpoint.invoke(context),
        }
    }

    /// Whether both values refer to the same handler instance.
    pub fn same_as(&self, other: &Endpoint) -> bool {
        match (self, other) {
            (Self::Payload(a), Self::Payload(b)) => Arc::ptr_eq(a, b),
            (Self::Message(a), Self::Message(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(e) => write!(f, "PayloadEndpoint({:p})", Arc::as_ptr(e)),
            Self::Message(e) => write!(f, "MessageEndpoint({:p})", Arc::as_ptr(e)),
        }
    }
}

/// Outcome of an interceptor phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Proceed with the next interceptor (or the endpoint)
    Continue,
    /// Stop; the response has been populated
    Respond,
    /// Stop; the response carries a fault
    Fault,
}

/// Cross-cutting hook around endpoint invocation.
///
/// All phases default to [`Flow::Continue`], so implementations only
/// override what they need.
pub trait EndpointInterceptor: Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Per-request applicability. Interceptors returning `false` take part
    /// in no phase of this request.
    fn should_intercept(&self, _context: &MessageContext, _endpoint: &Endpoint) -> bool {
        true
    }

    /// Whether this interceptor processes the given mandatory header.
    fn understands(&self, _header: &HeaderElement) -> bool {
        false
    }

    fn handle_request(
        &self,
        _context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        Ok(Flow::Continue)
    }

    fn handle_response(
        &self,
        _context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        Ok(Flow::Continue)
    }

    fn handle_fault(
        &self,
        _context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        Ok(Flow::Continue)
    }

    /// Called for every interceptor whose request phase ran, whatever the
    /// outcome. Errors are logged by the dispatcher and otherwise ignored.
    fn after_completion(
        &self,
        _context: &mut MessageContext,
        _endpoint: &Endpoint,
        _error: Option<&SoapError>,
    ) -> Result<(), SoapError> {
        Ok(())
    }
}

/// An endpoint plus the interceptors and actors/roles that apply to it.
#[derive(Clone)]
pub struct EndpointInvocationChain {
    endpoint: Endpoint,
    interceptors: Vec<Arc<dyn EndpointInterceptor>>,
    actors_or_roles: Vec<String>,
    ultimate_receiver: bool,
}

impl EndpointInvocationChain {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            interceptors: Vec::new(),
            actors_or_roles: Vec::new(),
            ultimate_receiver: true,
        }
    }

    pub fn with_interceptors(mut self, interceptors: Vec<Arc<dyn EndpointInterceptor>>) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn with_actors_or_roles(mut self, actors_or_roles: Vec<String>) -> Self {
        self.actors_or_roles = actors_or_roles;
        self
    }

    pub fn with_ultimate_receiver(mut self, ultimate_receiver: bool) -> Self {
        self.ultimate_receiver = ultimate_receiver;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn interceptors(&self) -> &[Arc<dyn EndpointInterceptor>] {
        &self.interceptors
    }

    pub fn actors_or_roles(&self) -> &[String] {
        &self.actors_or_roles
    }

    pub fn is_ultimate_receiver(&self) -> bool {
        self.ultimate_receiver
    }
}

impl fmt::Debug for EndpointInvocationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointInvocationChain")
            .field("endpoint", &self.endpoint)
            .field(
                "interceptors",
                &self.interceptors.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("actors_or_roles", &self.actors_or_roles)
            .field("ultimate_receiver", &self.ultimate_receiver)
            .finish()
    }
}
