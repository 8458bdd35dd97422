//! SOAP message dispatch for Zentinel
//!
//! A version-polymorphic SOAP envelope model, pluggable endpoint mappings,
//! an interceptor chain around endpoint invocation, exception resolution
//! into SOAP faults, and WS-Addressing support layered on top.
//!
//! # Features
//!
//! - SOAP 1.1 and 1.2 envelopes, headers, bodies and faults in one model
//! - Endpoint mapping by payload root, SOAP action, XPath, handler metadata
//!   or WS-Addressing action
//! - Interceptor phases with explicit continue/respond/fault outcomes
//! - MustUnderstand processing with actor/role support
//! - WS-Addressing 2004/08 and 1.0: validation, reply headers, message IDs
//!   and out-of-band replies
//! - Payload validation and message logging interceptors
//!
//! # Example
//!
//! ```ignore
//! use zentinel_soap_dispatch::{
//!     Endpoint, MessageDispatcher, PayloadRootMapping, QName, SoapMessageReceiver,
//! };
//!
//! let mut mapping = PayloadRootMapping::new();
//! mapping.register(
//!     QName::new("urn:example", "echo"),
//!     Endpoint::payload_fn(|request| Ok(request.cloned())),
//! )?;
//! let dispatcher = MessageDispatcher::new().with_mapping(mapping);
//! let receiver = SoapMessageReceiver::new(Arc::new(dispatcher), Arc::new(SoapMessageFactory::default()));
//! let response = receiver.receive(transport_message);
//! ```

pub mod addressing;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod interceptor;
pub mod mapping;
pub mod marshalling;
pub mod qname;
pub mod resolver;
pub mod soap;
pub mod stub;
pub mod transport;
pub mod xml;

pub use addressing::{ActionMapping, AddressingInterceptor, AddressingVersion};
pub use config::DispatcherConfig;
pub use context::MessageContext;
pub use dispatcher::MessageDispatcher;
pub use endpoint::{Endpoint, EndpointInterceptor, EndpointInvocationChain, Flow};
pub use error::{EndpointError, SoapError, ViolationCode};
pub use mapping::{
    EndpointMapping, MetadataMapping, PayloadRootMapping, SoapActionMapping, XPathMapping,
};
pub use qname::QName;
pub use resolver::{
    DeclaredFaultExceptionResolver, ExceptionResolver, FaultMappingExceptionResolver,
    SimpleSoapExceptionResolver,
};
pub use soap::{FaultDefinition, SoapMessage, SoapMessageFactory, SoapVersion};
pub use stub::StaticEndpoint;
pub use transport::{SoapMessageReceiver, TransportMessage, TransportResponse};
