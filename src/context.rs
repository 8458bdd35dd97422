//! Per-request message context.

use crate::soap::{MessageFactory, SoapMessage};
use crate::transport::TransportHeaders;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Request, lazily created response and a property bag for one request.
///
/// A context is created by the receiver for each inbound message and
/// dropped once dispatch completes; it is never shared between requests.
pub struct MessageContext {
    request: SoapMessage,
    response: Option<SoapMessage>,
    factory: Arc<dyn MessageFactory>,
    transport_headers: TransportHeaders,
    properties: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl MessageContext {
    pub fn new(request: SoapMessage, factory: Arc<dyn MessageFactory>) -> Self {
        Self {
            request,
            response: None,
            factory,
            transport_headers: TransportHeaders::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_transport_headers(mut self, headers: TransportHeaders) -> Self {
        self.transport_headers = headers;
        self
    }

    pub fn request(&self) -> &SoapMessage {
        &self.request
    }

    /// The response, created through the factory on first access.
    pub fn response(&mut self) -> &mut SoapMessage {
        let factory = &self.factory;
        let request = &self.request;
        self.response
            .get_or_insert_with(|| factory.create_response(request))
    }

    /// The response if one has been created.
    pub fn existing_response(&self) -> Option<&SoapMessage> {
        self.response.as_ref()
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Drop the response; nothing is sent back in-band.
    pub fn clear_response(&mut self) {
        self.response = None;
    }

    pub fn take_response(&mut self) -> Option<SoapMessage> {
        self.response.take()
    }

    pub fn factory(&self) -> &Arc<dyn MessageFactory> {
        &self.factory
    }

    /// Headers of the inbound transport message.
    pub fn transport_headers(&self) -> &TransportHeaders {
        &self.transport_headers
    }

    pub fn set_property<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.properties.insert(name.into(), Box::new(value));
    }

    /// Typed property lookup; `None` when absent or of another type.
    pub fn property<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.properties.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn property_mut<T: Any + Send + Sync>(&mut self, name: &str) -> Option<&mut T> {
        self.properties
            .get_mut(name)
            .and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove_property(&mut self, name: &str) -> bool {
        self.properties.remove(name).is_some()
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

impl fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageContext")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}
