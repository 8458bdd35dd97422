//! Interceptor enforcing WS-Addressing on requests and addressing replies.

use super::map::{
    AddressingHeaders, AddressingViolation, EndpointReference, MessageAddressingProperties,
    ViolationKind,
};
use super::message_id::MessageIdStrategy;
use super::version::AddressingVersion;
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInterceptor, Flow};
use crate::error::SoapError;
use crate::soap::fault::DEFAULT_LOCALE;
use crate::soap::{HeaderElement, SoapMessage, SoapVersion};
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

/// Property holding the request's [`MessageAddressingProperties`]. After an
/// addressing fault it holds whatever could still be read from the request.
pub const MAP_PROPERTY: &str = "zentinel.addressing.map";
/// Property holding the [`AddressingState`] of the current message.
pub const STATE_PROPERTY: &str = "zentinel.addressing.state";

/// Processing state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingState {
    NotProcessed,
    HeadersExtracted,
    Validated,
    MapApplied,
    FaultGenerated,
}

/// Delivers replies whose address is neither anonymous nor none.
pub trait MessageSender: Send + Sync {
    fn supports(&self, uri: &Url) -> bool;

    fn send(&self, uri: &Url, message: &SoapMessage) -> Result<(), SoapError>;
}

pub struct AddressingInterceptor {
    version: AddressingVersion,
    strategy: Arc<dyn MessageIdStrategy>,
    senders: Vec<Arc<dyn MessageSender>>,
    reply_action: Option<String>,
    fault_action: Option<String>,
    output_action_suffix: String,
}

impl AddressingInterceptor {
    pub fn new(version: AddressingVersion, strategy: Arc<dyn MessageIdStrategy>) -> Self {
        Self {
            version,
            strategy,
            senders: Vec::new(),
            reply_action: None,
            fault_action: None,
            output_action_suffix: "Response".to_string(),
        }
    }

    pub fn with_senders(mut self, senders: Vec<Arc<dyn MessageSender>>) -> Self {
        self.senders = senders;
        self
    }

    /// Action of replies; defaults to the request action plus the output
    /// suffix.
    pub fn with_reply_action(mut self, action: impl Into<String>) -> Self {
        self.reply_action = Some(action.into());
        self
    }

    /// Action of faults; defaults to the version's fault action.
    pub fn with_fault_action(mut self, action: impl Into<String>) -> Self {
        self.fault_action = Some(action.into());
        self
    }

    pub fn with_output_action_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.output_action_suffix = suffix.into();
        self
    }

    pub fn version(&self) -> AddressingVersion {
        self.version
    }

    fn set_state(context: &mut MessageContext, state: AddressingState) {
        context.set_property(STATE_PROPERTY, state);
    }

    fn state(context: &MessageContext) -> AddressingState {
        context
            .property::<AddressingState>(STATE_PROPERTY)
            .copied()
            .unwrap_or(AddressingState::NotProcessed)
    }

    fn reply_action_for(&self, map: &MessageAddressingProperties) -> String {
        self.reply_action
            .clone()
            .unwrap_or_else(|| format!("{}{}", map.action(), self.output_action_suffix))
    }

    fn fault_action(&self) -> String {
        self.fault_action
            .clone()
            .unwrap_or_else(|| self.version.default_fault_action())
    }

    /// Replace the response with an addressing fault.
    fn write_fault(
        &self,
        context: &mut MessageContext,
        violation: &AddressingViolation,
    ) -> Result<(), SoapError> {
        let version = self.version;
        let (subcode, reason) = match violation.kind {
            ViolationKind::HeaderRequired => (
                version.header_required_fault_subcode(),
                version.header_required_fault_reason(),
            ),
            ViolationKind::InvalidHeader => (
                version.invalid_header_fault_subcode(),
                version.invalid_header_fault_reason(),
            ),
        };
        let fault_action = self.fault_action();
        let response = context.response();
        let soap_version = response.version();
        let body = response.body_mut();
        let fault = match soap_version {
            SoapVersion::Soap11 => body.add_fault(subcode, reason, Some(DEFAULT_LOCALE))?,
            SoapVersion::Soap12 => {
                let fault = body.add_client_or_sender_fault(reason, Some(DEFAULT_LOCALE))?;
                fault.append_subcode(subcode)?;
                fault
            }
        };
        if let Some(problem) = version.problem_header_qname_name() {
            let entry = fault.add_detail().add_detail_element(problem);
            let header = &violation.header;
            let prefix = header.prefix().unwrap_or(version.prefix()).to_string();
            entry.sink().declare_namespace(prefix.clone(), header.namespace());
            entry.add_text(&format!("{prefix}:{}", header.local_part()));
        }
        let header = response.envelope_mut().header_mut();
        header.add_namespace_declaration(version.prefix(), version.namespace_uri());
        header
            .add_header_element(version.action_name())
            .set_text(fault_action);
        Ok(())
    }

    /// Route a reply or fault to the request's reply address.
    ///
    /// Faults this interceptor generated carry the properties that could
    /// still be read from the rejected request; their provisional `Action`
    /// header is replaced by the reply headers.
    fn handle_response_or_fault(
        &self,
        context: &mut MessageContext,
        is_fault: bool,
    ) -> Result<Flow, SoapError> {
        let generated = Self::state(context) == AddressingState::FaultGenerated;
        let Some(map) = context
            .property::<MessageAddressingProperties>(MAP_PROPERTY)
            .cloned()
        else {
            return Ok(Flow::Continue);
        };

        let epr = match map.reply_endpoint(is_fault) {
            Some(epr) if !epr.is_none(self.version) => epr,
            other => {
                debug!(
                    reply_to = other.as_ref().map(EndpointReference::address),
                    fault = is_fault,
                    "Request has no reply address; reply discarded"
                );
                context.clear_response();
                return Ok(Flow::Respond);
            }
        };

        let message_id = self.strategy.new_message_id();
        trace!(message_id = %message_id, "Generated reply MessageID");
        let action = if is_fault {
            self.fault_action()
        } else {
            self.reply_action_for(&map)
        };
        let reply = map.reply_properties(&epr, action, message_id);
        let header = context.response().envelope_mut().header_mut();
        if generated {
            header.remove_header_element(&self.version.action_name());
        }
        reply.write_headers(self.version, header);
        Self::set_state(context, AddressingState::MapApplied);

        if epr.is_anonymous(self.version) {
            debug!(address = %epr, fault = is_fault, "Sending in-band reply");
            return Ok(Flow::Continue);
        }
        self.send_out_of_band(context, &epr)?;
        Ok(Flow::Respond)
    }

    /// Write the addressing fault for `violation` and keep `map` for the
    /// fault phase. Without a map the fault goes back in-band.
    fn reject(
        &self,
        context: &mut MessageContext,
        violation: &AddressingViolation,
        map: Option<MessageAddressingProperties>,
    ) -> Result<Flow, SoapError> {
        debug!(
            version = %self.version,
            header = %violation.header,
            reason = %violation.message,
            "Rejecting request with addressing fault"
        );
        self.write_fault(context, violation)?;
        if let Some(map) = map {
            context.set_property(MAP_PROPERTY, map);
        }
        Self::set_state(context, AddressingState::FaultGenerated);
        Ok(Flow::Fault)
    }

    fn send_out_of_band(
        &self,
        context: &mut MessageContext,
        epr: &EndpointReference,
    ) -> Result<(), SoapError> {
        let url = Url::parse(epr.address())
            .map_err(|e| SoapError::Addressing(format!("invalid reply address [{epr}]: {e}")))?;
        let Some(response) = context.take_response() else {
            return Ok(());
        };
        match self.senders.iter().find(|sender| sender.supports(&url)) {
            Some(sender) => {
                debug!(address = %url, "Sending out-of-band reply");
                sender.send(&url, &response)
            }
            None => {
                warn!(
                    address = %url,
                    "Could not send out-of-band response; no message sender supports this address"
                );
                Ok(())
            }
        }
    }
}

impl EndpointInterceptor for AddressingInterceptor {
    fn name(&self) -> &str {
        "AddressingInterceptor"
    }

    fn understands(&self, header: &HeaderElement) -> bool {
        self.version.understands(header)
    }

    fn handle_request(&self, context: &mut MessageContext, _endpoint: &Endpoint) -> Result<Flow, SoapError> {
        Self::set_state(context, AddressingState::NotProcessed);
        let extracted =
            AddressingHeaders::extract(self.version, context.request().envelope().header()).map(
                |headers| {
                    let fallback = headers.fault_properties(self.version);
                    (fallback, headers.validate(self.version))
                },
            );
        let (fallback, outcome) = match extracted {
            Ok((fallback, outcome)) => {
                Self::set_state(context, AddressingState::HeadersExtracted);
                (Some(fallback), outcome)
            }
            Err(violation) => (None, Err(violation)),
        };

        let map = match outcome {
            Ok(map) => map,
            Err(violation) => return self.reject(context, &violation, fallback),
        };

        if let Some(id) = map.message_id() {
            if self.strategy.is_duplicate(id) {
                let violation = AddressingViolation::invalid(
                    self.version.message_id_name(),
                    format!("duplicate message ID {id}"),
                );
                debug!(message_id = %id, "Duplicate message");
                return self.reject(context, &violation, Some(map));
            }
        }

        debug!(action = %map.action(), to = %map.to(), "Validated addressing headers");
        context.set_property(MAP_PROPERTY, map);
        Self::set_state(context, AddressingState::Validated);
        Ok(Flow::Continue)
    }

    fn handle_response(&self, context: &mut MessageContext, _endpoint: &Endpoint) -> Result<Flow, SoapError> {
        self.handle_response_or_fault(context, false)
    }

    fn handle_fault(&self, context: &mut MessageContext, _endpoint: &Endpoint) -> Result<Flow, SoapError> {
        self.handle_response_or_fault(context, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::message_id::{TrackingMessageIdStrategy, UuidMessageIdStrategy};
    use crate::qname::QName;
    use crate::soap::SoapMessageFactory;
    use crate::xml::XmlElement;
    use std::sync::Mutex;

    const V10: AddressingVersion = AddressingVersion::V10;

    fn context(map: Option<MessageAddressingProperties>) -> MessageContext {
        let mut request = SoapMessage::new(SoapVersion::Soap12);
        request
            .body_mut()
            .set_payload(XmlElement::new(QName::new("urn:test", "ping")));
        if let Some(map) = map {
            map.write_headers(request.envelope_mut().header_mut());
        }
        MessageContext::new(request, Arc::new(SoapMessageFactory::new(SoapVersion::Soap12)))
    }

    fn interceptor() -> AddressingInterceptor {
        AddressingInterceptor::new(V10, Arc::new(UuidMessageIdStrategy))
    }

    fn endpoint() -> Endpoint {
        Endpoint::payload_fn(|_| Ok(None))
    }

    fn header_text(message: &SoapMessage, name: &QName) -> Option<String> {
        message
            .envelope()
            .header()?
            .examine_header_elements(name)
            .next()
            .map(HeaderElement::text)
    }

    #[test]
    fn test_missing_action_generates_fault() {
        let interceptor = interceptor();
        let mut ctx = context(None);
        let flow = interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        assert_eq!(flow, Flow::Fault);

        let response = ctx.existing_response().unwrap();
        let fault = response.body().fault().unwrap();
        assert_eq!(fault.subcodes()[0], V10.header_required_fault_subcode());
        assert_eq!(
            header_text(response, &V10.action_name()).as_deref(),
            Some("http://www.w3.org/2005/08/addressing/fault")
        );
        assert_eq!(
            ctx.property::<AddressingState>(STATE_PROPERTY),
            Some(&AddressingState::FaultGenerated)
        );

        // No reply address could be read, so the fault goes back in-band
        // with a single Action header.
        let flow = interceptor.handle_fault(&mut ctx, &endpoint()).unwrap();
        assert_eq!(flow, Flow::Continue);
        let response = ctx.existing_response().unwrap();
        let header = response.envelope().header().unwrap();
        assert_eq!(header.examine_header_elements(&V10.action_name()).count(), 1);
        assert_eq!(
            header_text(response, &V10.to_name()).as_deref(),
            Some("http://www.w3.org/2005/08/addressing/anonymous")
        );
    }

    #[test]
    fn test_soap11_fault_uses_subcode_as_code() {
        let interceptor = AddressingInterceptor::new(V10, Arc::new(UuidMessageIdStrategy));
        let request = SoapMessage::new(SoapVersion::Soap11);
        let mut ctx = MessageContext::new(request, Arc::new(SoapMessageFactory::default()));
        interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        let fault = ctx.existing_response().unwrap().body().fault().unwrap();
        assert_eq!(fault.code(), &V10.header_required_fault_subcode());
    }

    #[test]
    fn test_in_band_reply_headers() {
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:req-1")
            .with_reply_to(EndpointReference::new(V10.anonymous_uri()));
        let interceptor = interceptor();
        let mut ctx = context(Some(map));
        assert_eq!(interceptor.handle_request(&mut ctx, &endpoint()).unwrap(), Flow::Continue);

        ctx.response()
            .body_mut()
            .set_payload(XmlElement::new(QName::new("urn:test", "pong")));
        assert_eq!(interceptor.handle_response(&mut ctx, &endpoint()).unwrap(), Flow::Continue);

        let response = ctx.existing_response().unwrap();
        assert_eq!(header_text(response, &V10.action_name()).as_deref(), Some("urn:pingResponse"));
        assert_eq!(header_text(response, &V10.relates_to_name()).as_deref(), Some("urn:uuid:req-1"));
        assert!(header_text(response, &V10.message_id_name()).is_some());
        assert_eq!(
            ctx.property::<AddressingState>(STATE_PROPERTY),
            Some(&AddressingState::MapApplied)
        );
    }

    #[test]
    fn test_absent_reply_to_discards_reply() {
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping");
        let interceptor = interceptor();
        let mut ctx = context(Some(map));
        interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        ctx.response()
            .body_mut()
            .set_payload(XmlElement::new(QName::new("urn:test", "pong")));

        assert_eq!(interceptor.handle_response(&mut ctx, &endpoint()).unwrap(), Flow::Respond);
        assert!(!ctx.has_response());
    }

    #[test]
    fn test_duplicate_message_id_rejected() {
        let strategy = Arc::new(TrackingMessageIdStrategy::new(UuidMessageIdStrategy));
        let interceptor = AddressingInterceptor::new(V10, strategy);
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:dup");

        let mut first = context(Some(map.clone()));
        assert_eq!(interceptor.handle_request(&mut first, &endpoint()).unwrap(), Flow::Continue);

        let mut second = context(Some(map));
        assert_eq!(interceptor.handle_request(&mut second, &endpoint()).unwrap(), Flow::Fault);
        let fault = second.existing_response().unwrap().body().fault().unwrap();
        assert_eq!(fault.subcodes()[0], V10.invalid_header_fault_subcode());
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, SoapMessage)>>,
    }

    impl RecordingSender {
        fn addresses(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(uri, _)| uri.clone()).collect()
        }

        fn last(&self) -> SoapMessage {
            self.sent.lock().unwrap().last().unwrap().1.clone()
        }
    }

    impl MessageSender for RecordingSender {
        fn supports(&self, uri: &Url) -> bool {
            uri.scheme() == "http"
        }

        fn send(&self, uri: &Url, message: &SoapMessage) -> Result<(), SoapError> {
            self.sent.lock().unwrap().push((uri.to_string(), message.clone()));
            Ok(())
        }
    }

    fn with_sender(interceptor: AddressingInterceptor) -> (AddressingInterceptor, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let interceptor = interceptor.with_senders(vec![sender.clone() as Arc<dyn MessageSender>]);
        (interceptor, sender)
    }

    #[test]
    fn test_out_of_band_reply() {
        let (interceptor, sender) = with_sender(interceptor());
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:req-2")
            .with_reply_to(EndpointReference::new("http://client.example.com/callback"));
        let mut ctx = context(Some(map));
        interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        ctx.response()
            .body_mut()
            .set_payload(XmlElement::new(QName::new("urn:test", "pong")));

        assert_eq!(interceptor.handle_response(&mut ctx, &endpoint()).unwrap(), Flow::Respond);
        assert!(!ctx.has_response());
        assert_eq!(sender.addresses(), ["http://client.example.com/callback"]);
    }

    fn server_fault(ctx: &mut MessageContext) {
        ctx.response()
            .body_mut()
            .add_server_or_receiver_fault("boom", None)
            .unwrap();
    }

    #[test]
    fn test_fault_routed_to_fault_to() {
        let (interceptor, sender) = with_sender(interceptor());
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:req-3")
            .with_reply_to(EndpointReference::new(V10.anonymous_uri()))
            .with_fault_to(EndpointReference::new("http://client.example.com/faults"));
        let mut ctx = context(Some(map));
        interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        server_fault(&mut ctx);

        assert_eq!(interceptor.handle_fault(&mut ctx, &endpoint()).unwrap(), Flow::Respond);
        assert!(!ctx.has_response());
        assert_eq!(sender.addresses(), ["http://client.example.com/faults"]);
        let sent = sender.last();
        assert!(sent.has_fault());
        assert_eq!(header_text(&sent, &V10.relates_to_name()).as_deref(), Some("urn:uuid:req-3"));
        assert_eq!(
            header_text(&sent, &V10.action_name()),
            Some(V10.default_fault_action())
        );
    }

    #[test]
    fn test_fault_falls_back_to_reply_to() {
        let (interceptor, sender) = with_sender(interceptor());
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:req-4")
            .with_reply_to(EndpointReference::new("http://client.example.com/callback"));
        let mut ctx = context(Some(map));
        interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        server_fault(&mut ctx);

        assert_eq!(interceptor.handle_fault(&mut ctx, &endpoint()).unwrap(), Flow::Respond);
        assert_eq!(sender.addresses(), ["http://client.example.com/callback"]);
    }

    #[test]
    fn test_fault_to_none_discards_fault() {
        let (interceptor, sender) = with_sender(interceptor());
        let none = V10.none_uri().unwrap();
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:req-5")
            .with_reply_to(EndpointReference::new("http://client.example.com/callback"))
            .with_fault_to(EndpointReference::new(none));
        let mut ctx = context(Some(map));
        interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        server_fault(&mut ctx);

        assert_eq!(interceptor.handle_fault(&mut ctx, &endpoint()).unwrap(), Flow::Respond);
        assert!(!ctx.has_response());
        assert!(sender.addresses().is_empty());
    }

    #[test]
    fn test_duplicate_fault_goes_to_fault_to() {
        let strategy = Arc::new(TrackingMessageIdStrategy::new(UuidMessageIdStrategy));
        let (interceptor, sender) = with_sender(AddressingInterceptor::new(V10, strategy));
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "urn:ping")
            .with_message_id("urn:uuid:dup")
            .with_fault_to(EndpointReference::new("http://client.example.com/faults"));

        let mut first = context(Some(map.clone()));
        assert_eq!(interceptor.handle_request(&mut first, &endpoint()).unwrap(), Flow::Continue);

        let mut second = context(Some(map));
        assert_eq!(interceptor.handle_request(&mut second, &endpoint()).unwrap(), Flow::Fault);
        assert_eq!(interceptor.handle_fault(&mut second, &endpoint()).unwrap(), Flow::Respond);
        assert!(!second.has_response());
        assert_eq!(sender.addresses(), ["http://client.example.com/faults"]);

        let sent = sender.last();
        let fault = sent.body().fault().unwrap();
        assert_eq!(fault.subcodes()[0], V10.invalid_header_fault_subcode());
        let header = sent.envelope().header().unwrap();
        assert_eq!(header.examine_header_elements(&V10.action_name()).count(), 1);
        assert_eq!(header_text(&sent, &V10.relates_to_name()).as_deref(), Some("urn:uuid:dup"));
    }

    #[test]
    fn test_invalid_request_fault_uses_readable_reply_to() {
        let (interceptor, sender) = with_sender(interceptor());
        // An empty Action is invalid; ReplyTo and MessageID are still usable.
        let map = MessageAddressingProperties::new(V10, "http://svc.example.com", "")
            .with_message_id("urn:uuid:req-6")
            .with_reply_to(EndpointReference::new("http://client.example.com/callback"));
        let mut ctx = context(Some(map));
        assert_eq!(interceptor.handle_request(&mut ctx, &endpoint()).unwrap(), Flow::Fault);
        assert_eq!(interceptor.handle_fault(&mut ctx, &endpoint()).unwrap(), Flow::Respond);

        assert_eq!(sender.addresses(), ["http://client.example.com/callback"]);
        let sent = sender.last();
        assert_eq!(header_text(&sent, &V10.relates_to_name()).as_deref(), Some("urn:uuid:req-6"));
    }

    #[test]
    fn test_understands_own_namespace_only() {
        let interceptor = interceptor();
        let own = HeaderElement::new(SoapVersion::Soap12, V10.to_name());
        let other = HeaderElement::new(SoapVersion::Soap12, QName::new("urn:other", "To"));
        assert!(interceptor.understands(&own));
        assert!(!interceptor.understands(&other));
    }
}
