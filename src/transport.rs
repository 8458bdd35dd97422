//! Transport boundary: header multimap, raw messages and the receiver that
//! turns them into dispatcher calls.

use crate::config::SettingsConfig;
use crate::context::MessageContext;
use crate::dispatcher::MessageDispatcher;
use crate::error::SoapError;
use crate::soap::{MessageFactory, SoapElement, SoapMessage, SoapMessageFactory, SoapVersion};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, enabled, error, trace, warn, Level};

/// Header multimap. Names compare case-insensitively, values may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportHeaders {
    entries: Vec<(String, String)>,
}

impl TransportHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping existing values of the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace all values of `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for TransportHeaders {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

/// A raw transport message: headers plus body bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportMessage {
    pub headers: TransportHeaders,
    pub body: Vec<u8>,
}

impl TransportMessage {
    pub fn new(headers: TransportHeaders, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.headers.get(CONTENT_TYPE).map(ContentType::parse)
    }
}

pub const CONTENT_TYPE: &str = "Content-Type";
pub const SOAP_ACTION: &str = "SOAPAction";

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    media_type: String,
    parameters: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            parameters: Vec::new(),
        }
    }

    /// Lenient parse: malformed parameters are skipped.
    pub fn parse(value: &str) -> Self {
        let mut pieces = split_unquoted(value, ';').into_iter();
        let media_type = pieces.next().unwrap_or_default().trim().to_ascii_lowercase();
        let parameters = pieces
            .filter_map(|piece| {
                let (name, value) = piece.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote(value.trim())))
            })
            .collect();
        Self {
            media_type,
            parameters,
        }
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        self.parameters.retain(|(n, _)| *n != name);
        self.parameters.push((name, value.into()));
        self
    }

    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.media_type)?;
        for (name, value) in &self.parameters {
            if value.is_empty() || value.contains(|c: char| "()<>@,;:\\\"/[]?= ".contains(c)) {
                write!(f, "; {}=\"{}\"", name, value.replace('"', "\\\""))?;
            } else {
                write!(f, "; {name}={value}")?;
            }
        }
        Ok(())
    }
}

fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                pieces.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&value[start..]);
    pieces
}

/// Strip surrounding double quotes and unescape `\"`.
pub(crate) fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].replace("\\\"", "\"")
    } else {
        value.to_string()
    }
}

/// Log target for received messages.
pub const RECEIVED_TARGET: &str = "zentinel_soap::message_tracing::received";
/// Log target for sent messages.
pub const SENT_TARGET: &str = "zentinel_soap::message_tracing::sent";

/// Answer to a transport message: a status code and an optional body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP-style status code
    pub status: u16,
    pub message: Option<TransportMessage>,
}

impl TransportResponse {
    pub const OK: u16 = 200;
    pub const ACCEPTED: u16 = 202;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const PAYLOAD_TOO_LARGE: u16 = 413;
    pub const INTERNAL_ERROR: u16 = 500;

    fn empty(status: u16) -> Self {
        Self {
            status,
            message: None,
        }
    }
}

/// Reads transport messages, dispatches them and writes the answer.
pub struct SoapMessageReceiver {
    dispatcher: Arc<MessageDispatcher>,
    factory: Arc<dyn MessageFactory>,
    max_body_size: usize,
    message_tracing: bool,
}

impl SoapMessageReceiver {
    pub fn new(dispatcher: Arc<MessageDispatcher>, factory: Arc<dyn MessageFactory>) -> Self {
        let settings = SettingsConfig::default();
        Self {
            dispatcher,
            factory,
            max_body_size: settings.max_body_size,
            message_tracing: settings.message_tracing,
        }
    }

    pub fn from_config(settings: &SettingsConfig, dispatcher: Arc<MessageDispatcher>) -> Self {
        Self::new(dispatcher, Arc::new(SoapMessageFactory::new(settings.soap_version)))
            .with_max_body_size(settings.max_body_size)
            .with_message_tracing(settings.message_tracing)
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_message_tracing(mut self, message_tracing: bool) -> Self {
        self.message_tracing = message_tracing;
        self
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    /// Handle one inbound message.
    ///
    /// Status codes: 200 response, 202 no response, 400 malformed message
    /// or SOAP 1.2 Sender fault, 404 no endpoint, 413 body too large, 500
    /// any other SOAP fault (with body) or unresolved error (without body).
    pub fn receive(&self, message: TransportMessage) -> TransportResponse {
        if message.body.len() > self.max_body_size {
            warn!(
                size = message.body.len(),
                max = self.max_body_size,
                "Request body exceeds size limit"
            );
            return TransportResponse::empty(TransportResponse::PAYLOAD_TOO_LARGE);
        }

        let request = match self.factory.read_message(&message) {
            Ok(request) => request,
            Err(e) if e.is_malformed_message() => {
                debug!(error = %e, "Rejecting malformed message");
                return TransportResponse::empty(TransportResponse::BAD_REQUEST);
            }
            Err(e) => {
                error!(error = %e, "Could not read message");
                return TransportResponse::empty(TransportResponse::INTERNAL_ERROR);
            }
        };
        if self.message_tracing {
            trace_message(RECEIVED_TARGET, "Received request", &request);
        }

        let mut context =
            MessageContext::new(request, self.factory.clone()).with_transport_headers(message.headers);
        match self.dispatcher.dispatch(&mut context) {
            Ok(()) => {}
            Err(SoapError::NoEndpointFound(what)) => {
                debug!(request = %what, "Answering not found");
                return TransportResponse::empty(TransportResponse::NOT_FOUND);
            }
            Err(e) => {
                error!(kind = %e.kind(), error = %e, "Unresolved error while dispatching");
                return TransportResponse::empty(TransportResponse::INTERNAL_ERROR);
            }
        }

        let Some(response) = context.take_response() else {
            debug!("No response for request");
            return TransportResponse::empty(TransportResponse::ACCEPTED);
        };
        if self.message_tracing {
            trace_message(SENT_TARGET, "Sent response", &response);
        }

        let mut out = TransportMessage::default();
        if let Err(e) = response.write_to(&mut out) {
            error!(error = %e, "Could not write response");
            return TransportResponse::empty(TransportResponse::INTERNAL_ERROR);
        }
        let status = response_status(&response);
        TransportResponse {
            status,
            message: Some(out),
        }
    }
}

/// 200 for a normal response. A SOAP 1.2 Sender fault is the client's
/// problem and gets 400; every other fault gets 500.
fn response_status(response: &SoapMessage) -> u16 {
    let Some(fault) = response.body().fault() else {
        return TransportResponse::OK;
    };
    match response.version() {
        SoapVersion::Soap12 if *fault.code() == SoapVersion::Soap12.client_or_sender_fault_name() => {
            TransportResponse::BAD_REQUEST
        }
        _ => TransportResponse::INTERNAL_ERROR,
    }
}

fn trace_message(target: &'static str, summary: &str, message: &SoapMessage) {
    let root = message
        .payload_source()
        .map(|p| p.name().to_string())
        .unwrap_or_default();
    match target {
        RECEIVED_TARGET => debug!(
            target: RECEIVED_TARGET,
            payload = %root,
            soap_action = message.soap_action().unwrap_or("-"),
            fault = message.has_fault(),
            "{summary}"
        ),
        _ => debug!(
            target: SENT_TARGET,
            payload = %root,
            fault = message.has_fault(),
            "{summary}"
        ),
    }
    if enabled!(target: RECEIVED_TARGET, Level::TRACE) || enabled!(target: SENT_TARGET, Level::TRACE) {
        let envelope = message
            .envelope()
            .to_source()
            .to_xml_string()
            .unwrap_or_else(|e| format!("<unserializable: {e}>"));
        match target {
            RECEIVED_TARGET => trace!(target: RECEIVED_TARGET, "{envelope}"),
            _ => trace!(target: SENT_TARGET, "{envelope}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EndpointError;
    use crate::mapping::PayloadRootMapping;
    use crate::qname::QName;
    use crate::endpoint::Endpoint;

    const ECHO: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><e:echo xmlns:e="urn:echo">hello</e:echo></soap:Body></soap:Envelope>"#;

    fn receiver(endpoint: Endpoint) -> SoapMessageReceiver {
        let mut mapping = PayloadRootMapping::new();
        mapping
            .register(QName::new("urn:echo", "echo"), endpoint)
            .unwrap();
        let dispatcher = MessageDispatcher::new().with_mapping(mapping);
        SoapMessageReceiver::new(
            Arc::new(dispatcher),
            Arc::new(SoapMessageFactory::new(SoapVersion::Soap11)),
        )
    }

    fn request(body: &str) -> TransportMessage {
        TransportMessage::new(
            [(CONTENT_TYPE, "text/xml; charset=utf-8"), (SOAP_ACTION, "\"urn:echo\"")]
                .into_iter()
                .collect(),
            body,
        )
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse(r#"multipart/related; type="text/xml"; boundary="a;b""#);
        assert_eq!(ct.media_type(), "multipart/related");
        assert_eq!(ct.parameter("boundary"), Some("a;b"));
        assert!(ct.is_multipart());
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = TransportHeaders::new();
        headers.add("soapaction", "a");
        headers.add("SOAPAction", "b");
        assert_eq!(headers.get(SOAP_ACTION), Some("a"));
        assert_eq!(headers.get_all("SOAPACTION").count(), 2);
        headers.set("SoapAction", "c");
        assert_eq!(headers.get_all(SOAP_ACTION).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn test_echo_ok() {
        let receiver = receiver(Endpoint::payload_fn(|request| Ok(request.cloned())));
        let response = receiver.receive(request(ECHO));
        assert_eq!(response.status, TransportResponse::OK);
        let message = response.message.unwrap();
        let body = String::from_utf8(message.body).unwrap();
        assert!(body.contains("hello"));
        assert!(message.headers.get(CONTENT_TYPE).unwrap().starts_with("text/xml"));
    }

    #[test]
    fn test_no_response_is_accepted() {
        let receiver = receiver(Endpoint::payload_fn(|_| Ok(None)));
        let response = receiver.receive(request(ECHO));
        assert_eq!(response.status, TransportResponse::ACCEPTED);
        assert!(response.message.is_none());
    }

    #[test]
    fn test_malformed_and_too_large() {
        let receiver = receiver(Endpoint::payload_fn(|_| Ok(None)));
        assert_eq!(
            receiver.receive(request("<not-soap/>")).status,
            TransportResponse::BAD_REQUEST
        );
        assert_eq!(
            receiver.receive(request("<soap:Envelope")).status,
            TransportResponse::BAD_REQUEST
        );

        let small = receiver.with_max_body_size(16);
        assert_eq!(
            small.receive(request(ECHO)).status,
            TransportResponse::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_fault_and_unresolved_error() {
        let receiver = receiver(Endpoint::payload_fn(|_| {
            Err(EndpointError::new("storage", "down").into())
        }));
        let response = receiver.receive(request(ECHO));
        assert_eq!(response.status, TransportResponse::INTERNAL_ERROR);
        assert!(response.message.is_none());

        let other = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><x/></soap:Body></soap:Envelope>"#;
        let response = receiver.receive(request(other));
        assert_eq!(response.status, TransportResponse::INTERNAL_ERROR);
        let body = String::from_utf8(response.message.unwrap().body).unwrap();
        assert!(body.contains("No endpoint found"));
    }

    #[test]
    fn test_soap12_sender_fault_is_bad_request() {
        let mut mapping = PayloadRootMapping::new();
        mapping
            .register(
                QName::new("urn:echo", "echo"),
                Endpoint::payload_fn(|_| Err(EndpointError::new("storage", "down").into())),
            )
            .unwrap();
        let dispatcher = MessageDispatcher::new()
            .with_mapping(mapping)
            .with_resolver(crate::resolver::SimpleSoapExceptionResolver::default());
        let receiver = SoapMessageReceiver::new(
            Arc::new(dispatcher),
            Arc::new(SoapMessageFactory::new(SoapVersion::Soap12)),
        );
        let soap12 = |payload: &str| {
            TransportMessage::new(
                [(CONTENT_TYPE, "application/soap+xml; charset=utf-8")]
                    .into_iter()
                    .collect(),
                format!(
                    r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body>{payload}</env:Body></env:Envelope>"#
                ),
            )
        };

        // No endpoint: the dispatcher answers with a Sender fault.
        let response = receiver.receive(soap12("<x/>"));
        assert_eq!(response.status, TransportResponse::BAD_REQUEST);
        let body = String::from_utf8(response.message.unwrap().body).unwrap();
        assert!(body.contains("Sender"));

        // Resolved endpoint error: a Receiver fault stays 500.
        let response = receiver.receive(soap12(r#"<e:echo xmlns:e="urn:echo"/>"#));
        assert_eq!(response.status, TransportResponse::INTERNAL_ERROR);
        let body = String::from_utf8(response.message.unwrap().body).unwrap();
        assert!(body.contains("Receiver"));
    }

    #[test]
    fn test_not_found() {
        let dispatcher = MessageDispatcher::new()
            .with_no_endpoint_action(crate::config::NoEndpointAction::NotFound);
        let receiver = SoapMessageReceiver::new(
            Arc::new(dispatcher),
            Arc::new(SoapMessageFactory::default()),
        );
        assert_eq!(
            receiver.receive(request(ECHO)).status,
            TransportResponse::NOT_FOUND
        );
    }
}
