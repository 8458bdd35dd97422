//! Message logging interceptor.

use crate::config::LogMode;
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInterceptor, Flow};
use crate::error::SoapError;
use crate::soap::{SoapElement, SoapMessage};
use tracing::{debug, enabled, Level};

/// Logs request, response and fault messages at debug level.
#[derive(Debug, Clone, Copy)]
pub struct LoggingInterceptor {
    mode: LogMode,
}

impl LoggingInterceptor {
    pub fn new(mode: LogMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    /// The part of `message` this interceptor logs, or `None` when off.
    pub fn render(&self, message: &SoapMessage) -> Option<String> {
        let rendered = match self.mode {
            LogMode::Off => return None,
            LogMode::Payload => match message.payload_source() {
                Some(payload) => payload.to_xml_string(),
                None => Ok(String::new()),
            },
            LogMode::Envelope => message.envelope().to_source().to_xml_string(),
        };
        Some(rendered.unwrap_or_else(|e| format!("<unserializable: {e}>")))
    }

    fn log(&self, kind: &str, message: Option<&SoapMessage>) {
        if !enabled!(Level::DEBUG) {
            return;
        }
        if let Some(text) = message.and_then(|m| self.render(m)) {
            debug!(kind = kind, "{text}");
        }
    }
}

impl EndpointInterceptor for LoggingInterceptor {
    fn name(&self) -> &str {
        "LoggingInterceptor"
    }

    fn should_intercept(&self, _context: &MessageContext, _endpoint: &Endpoint) -> bool {
        self.mode != LogMode::Off
    }

    fn handle_request(
        &self,
        context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        self.log("request", Some(context.request()));
        Ok(Flow::Continue)
    }

    fn handle_response(
        &self,
        context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        self.log("response", context.existing_response());
        Ok(Flow::Continue)
    }

    fn handle_fault(
        &self,
        context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        self.log("fault", context.existing_response());
        Ok(Flow::Continue)
    }
}
