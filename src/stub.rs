//! Canned endpoints for stub servers and tests.

use crate::config::{EndpointConfig, ResponseMode};
use crate::endpoint::{Endpoint, PayloadEndpoint};
use crate::error::{EndpointError, SoapError};
use crate::soap::FaultDefinition;
use crate::xml::XmlElement;
use tracing::debug;

/// Error kind raised by endpoints configured to fail.
pub const STATIC_FAULT_KIND: &str = "static.fault";

#[derive(Debug, Clone)]
enum Answer {
    Echo,
    Payload(XmlElement),
    Fault(FaultDefinition),
    Empty,
}

/// Endpoint answering every request the same way.
#[derive(Debug, Clone)]
pub struct StaticEndpoint {
    name: String,
    answer: Answer,
}

impl StaticEndpoint {
    /// Return the request payload.
    pub fn echo(name: impl Into<String>) -> Self {
        Self::with_answer(name, Answer::Echo)
    }

    /// Return `payload` whatever the request.
    pub fn payload(name: impl Into<String>, payload: XmlElement) -> Self {
        Self::with_answer(name, Answer::Payload(payload))
    }

    /// Fail with the fault `definition` describes.
    pub fn fault(name: impl Into<String>, definition: FaultDefinition) -> Self {
        Self::with_answer(name, Answer::Fault(definition))
    }

    /// Answer with no response at all.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::with_answer(name, Answer::Empty)
    }

    fn with_answer(name: impl Into<String>, answer: Answer) -> Self {
        Self {
            name: name.into(),
            answer,
        }
    }

    pub fn from_config(config: &EndpointConfig) -> Result<Self, SoapError> {
        let name = config.name.clone();
        match config.response {
            ResponseMode::Echo => Ok(Self::echo(name)),
            ResponseMode::Empty => Ok(Self::empty(name)),
            ResponseMode::Payload => {
                let xml = config.payload.as_deref().ok_or_else(|| {
                    SoapError::Config(format!("endpoint '{name}' has no payload"))
                })?;
                let payload = XmlElement::parse_str(xml).map_err(|e| {
                    SoapError::Config(format!("endpoint '{name}' has an invalid payload: {e}"))
                })?;
                Ok(Self::payload(name, payload))
            }
            ResponseMode::Fault => {
                let definition = config.fault.clone().ok_or_else(|| {
                    SoapError::Config(format!("endpoint '{name}' has no fault"))
                })?;
                Ok(Self::fault(name, definition))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_endpoint(self) -> Endpoint {
        Endpoint::payload(self)
    }
}

impl PayloadEndpoint for StaticEndpoint {
    fn invoke(&self, request: Option<&XmlElement>) -> Result<Option<XmlElement>, SoapError> {
        debug!(endpoint = %self.name, "Static endpoint invoked");
        match &self.answer {
            Answer::Echo => Ok(request.cloned()),
            Answer::Payload(payload) => Ok(Some(payload.clone())),
            Answer::Empty => Ok(None),
            Answer::Fault(definition) => {
                let message = definition
                    .reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("endpoint '{}' failed", self.name));
                Err(EndpointError::new(STATIC_FAULT_KIND, message)
                    .with_fault(definition.clone())
                    .into())
            }
        }
    }
}
