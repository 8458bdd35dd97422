//! Configuration types for the SOAP dispatcher.

use crate::addressing::message_id::DEFAULT_TRACKED_IDS;
use crate::addressing::AddressingVersion;
use crate::qname::QName;
use crate::soap::{FaultDefinition, SoapVersion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Config version
    pub version: String,

    /// General settings
    pub settings: SettingsConfig,

    /// HTTP listener (binary only)
    pub server: ServerConfig,

    /// WS-Addressing support
    pub addressing: AddressingConfig,

    /// Payload validation
    pub validation: ValidationConfig,

    /// Error kind to fault mappings; the most specific dotted prefix wins
    pub exception_mappings: HashMap<String, FaultDefinition>,

    /// Fault used for errors no mapping matches
    pub default_fault: Option<FaultDefinition>,

    /// Canned endpoints served by the binary
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            settings: SettingsConfig::default(),
            server: ServerConfig::default(),
            addressing: AddressingConfig::default(),
            validation: ValidationConfig::default(),
            exception_mappings: HashMap::new(),
            default_fault: None,
            endpoints: Vec::new(),
        }
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Maximum request size to process (bytes)
    pub max_body_size: usize,

    /// What to answer when no mapping matches
    pub no_endpoint: NoEndpointAction,

    /// Reason of MustUnderstand faults
    pub must_understand_fault_string: String,

    /// Locale of MustUnderstand faults
    pub must_understand_fault_locale: String,

    /// Log received and sent messages
    pub message_tracing: bool,

    /// Log request/response messages through the logging interceptor
    pub log_messages: LogMode,

    /// SOAP version of messages built from scratch
    pub soap_version: SoapVersion,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1_048_576, // 1MB
            no_endpoint: NoEndpointAction::Fault,
            must_understand_fault_string:
                "One or more mandatory SOAP header blocks not understood".to_string(),
            must_understand_fault_locale: "en".to_string(),
            message_tracing: false,
            log_messages: LogMode::Off,
            soap_version: SoapVersion::Soap11,
        }
    }
}

/// Answer to a request no endpoint is mapped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoEndpointAction {
    /// Sender/Client fault
    #[default]
    Fault,
    /// Transport-level "not found" without a body
    NotFound,
}

/// What the logging interceptor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    Off,
    /// Body payload only
    Payload,
    /// Whole envelope
    Envelope,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen: String,

    /// Path SOAP requests are posted to
    pub path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            path: "/ws".to_string(),
        }
    }
}

/// WS-Addressing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingConfig {
    /// Enable action-based mapping and the addressing interceptor
    pub enabled: bool,

    /// Versions accepted, in detection order
    pub versions: Vec<AddressingVersion>,

    /// How reply message IDs are generated
    pub message_id_strategy: MessageIdStrategyKind,

    /// Reject requests whose MessageID was seen before
    pub detect_duplicates: bool,

    /// How many recent MessageIDs are remembered for duplicate detection
    pub duplicate_window: usize,

    /// Appended to the request action to form the reply action
    pub output_action_suffix: String,

    /// Appended to the request action to form the fault action
    pub fault_action_suffix: String,

    /// Only accept requests whose To matches this address
    pub address: Option<String>,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            versions: AddressingVersion::ALL.to_vec(),
            message_id_strategy: MessageIdStrategyKind::Uuid,
            detect_duplicates: false,
            duplicate_window: DEFAULT_TRACKED_IDS,
            output_action_suffix: "Response".to_string(),
            fault_action_suffix: "Fault".to_string(),
            address: None,
        }
    }
}

/// Message ID generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageIdStrategyKind {
    #[default]
    Uuid,
    Random,
    SecureRandom,
}

/// Payload validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Enable payload validation
    pub enabled: bool,

    /// Maximum nesting depth of the payload
    pub max_depth: u32,

    /// Maximum number of elements in the payload
    pub max_elements: u32,

    /// Maximum text content length per element
    pub max_text_length: usize,

    /// Block CDATA sections
    pub block_cdata: bool,

    /// Block comments
    pub block_comments: bool,

    /// Required namespaces (payload must use one of these)
    pub required_namespaces: Vec<String>,

    /// Reject requests with an empty body
    pub require_payload: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 20,
            max_elements: 1000,
            max_text_length: 65536, // 64KB
            block_cdata: false,
            block_comments: false,
            required_namespaces: Vec::new(),
            require_payload: false,
        }
    }
}

/// A canned endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Name used in logs
    pub name: String,

    /// Payload root to map on (Clark notation: `{ns}local`)
    #[serde(default)]
    pub payload_root: Option<QName>,

    /// SOAP action to map on
    #[serde(default)]
    pub soap_action: Option<String>,

    /// WS-Addressing action to map on
    #[serde(default)]
    pub action: Option<String>,

    /// How the endpoint answers
    #[serde(default)]
    pub response: ResponseMode,

    /// Response payload for `payload` mode
    #[serde(default)]
    pub payload: Option<String>,

    /// Fault for `fault` mode
    #[serde(default)]
    pub fault: Option<FaultDefinition>,
}

/// How a canned endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Return the request payload
    #[default]
    Echo,
    /// Return the configured payload
    Payload,
    /// Fail with the configured fault
    Fault,
    /// Return no response
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::FaultCode;

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert!(!config.addressing.enabled);
        assert!(config.validation.enabled);
        assert_eq!(config.settings.no_endpoint, NoEndpointAction::Fault);
        assert_eq!(config.settings.must_understand_fault_locale, "en");
        assert_eq!(config.addressing.versions.len(), 3);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = DispatcherConfig::default();
        config.exception_mappings.insert(
            "validation".to_string(),
            FaultDefinition::client_or_sender("Invalid input"),
        );
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: DispatcherConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.validation.max_depth, config.validation.max_depth);
        assert_eq!(
            parsed.exception_mappings["validation"].reason(),
            Some("Invalid input")
        );
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
version: "1"
settings:
  max_body_size: 2097152
  no_endpoint: not_found
  message_tracing: true
  log_messages: envelope
  soap_version: "1.2"
server:
  listen: "0.0.0.0:9000"
addressing:
  enabled: true
  versions: ["1.0"]
  message_id_strategy: secure_random
  detect_duplicates: true
  duplicate_window: 500
validation:
  max_depth: 15
  block_comments: true
exception_mappings:
  validation: "CLIENT,Invalid input,en"
  storage.io: "RECEIVER,Try again later"
default_fault: "SERVER"
endpoints:
  - name: echo
    payload_root: "{urn:example}echo"
  - name: broken
    soap_action: "urn:broken"
    response: fault
    fault: "CLIENT,bad input"
"#;
        let config: DispatcherConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settings.max_body_size, 2_097_152);
        assert_eq!(config.settings.no_endpoint, NoEndpointAction::NotFound);
        assert_eq!(config.settings.log_messages, LogMode::Envelope);
        assert_eq!(config.settings.soap_version, SoapVersion::Soap12);
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.server.path, "/ws");
        assert!(config.addressing.enabled);
        assert_eq!(config.addressing.versions, vec![AddressingVersion::V10]);
        assert_eq!(
            config.addressing.message_id_strategy,
            MessageIdStrategyKind::SecureRandom
        );
        assert_eq!(config.addressing.duplicate_window, 500);
        assert_eq!(config.validation.max_depth, 15);
        assert!(config.validation.block_comments);
        assert_eq!(config.exception_mappings.len(), 2);
        assert_eq!(
            config.exception_mappings["storage.io"].code(),
            &FaultCode::ServerOrReceiver
        );
        assert_eq!(config.default_fault.unwrap().reason(), None);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(
            config.endpoints[0].payload_root,
            Some(QName::new("urn:example", "echo"))
        );
        assert_eq!(config.endpoints[0].response, ResponseMode::Echo);
        assert_eq!(config.endpoints[1].response, ResponseMode::Fault);
        assert_eq!(config.endpoints[1].fault.as_ref().unwrap().reason(), Some("bad input"));
    }
}
