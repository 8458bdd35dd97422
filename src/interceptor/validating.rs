//! Payload validation interceptor.

use crate::config::ValidationConfig;
use crate::context::MessageContext;
use crate::endpoint::{Endpoint, EndpointInterceptor, Flow};
use crate::error::{SoapError, Violation, ViolationCode};
use crate::qname::QName;
use crate::xml::{XmlElement, XmlNode};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Namespace of the `ValidationError` fault detail entries.
pub const VALIDATION_ERROR_NS: &str = "urn:zentinel:soap:validation";

/// Reason of the fault written for an invalid request.
pub const VALIDATION_FAULT_REASON: &str = "Validation error";

/// Result of validating a payload.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Violations found
    pub violations: Vec<Violation>,
    /// Payload metrics
    pub analysis: PayloadAnalysis,
}

impl ValidationResult {
    /// Check if any violations were found.
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Add a violation.
    pub fn add_violation(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

/// Structural metrics of a payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadAnalysis {
    /// Maximum nesting depth found (the payload root is depth 1)
    pub max_depth: u32,
    /// Element at the maximum depth
    pub deepest_element: Option<String>,
    /// Total element count
    pub element_count: u32,
    /// Maximum text content length
    pub max_text_length: usize,
    /// Element holding the longest text
    pub longest_text_element: Option<String>,
    /// Contains CDATA sections
    pub has_cdata: bool,
    /// Contains comments
    pub has_comments: bool,
    /// Namespaces of elements in the payload
    pub namespaces: BTreeSet<String>,
}

impl PayloadAnalysis {
    pub fn of(payload: &XmlElement) -> Self {
        let mut analysis = Self::default();
        analysis.visit(payload, 1);
        analysis
    }

    fn visit(&mut self, element: &XmlElement, depth: u32) {
        self.element_count += 1;
        if depth > self.max_depth {
            self.max_depth = depth;
            self.deepest_element = Some(element.name().to_string());
        }
        if element.name().has_namespace() {
            self.namespaces.insert(element.name().namespace().to_string());
        }

        for node in element.children() {
            match node {
                XmlNode::Element(child) => self.visit(child, depth + 1),
                XmlNode::Text(text) => self.record_text(element, text),
                XmlNode::CData(text) => {
                    self.has_cdata = true;
                    self.record_text(element, text);
                }
                XmlNode::Comment(_) => self.has_comments = true,
            }
        }
    }

    fn record_text(&mut self, element: &XmlElement, text: &str) {
        let length = text.chars().count();
        if length > self.max_text_length {
            self.max_text_length = length;
            self.longest_text_element = Some(element.name().to_string());
        }
    }
}

/// Validates request payloads against structural limits.
///
/// An invalid request is answered with a Client/Sender fault whose detail
/// holds one `ValidationError` entry per violation.
#[derive(Debug, Clone)]
pub struct PayloadValidatingInterceptor {
    config: ValidationConfig,
    validate_response: bool,
}

impl PayloadValidatingInterceptor {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            validate_response: false,
        }
    }

    /// Also check response payloads; invalid ones are logged and stop the
    /// response phase.
    pub fn with_validate_response(mut self, validate_response: bool) -> Self {
        self.validate_response = validate_response;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate a payload (`None` for an empty body).
    pub fn validate(&self, payload: Option<&XmlElement>) -> ValidationResult {
        let config = &self.config;
        let mut result = ValidationResult::default();

        let Some(payload) = payload else {
            if config.require_payload {
                result.add_violation(Violation::new(
                    ViolationCode::MissingPayload,
                    "SOAP Body carries no payload",
                ));
            }
            return result;
        };
        let analysis = PayloadAnalysis::of(payload);

        if analysis.max_depth > config.max_depth {
            let message = format!(
                "Payload depth {} exceeds maximum {}",
                analysis.max_depth, config.max_depth
            );
            result.add_violation(match &analysis.deepest_element {
                Some(location) => {
                    Violation::with_location(ViolationCode::BodyDepthExceeded, message, location)
                }
                None => Violation::new(ViolationCode::BodyDepthExceeded, message),
            });
        }

        if analysis.element_count > config.max_elements {
            result.add_violation(Violation::new(
                ViolationCode::TooManyElements,
                format!(
                    "Payload contains {} elements, maximum is {}",
                    analysis.element_count, config.max_elements
                ),
            ));
        }

        if analysis.max_text_length > config.max_text_length {
            let message = format!(
                "Text content length {} exceeds maximum {}",
                analysis.max_text_length, config.max_text_length
            );
            result.add_violation(match &analysis.longest_text_element {
                Some(location) => {
                    Violation::with_location(ViolationCode::TextTooLong, message, location)
                }
                None => Violation::new(ViolationCode::TextTooLong, message),
            });
        }

        if config.block_cdata && analysis.has_cdata {
            result.add_violation(Violation::new(
                ViolationCode::CdataNotAllowed,
                "CDATA sections are not allowed",
            ));
        }

        if config.block_comments && analysis.has_comments {
            result.add_violation(Violation::new(
                ViolationCode::CommentNotAllowed,
                "XML comments are not allowed in the payload",
            ));
        }

        if !config.required_namespaces.is_empty()
            && !config
                .required_namespaces
                .iter()
                .any(|ns| analysis.namespaces.contains(ns))
        {
            result.add_violation(Violation::new(
                ViolationCode::MissingNamespace,
                format!(
                    "Payload must use one of these namespaces: {:?}",
                    config.required_namespaces
                ),
            ));
        }

        result.analysis = analysis;
        result
    }

    fn write_fault(&self, context: &mut MessageContext, violations: &[Violation]) -> Result<(), SoapError> {
        let fault = context
            .response()
            .body_mut()
            .add_client_or_sender_fault(VALIDATION_FAULT_REASON, None)?;
        let detail = fault.add_detail();
        for violation in violations {
            let entry = detail.add_detail_element(
                QName::new(VALIDATION_ERROR_NS, "ValidationError").with_prefix("v"),
            );
            entry.add_text(&violation.message);
            let element = entry.sink();
            element.set_attribute(QName::local("code"), violation.code.as_str());
            if let Some(location) = &violation.location {
                element.set_attribute(QName::local("location"), location.clone());
            }
        }
        Ok(())
    }
}

impl EndpointInterceptor for PayloadValidatingInterceptor {
    fn name(&self) -> &str {
        "PayloadValidatingInterceptor"
    }

    fn should_intercept(&self, _context: &MessageContext, _endpoint: &Endpoint) -> bool {
        self.config.enabled
    }

    fn handle_request(
        &self,
        context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        let result = self.validate(context.request().payload_source());
        debug!(
            depth = result.analysis.max_depth,
            elements = result.analysis.element_count,
            max_text_length = result.analysis.max_text_length,
            "Payload analyzed"
        );
        if !result.has_violations() {
            return Ok(Flow::Continue);
        }

        for violation in &result.violations {
            warn!(
                code = violation.code.as_str(),
                location = violation.location.as_deref().unwrap_or("-"),
                "Request payload rejected: {}",
                violation.message
            );
        }
        self.write_fault(context, &result.violations)?;
        Ok(Flow::Fault)
    }

    fn handle_response(
        &self,
        context: &mut MessageContext,
        _endpoint: &Endpoint,
    ) -> Result<Flow, SoapError> {
        if !self.validate_response {
            return Ok(Flow::Continue);
        }
        let Some(response) = context.existing_response() else {
            return Ok(Flow::Continue);
        };
        let result = self.validate(response.payload_source());
        if result.has_violations() {
            for violation in &result.violations {
                warn!(code = violation.code.as_str(), "Response payload invalid: {}", violation.message);
            }
            return Ok(Flow::Respond);
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::{SoapMessage, SoapMessageFactory, SoapVersion};
    use std::sync::Arc;

    fn payload(xml: &str) -> XmlElement {
        XmlElement::parse_str(xml).unwrap()
    }

    fn context(payload: Option<XmlElement>, version: SoapVersion) -> MessageContext {
        let mut request = SoapMessage::new(version);
        if let Some(payload) = payload {
            request.body_mut().set_payload(payload);
        }
        MessageContext::new(request, Arc::new(SoapMessageFactory::new(version)))
    }

    fn endpoint() -> Endpoint {
        Endpoint::payload_fn(|_| Ok(None))
    }

    fn codes(result: &ValidationResult) -> Vec<ViolationCode> {
        result.violations.iter().map(|v| v.code).collect()
    }

    #[test]
    fn test_analysis() {
        let analysis = PayloadAnalysis::of(&payload(
            r#"<m:GetUser xmlns:m="urn:users"><m:Id>123</m:Id><!-- note --><m:Name><![CDATA[Jo]]></m:Name></m:GetUser>"#,
        ));
        assert_eq!(analysis.max_depth, 2);
        assert_eq!(analysis.element_count, 3);
        assert_eq!(analysis.max_text_length, 3);
        assert!(analysis.has_cdata);
        assert!(analysis.has_comments);
        assert!(analysis.namespaces.contains("urn:users"));
    }

    #[test]
    fn test_valid_payload() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig::default());
        let result = interceptor.validate(Some(&payload(r#"<echo xmlns="urn:e">hi</echo>"#)));
        assert!(!result.has_violations());
    }

    #[test]
    fn test_depth_exceeded() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig {
            max_depth: 2,
            ..Default::default()
        });
        let result = interceptor.validate(Some(&payload("<a><b><c/></b></a>")));
        assert_eq!(codes(&result), vec![ViolationCode::BodyDepthExceeded]);
        assert_eq!(result.violations[0].location.as_deref(), Some("c"));

        let result = interceptor.validate(Some(&payload("<a><b/></a>")));
        assert!(!result.has_violations());
    }

    #[test]
    fn test_limits_and_blocks() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig {
            max_elements: 2,
            max_text_length: 4,
            block_cdata: true,
            block_comments: true,
            ..Default::default()
        });
        let result = interceptor.validate(Some(&payload(
            "<a><b>too long text</b><!-- c --><d><![CDATA[x]]></d></a>",
        )));
        assert_eq!(
            codes(&result),
            vec![
                ViolationCode::TooManyElements,
                ViolationCode::TextTooLong,
                ViolationCode::CdataNotAllowed,
                ViolationCode::CommentNotAllowed,
            ]
        );
    }

    #[test]
    fn test_required_namespace() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig {
            required_namespaces: vec!["urn:orders".to_string()],
            ..Default::default()
        });
        assert!(!interceptor
            .validate(Some(&payload(r#"<o:Order xmlns:o="urn:orders"/>"#)))
            .has_violations());
        assert_eq!(
            codes(&interceptor.validate(Some(&payload("<Order/>")))),
            vec![ViolationCode::MissingNamespace]
        );
    }

    #[test]
    fn test_missing_payload() {
        let lenient = PayloadValidatingInterceptor::new(ValidationConfig::default());
        assert!(!lenient.validate(None).has_violations());

        let strict = PayloadValidatingInterceptor::new(ValidationConfig {
            require_payload: true,
            ..Default::default()
        });
        assert_eq!(codes(&strict.validate(None)), vec![ViolationCode::MissingPayload]);
    }

    #[test]
    fn test_invalid_request_gets_sender_fault() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig {
            max_depth: 1,
            ..Default::default()
        });
        let mut ctx = context(Some(payload("<a><b/></a>")), SoapVersion::Soap12);
        let flow = interceptor.handle_request(&mut ctx, &endpoint()).unwrap();
        assert_eq!(flow, Flow::Fault);

        let fault = ctx.existing_response().unwrap().body().fault().unwrap();
        assert_eq!(fault.code().local_part(), "Sender");
        assert_eq!(fault.reason(), Some(VALIDATION_FAULT_REASON));
        let entries = fault.detail().unwrap().entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].text().contains("depth 2"));
    }

    #[test]
    fn test_valid_request_continues() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig::default());
        let mut ctx = context(Some(payload("<a/>")), SoapVersion::Soap11);
        assert_eq!(
            interceptor.handle_request(&mut ctx, &endpoint()).unwrap(),
            Flow::Continue
        );
        assert!(!ctx.has_response());
    }

    #[test]
    fn test_disabled() {
        let interceptor = PayloadValidatingInterceptor::new(ValidationConfig {
            enabled: false,
            ..Default::default()
        });
        let ctx = context(None, SoapVersion::Soap11);
        assert!(!interceptor.should_intercept(&ctx, &endpoint()));
    }
}
