//! SOAP messages and the factory that reads them from transport messages.

use super::attachment::{self, Attachment};
use super::body::Body;
use super::envelope::Envelope;
use super::{SoapElement, SoapVersion};
use crate::error::SoapError;
use crate::transport::{unquote, ContentType, TransportMessage, CONTENT_TYPE, SOAP_ACTION};
use crate::xml::{XmlElement, XmlOptions};
use uuid::Uuid;

/// A SOAP request or response.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapMessage {
    envelope: Envelope,
    soap_action: Option<String>,
    attachments: Vec<Attachment>,
}

impl SoapMessage {
    /// An empty message (`<Envelope><Body/></Envelope>`).
    pub fn new(version: SoapVersion) -> Self {
        Self::from_envelope(Envelope::new(version))
    }

    pub fn from_envelope(envelope: Envelope) -> Self {
        Self {
            envelope,
            soap_action: None,
            attachments: Vec::new(),
        }
    }

    /// Parse a bare envelope document, detecting the version from its namespace.
    pub fn parse(xml: &[u8]) -> Result<Self, SoapError> {
        let root = XmlOptions::default().parse(xml)?;
        Ok(Self::from_envelope(Envelope::from_xml(root, None)?))
    }

    pub fn version(&self) -> SoapVersion {
        self.envelope.version()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    pub fn body(&self) -> &Body {
        self.envelope.body()
    }

    pub fn body_mut(&mut self) -> &mut Body {
        self.envelope.body_mut()
    }

    pub fn payload_source(&self) -> Option<&XmlElement> {
        self.body().payload_source()
    }

    pub fn has_fault(&self) -> bool {
        self.body().has_fault()
    }

    /// Reason of the body fault, if any.
    pub fn fault_reason(&self) -> Option<&str> {
        self.body().fault().and_then(|f| f.reason())
    }

    /// The SOAP action, without surrounding quotes.
    pub fn soap_action(&self) -> Option<&str> {
        self.soap_action.as_deref()
    }

    pub fn set_soap_action(&mut self, action: Option<String>) {
        self.soap_action = action
            .map(|a| unquote(&a))
            .filter(|a| !a.is_empty());
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, content_id: &str) -> Option<&Attachment> {
        let content_id = attachment::strip_angle_brackets(content_id);
        self.attachments
            .iter()
            .find(|a| a.content_id() == content_id)
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Serialize the envelope alone, with an XML declaration.
    pub fn to_bytes(&self, options: &XmlOptions) -> Result<Vec<u8>, SoapError> {
        options.write(&self.envelope.to_source(), true)
    }

    /// The content type for this message's envelope part.
    pub fn envelope_content_type(&self) -> ContentType {
        let version = self.version();
        let mut content_type =
            ContentType::new(version.content_type()).with_parameter("charset", "utf-8");
        if version.action_in_content_type() {
            if let Some(action) = &self.soap_action {
                content_type = content_type.with_parameter("action", action.clone());
            }
        }
        content_type
    }

    /// Write the message, and its attachments if any, to `out`.
    pub fn write_to(&self, out: &mut TransportMessage) -> Result<(), SoapError> {
        self.write_to_with(out, &XmlOptions::default())
    }

    pub fn write_to_with(
        &self,
        out: &mut TransportMessage,
        options: &XmlOptions,
    ) -> Result<(), SoapError> {
        let envelope = self.to_bytes(options)?;
        let envelope_type = self.envelope_content_type();

        if self.attachments.is_empty() {
            out.headers.set(CONTENT_TYPE, envelope_type.to_string());
            out.body = envelope;
        } else {
            let id = Uuid::new_v4().simple().to_string();
            let boundary = format!("----=_Part_{id}");
            let root_id = format!("{id}@soap");
            let mut package = ContentType::new("multipart/related")
                .with_parameter("type", self.version().content_type())
                .with_parameter("boundary", boundary.clone())
                .with_parameter("start", format!("<{root_id}>"));
            if self.version().action_in_content_type() {
                if let Some(action) = &self.soap_action {
                    package = package.with_parameter("action", action.clone());
                }
            }
            out.headers.set("MIME-Version", "1.0");
            out.headers.set(CONTENT_TYPE, package.to_string());
            out.body = attachment::write_multipart(
                &boundary,
                &envelope_type,
                &root_id,
                &envelope,
                &self.attachments,
            )?;
        }

        if !self.version().action_in_content_type() {
            out.headers.set(
                SOAP_ACTION,
                format!("\"{}\"", self.soap_action.as_deref().unwrap_or_default()),
            );
        }
        Ok(())
    }
}

/// Creates request and response messages.
///
/// Implementations are shared by all requests and must not hold per-request
/// parser state.
pub trait MessageFactory: Send + Sync {
    /// A new empty message of the factory's default version.
    fn create_message(&self) -> SoapMessage;

    /// A response of the same version as `request`.
    fn create_response(&self, request: &SoapMessage) -> SoapMessage {
        SoapMessage::new(request.version())
    }

    /// Read a message from raw transport input.
    fn read_message(&self, transport: &TransportMessage) -> Result<SoapMessage, SoapError>;
}

/// Default factory over the crate's XML tree.
#[derive(Debug, Clone)]
pub struct SoapMessageFactory {
    version: SoapVersion,
    options: XmlOptions,
}

impl Default for SoapMessageFactory {
    fn default() -> Self {
        Self::new(SoapVersion::Soap11)
    }
}

impl SoapMessageFactory {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            options: XmlOptions::default(),
        }
    }

    pub fn with_options(mut self, options: XmlOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &XmlOptions {
        &self.options
    }
}

impl MessageFactory for SoapMessageFactory {
    fn create_message(&self) -> SoapMessage {
        SoapMessage::new(self.version)
    }

    fn read_message(&self, transport: &TransportMessage) -> Result<SoapMessage, SoapError> {
        if transport.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(SoapError::InvalidMessage {
                version: None,
                reason: "empty message body".to_string(),
            });
        }
        let content_type = transport.content_type();

        let (root_bytes, root_type, attachments) = match &content_type {
            Some(ct) if ct.is_multipart() => {
                if ct.parameter("boundary").is_none() {
                    return Err(SoapError::InvalidMessage {
                        version: None,
                        reason: "multipart content type without boundary".to_string(),
                    });
                }
                let mut parts = attachment::parse_multipart(&ct.to_string(), &transport.body)?;
                let start = ct.parameter("start").map(attachment::strip_angle_brackets);
                let root_index = start
                    .and_then(|id| parts.iter().position(|p| p.content_id.as_deref() == Some(id.as_str())))
                    .unwrap_or(0);
                let root = parts.remove(root_index);
                let root_type = root
                    .content_type
                    .or_else(|| ct.parameter("type").map(ContentType::parse));
                let attachments = parts
                    .into_iter()
                    .enumerate()
                    .map(|(i, part)| {
                        Attachment::new(
                            part.content_id.unwrap_or_else(|| format!("part-{}", i + 1)),
                            part.content_type
                                .map(|ct| ct.to_string())
                                .unwrap_or_else(|| "application/octet-stream".to_string()),
                            part.body,
                        )
                    })
                    .collect();
                (root.body, root_type, attachments)
            }
            other => (transport.body.clone(), other.clone(), Vec::new()),
        };

        let version = root_type
            .as_ref()
            .and_then(|ct| SoapVersion::from_media_type(ct.media_type()));
        let root = self.options.parse(&root_bytes)?;
        let envelope = Envelope::from_xml(root, version)?;

        let mut message = SoapMessage::from_envelope(envelope);
        let action = if message.version().action_in_content_type() {
            root_type
                .as_ref()
                .and_then(|ct| ct.parameter("action"))
                .or_else(|| content_type.as_ref().and_then(|ct| ct.parameter("action")))
                .map(str::to_string)
        } else {
            transport.headers.get(SOAP_ACTION).map(str::to_string)
        };
        message.set_soap_action(action);
        for attachment in attachments {
            message.add_attachment(attachment);
        }
        Ok(message)
    }
}
