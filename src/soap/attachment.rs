//! SOAP with Attachments: MIME `multipart/related` packaging.
//!
//! Packages are read with `mail-parser` and written with `mail-builder`;
//! both handle boundaries and transfer encodings.

use crate::error::SoapError;
use crate::transport::ContentType;
use mail_builder::headers::content_type::ContentType as MimeContentType;
use mail_builder::mime::MimePart;
use mail_parser::{MessageParser, MimeHeaders, PartType};

/// A MIME attachment carried next to the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    content_id: String,
    content_type: String,
    data: Vec<u8>,
}

impl Attachment {
    pub fn new(
        content_id: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Content-ID without the surrounding angle brackets.
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// One body part of a package, transfer encoding already removed.
#[derive(Debug, Clone)]
pub(crate) struct BodyPart {
    pub content_type: Option<ContentType>,
    pub content_id: Option<String>,
    pub body: Vec<u8>,
}

pub(crate) fn strip_angle_brackets(value: &str) -> String {
    value
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .to_string()
}

fn malformed(reason: impl Into<String>) -> SoapError {
    SoapError::InvalidMessage {
        version: None,
        reason: reason.into(),
    }
}

/// Read the parts of a package sent with the given `Content-Type`.
pub(crate) fn parse_multipart(content_type: &str, data: &[u8]) -> Result<Vec<BodyPart>, SoapError> {
    let mut raw = format!("Content-Type: {content_type}\r\n\r\n").into_bytes();
    raw.extend_from_slice(data);
    let message = MessageParser::default()
        .parse(&raw[..])
        .ok_or_else(|| malformed("unreadable multipart body"))?;
    let PartType::Multipart(children) = &message.root_part().body else {
        return Err(malformed("body is not a multipart package"));
    };

    let parts: Vec<BodyPart> = children
        .iter()
        .filter_map(|id| message.part(*id))
        .map(|part| BodyPart {
            content_type: part.content_type().map(part_content_type),
            content_id: part.content_id().map(strip_angle_brackets),
            body: part.contents().to_vec(),
        })
        .collect();
    if parts.is_empty() {
        return Err(malformed("multipart message without parts"));
    }
    Ok(parts)
}

fn part_content_type(content_type: &mail_parser::ContentType) -> ContentType {
    let media_type = match content_type.subtype() {
        Some(subtype) => format!("{}/{subtype}", content_type.ctype()),
        None => content_type.ctype().to_string(),
    };
    ["charset", "action", "type"]
        .into_iter()
        .fold(ContentType::new(media_type), |ct, name| {
            match content_type.attribute(name) {
                Some(value) => ct.with_parameter(name, value),
                None => ct,
            }
        })
}

/// Write a `multipart/related` body delimited by `boundary`, root part first.
///
/// The root is written as-is (`8bit`); attachments get the builder's
/// transfer encoding.
pub(crate) fn write_multipart(
    boundary: &str,
    root_content_type: &ContentType,
    root_content_id: &str,
    root: &[u8],
    attachments: &[Attachment],
) -> Result<Vec<u8>, SoapError> {
    let root_text = std::str::from_utf8(root)
        .map_err(|e| SoapError::Transformation(format!("envelope is not UTF-8: {e}")))?;
    let root_type = root_content_type.parameters().fold(
        MimeContentType::new(root_content_type.media_type()),
        |ct, (name, value)| ct.attribute(name, value),
    );

    let mut parts = vec![MimePart::new(root_type, root_text)
        .cid(root_content_id)
        .transfer_encoding("8bit")];
    parts.extend(attachments.iter().map(|attachment| {
        MimePart::new(attachment.content_type(), attachment.data())
            .cid(attachment.content_id())
    }));

    let package_type = MimeContentType::new("multipart/related").attribute("boundary", boundary);
    let mut written = Vec::new();
    MimePart::new(package_type, parts).write_part(&mut written)?;

    // Drop the package's own header block; it travels as transport headers.
    let body_start = written
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .ok_or_else(|| SoapError::Transformation("multipart package without headers".to_string()))?;
    Ok(written.split_off(body_start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_type(boundary: &str) -> String {
        format!("multipart/related; type=\"text/xml\"; boundary=\"{boundary}\"")
    }

    #[test]
    fn test_multipart_round_trip() {
        let attachments = vec![Attachment::new("img@example", "image/png", vec![0u8, 1, 2, 255])];
        let root_type = ContentType::new("text/xml").with_parameter("charset", "utf-8");
        let body = write_multipart(
            "----=_Part_1",
            &root_type,
            "root@example",
            b"<Envelope/>",
            &attachments,
        )
        .unwrap();

        let parts = parse_multipart(&package_type("----=_Part_1"), &body).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body, b"<Envelope/>");
        assert_eq!(parts[0].content_id.as_deref(), Some("root@example"));
        assert_eq!(
            parts[0].content_type.as_ref().map(ContentType::media_type),
            Some("text/xml")
        );
        assert_eq!(parts[1].body, vec![0u8, 1, 2, 255]);
        assert_eq!(
            parts[1].content_type.as_ref().map(ContentType::media_type),
            Some("image/png")
        );
    }

    #[test]
    fn test_base64_part_is_decoded() {
        let body = "--xyz\r\nContent-Type: text/xml\r\n\r\n<a/>\r\n--xyz\r\nContent-Type: application/octet-stream\r\nContent-ID: <att>\r\nContent-Transfer-Encoding: base64\r\n\r\naGVs\r\nbG8=\r\n--xyz--\r\n";
        let parts = parse_multipart(&package_type("xyz"), body.as_bytes()).unwrap();
        assert_eq!(parts[1].body, b"hello");
        assert_eq!(parts[1].content_id.as_deref(), Some("att"));
    }

    #[test]
    fn test_dashes_inside_part_are_content() {
        let body = "--xyz\r\nContent-Type: application/octet-stream\r\n\r\nline one\r\n--not-a-delimiter\r\nline two\r\n--xyz--\r\n";
        let parts = parse_multipart(&package_type("xyz"), body.as_bytes()).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"line one\r\n--not-a-delimiter\r\nline two");
    }

    #[test]
    fn test_body_without_parts() {
        assert!(parse_multipart("text/xml", b"<a/>").is_err());
        assert!(parse_multipart(&package_type("xyz"), b"no parts here").is_err());
    }
}
