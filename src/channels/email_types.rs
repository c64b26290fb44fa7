//! Email types: inbound and outbound messages, subject decoding, body extraction.

use std::fmt;

use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::MailboxError;

/// Subject used when an inbound message has none.
pub const NO_SUBJECT: &str = "No Subject";

/// Reply subject used when the inbound message had no subject.
pub const DEFAULT_REPLY_SUBJECT: &str = "Re: Your Query";

/// Opaque mailbox identifier for one message (IMAP UID).
///
/// Stable across expunges by other clients; valid while the mailbox's
/// UIDVALIDITY is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageHandle(String);

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A customer query extracted from the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub handle: MessageHandle,
    /// Bare sender address (no display name).
    pub sender: String,
    /// Decoded subject, or [`NO_SUBJECT`].
    pub subject: String,
    /// First text/plain body found, trimmed. Empty if there is none.
    pub body: String,
    /// `Message-ID` header, if the message carried one.
    pub message_id: Option<String>,
}

impl InboundMessage {
    /// Parse a raw RFC 822 message fetched under `handle`.
    pub fn parse(handle: MessageHandle, raw: &[u8]) -> Result<Self, MailboxError> {
        let parsed = MessageParser::default()
            .parse(raw)
            .ok_or_else(|| MailboxError::Parse {
                handle: handle.to_string(),
                reason: "not an RFC 822 message".into(),
            })?;

        let sender = extract_sender(&parsed).ok_or_else(|| MailboxError::Parse {
            handle: handle.to_string(),
            reason: "no sender address".into(),
        })?;

        Ok(Self {
            sender,
            subject: decode_subject(parsed.subject()),
            body: extract_body(&parsed),
            message_id: parsed.message_id().map(str::to_string),
            handle,
        })
    }

    /// First `limit` characters of the body, for log lines.
    pub fn preview(&self, limit: usize) -> String {
        let mut preview: String = self.body.chars().take(limit).collect();
        if self.body.chars().count() > limit {
            preview.push_str("...");
        }
        preview
    }
}

/// A reply ready to hand to the SMTP sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    /// Build the reply to `inbound` carrying `body`.
    pub fn reply_to(inbound: &InboundMessage, body: impl Into<String>) -> Self {
        Self {
            to: inbound.sender.clone(),
            subject: reply_subject(&inbound.subject),
            body: body.into(),
        }
    }
}

/// Take an already RFC 2047-decoded subject header as-is.
///
/// mail-parser joins adjacent encoded words and replaces undecodable bytes,
/// so all that is left is the placeholder for a missing header. A present
/// header is kept unchanged, even when blank.
pub fn decode_subject(subject: Option<&str>) -> String {
    subject.map_or_else(|| NO_SUBJECT.to_string(), str::to_string)
}

/// `"Re: <subject>"`, or [`DEFAULT_REPLY_SUBJECT`] for the placeholder subject.
pub fn reply_subject(subject: &str) -> String {
    if subject == NO_SUBJECT {
        DEFAULT_REPLY_SUBJECT.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Extract the sender address from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract the query text from a parsed email.
///
/// Multipart: the first part, in depth-first order, declared `text/plain`.
/// Single part: the payload whatever its type.
pub fn extract_body(parsed: &mail_parser::Message) -> String {
    let Some(root) = parsed.parts.first() else {
        return String::new();
    };

    let body = match root.body {
        PartType::Multipart(_) => parsed
            .parts
            .iter()
            .skip(1)
            .find(|part| is_plain_text(part))
            .map(part_text)
            .unwrap_or_default(),
        _ => part_text(root),
    };

    body.trim().to_string()
}

fn is_plain_text(part: &MessagePart) -> bool {
    match MimeHeaders::content_type(part) {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().is_some_and(|s| s.eq_ignore_ascii_case("plain"))
        }
        // No Content-Type inside a multipart defaults to text/plain.
        None => matches!(part.body, PartType::Text(_)),
    }
}

/// Decoded text of a part; non-text payloads fall back to their raw bytes.
fn part_text(part: &MessagePart) -> String {
    match &part.body {
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        PartType::Message(_) | PartType::Multipart(_) => {
            String::from_utf8_lossy(part.contents()).into_owned()
        }
    }
}
