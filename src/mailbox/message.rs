//! Turning fetched messages into classifier input.

use mail_parser::MessageParser;

use crate::cleanup::{clean_text_content, decode_base64_if_valid};
use crate::mailbox::RawMessage;

/// Placeholder for a missing sender or subject.
const UNKNOWN: &str = "unknown";

/// A fetched message reduced to the text the classifier sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub uid: u32,
    pub sender: String,
    pub subject: String,
    /// Cleaned body text.
    pub body: String,
    /// `Sender: … | Subject: … | Message: …`
    pub classification_input: String,
}

/// Parse a raw message into sender, subject and cleaned body.
///
/// MIME decoding is left to mail-parser. When it finds no body part (or the
/// header section is missing) the raw text is used, decoded from base64 if
/// it is a single base64 payload.
pub fn parse_raw(raw: &RawMessage) -> ParsedMessage {
    let full = join_sections(&raw.header, &raw.text);
    let parsed = if raw.header.is_empty() {
        None
    } else {
        MessageParser::default().parse(&full)
    };

    let sender = parsed
        .as_ref()
        .and_then(extract_sender)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let subject = parsed
        .as_ref()
        .and_then(|p| p.subject())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();

    let body_source = parsed.as_ref().and_then(extract_body).unwrap_or_else(|| {
        let text = String::from_utf8_lossy(&raw.text);
        decode_base64_if_valid(&text).into_owned()
    });
    let body = clean_text_content(&body_source);

    let classification_input = format_classification_input(&sender, &subject, &body);

    ParsedMessage {
        uid: raw.uid,
        sender,
        subject,
        body,
        classification_input,
    }
}

/// Build the single-line text sent to the classifier.
pub fn format_classification_input(sender: &str, subject: &str, body: &str) -> String {
    format!("Sender: {sender} | Subject: {subject} | Message: {body}")
}

/// Rebuild a full RFC 5322 message from the HEADER and TEXT sections.
fn join_sections(header: &[u8], text: &[u8]) -> Vec<u8> {
    let mut full = Vec::with_capacity(header.len() + text.len() + 4);
    full.extend_from_slice(header);
    if !header.is_empty() {
        if header.ends_with(b"\r\n\r\n") || header.ends_with(b"\n\n") {
            // already terminated by a blank line
        } else if header.ends_with(b"\n") {
            full.extend_from_slice(b"\r\n");
        } else {
            full.extend_from_slice(b"\r\n\r\n");
        }
    }
    full.extend_from_slice(text);
    full
}

/// `Name <address>`, the bare address, or the bare name.
fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    let addr = parsed.from()?.first()?;
    let name = addr.name().map(str::trim).filter(|n| !n.is_empty());
    let address = addr.address().map(str::trim).filter(|a| !a.is_empty());
    match (name, address) {
        (Some(name), Some(address)) => Some(format!("{name} <{address}>")),
        (None, Some(address)) => Some(address.to_string()),
        (Some(name), None) => Some(name.to_string()),
        (None, None) => None,
    }
}

/// First text body, else first HTML body.
fn extract_body(parsed: &mail_parser::Message) -> Option<String> {
    if let Some(text) = parsed.body_text(0)
        && !text.trim().is_empty()
    {
        return Some(text.into_owned());
    }
    parsed
        .body_html(0)
        .filter(|html| !html.trim().is_empty())
        .map(|html| html.into_owned())
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    fn raw(uid: u32, header: &str, text: &str) -> RawMessage {
        RawMessage {
            uid,
            header: header.as_bytes().to_vec(),
            text: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn plain_message() {
        let msg = raw(
            7,
            "From: Alice Example <alice@example.com>\r\nSubject: Lunch on Friday?\r\n\r\n",
            "Are you free for lunch on Friday?\r\n",
        );
        let parsed = parse_raw(&msg);
        assert_eq!(parsed.uid, 7);
        assert_eq!(parsed.sender, "Alice Example <alice@example.com>");
        assert_eq!(parsed.subject, "Lunch on Friday?");
        assert_eq!(parsed.body, "Are you free for lunch on Friday?");
        assert_eq!(
            parsed.classification_input,
            "Sender: Alice Example <alice@example.com> | Subject: Lunch on Friday? | Message: Are you free for lunch on Friday?"
        );
    }

    #[test]
    fn bare_address_sender() {
        let msg = raw(1, "From: bob@example.com\r\nSubject: hi\r\n\r\n", "hello\r\n");
        assert_eq!(parse_raw(&msg).sender, "bob@example.com");
    }

    #[test]
    fn header_without_blank_line_still_parses() {
        let msg = raw(1, "From: bob@example.com\r\nSubject: hi\r\n", "hello there\r\n");
        let parsed = parse_raw(&msg);
        assert_eq!(parsed.subject, "hi");
        assert_eq!(parsed.body, "hello there");
    }

    #[test]
    fn missing_sender_and_subject_are_unknown() {
        let msg = raw(3, "Date: Mon, 1 Jan 2024 10:00:00 +0000\r\n\r\n", "body\r\n");
        let parsed = parse_raw(&msg);
        assert_eq!(parsed.sender, "unknown");
        assert_eq!(parsed.subject, "unknown");
        assert!(parsed.classification_input.starts_with("Sender: unknown | Subject: unknown"));
    }

    #[test]
    fn encoded_subject_decoded() {
        let msg = raw(
            1,
            "From: cafe@example.com\r\nSubject: =?UTF-8?B?Q2Fmw6kgbWVudQ==?=\r\n\r\n",
            "Today's specials\r\n",
        );
        assert_eq!(parse_raw(&msg).subject, "Café menu");
    }

    #[test]
    fn quoted_printable_html_body_cleaned() {
        let msg = raw(
            2,
            "From: shop@example.com\r\nSubject: Shipped\r\nContent-Type: text/html; charset=utf-8\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\n",
            "<p>Your package has=\r\n shipped! Track at https://t.example.com/abc</p>\r\n",
        );
        let parsed = parse_raw(&msg);
        assert!(parsed.body.contains("Your package has shipped!"), "got: {}", parsed.body);
        assert!(!parsed.body.contains("https"));
        assert!(!parsed.body.contains("<p>"));
    }

    #[test]
    fn base64_part_decoded() {
        let encoded = STANDARD.encode("Invoice 42 is now overdue.");
        let msg = raw(
            4,
            "From: billing@example.com\r\nSubject: Invoice\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: base64\r\n\r\n",
            &format!("{encoded}\r\n"),
        );
        assert_eq!(parse_raw(&msg).body, "Invoice 42 is now overdue.");
    }

    #[test]
    fn missing_header_falls_back_to_raw_text() {
        let encoded = STANDARD.encode("Fallback body text arrives here");
        let msg = raw(5, "", &encoded);
        let parsed = parse_raw(&msg);
        assert_eq!(parsed.sender, "unknown");
        assert_eq!(parsed.body, "Fallback body text arrives here");
    }

    #[test]
    fn empty_message_still_produces_input() {
        let parsed = parse_raw(&RawMessage {
            uid: 9,
            ..Default::default()
        });
        assert_eq!(
            parsed.classification_input,
            "Sender: unknown | Subject: unknown | Message: "
        );
    }
}
