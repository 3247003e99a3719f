//! Text cleanup applied to message bodies before classification.
//!
//! Bodies arrive in every state imaginable: HTML, quoted-printable with soft
//! line breaks, stray base64 blocks from attachments, tracking URLs. The
//! classifier only needs readable words, so everything else is stripped.
//!
//! Pure string processing, no I/O.

use std::borrow::Cow;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quoted_printable::ParseMode;
use regex::{Captures, Regex};

/// Wrap width used when rendering HTML to text.
const HTML_WRAP_WIDTH: usize = 130;

/// Tokens longer than this that look like base64 are dropped.
const BASE64_TOKEN_MIN_LEN: usize = 50;

/// Shortest payload `decode_base64_if_valid` will attempt to decode.
const BASE64_BODY_MIN_LEN: usize = 16;

static BASE64_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Za-z0-9+/=]+\b").expect("valid regex"));

static BASE64_PADDING_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[+/=]{2,}").expect("valid regex"));

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S*").expect("valid regex"));

static CONTENT_HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^Content-(Type|Transfer-Encoding):.*$").expect("valid regex")
});

static FOOTNOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]:?").expect("valid regex"));

static NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]+").expect("valid regex"));

static QP_BRACKET_ARTIFACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[3D"?.*?"?\]"#).expect("valid regex"));

static EQUALS_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"=+").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Run the full cleanup chain over a message body.
///
/// MIME header lines are removed first, while line structure still exists;
/// HTML rendering reflows the text.
pub fn clean_text_content(text: &str) -> String {
    let text = CONTENT_HEADER_LINE.replace_all(text, "");
    let text = html_to_text(&text);
    let text = decode_quoted_printable(&text);

    let text = BASE64_TOKEN.replace_all(&text, |caps: &Captures| {
        let token = &caps[0];
        if token.len() > BASE64_TOKEN_MIN_LEN && BASE64_PADDING_RUN.is_match(token) {
            String::new()
        } else {
            token.to_string()
        }
    });
    let text = URL.replace_all(&text, "");
    let text = FOOTNOTE_MARKER.replace_all(&text, "");
    let text = NEWLINES.replace_all(&text, " ");

    clean_up_html_entities(&text)
}

/// Remove leftover `3D` escapes and `=` runs, then normalise whitespace.
pub fn clean_up_html_entities(text: &str) -> String {
    let text = QP_BRACKET_ARTIFACT.replace_all(text, "");
    let text = text.replace("3D\"\"", "");
    let text = EQUALS_RUN.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Render HTML to plain text, falling back to tag stripping.
pub fn html_to_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), HTML_WRAP_WIDTH) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("html2text failed, stripping tags instead: {e}");
            strip_html(html)
        }
    }
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode quoted-printable text.
///
/// Soft line breaks (with or without transport padding) are joined and `=XX`
/// escapes decoded. Malformed escapes are kept verbatim; the resulting bytes
/// are read as lossy UTF-8.
pub fn decode_quoted_printable(text: &str) -> String {
    match quoted_printable::decode(text, ParseMode::Robust) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!("quoted-printable decode failed, keeping text: {e}");
            text.to_string()
        }
    }
}

/// Decode text that is entirely one base64 payload.
///
/// Returns the input untouched unless it is canonical base64 (ignoring line
/// breaks) that decodes to printable UTF-8.
pub fn decode_base64_if_valid(text: &str) -> Cow<'_, str> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < BASE64_BODY_MIN_LEN {
        return Cow::Borrowed(text);
    }

    let Ok(bytes) = STANDARD.decode(&compact) else {
        return Cow::Borrowed(text);
    };
    if STANDARD.encode(&bytes) != compact {
        return Cow::Borrowed(text);
    }

    match String::from_utf8(bytes) {
        Ok(decoded)
            if decoded
                .chars()
                .all(|c| !c.is_control() || c.is_whitespace()) =>
        {
            Cow::Owned(decoded)
        }
        _ => Cow::Borrowed(text),
    }
}
