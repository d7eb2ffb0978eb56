//! MIME part tree and plain-text extraction.
//!
//! Parts arrive in the Gmail API shape: every leaf carries its payload as
//! base64url, containers carry child parts. Extraction flattens the tree into
//! one plain-text document for classification.
//!
//! Pure string processing. Decode failures are logged and degrade to an empty
//! string for the failing node only.

use std::sync::LazyLock;

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Standard alphabet, padding optional (Gmail strips it).
const LENIENT_STANDARD: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Payload of a leaf part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartBody {
    /// Base64url-encoded content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// A node of the MIME tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<PartBody>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

impl MessagePart {
    /// A leaf part holding `content`, encoded the way Gmail delivers it.
    pub fn leaf(mime_type: impl Into<String>, content: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            filename: None,
            body: Some(PartBody {
                data: Some(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(content)),
                size: Some(content.len() as u64),
            }),
            parts: Vec::new(),
        }
    }

    /// A container part (`multipart/*` or `message/rfc822`) with children.
    pub fn container(mime_type: impl Into<String>, parts: Vec<MessagePart>) -> Self {
        Self {
            mime_type: mime_type.into(),
            filename: None,
            body: None,
            parts,
        }
    }

    /// Builder: set filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    fn data(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .unwrap_or("")
    }
}

/// Extract the plain-text content of a whole message.
///
/// Returns an empty string when there is no payload.
pub fn extract_email_content(payload: Option<&MessagePart>) -> String {
    match payload {
        Some(part) => extract_text(part).trim().to_string(),
        None => String::new(),
    }
}

/// Recursively extract the text of one part.
pub fn extract_text(part: &MessagePart) -> String {
    let mime_type = part.mime_type.to_ascii_lowercase();

    if mime_type.starts_with("multipart/") {
        return join_children(&part.parts);
    }

    match mime_type.as_str() {
        "text/plain" => decode_or_empty(part).trim().to_string(),
        "text/html" => html_to_text(&decode_or_empty(part)).trim().to_string(),
        // Forwarded email attached inline.
        "message/rfc822" => {
            if part.parts.is_empty() {
                decode_or_empty(part).trim().to_string()
            } else {
                join_children(&part.parts)
            }
        }
        // Images, PDFs, calendar invites, etc.
        _ => String::new(),
    }
}

/// Each child's text followed by a newline.
fn join_children(parts: &[MessagePart]) -> String {
    let mut text = String::new();
    for child in parts {
        text.push_str(&extract_text(child));
        text.push('\n');
    }
    text
}

fn decode_or_empty(part: &MessagePart) -> String {
    match decode_base64url(part.data()) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                mime_type = %part.mime_type,
                filename = part.filename.as_deref().unwrap_or(""),
                error = %e,
                "Failed to decode part body"
            );
            String::new()
        }
    }
}

/// Decode base64url (URL-safe alphabet, optional padding) to UTF-8 text.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub fn decode_base64url(data: &str) -> Result<String, base64::DecodeError> {
    let standard: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = LENIENT_STANDARD.decode(standard)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</p>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Entities decoded in this order; `&amp;` precedes the others, so
/// `&amp;lt;` ends up as `<`.
static ENTITIES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("&nbsp;", " "),
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
    ]
    .into_iter()
    .map(|(entity, replacement)| {
        let re = Regex::new(&format!("(?i){}", regex::escape(entity))).unwrap();
        (re, replacement)
    })
    .collect()
});

/// Convert an HTML document to plain text.
///
/// Drops `<script>`/`<style>` blocks, turns `<br>` and `</p>` into newlines,
/// removes every other tag and decodes a small set of common entities.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = PARAGRAPH_END.replace_all(&text, "\n");
    let mut text = ANY_TAG.replace_all(&text, "").into_owned();

    for (re, replacement) in ENTITIES.iter() {
        text = re.replace_all(&text, *replacement).into_owned();
    }
    text
}
