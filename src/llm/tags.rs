//! Extraction of `<tag>...</tag>` spans from oracle responses.
//!
//! Responses may wrap the tagged answer in arbitrary prose. Tag names must
//! match exactly (case-sensitive).

/// Trimmed inner text of the first `<name>...</name>` pair, or `None`.
///
/// The closing tag is searched for only after the opening one.
pub fn extract_tag(text: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");

    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    Some(text[start..start + len].trim().to_string())
}

/// Like [`extract_tag`], but treats an empty span as absent.
pub fn extract_non_empty(text: &str, name: &str) -> Option<String> {
    extract_tag(text, name).filter(|s| !s.is_empty())
}
