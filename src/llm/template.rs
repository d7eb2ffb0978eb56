//! `{{NAME}}` placeholder substitution for prompt templates.

/// Replace every `{{NAME}}` in `template` with its binding.
///
/// Placeholders without a binding are left verbatim. Bound values are
/// inserted as-is and never re-scanned, so a value containing `{{X}}` does not
/// expand further.
pub fn substitute(template: &str, bindings: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after_open[..end];
        match bindings.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => {
                out.push_str(value);
                rest = &after_open[end + 2..];
            }
            None => {
                // Keep the braces and resume scanning right after `{{`, in
                // case a real placeholder is nested in the unmatched text.
                out.push_str("{{");
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}
