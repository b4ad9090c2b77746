/// Fixed width of free-text fields in the declaration document.
pub const FIELD_WIDTH: usize = 32;

const ACCENTED: &str = "éèêëàâäùûüîïôöçÉÈÊËÀÂÄÙÛÜÎÏÔÖÇ";

/// Restricts a free-text value to what the remote service accepts.
///
/// The value is cut to [`FIELD_WIDTH`] characters, every character outside
/// the whitelist becomes a space, and the result is escaped for XML.
pub fn sanitize(text: &str) -> String {
    let filtered: String = text
        .chars()
        .take(FIELD_WIDTH)
        .map(|c| if is_allowed(c) { c } else { ' ' })
        .collect();
    escape_xml(&filtered)
}

pub(crate) fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '\'' | '-' | ' ') || ACCENTED.contains(c)
}

pub fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
