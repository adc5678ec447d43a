//! iCalendar text escaping.

/// Escapes a TEXT value (RFC 5545 §3.3.11).
///
/// CR is dropped; LF becomes `\n`.
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Encodes a parameter value, quoting it when it contains a separator.
///
/// Quoted values use RFC 6868 caret encoding for `^`, LF and `"`.
#[must_use]
pub fn escape_param_value(s: &str) -> String {
    if !s.contains([':', ';', ',', '"', '\n']) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 8);
    out.push('"');
    for c in s.chars() {
        match c {
            '^' => out.push_str("^^"),
            '\n' => out.push_str("^n"),
            '"' => out.push_str("^'"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_escapes() {
        assert_eq!(escape_text("a,b;c\\d\r\ne"), "a\\,b\\;c\\\\d\\ne");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn param_quoting() {
        assert_eq!(escape_param_value("Smith, John"), "\"Smith, John\"");
        assert_eq!(escape_param_value("mailto:a@b"), "\"mailto:a@b\"");
        assert_eq!(escape_param_value("Say \"hi\""), "\"Say ^'hi^'\"");
        assert_eq!(escape_param_value("ACCEPTED"), "ACCEPTED");
    }
}
