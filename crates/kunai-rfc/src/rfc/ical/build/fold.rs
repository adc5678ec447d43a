//! iCalendar line folding.

/// Maximum line length in octets per RFC 5545 §3.1.
const MAX_LINE_OCTETS: usize = 75;

/// Folds a content line at 75 octets, inserting CRLF + space.
///
/// Never splits a UTF-8 sequence.
#[must_use]
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut result = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut current_len = 0;
    let mut limit = MAX_LINE_OCTETS;

    for c in line.chars() {
        let char_len = c.len_utf8();
        if current_len + char_len > limit {
            result.push_str("\r\n ");
            current_len = 1;
            limit = MAX_LINE_OCTETS;
        }
        result.push(c);
        current_len += char_len;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_unchanged() {
        assert_eq!(fold_line("SUMMARY:Lunch"), "SUMMARY:Lunch");
    }

    #[test]
    fn every_physical_line_fits() {
        let line = format!("DESCRIPTION:{}", "x".repeat(200));
        let folded = fold_line(&line);
        assert!(folded.split("\r\n").all(|l| l.len() <= MAX_LINE_OCTETS));
        assert_eq!(folded.replace("\r\n ", ""), line);
    }

    #[test]
    fn fold_respects_utf8() {
        let line = format!("LOCATION:{}", "会議室".repeat(20));
        let folded = fold_line(&line);
        assert!(folded.split("\r\n").all(|l| l.len() <= MAX_LINE_OCTETS));
        assert_eq!(folded.replace("\r\n ", ""), line);
    }
}
