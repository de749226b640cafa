// WHY: standalone normalization logic shared by the resolver and the tag grouper
// Quote text and verse text must pass through the same function before any comparison

/// Normalize text for comparison: lower-case, drop punctuation, collapse whitespace, trim.
///
/// Word characters (alphanumerics and `_`) and whitespace survive; everything else is
/// removed without leaving a gap, so `"don't"` becomes `"dont"`.
pub fn normalize(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    normalize_into(text, &mut result);
    result
}

/// Normalize into a supplied buffer to avoid allocation in scan loops
pub fn normalize_into(text: &str, buffer: &mut String) {
    buffer.clear();
    buffer.reserve(text.len());

    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }

        for lower in ch.to_lowercase() {
            if !is_word_char(lower) {
                continue;
            }
            // Leading whitespace never reaches the buffer, trailing whitespace is never flushed
            if pending_space && !buffer.is_empty() {
                buffer.push(' ');
            }
            pending_space = false;
            buffer.push(lower);
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Remove every `<...>` tag (a `<`, at least one non-`>` character, then `>`)
pub fn strip_markup(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        let after = &rest[open + 1..];
        match after.find('>') {
            Some(close) if close > 0 => {
                result.push_str(&rest[..open]);
                rest = &after[close + 1..];
            }
            _ => {
                // "<>" or an unterminated "<" is literal text
                result.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

/// Collapse whitespace runs into single spaces and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip markup then collapse whitespace, the cleanup applied to tagged quotes and their context
pub fn clean_markup(text: &str) -> String {
    collapse_whitespace(&strip_markup(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("Peace be with you."), "peace be with you");
        assert_eq!(normalize("  Let there be   light!  "), "let there be light");
    }

    #[test]
    fn test_normalize_punctuation_removed_without_gap() {
        assert_eq!(normalize("don't"), "dont");
        assert_eq!(normalize("LORD's"), "lords");
        assert_eq!(normalize("word , word"), "word word");
    }

    #[test]
    fn test_normalize_into_buffer_reuse() {
        let mut buffer = String::new();

        normalize_into("Verily, verily.", &mut buffer);
        assert_eq!(buffer, "verily verily");

        normalize_into("I say\nunto\r\nyou;", &mut buffer);
        assert_eq!(buffer, "i say unto you");
    }

    #[test]
    fn test_normalize_empty_and_blank() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize(".,;:!?"), "");
        assert_eq!(normalize(" . , "), "");
    }

    #[test]
    fn test_normalize_keeps_digits_and_underscore() {
        assert_eq!(normalize("Chapter 3_a: verse 16"), "chapter 3_a verse 16");
    }

    #[test]
    fn test_normalize_unicode_letters() {
        assert_eq!(normalize("Élie, ÉLIE!"), "élie élie");
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "",
            "And God said, Let there be light: and there was light.",
            "  \t Mixed\n\nWHITESPACE  ",
            "<FR>tagged<Fr> text",
            "İstanbul — ünïcödé … “quotes”",
            "a.b.c d-e-f",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "normalize not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("<FR>Follow<Fr> me"), "Follow me");
        assert_eq!(strip_markup("no tags"), "no tags");
        assert_eq!(strip_markup("<a><b>x</b></a>"), "x");
        assert_eq!(strip_markup("a <> b < c"), "a <> b < c");
        assert_eq!(strip_markup("<<x>y"), "y");
    }

    #[test]
    fn test_clean_markup_collapses() {
        assert_eq!(clean_markup("  <FR>Come<Fr>\n\n <FR>and<Fr>  see "), "Come and see");
    }
}
