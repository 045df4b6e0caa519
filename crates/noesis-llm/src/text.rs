//! Text preparation before submission to a provider.
//!
//! Node content arrives as rich text. Providers want plain text within a
//! token budget, so every string is sanitized (tags stripped, entities
//! decoded, whitespace collapsed) and then truncated to a character budget.

/// Default character budget for a single input.
pub const DEFAULT_MAX_CHARS: usize = 6_000;

/// Appended to any input that was cut short.
pub const TRUNCATION_MARKER: &str = " [truncated]";

/// Sanitize `text` and truncate it to at most `max_chars` characters.
///
/// Truncation keeps the prefix and appends [`TRUNCATION_MARKER`].
pub fn prepare_text(text: &str, max_chars: usize) -> String {
    let clean = collapse_whitespace(&decode_entities(&strip_html(text)));

    if clean.chars().count() <= max_chars {
        return clean;
    }

    let mut truncated: String = clean.chars().take(max_chars).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Remove markup tags, replacing each with a single space.
///
/// A `<` only opens a tag when followed by a letter, `/`, or `!`, so plain
/// comparisons such as `a < b` survive.
pub fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let opens_tag = c == '<'
            && chars
                .peek()
                .is_some_and(|n| n.is_ascii_alphabetic() || *n == '/' || *n == '!');

        if opens_tag {
            for inner in chars.by_ref() {
                if inner == '>' {
                    break;
                }
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }

    out
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_tags_and_collapses_whitespace() {
        let html = "<p>Hello&nbsp;<b>world</b></p>\n\n<ul><li>one</li><li>two</li></ul>";
        assert_eq!(prepare_text(html, 100), "Hello world one two");
    }

    #[test]
    fn test_keeps_plain_comparisons() {
        assert_eq!(prepare_text("a < b and c > d", 100), "a < b and c > d");
    }

    #[test]
    fn test_decodes_entities() {
        assert_eq!(
            prepare_text("Fish &amp; chips &lt;3 &quot;yum&quot;", 100),
            "Fish & chips <3 \"yum\""
        );
    }

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(prepare_text("short", 10), "short");
        assert_eq!(prepare_text("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn test_truncation_keeps_prefix_and_appends_marker() {
        let text = "abcdefghij klmnop";
        let out = prepare_text(text, 10);
        assert_eq!(out, format!("abcdefghij{}", TRUNCATION_MARKER));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "ééééé ééééé";
        let out = prepare_text(text, 3);
        assert!(out.starts_with("ééé"));
        assert!(out.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(prepare_text("   <br/>  ", 10), "");
    }
}
