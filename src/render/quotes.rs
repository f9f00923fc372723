//! Quote-stripping sentinels.
//!
//! A `strip_quotes` directive renders its value between two sentinels. After
//! the host document has been serialized, `strip_quote_sentinels` removes each
//! sentinel together with the one quote character the serializer placed next
//! to it, so Argo substitutes a bare (non-string) value into that position.
//! That only makes sense inside text that is itself parsed later (a resource
//! manifest, a JSON-encoded aggregate). Fields of the outer document keep
//! their value a string and drop the sentinels with `drop_quote_sentinels`.

pub const STRIP_QUOTES_BEGIN: &str = "__ARGO_UNQUOTE_BEGIN__";
pub const STRIP_QUOTES_END: &str = "__ARGO_UNQUOTE_END__";

pub(crate) fn wrap(text: &str) -> String {
    format!("{}{}{}", STRIP_QUOTES_BEGIN, text, STRIP_QUOTES_END)
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

/// Remove every sentinel pair and the quote character adjacent to each
/// sentinel (immediately before the begin marker, immediately after the end
/// marker). Sentinels without an adjacent quote are removed on their own.
pub fn strip_quote_sentinels(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut remaining = text;

    loop {
        let begin = remaining.find(STRIP_QUOTES_BEGIN);
        let end = remaining.find(STRIP_QUOTES_END);
        let (at, is_begin) = match (begin, end) {
            (Some(b), Some(e)) if b < e => (b, true),
            (Some(b), None) => (b, true),
            (_, Some(e)) => (e, false),
            (None, None) => break,
        };

        if is_begin {
            let mut head = &remaining[..at];
            if head.ends_with(is_quote) {
                head = &head[..head.len() - 1];
            }
            out.push_str(head);
            remaining = &remaining[at + STRIP_QUOTES_BEGIN.len()..];
        } else {
            out.push_str(&remaining[..at]);
            remaining = &remaining[at + STRIP_QUOTES_END.len()..];
            if remaining.starts_with(is_quote) {
                remaining = &remaining[1..];
            }
        }
    }

    out.push_str(remaining);
    out
}

/// Remove the sentinels only, leaving the surrounding text intact.
pub fn drop_quote_sentinels(text: &str) -> String {
    text.replace(STRIP_QUOTES_BEGIN, "").replace(STRIP_QUOTES_END, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_and_double_quotes() {
        let single = format!("a: '{}'", wrap("{{=1 + 1}}"));
        assert_eq!(strip_quote_sentinels(&single), "a: {{=1 + 1}}");
        let double = format!(r#"{{"a": "{}"}}"#, wrap("{{=x}}"));
        assert_eq!(strip_quote_sentinels(&double), r#"{"a": {{=x}}}"#);
    }

    #[test]
    fn strips_unquoted_sentinels() {
        let text = format!("a: {}", wrap("{{=x}}"));
        assert_eq!(strip_quote_sentinels(&text), "a: {{=x}}");
    }

    #[test]
    fn handles_several_pairs() {
        let text = format!("x: '{}'\ny: \"{}\"\n", wrap("{{=a}}"), wrap("{{=b}}"));
        assert_eq!(strip_quote_sentinels(&text), "x: {{=a}}\ny: {{=b}}\n");
    }

    #[test]
    fn leaves_other_text_untouched() {
        assert_eq!(strip_quote_sentinels("a: 'b'"), "a: 'b'");
    }

    #[test]
    fn drop_keeps_the_quotes() {
        let text = format!("a: '{}'", wrap("{{=x}}"));
        assert_eq!(drop_quote_sentinels(&text), "a: '{{=x}}'");
    }
}
