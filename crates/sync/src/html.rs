//! Long-description cleanup.
//!
//! Early product descriptions were scraped from other sites and carry
//! inconsistent inline styling. Before publishing, inline `style`
//! attributes are removed from every tag and `<font>` tags are stripped of
//! all attributes, leaving the markup structure intact. This is a
//! plain-text transform over tags, not an HTML parser: malformed input
//! passes through untouched rather than failing an item.

/// Remove inline styling and `<font>` attributes from a fragment of HTML.
#[must_use]
pub fn strip_styling(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        let (text, tag_onward) = rest.split_at(start);
        out.push_str(text);

        match tag_end(tag_onward) {
            Some(end) => {
                let (tag, after) = tag_onward.split_at(end + 1);
                out.push_str(&rewrite_tag(tag));
                rest = after;
            }
            None => {
                // Unterminated tag: emit as-is.
                out.push_str(tag_onward);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Byte offset of the `>` closing this tag, honoring quoted attribute
/// values that may contain `>`.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in tag.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(idx),
            (None, _) => {}
        }
    }
    None
}

/// Rewrite one complete `<...>` tag.
fn rewrite_tag(tag: &str) -> String {
    let inner = tag
        .strip_prefix('<')
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(tag);

    // Closing tags, comments, doctypes, and processing instructions carry
    // no attributes worth rewriting.
    if inner.starts_with(['/', '!', '?']) {
        return tag.to_string();
    }

    let name_len = inner
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let (name, attrs) = inner.split_at(name_len);
    let self_closing = attrs.trim_end().ends_with('/');

    let kept = if name.eq_ignore_ascii_case("font") {
        String::new()
    } else {
        keep_attributes(attrs)
    };

    let mut rebuilt = String::with_capacity(tag.len());
    rebuilt.push('<');
    rebuilt.push_str(name);
    if !kept.is_empty() {
        rebuilt.push(' ');
        rebuilt.push_str(&kept);
    }
    if self_closing {
        rebuilt.push_str(" /");
    }
    rebuilt.push('>');
    rebuilt
}

/// Re-emit attributes, dropping any named `style`.
fn keep_attributes(attrs: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut chars = attrs.char_indices().peekable();
    let bytes = attrs;

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() || ch == '/' {
            chars.next();
            continue;
        }

        // Attribute name.
        let mut name_end = start;
        while let Some(&(idx, c)) = chars.peek() {
            if c.is_whitespace() || c == '=' || c == '/' {
                name_end = idx;
                break;
            }
            chars.next();
            name_end = idx + c.len_utf8();
        }
        let name = bytes.get(start..name_end).unwrap_or_default();

        // Optional value.
        let mut value_end = name_end;
        if matches!(chars.peek(), Some(&(_, '='))) {
            chars.next();
            match chars.peek().copied() {
                Some((q_start, quote @ ('"' | '\''))) => {
                    chars.next();
                    value_end = q_start + 1;
                    for (idx, c) in chars.by_ref() {
                        value_end = idx + c.len_utf8();
                        if c == quote {
                            break;
                        }
                    }
                }
                Some(_) => {
                    while let Some(&(idx, c)) = chars.peek() {
                        if c.is_whitespace() {
                            break;
                        }
                        chars.next();
                        value_end = idx + c.len_utf8();
                    }
                }
                None => {}
            }
        }

        if !name.eq_ignore_ascii_case("style") {
            if let Some(attr) = bytes.get(start..value_end) {
                kept.push(attr.to_string());
            }
        }
    }

    kept.join(" ")
}
