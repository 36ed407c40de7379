use crate::model::{List, ListColor, ListItem};

/// A line the parser could not place, kept so callers can warn about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedLine {
    /// 1-based line number in the source
    pub line: usize,
    pub text: String,
}

/// Result of parsing a list document
#[derive(Debug, Clone)]
pub struct ParsedList {
    pub list: List,
    pub dropped: Vec<DroppedLine>,
}

/// Parse a list document from its source text.
///
/// List format: an optional `color: <name>` line, then one checklist item
/// per line (`- [ ] text` or `- [x] text`). Blank lines and a leading
/// `# Title` heading are ignored. Anything else, including an unknown
/// color, is reported as dropped; an unknown color leaves the default.
pub fn parse_list(source: &str) -> ParsedList {
    let mut color = None;
    let mut items = Vec::new();
    let mut dropped = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || (items.is_empty() && trimmed.starts_with("# ")) {
            continue;
        }

        // Items keep trailing whitespace; it is part of the text
        if let Some(item) = parse_item_line(line.trim_start()) {
            items.push(item);
            continue;
        }

        if let Some(value) = strip_key(trimmed, "color")
            && let Some(parsed) = ListColor::from_name(value)
        {
            color = Some(parsed);
            continue;
        }

        dropped.push(DroppedLine {
            line: idx + 1,
            text: line.to_string(),
        });
    }

    ParsedList {
        list: List::new(color.unwrap_or_default(), items),
        dropped,
    }
}

/// Parse one `- [ ] text` / `- [x] text` line. Returns None if the line is
/// not a checklist item.
fn parse_item_line(line: &str) -> Option<ListItem> {
    let rest = line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))?;
    let (state, text) = match rest.get(..3)? {
        "[ ]" => (false, &rest[3..]),
        "[x]" | "[X]" => (true, &rest[3..]),
        _ => return None,
    };
    // `- [ ]` on its own is an item with no text
    let text = match text.strip_prefix(' ') {
        Some(text) => text,
        None if text.is_empty() => text,
        None => return None,
    };
    Some(ListItem::with_state(unescape(text), state))
}

/// Value of a `key: value` header line, case-insensitive on the key
fn strip_key<'a>(trimmed: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = trimmed.split_once(':')?;
    k.trim().eq_ignore_ascii_case(key).then(|| v.trim())
}

/// Reverse the item text escapes: `\\`, `\n`, `\r`. Unknown escapes are
/// kept as written.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
