use crate::model::{List, ListItem};

/// Serialize a list to its canonical markdown representation.
///
/// The color header always comes first, then a blank line and one checklist
/// line per item in storage order. The output ends with a newline.
pub fn serialize_list(list: &List) -> String {
    let mut lines = vec![format!("color: {}", list.color)];

    if !list.is_empty() {
        lines.push(String::new());
        lines.extend(list.items().iter().map(serialize_item));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn serialize_item(item: &ListItem) -> String {
    let check = if item.is_complete { 'x' } else { ' ' };
    if item.text.is_empty() {
        format!("- [{}]", check)
    } else {
        format!("- [{}] {}", check, escape(&item.text))
    }
}

/// Escape item text so it stays on one line: `\` → `\\`, LF → `\n`,
/// CR → `\r`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
