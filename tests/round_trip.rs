use listkeeper::model::ListColor;
use listkeeper::parse::{DroppedLine, parse_list, serialize_list};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;

fn read_fixture(fixture_name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(fixture_name);
    fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Could not read fixture {}: {}", fixture_name, e))
}

/// Helper: load a canonical fixture, parse it, serialize it, and assert
/// byte-for-byte equality
fn assert_list_round_trip(fixture_name: &str) {
    let source = read_fixture(fixture_name);

    let parsed = parse_list(&source);
    assert!(
        parsed.dropped.is_empty(),
        "fixture {} dropped lines: {:?}",
        fixture_name,
        parsed.dropped
    );
    let output = serialize_list(&parsed.list);

    assert_eq!(
        output, source,
        "Round-trip failed for fixture: {}",
        fixture_name
    );
}

// ============================================================================
// Canonical documents
// ============================================================================

#[test]
fn round_trip_groceries() {
    assert_list_round_trip("groceries.list");
}

#[test]
fn round_trip_empty_list() {
    assert_list_round_trip("empty.list");
}

#[test]
fn round_trip_escapes_and_whitespace() {
    assert_list_round_trip("escapes.list");
}

#[test]
fn escaped_text_is_decoded() {
    let parsed = parse_list(&read_fixture("escapes.list"));
    let texts: Vec<&str> = parsed.list.items().iter().map(|i| i.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "path C:\\temp\\new",
            "first line\nsecond line",
            "",
            "  padded   ",
            "done",
            "日本語のアイテム",
        ]
    );
    assert_eq!(parsed.list.color, ListColor::Orange);
}

// ============================================================================
// Non-canonical input
// ============================================================================

#[test]
fn messy_document_normalizes() {
    let parsed = parse_list(&read_fixture("messy.list"));

    assert_eq!(
        serialize_list(&parsed.list),
        "color: red\n\n- [x] passport\n- [ ] socks\n- [x] charger\n"
    );
    assert_eq!(
        parsed.dropped,
        vec![
            DroppedLine {
                line: 8,
                text: "notes go here".to_string(),
            },
            DroppedLine {
                line: 9,
                text: "- [ ]tent".to_string(),
            },
        ]
    );
}

#[test]
fn normalized_output_is_stable() {
    let once = serialize_list(&parse_list(&read_fixture("messy.list")).list);
    let twice = serialize_list(&parse_list(&once).list);
    assert_eq!(once, twice);
}

#[test]
fn crlf_line_endings_are_accepted() {
    let source = read_fixture("groceries.list").replace('\n', "\r\n");
    let parsed = parse_list(&source);
    assert!(parsed.dropped.is_empty());
    assert_eq!(serialize_list(&parsed.list), read_fixture("groceries.list"));
}
