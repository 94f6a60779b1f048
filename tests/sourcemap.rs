// tests/sourcemap.rs
mod common;

use common::{encode_mappings, source_map_json};
use istanbul_sourcemap::sourcemap::{Segment, decode_mappings};
use istanbul_sourcemap::{SourceMap, SourceMapError, Table, decode_source_map};
use proptest::prelude::*;
use rstest::*;

#[fixture]
fn fixture_map() -> SourceMap {
    decode_source_map(include_str!("fixtures/dist/app.js.map")).unwrap()
}

#[rstest]
fn test_decode_fixture_map(fixture_map: SourceMap) {
    assert_eq!(fixture_map.sources, vec!["../src/app.ts"]);
    assert_eq!(fixture_map.names, vec!["greet"]);
    assert_eq!(fixture_map.file.as_deref(), Some("app.js"));
    assert_eq!(fixture_map.lines.len(), 3);
    assert_eq!(fixture_map.segment_count(), 4);
    assert_eq!(fixture_map.lines[0][1].generated_column, 9);

    let named = fixture_map.lines[0][1].original.unwrap();
    assert_eq!((named.line, named.column), (0, 16));
    assert_eq!(named.name_index, Some(0));
}

#[rstest]
#[case::segment_start(1, 9, Some((0, 16)))]
#[case::inside_segment(1, 13, Some((0, 16)))]
#[case::first_segment(1, 4, Some((0, 7)))]
#[case::second_line(2, 21, Some((1, 2)))]
#[case::before_first_segment(2, 1, None)]
#[case::line_past_end(9, 0, None)]
#[case::line_zero(0, 0, None)]
fn test_nearest_preceding_lookup(
    fixture_map: SourceMap,
    #[case] line: u32,
    #[case] column: u32,
    #[case] expected: Option<(u32, u32)>,
) {
    let actual = fixture_map
        .lookup(line, column)
        .map(|hit| (hit.original.line, hit.original.column));
    assert_eq!(actual, expected);
}

#[test]
fn test_unmapped_segment_hides_earlier_mapping() {
    // Setup test data: a mapped segment at 0, then an unmapped one at 10
    let mappings = encode_mappings(&[vec![vec![0, 0, 0, 0], vec![10]]]);
    let map = decode_source_map(&source_map_json(&["a.ts"], &[], &mappings)).unwrap();

    // Verify
    assert!(map.lookup(1, 5).is_some());
    assert!(map.lookup(1, 10).is_none());
    assert!(map.lookup(1, 50).is_none());
}

#[test]
fn test_fields_accumulate_across_lines() {
    let mappings = encode_mappings(&[
        vec![vec![4, 1, 10, 3]],
        vec![],
        vec![vec![2, 1, 12, 0], vec![8, 0, 2, 6]],
    ]);
    let lines = decode_mappings(&mappings, 2, 0).unwrap();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].is_empty());
    assert_eq!(lines[0], vec![Segment::mapped(4, 1, 10, 3)]);
    assert_eq!(
        lines[2],
        vec![Segment::mapped(2, 1, 12, 0), Segment::mapped(8, 0, 2, 6)]
    );
}

#[test]
fn test_empty_mappings() {
    let lines = decode_mappings("", 0, 0).unwrap();
    assert_eq!(lines, vec![Vec::<Segment>::new()]);
}

#[test]
fn test_source_root_and_null_sources() {
    let text = r#"{"version": 3, "sourceRoot": "", "sources": [null, "b.ts"], "mappings": "AAAA"}"#;
    let map = decode_source_map(text).unwrap();
    assert_eq!(map.sources, vec!["", "b.ts"]);
    assert_eq!(map.source_root, None);

    let text = r#"{"version": 3, "sourceRoot": "/repo/", "sources": ["a.ts"], "mappings": "AAAA"}"#;
    let map = decode_source_map(text).unwrap();
    assert_eq!(map.source_root.as_deref(), Some("/repo/"));
}

#[rstest]
#[case::not_json("{\"version\": 3,")]
#[case::wrong_version(r#"{"version": 2, "sources": [], "mappings": ""}"#)]
#[case::no_mappings(r#"{"version": 3, "sources": ["a.ts"]}"#)]
#[case::external_section(
    r#"{"version": 3, "sections": [{"offset": {"line": 0, "column": 0}, "url": "a.js.map"}]}"#
)]
#[case::section_column_overflow(
    r#"{"version": 3, "sections": [{"offset": {"line": 0, "column": 4294967295},
        "map": {"version": 3, "sources": ["a.ts"], "names": [], "mappings": "CAAA"}}]}"#
)]
fn test_malformed_maps(#[case] text: &str) {
    assert!(matches!(
        decode_source_map(text),
        Err(SourceMapError::Malformed(_))
    ));
}

#[test]
fn test_source_index_out_of_range() {
    // "AKAA" points at source 5
    let result = decode_mappings("AKAA", 2, 0);
    match result {
        Err(SourceMapError::IndexOutOfRange { table, index, len }) => {
            assert_eq!(table, Table::Sources);
            assert_eq!(index, 5);
            assert_eq!(len, 2);
        }
        other => panic!("expected IndexOutOfRange, got {:?}", other),
    }
}

#[test]
fn test_name_index_out_of_range() {
    let result = decode_mappings("AAAAA", 1, 0);
    assert!(matches!(
        result,
        Err(SourceMapError::IndexOutOfRange {
            table: Table::Names,
            ..
        })
    ));
}

#[rstest]
#[case::bad_digit("AA*A")]
#[case::unterminated("AAAg")]
#[case::two_fields("AA")]
#[case::six_fields("AAAAAA")]
#[case::negative_column("D")]
#[case::negative_original_line("AADA")]
fn test_invalid_encoding(#[case] mappings: &str) {
    assert!(matches!(
        decode_mappings(mappings, 1, 1),
        Err(SourceMapError::InvalidEncoding { line: 1, .. })
    ));
}

#[test]
fn test_unordered_segments() {
    // column 5, then column 5 again
    let result = decode_mappings("KAAA,AAAA", 1, 0);
    assert!(matches!(
        result,
        Err(SourceMapError::UnorderedSegments { line: 1 })
    ));
}

#[test]
fn test_index_map_sections() {
    // Setup test data: two sections, the second starting at line 2 column 10
    let first = encode_mappings(&[
        vec![vec![0, 0, 0, 0]],
        vec![vec![0, 0, 1, 0], vec![12, 0, 1, 8]],
    ]);
    let second = encode_mappings(&[vec![vec![0, 0, 4, 2, 0]], vec![vec![3, 0, 5, 0]]]);
    let text = serde_json::json!({
        "version": 3,
        "file": "bundle.js",
        "sections": [
            {"offset": {"line": 0, "column": 0},
             "map": {"version": 3, "sources": ["a.ts"], "names": [], "mappings": first}},
            {"offset": {"line": 1, "column": 10},
             "map": {"version": 3, "sourceRoot": "lib", "sources": ["b.ts"], "names": ["run"], "mappings": second}}
        ]
    })
    .to_string();

    // Execute
    let map = decode_source_map(&text).unwrap();

    // Verify
    assert_eq!(map.file.as_deref(), Some("bundle.js"));
    assert_eq!(map.sources, vec!["a.ts", "lib/b.ts"]);
    assert_eq!(map.names, vec!["run"]);
    assert_eq!(map.lines.len(), 3);

    // the first section's segment at column 12 is shadowed by the second section
    let columns: Vec<u32> = map.lines[1].iter().map(|s| s.generated_column).collect();
    assert_eq!(columns, vec![0, 10]);

    let hit = map.lookup(2, 11).unwrap();
    assert_eq!(hit.original.source_index, 1);
    assert_eq!((hit.original.line, hit.original.column), (4, 2));
    assert_eq!(map.name(hit.original.name_index.unwrap()), Some("run"));

    // only the first row of a section is shifted
    let hit = map.lookup(3, 3).unwrap();
    assert_eq!(hit.generated_column, 3);
    assert_eq!(hit.original.source_index, 1);
}

proptest! {
    #[test]
    fn prop_decoding_recovers_absolute_fields(
        lines in prop::collection::vec(
            prop::collection::vec((1u32..20, 0u32..3, 0u32..200, 0u32..120), 0..6),
            1..6,
        )
    ) {
        // Setup test data: strictly increasing columns per line
        let absolute: Vec<Vec<Segment>> = lines
            .iter()
            .map(|segments| {
                let mut column = 0;
                segments
                    .iter()
                    .map(|&(gap, source, line, col)| {
                        column += gap;
                        Segment::mapped(column, source, line, col)
                    })
                    .collect()
            })
            .collect();
        let fields: Vec<Vec<Vec<i64>>> = absolute
            .iter()
            .map(|segments| {
                segments
                    .iter()
                    .map(|s| {
                        let o = s.original.unwrap();
                        vec![
                            i64::from(s.generated_column),
                            i64::from(o.source_index),
                            i64::from(o.line),
                            i64::from(o.column),
                        ]
                    })
                    .collect()
            })
            .collect();

        // Execute
        let decoded = decode_mappings(&encode_mappings(&fields), 3, 0).unwrap();

        // Verify
        prop_assert_eq!(decoded, absolute);
    }
}
