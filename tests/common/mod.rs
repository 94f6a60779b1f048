#![allow(dead_code)]
use istanbul_sourcemap::{FileCoverage, Position, Range};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

pub fn encode_vlq(value: i64, out: &mut String) {
    let mut rest = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = rest & 31;
        rest >>= 5;
        if rest > 0 {
            digit |= 32;
        }
        out.push(ALPHABET[digit as usize] as char);
        if rest == 0 {
            break;
        }
    }
}

/// Encode absolute segment fields (`[col]`, `[col, src, line, col]` or with a name)
/// into a `mappings` string.
pub fn encode_mappings(lines: &[Vec<Vec<i64>>]) -> String {
    let mut previous = [0i64; 5];
    let mut encoded = Vec::new();
    for line in lines {
        previous[0] = 0;
        let segments: Vec<String> = line
            .iter()
            .map(|fields| {
                let mut out = String::new();
                for (i, value) in fields.iter().enumerate() {
                    encode_vlq(value - previous[i], &mut out);
                    previous[i] = *value;
                }
                out
            })
            .collect();
        encoded.push(segments.join(","));
    }
    encoded.join(";")
}

pub fn source_map_json(sources: &[&str], names: &[&str], mappings: &str) -> String {
    serde_json::json!({
        "version": 3,
        "sources": sources,
        "names": names,
        "mappings": mappings,
    })
    .to_string()
}

pub fn range(start: (u32, u32), end: (u32, u32)) -> Range {
    Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
}

/// A coverage entry with one statement per `(range, hits)` pair, ids `0..n`.
pub fn statements(path: &str, stmts: &[(Range, u64)]) -> FileCoverage {
    let mut file = FileCoverage::new(path);
    for (i, (range, hits)) in stmts.iter().enumerate() {
        file.statement_map.insert(i.to_string(), *range);
        file.s.insert(i.to_string(), *hits);
    }
    file
}

pub fn total_hits<'a>(files: impl IntoIterator<Item = &'a FileCoverage>) -> u64 {
    files.into_iter().map(FileCoverage::total_hits).sum()
}
