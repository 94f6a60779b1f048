use crate::types::models::{CoverageMap, FileCoverage, RemappedEntry};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Order coverage ids: numeric ids numerically, numeric before non-numeric,
/// everything else lexicographically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn sorted_by_id<T>(map: BTreeMap<String, T>) -> Vec<(String, T)> {
    let mut items: Vec<_> = map.into_iter().collect();
    items.sort_by(|a, b| compare_ids(&a.0, &b.0));
    items
}

/// Group remapped entries by original path.
///
/// A path reached from a single entry keeps its ids. A path reached from several
/// entries gets their maps concatenated under fresh ids `0..n-1`, ordered by entry
/// then by original id.
pub fn aggregate(remapped: impl IntoIterator<Item = RemappedEntry>) -> CoverageMap {
    let mut groups: BTreeMap<String, Vec<FileCoverage>> = BTreeMap::new();
    for entry in remapped {
        groups
            .entry(entry.coverage.path.clone())
            .or_default()
            .push(entry.coverage);
    }

    groups
        .into_iter()
        .map(|(path, mut parts)| {
            let merged = if parts.len() == 1 {
                parts.remove(0)
            } else {
                merge(path.clone(), parts)
            };
            (path, merged)
        })
        .collect()
}

/// Concatenate several coverage structures for the same file under fresh ids.
fn merge(path: String, parts: Vec<FileCoverage>) -> FileCoverage {
    let mut merged = FileCoverage::new(path);
    let (mut next_s, mut next_f, mut next_b) = (0usize, 0usize, 0usize);

    for mut part in parts {
        for (id, range) in sorted_by_id(part.statement_map) {
            let key = next_s.to_string();
            next_s += 1;
            merged.s.insert(key.clone(), part.s.remove(&id).unwrap_or(0));
            merged.statement_map.insert(key, range);
        }

        for (id, meta) in sorted_by_id(part.fn_map) {
            let key = next_f.to_string();
            next_f += 1;
            merged.f.insert(key.clone(), part.f.remove(&id).unwrap_or(0));
            merged.fn_map.insert(key, meta);
        }

        for (id, meta) in sorted_by_id(part.branch_map) {
            let key = next_b.to_string();
            next_b += 1;
            let hits = part
                .b
                .remove(&id)
                .unwrap_or_else(|| vec![0; meta.locations.len()]);
            merged.b.insert(key.clone(), hits);
            merged.branch_map.insert(key, meta);
        }
    }

    merged
}

/// Serialize a coverage map with the same field names the parser reads.
pub fn serialize_coverage(coverage: &CoverageMap, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(coverage)
    } else {
        serde_json::to_string(coverage)
    }
}
