//! Index maps: a list of `{offset, map}` sections concatenated into one map.
use crate::sourcemap::decoder::{RawSection, SourceMap, decode_raw};
use crate::types::errors::SourceMapError;
use crate::utils::paths::join_source_root;

/// Flatten sections into a single map. Each section's sources and names are
/// appended to the combined tables with rebased indices. A section starting at
/// `(line, column)` truncates whatever earlier sections placed at or after that
/// position.
pub(crate) fn flatten_sections(sections: Vec<RawSection>) -> Result<SourceMap, SourceMapError> {
    let mut combined = SourceMap::default();

    for (i, section) in sections.into_iter().enumerate() {
        let raw = match (section.map, section.url) {
            (Some(map), _) => *map,
            (None, Some(url)) => {
                return Err(SourceMapError::Malformed(format!(
                    "section {i} references external map '{url}'"
                )));
            }
            (None, None) => {
                return Err(SourceMapError::Malformed(format!(
                    "section {i} has no map"
                )));
            }
        };
        let map = decode_raw(raw)?;
        let offset_line = section.offset.line as usize;
        let offset_column = section.offset.column;

        let source_base = combined.sources.len() as u32;
        let name_base = combined.names.len() as u32;
        let root = map.source_root.as_deref();
        combined
            .sources
            .extend(map.sources.iter().map(|s| join_source_root(root, s)));
        combined.names.extend(map.names);

        if combined.lines.len() > offset_line {
            combined.lines.truncate(offset_line + 1);
            combined.lines[offset_line].retain(|s| s.generated_column < offset_column);
        }

        for (row, segments) in map.lines.into_iter().enumerate() {
            let target = offset_line + row;
            let shift = if row == 0 { offset_column } else { 0 };
            if combined.lines.len() <= target {
                combined.lines.resize_with(target + 1, Vec::new);
            }
            for mut segment in segments {
                segment.generated_column =
                    segment.generated_column.checked_add(shift).ok_or_else(|| {
                        SourceMapError::Malformed(format!(
                            "section {i} column offset {offset_column} overflows"
                        ))
                    })?;
                if let Some(original) = segment.original.as_mut() {
                    original.source_index += source_base;
                    original.name_index = original.name_index.map(|n| n + name_base);
                }
                combined.lines[target].push(segment);
            }
        }
    }

    Ok(combined)
}
