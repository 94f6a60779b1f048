use crate::sourcemap::sections::flatten_sections;
use crate::sourcemap::vlq;
use crate::types::errors::{SourceMapError, Table};
use serde::Deserialize;
use serde_json::Value;

/// The original coordinates a segment points at. `line` is 0-based, as stored in the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source_index: u32,
    pub line: u32,
    pub column: u32,
    pub name_index: Option<u32>,
}

/// One mapping unit of a generated line. `original` is `None` for unmapped code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub original: Option<OriginalLocation>,
}

impl Segment {
    pub fn unmapped(generated_column: u32) -> Self {
        Self {
            generated_column,
            original: None,
        }
    }

    pub fn mapped(generated_column: u32, source_index: u32, line: u32, column: u32) -> Self {
        Self {
            generated_column,
            original: Some(OriginalLocation {
                source_index,
                line,
                column,
                name_index: None,
            }),
        }
    }
}

/// The mapped segment found for a generated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    pub generated_column: u32,
    pub original: OriginalLocation,
}

/// A decoded source map, queryable by generated position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    pub sources: Vec<String>,
    pub names: Vec<String>,
    /// Segment lists indexed by 0-based generated line.
    pub lines: Vec<Vec<Segment>>,
    pub file: Option<String>,
    pub source_root: Option<String>,
}

impl SourceMap {
    /// Build a map from already-decoded parts. Indices are not checked here;
    /// the remapper rejects segments that point outside `sources`.
    pub fn new(sources: Vec<String>, names: Vec<String>, lines: Vec<Vec<Segment>>) -> Self {
        Self {
            sources,
            names,
            lines,
            file: None,
            source_root: None,
        }
    }

    /// Nearest-preceding-segment lookup. `line` is 1-based, `column` 0-based.
    ///
    /// Returns `None` when the line is absent or empty, when no segment starts at
    /// or before `column`, or when that segment is unmapped.
    pub fn lookup(&self, line: u32, column: u32) -> Option<Lookup> {
        let segments = self.lines.get(line.checked_sub(1)? as usize)?;
        let after = segments.partition_point(|s| s.generated_column <= column);
        let segment = segments.get(after.checked_sub(1)?)?;
        segment.original.map(|original| Lookup {
            generated_column: segment.generated_column,
            original,
        })
    }

    pub fn source(&self, index: u32) -> Option<&str> {
        self.sources.get(index as usize).map(String::as_str)
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    pub fn segment_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }
}

/// Wire shape of a v3 source map or index map.
#[derive(Debug, Deserialize)]
pub(crate) struct RawSourceMap {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    sources: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    #[serde(default)]
    mappings: Option<String>,
    #[serde(default)]
    file: Option<String>,
    #[serde(rename = "sourceRoot", default)]
    source_root: Option<String>,
    #[serde(default)]
    pub(crate) sections: Option<Vec<RawSection>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSection {
    pub(crate) offset: RawOffset,
    #[serde(default)]
    pub(crate) map: Option<Box<RawSourceMap>>,
    #[serde(default)]
    pub(crate) url: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct RawOffset {
    pub(crate) line: u32,
    pub(crate) column: u32,
}

/// Decode a source map document from text.
pub fn decode_source_map(text: &str) -> Result<SourceMap, SourceMapError> {
    let raw: RawSourceMap = serde_json::from_str(text)?;
    decode_raw(raw)
}

/// Decode a source map that is already a JSON value, such as an embedded `inputSourceMap`.
pub fn decode_source_map_value(value: &Value) -> Result<SourceMap, SourceMapError> {
    let raw = RawSourceMap::deserialize(value)?;
    decode_raw(raw)
}

pub(crate) fn decode_raw(raw: RawSourceMap) -> Result<SourceMap, SourceMapError> {
    if let Some(version) = raw.version {
        if version != 3 {
            return Err(SourceMapError::Malformed(format!(
                "unsupported version {version}"
            )));
        }
    }

    if let Some(sections) = raw.sections {
        let mut map = flatten_sections(sections)?;
        map.file = raw.file;
        return Ok(map);
    }

    let mappings = raw
        .mappings
        .ok_or_else(|| SourceMapError::Malformed("missing 'mappings'".to_string()))?;
    let sources: Vec<String> = raw
        .sources
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    let lines = decode_mappings(&mappings, sources.len(), raw.names.len())?;

    Ok(SourceMap {
        sources,
        names: raw.names,
        lines,
        file: raw.file,
        source_root: raw.source_root.filter(|root| !root.is_empty()),
    })
}

/// Running values that carry over from one segment to the next.
#[derive(Default)]
struct DecodeState {
    source: i64,
    line: i64,
    column: i64,
    name: i64,
}

fn to_u32(value: i64, line: usize, what: &str) -> Result<u32, SourceMapError> {
    u32::try_from(value).map_err(|_| SourceMapError::InvalidEncoding {
        line,
        reason: format!("{what} {value} is out of range"),
    })
}

fn to_index(value: i64, table: Table, len: usize) -> Result<u32, SourceMapError> {
    match u32::try_from(value) {
        Ok(index) if (index as usize) < len => Ok(index),
        _ => Err(SourceMapError::IndexOutOfRange {
            table,
            index: value,
            len,
        }),
    }
}

/// Decode the `mappings` string into per-line segment lists.
pub fn decode_mappings(
    mappings: &str,
    sources_len: usize,
    names_len: usize,
) -> Result<Vec<Vec<Segment>>, SourceMapError> {
    let mut state = DecodeState::default();
    let mut fields = Vec::with_capacity(5);
    let mut lines = Vec::new();

    for (index, text) in mappings.split(';').enumerate() {
        let line = index + 1;
        let mut generated_column = 0i64;
        let mut segments: Vec<Segment> = Vec::new();

        for segment_text in text.split(',').filter(|s| !s.is_empty()) {
            fields.clear();
            vlq::decode_segment(segment_text, &mut fields).map_err(|e| {
                SourceMapError::InvalidEncoding {
                    line,
                    reason: e.to_string(),
                }
            })?;

            generated_column += fields[0];
            let column = to_u32(generated_column, line, "generated column")?;

            let original = match fields.len() {
                1 => None,
                4 | 5 => {
                    state.source += fields[1];
                    state.line += fields[2];
                    state.column += fields[3];
                    let source_index = to_index(state.source, Table::Sources, sources_len)?;
                    let name_index = if fields.len() == 5 {
                        state.name += fields[4];
                        Some(to_index(state.name, Table::Names, names_len)?)
                    } else {
                        None
                    };
                    Some(OriginalLocation {
                        source_index,
                        line: to_u32(state.line, line, "original line")?,
                        column: to_u32(state.column, line, "original column")?,
                        name_index,
                    })
                }
                n => {
                    return Err(SourceMapError::InvalidEncoding {
                        line,
                        reason: format!("segment '{segment_text}' has {n} fields"),
                    });
                }
            };

            if segments
                .last()
                .is_some_and(|last| last.generated_column >= column)
            {
                return Err(SourceMapError::UnorderedSegments { line });
            }
            segments.push(Segment {
                generated_column: column,
                original,
            });
        }

        lines.push(segments);
    }

    Ok(lines)
}
