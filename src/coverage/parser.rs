//! Decoding of Istanbul / NYC `coverage-final.json` documents.
//!
//! The document is a JSON object keyed by generated file path. Each value contains:
//!   - `statementMap`: `{ "0": { "start": { "line": 1, "column": 0 }, "end": { ... } }, ... }`
//!   - `s`:            `{ "0": 5, ... }`, hit counts per statement
//!   - `fnMap`:        `{ "0": { "name": "foo", "decl": <range>, "loc": <range> }, ... }`
//!   - `f`:            `{ "0": 3, ... }`, hit counts per function
//!   - `branchMap`:    `{ "0": { "type": "if", "loc": <range>, "locations": [<range>, ...] }, ... }`
//!   - `b`:            `{ "0": [5, 0], ... }`, hit counts per branch arm
//!
//! Every map may be absent. Fields this crate does not know are kept on the entry.
use crate::types::errors::ParseError;
use crate::types::models::{
    BranchMeta, CoverageMap, ExtraFields, FileCoverage, FunctionMeta, Position, Range,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ENTRY_FIELDS: &[&str] = &[
    "path",
    "statementMap",
    "fnMap",
    "branchMap",
    "s",
    "f",
    "b",
    "inputSourceMap",
];
const FUNCTION_FIELDS: &[&str] = &["name", "decl", "loc"];
const BRANCH_FIELDS: &[&str] = &["type", "loc", "locations"];

/// Parse a coverage document from text.
pub fn parse_coverage(text: &str) -> Result<CoverageMap, ParseError> {
    if text.trim().is_empty() {
        return Ok(CoverageMap::new());
    }
    let document: Value = serde_json::from_str(text)?;
    parse_coverage_value(&document)
}

/// Parse an already-decoded coverage document.
pub fn parse_coverage_value(document: &Value) -> Result<CoverageMap, ParseError> {
    let entries = document.as_object().ok_or_else(|| ParseError::SchemaViolation {
        path: String::new(),
        field: "<root>".to_string(),
    })?;

    entries
        .iter()
        .map(|(key, entry)| parse_file_entry(key, entry).map(|file| (key.clone(), file)))
        .collect()
}

/// Field-path aware reader for a single document entry.
struct EntryReader<'a> {
    key: &'a str,
}

impl EntryReader<'_> {
    fn violation(&self, field: impl Into<String>) -> ParseError {
        ParseError::SchemaViolation {
            path: self.key.to_string(),
            field: field.into(),
        }
    }

    /// An optional object member: absent and `null` both read as `None`.
    fn optional_object<'v>(
        &self,
        parent: &'v Map<String, Value>,
        name: &str,
        field: &str,
    ) -> Result<Option<&'v Map<String, Value>>, ParseError> {
        match parent.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(self.violation(field)),
        }
    }

    fn position(&self, value: Option<&Value>, field: &str) -> Result<Position, ParseError> {
        let obj = value
            .and_then(Value::as_object)
            .ok_or_else(|| self.violation(field))?;
        let line = self.unsigned(obj.get("line"), &format!("{field}.line"))?;
        let column = self.unsigned(obj.get("column"), &format!("{field}.column"))?;
        if line < 1 {
            return Err(self.violation(format!("{field}.line")));
        }
        Ok(Position::new(line, column))
    }

    fn unsigned(&self, value: Option<&Value>, field: &str) -> Result<u32, ParseError> {
        value
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| self.violation(field))
    }

    fn range(&self, value: Option<&Value>, field: &str) -> Result<Range, ParseError> {
        let obj = value
            .and_then(Value::as_object)
            .ok_or_else(|| self.violation(field))?;
        let start = self.position(obj.get("start"), &format!("{field}.start"))?;
        let end = self.position(obj.get("end"), &format!("{field}.end"))?;
        if start > end {
            return Err(self.violation(field));
        }
        Ok(Range::new(start, end))
    }

    fn count(&self, value: &Value, field: &str) -> Result<u64, ParseError> {
        value.as_u64().ok_or_else(|| self.violation(field))
    }
}

fn extra_fields(obj: &Map<String, Value>, known: &[&str]) -> ExtraFields {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Parse a single `path → entry` pair of the document.
fn parse_file_entry(key: &str, entry: &Value) -> Result<FileCoverage, ParseError> {
    let reader = EntryReader { key };
    let obj = entry.as_object().ok_or_else(|| reader.violation("<entry>"))?;

    let path = match obj.get("path") {
        None | Some(Value::Null) => key.to_string(),
        Some(Value::String(p)) => p.clone(),
        Some(_) => return Err(reader.violation("path")),
    };

    let mut file = FileCoverage::new(path);
    file.extra = extra_fields(obj, ENTRY_FIELDS);
    file.input_source_map = match obj.get("inputSourceMap") {
        None | Some(Value::Null) => None,
        Some(map @ Value::Object(_)) => Some(map.clone()),
        Some(_) => return Err(reader.violation("inputSourceMap")),
    };

    parse_statements(&reader, obj, &mut file)?;
    parse_functions(&reader, obj, &mut file)?;
    parse_branches(&reader, obj, &mut file)?;

    Ok(file)
}

/// `statementMap` + `s`. Statements without a counter start at zero.
fn parse_statements(
    reader: &EntryReader<'_>,
    obj: &Map<String, Value>,
    file: &mut FileCoverage,
) -> Result<(), ParseError> {
    if let Some(map) = reader.optional_object(obj, "statementMap", "statementMap")? {
        for (id, loc) in map {
            let range = reader.range(Some(loc), &format!("statementMap.{id}"))?;
            file.statement_map.insert(id.clone(), range);
        }
    }

    let counts = read_counts(reader, obj, "s", |id| file.statement_map.contains_key(id))?;
    file.s = fill_missing(&file.statement_map, counts, |_| 0);
    Ok(())
}

/// `fnMap` + `f`. A missing `decl` falls back to the body range.
fn parse_functions(
    reader: &EntryReader<'_>,
    obj: &Map<String, Value>,
    file: &mut FileCoverage,
) -> Result<(), ParseError> {
    if let Some(map) = reader.optional_object(obj, "fnMap", "fnMap")? {
        for (id, info) in map {
            let field = format!("fnMap.{id}");
            let info_obj = info.as_object().ok_or_else(|| reader.violation(&field))?;

            let name = match info_obj.get("name") {
                None | Some(Value::Null) => "(anonymous)".to_string(),
                Some(Value::String(n)) => n.clone(),
                Some(_) => return Err(reader.violation(format!("{field}.name"))),
            };
            let loc = reader.range(info_obj.get("loc"), &format!("{field}.loc"))?;
            let decl = match info_obj.get("decl") {
                None | Some(Value::Null) => loc,
                decl => reader.range(decl, &format!("{field}.decl"))?,
            };

            file.fn_map.insert(
                id.clone(),
                FunctionMeta {
                    name,
                    decl,
                    loc,
                    extra: extra_fields(info_obj, FUNCTION_FIELDS),
                },
            );
        }
    }

    let counts = read_counts(reader, obj, "f", |id| file.fn_map.contains_key(id))?;
    file.f = fill_missing(&file.fn_map, counts, |_| 0);
    Ok(())
}

/// `branchMap` + `b`. Each counter array must have one slot per location.
fn parse_branches(
    reader: &EntryReader<'_>,
    obj: &Map<String, Value>,
    file: &mut FileCoverage,
) -> Result<(), ParseError> {
    if let Some(map) = reader.optional_object(obj, "branchMap", "branchMap")? {
        for (id, info) in map {
            let field = format!("branchMap.{id}");
            let info_obj = info.as_object().ok_or_else(|| reader.violation(&field))?;

            let branch_type = info_obj
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| reader.violation(format!("{field}.type")))?
                .to_string();

            let locations = info_obj
                .get("locations")
                .and_then(Value::as_array)
                .ok_or_else(|| reader.violation(format!("{field}.locations")))?
                .iter()
                .enumerate()
                .map(|(i, loc)| {
                    if is_unset_range(loc) {
                        Ok(Range::unset())
                    } else {
                        reader.range(Some(loc), &format!("{field}.locations.{i}"))
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;

            let loc = match info_obj.get("loc") {
                None | Some(Value::Null) => None,
                Some(loc) if is_unset_range(loc) => None,
                loc => Some(reader.range(loc, &format!("{field}.loc"))?),
            };

            file.branch_map.insert(
                id.clone(),
                BranchMeta {
                    branch_type,
                    loc,
                    locations,
                    extra: extra_fields(info_obj, BRANCH_FIELDS),
                },
            );
        }
    }

    let mut counts = BTreeMap::new();
    if let Some(map) = reader.optional_object(obj, "b", "b")? {
        for (id, arms) in map {
            let field = format!("b.{id}");
            let branch = file
                .branch_map
                .get(id)
                .ok_or_else(|| reader.violation(&field))?;
            let arms = arms.as_array().ok_or_else(|| reader.violation(&field))?;
            if arms.len() != branch.locations.len() {
                return Err(reader.violation(&field));
            }
            let hits = arms
                .iter()
                .enumerate()
                .map(|(i, n)| reader.count(n, &format!("{field}.{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            counts.insert(id.clone(), hits);
        }
    }
    file.b = fill_missing(&file.branch_map, counts, |branch| {
        vec![0; branch.locations.len()]
    });
    Ok(())
}

/// Read a scalar counter map, rejecting ids the matching location map does not know.
fn read_counts(
    reader: &EntryReader<'_>,
    obj: &Map<String, Value>,
    name: &str,
    known: impl Fn(&str) -> bool,
) -> Result<BTreeMap<String, u64>, ParseError> {
    let mut counts = BTreeMap::new();
    if let Some(map) = reader.optional_object(obj, name, name)? {
        for (id, n) in map {
            let field = format!("{name}.{id}");
            if !known(id) {
                return Err(reader.violation(field));
            }
            counts.insert(id.clone(), reader.count(n, &field)?);
        }
    }
    Ok(counts)
}

fn fill_missing<T, C>(
    locations: &BTreeMap<String, T>,
    mut counts: BTreeMap<String, C>,
    zero: impl Fn(&T) -> C,
) -> BTreeMap<String, C> {
    for (id, loc) in locations {
        counts.entry(id.clone()).or_insert_with(|| zero(loc));
    }
    counts
}

/// Istanbul writes `{start: {}, end: {}}` or an all-zero range for branch locations
/// it could not determine.
fn is_unset_range(value: &Value) -> bool {
    let unset = |p: Option<&Value>| match p {
        Some(Value::Object(p)) => ["line", "column"].iter().all(|key| match p.get(*key) {
            None | Some(Value::Null) => true,
            Some(n) => n.as_u64() == Some(0),
        }),
        _ => false,
    };
    unset(value.get("start")) && unset(value.get("end"))
}
