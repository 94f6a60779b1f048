use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Istanbul coverage document: path → per-file coverage, ordered by path.
pub type CoverageMap = BTreeMap<String, FileCoverage>;

/// Fields a coverage entry may carry that this crate does not interpret.
pub type ExtraFields = BTreeMap<String, Value>;

/// A 1-based line and 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn zero_width(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_zero_width(&self) -> bool {
        self.start == self.end
    }

    /// Placeholder for a branch arm Istanbul could not locate, such as the implicit
    /// `else` of an `if`. Written back as line 0, which no real position uses.
    pub fn unset() -> Self {
        Self::zero_width(Position::new(0, 0))
    }

    pub fn is_unset(&self) -> bool {
        self.start.line == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionMeta {
    pub name: String,
    pub decl: Range,
    pub loc: Range,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchMeta {
    #[serde(rename = "type")]
    pub branch_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc: Option<Range>,
    pub locations: Vec<Range>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Coverage for one file, in Istanbul's canonical shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileCoverage {
    pub path: String,
    #[serde(rename = "statementMap")]
    pub statement_map: BTreeMap<String, Range>,
    #[serde(rename = "fnMap")]
    pub fn_map: BTreeMap<String, FunctionMeta>,
    #[serde(rename = "branchMap")]
    pub branch_map: BTreeMap<String, BranchMeta>,
    pub s: BTreeMap<String, u64>,
    pub f: BTreeMap<String, u64>,
    pub b: BTreeMap<String, Vec<u64>>,
    #[serde(rename = "inputSourceMap", skip_serializing_if = "Option::is_none")]
    pub input_source_map: Option<Value>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl FileCoverage {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sum of every statement, function and branch counter.
    pub fn total_hits(&self) -> u64 {
        self.s.values().sum::<u64>()
            + self.f.values().sum::<u64>()
            + self.b.values().flatten().sum::<u64>()
    }

    pub fn is_empty(&self) -> bool {
        self.statement_map.is_empty() && self.fn_map.is_empty() && self.branch_map.is_empty()
    }
}

/// Coverage attributed to one original source, produced from one generated entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RemappedEntry {
    /// Path of the generated file this coverage was read from.
    pub generated: String,
    pub coverage: FileCoverage,
}

/// Counters describing what the remapper had to approximate or discard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemapStats {
    pub dropped_hits: u64,
    pub dropped_ranges: usize,
    pub cross_file_ranges: usize,
    pub clamped_ranges: usize,
    pub passthrough_entries: usize,
    pub excluded_entries: usize,
}

impl RemapStats {
    pub fn merge(&mut self, other: &RemapStats) {
        self.dropped_hits += other.dropped_hits;
        self.dropped_ranges += other.dropped_ranges;
        self.cross_file_ranges += other.cross_file_ranges;
        self.clamped_ranges += other.clamped_ranges;
        self.passthrough_entries += other.passthrough_entries;
        self.excluded_entries += other.excluded_entries;
    }

    pub(crate) fn drop_range(&mut self, hits: u64) {
        self.dropped_hits += hits;
        self.dropped_ranges += 1;
    }
}

impl std::fmt::Display for RemapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} dropped ranges ({} hits), {} cross-file, {} clamped, {} passed through, {} excluded",
            self.dropped_ranges,
            self.dropped_hits,
            self.cross_file_ranges,
            self.clamped_ranges,
            self.passthrough_entries,
            self.excluded_entries
        )
    }
}

/// Tuning for a single transform invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapOptions {
    /// Resolve relative source paths against the generated file's directory.
    pub relative_sources: bool,
    /// Wildcard patterns; original paths matching any of them are discarded.
    pub exclude: Vec<String>,
    /// Worker threads for the remap phase. `None` uses rayon's global pool.
    pub jobs: Option<usize>,
    pub pretty: bool,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            relative_sources: true,
            exclude: Vec::new(),
            jobs: None,
            pretty: true,
        }
    }
}

/// Result of a successful transform.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub document: String,
    pub stats: RemapStats,
}
