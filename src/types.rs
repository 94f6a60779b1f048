pub mod errors;
pub mod models;

pub use errors::{Error, ParseError, RemapError, SourceMapError, Table};
pub use models::{
    BranchMeta, CoverageMap, ExtraFields, FileCoverage, FunctionMeta, Position, Range,
    RemapOptions, RemapStats, RemappedEntry, Transformed,
};
