use thiserror::Error;

/// Failures decoding the coverage document itself.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed coverage JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Schema violation in '{path}' at field '{field}'")]
    SchemaViolation { path: String, field: String },
}

/// Which string table an out-of-range index pointed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Sources,
    Names,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Table::Sources => write!(f, "sources"),
            Table::Names => write!(f, "names"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VlqError {
    #[error("invalid base64 digit '{0}'")]
    InvalidDigit(char),

    #[error("unterminated continuation in '{0}'")]
    Unterminated(String),

    #[error("value overflows in '{0}'")]
    Overflow(String),
}

#[derive(Error, Debug)]
pub enum SourceMapError {
    #[error("Malformed source map: {0}")]
    Malformed(String),

    #[error("Invalid VLQ encoding on generated line {line}: {reason}")]
    InvalidEncoding { line: usize, reason: String },

    #[error("Index {index} out of range for '{table}' table of length {len}")]
    IndexOutOfRange { table: Table, index: i64, len: usize },

    #[error("Segments on generated line {line} are not in ascending column order")]
    UnorderedSegments { line: usize },
}

impl From<serde_json::Error> for SourceMapError {
    fn from(err: serde_json::Error) -> Self {
        SourceMapError::Malformed(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum RemapError {
    #[error("Source map for '{path}' references source index {index} but only {len} sources exist")]
    BadSourceIndex { path: String, index: i64, len: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Source map for '{path}': {source}")]
    SourceMap {
        path: String,
        #[source]
        source: SourceMapError,
    },

    #[error(transparent)]
    Remap(#[from] RemapError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Attach the generated path to a decoder failure. A source index the decoder
    /// could not place is reported as a remap failure for that entry.
    pub fn from_source_map(path: &str, err: SourceMapError) -> Self {
        match err {
            SourceMapError::IndexOutOfRange {
                table: Table::Sources,
                index,
                len,
            } => Error::Remap(RemapError::BadSourceIndex {
                path: path.to_string(),
                index,
                len,
            }),
            source => Error::SourceMap {
                path: path.to_string(),
                source,
            },
        }
    }
}
