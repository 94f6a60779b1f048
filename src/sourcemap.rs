pub mod decoder;
pub mod sections;
pub mod vlq;

// Re-export main functions
pub use decoder::{
    Lookup, OriginalLocation, Segment, SourceMap, decode_mappings, decode_source_map,
    decode_source_map_value,
};
