pub mod aggregate;
pub mod parser;
pub mod remap;

// Re-export main functions
pub use aggregate::{aggregate, serialize_coverage};
pub use parser::{parse_coverage, parse_coverage_value};
pub use remap::{RemapOutput, remap, remap_entry};
