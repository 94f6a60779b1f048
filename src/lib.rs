// src/lib.rs
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub mod cli;
pub mod coverage;
pub mod sourcemap;
pub mod types;
pub mod utils;

pub use coverage::{aggregate, parse_coverage, remap, remap_entry, serialize_coverage};
pub use sourcemap::{SourceMap, decode_source_map, decode_source_map_value};
pub use types::*;

/// Supplies the source-map document for a generated file, if there is one.
///
/// How the map is found (sidecar file, `sourceMappingURL` comment, a lookup table)
/// is up to the implementor.
pub trait SourceMapLookup {
    fn source_map_for(&self, generated_path: &str) -> Option<String>;
}

impl<F> SourceMapLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn source_map_for(&self, generated_path: &str) -> Option<String> {
        self(generated_path)
    }
}

impl SourceMapLookup for HashMap<String, String> {
    fn source_map_for(&self, generated_path: &str) -> Option<String> {
        self.get(generated_path).cloned()
    }
}

impl SourceMapLookup for BTreeMap<String, String> {
    fn source_map_for(&self, generated_path: &str) -> Option<String> {
        self.get(generated_path).cloned()
    }
}

/// No source maps at all: every entry passes through.
impl SourceMapLookup for () {
    fn source_map_for(&self, _generated_path: &str) -> Option<String> {
        None
    }
}

enum MapInput<'a> {
    Text(String),
    Embedded(&'a Value),
}

/// Remap a coverage document with default options.
pub fn transform(coverage_text: &str, lookup: &impl SourceMapLookup) -> Result<Transformed, Error> {
    transform_with_options(coverage_text, lookup, &RemapOptions::default())
}

/// Parse, remap, aggregate and serialize a coverage document.
///
/// Maps come from `lookup` first and from an entry's embedded `inputSourceMap`
/// otherwise. Any structural failure aborts the whole transform; per-range
/// losses are reported in [`Transformed::stats`].
pub fn transform_with_options(
    coverage_text: &str,
    lookup: &impl SourceMapLookup,
    options: &RemapOptions,
) -> Result<Transformed, Error> {
    let coverage = parse_coverage(coverage_text)?;

    let pending: Vec<(&str, MapInput<'_>)> = coverage
        .values()
        .filter_map(|file| {
            lookup
                .source_map_for(&file.path)
                .map(MapInput::Text)
                .or_else(|| file.input_source_map.as_ref().map(MapInput::Embedded))
                .map(|input| (file.path.as_str(), input))
        })
        .collect();

    let run = || -> Result<Transformed, Error> {
        let maps: BTreeMap<&str, SourceMap> = pending
            .par_iter()
            .map(|(path, input)| {
                let decoded = match input {
                    MapInput::Text(text) => decode_source_map(text),
                    MapInput::Embedded(value) => decode_source_map_value(value),
                };
                decoded
                    .map(|map| (*path, map))
                    .map_err(|e| Error::from_source_map(path, e))
            })
            .collect::<Result<_, Error>>()?;

        let output = remap(&coverage, |path| maps.get(path), options)?;
        let aggregated = aggregate(output.entries);
        let document = serialize_coverage(&aggregated, options.pretty)?;

        info!(
            "Remapped {} generated files into {} original files: {}",
            coverage.len(),
            aggregated.len(),
            output.stats
        );
        Ok(Transformed {
            document,
            stats: output.stats,
        })
    };

    match options.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()?
            .install(run),
        None => run(),
    }
}
