use crate::sourcemap::decode_source_map;
use crate::transform_with_options;
use crate::types::errors::Error;
use crate::types::models::RemapOptions;
use crate::utils::io::{read_text, write_output};
use crate::utils::lookup::FileSourceMaps;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "istanbul-sourcemap",
    about = "Remap Istanbul coverage from generated JavaScript onto original sources",
    version
)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remap a coverage report through the source maps of its generated files
    Remap(RemapArgs),

    /// Print the original position a generated position maps to
    Lookup {
        /// Source map file
        map: PathBuf,

        /// Generated line (1-based)
        line: u32,

        /// Generated column (0-based)
        column: u32,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RemapArgs {
    /// Istanbul coverage JSON (e.g. coverage-final.json)
    pub coverage: PathBuf,

    /// Output file for the remapped report (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Explicit source map for a generated file, as GENERATED=MAPFILE
    #[arg(short, long = "map", value_parser = parse_map_pair)]
    pub maps: Vec<(String, PathBuf)>,

    /// Directory searched recursively for *.map files
    #[arg(long)]
    pub map_dir: Option<PathBuf>,

    /// Directory relative generated paths are resolved against
    #[arg(long, default_value = ".")]
    pub base_dir: PathBuf,

    /// Wildcard patterns for original paths to leave out of the report
    #[arg(short, long)]
    pub exclude: Vec<String>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Write compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// Keep source paths exactly as the source map lists them
    #[arg(long)]
    pub no_relative_sources: bool,
}

fn parse_map_pair(arg: &str) -> Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((generated, map)) if !generated.is_empty() && !map.is_empty() => {
            Ok((generated.to_string(), PathBuf::from(map)))
        }
        _ => Err(format!("expected GENERATED=MAPFILE, got '{arg}'")),
    }
}

/// Install the tracing subscriber; `RUST_LOG` overrides the verbosity flag
pub fn init_logging(verbose: u8) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info"),
            2 => tracing_subscriber::EnvFilter::new("debug"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

impl RemapArgs {
    pub fn options(&self) -> RemapOptions {
        RemapOptions {
            relative_sources: !self.no_relative_sources,
            exclude: self.exclude.clone(),
            jobs: Some(self.jobs.unwrap_or_else(num_cpus::get)),
            pretty: !self.compact,
        }
    }

    pub fn lookup(&self) -> Result<FileSourceMaps, Error> {
        let mut lookup = self
            .maps
            .iter()
            .fold(FileSourceMaps::new(&self.base_dir), |lookup, (generated, map)| {
                lookup.with_map(generated.as_str(), map)
            });
        if let Some(dir) = &self.map_dir {
            let count = lookup.index_dir(dir)?;
            info!("Indexed {} source maps from {}", count, dir.display());
        }
        Ok(lookup)
    }
}

pub fn execute_remap_command(args: &RemapArgs) -> Result<(), Box<dyn std::error::Error>> {
    let coverage = read_text(&args.coverage)?;
    let lookup = args.lookup()?;
    let options = args.options();

    let result = transform_with_options(&coverage, &lookup, &options)?;
    write_output(args.output.as_deref(), &result.document)?;

    let stats = result.stats;
    eprintln!("Remap complete: {}", stats);
    if let Some(output) = &args.output {
        eprintln!("Results saved to {}", output.display());
    }
    if stats.dropped_hits > 0 {
        eprintln!(
            "Warning: {} hits fell on code with no original source",
            stats.dropped_hits
        );
    }

    Ok(())
}

pub fn execute_lookup_command(
    map: &PathBuf,
    line: u32,
    column: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = read_text(map)?;
    let source_map = decode_source_map(&text)
        .map_err(|e| Error::from_source_map(&map.display().to_string(), e))?;

    match source_map.lookup(line, column) {
        Some(hit) => {
            let original = hit.original;
            let source = source_map.source(original.source_index).unwrap_or_default();
            print!("{}:{}:{}", source, original.line + 1, original.column);
            match original.name_index.and_then(|i| source_map.name(i)) {
                Some(name) => println!(" ({})", name),
                None => println!(),
            }
        }
        None => println!("{}:{} is not mapped", line, column),
    }

    Ok(())
}
