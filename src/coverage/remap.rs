use crate::sourcemap::SourceMap;
use crate::types::errors::RemapError;
use crate::types::models::{
    BranchMeta, CoverageMap, FileCoverage, FunctionMeta, Position, Range, RemapOptions,
    RemapStats, RemappedEntry,
};
use crate::utils::paths::{join_source_root, resolve_original_path};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use wildmatch::WildMatch;

/// Everything the remapper produced for one invocation.
#[derive(Debug, Clone, Default)]
pub struct RemapOutput {
    pub entries: Vec<RemappedEntry>,
    pub stats: RemapStats,
}

/// A generated range resolved into one original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Resolved {
    source: u32,
    range: Range,
}

/// Remap every entry through the source map `source_map_for` returns for its path.
///
/// Entries are independent, so they are processed in parallel on the current rayon
/// pool. Output keeps input order; within an entry, one remapped entry is produced
/// per original source in source-index order.
pub fn remap<'m, F>(
    coverage: &CoverageMap,
    source_map_for: F,
    options: &RemapOptions,
) -> Result<RemapOutput, RemapError>
where
    F: Fn(&str) -> Option<&'m SourceMap> + Sync,
{
    let files: Vec<&FileCoverage> = coverage.values().collect();
    let per_entry = files
        .par_iter()
        .map(|file| match source_map_for(&file.path) {
            Some(map) => remap_entry(file, map, options),
            None => Ok(passthrough(file)),
        })
        .collect::<Result<Vec<_>, RemapError>>()?;

    let excludes: Vec<WildMatch> = options.exclude.iter().map(|p| WildMatch::new(p)).collect();
    let mut output = RemapOutput::default();
    for (entries, stats) in per_entry {
        output.stats.merge(&stats);
        for entry in entries {
            if excludes.iter().any(|w| w.matches(&entry.coverage.path)) {
                exclude(&entry, &mut output.stats);
            } else {
                output.entries.push(entry);
            }
        }
    }

    Ok(output)
}

fn passthrough(file: &FileCoverage) -> (Vec<RemappedEntry>, RemapStats) {
    let stats = RemapStats {
        passthrough_entries: 1,
        ..Default::default()
    };
    let entry = RemappedEntry {
        generated: file.path.clone(),
        coverage: file.clone(),
    };
    (vec![entry], stats)
}

fn exclude(entry: &RemappedEntry, stats: &mut RemapStats) {
    let coverage = &entry.coverage;
    debug!(
        "Excluding '{}' (from '{}')",
        coverage.path, entry.generated
    );
    stats.excluded_entries += 1;
    stats.dropped_hits += coverage.total_hits();
    stats.dropped_ranges += coverage.statement_map.len()
        + coverage.fn_map.len()
        + coverage
            .branch_map
            .values()
            .map(|b| b.locations.len())
            .sum::<usize>();
}

/// Remap one generated entry through its source map.
pub fn remap_entry(
    file: &FileCoverage,
    map: &SourceMap,
    options: &RemapOptions,
) -> Result<(Vec<RemappedEntry>, RemapStats), RemapError> {
    let mut remapper = EntryRemapper {
        file,
        map,
        stats: RemapStats::default(),
        targets: BTreeMap::new(),
    };
    remapper.statements()?;
    remapper.functions()?;
    remapper.branches()?;

    let EntryRemapper { targets, stats, .. } = remapper;
    let root = map.source_root.as_deref();
    let entries = targets
        .into_iter()
        .map(|(source, mut coverage)| {
            let source = map.source(source).unwrap_or_default();
            let rooted = join_source_root(root, source);
            coverage.path = resolve_original_path(&file.path, &rooted, options.relative_sources);
            RemappedEntry {
                generated: file.path.clone(),
                coverage,
            }
        })
        .collect::<Vec<_>>();

    if entries.is_empty() {
        warn!("Nothing in '{}' could be mapped", file.path);
    }
    Ok((entries, stats))
}

struct EntryRemapper<'a> {
    file: &'a FileCoverage,
    map: &'a SourceMap,
    stats: RemapStats,
    /// Remapped coverage keyed by source index; paths are filled in at the end.
    targets: BTreeMap<u32, FileCoverage>,
}

impl EntryRemapper<'_> {
    fn target(&mut self, source: u32) -> &mut FileCoverage {
        self.targets.entry(source).or_default()
    }

    /// Resolve one generated position. `exclusive_end` applies the end-column
    /// policy: look up `column - 1`, then add the column back after mapping.
    fn resolve_position(
        &self,
        at: Position,
        exclusive_end: bool,
    ) -> Result<Option<(u32, Position)>, RemapError> {
        let back = u32::from(exclusive_end && at.column > 0);
        let column = at.column - back;
        let Some(hit) = self.map.lookup(at.line, column) else {
            return Ok(None);
        };

        let original = hit.original;
        if original.source_index as usize >= self.map.sources.len() {
            return Err(RemapError::BadSourceIndex {
                path: self.file.path.clone(),
                index: i64::from(original.source_index),
                len: self.map.sources.len(),
            });
        }

        let delta = column - hit.generated_column;
        let position = Position::new(
            original.line.saturating_add(1),
            original.column.saturating_add(delta).saturating_add(back),
        );
        Ok(Some((original.source_index, position)))
    }

    fn resolve_range(&mut self, range: Range) -> Result<Option<Resolved>, RemapError> {
        let start = self.resolve_position(range.start, false)?;
        let end = self.resolve_position(range.end, true)?;

        let resolved = match (start, end) {
            (None, None) => return Ok(None),
            (Some((source, at)), None) | (None, Some((source, at))) => Resolved {
                source,
                range: Range::zero_width(at),
            },
            (Some((source, start)), Some((end_source, end))) => {
                let end = if source == end_source {
                    Some(end)
                } else {
                    self.stats.cross_file_ranges += 1;
                    debug!(
                        "Range {:?} in '{}' spans sources {} and {}; attributing to {}",
                        range, self.file.path, source, end_source, source
                    );
                    self.resolve_end_in_source(range.end, source, range.start.line)
                };
                match end {
                    Some(end) if end >= start => Resolved {
                        source,
                        range: Range::new(start, end),
                    },
                    Some(_) => {
                        self.stats.clamped_ranges += 1;
                        Resolved {
                            source,
                            range: Range::zero_width(start),
                        }
                    }
                    None => Resolved {
                        source,
                        range: Range::zero_width(start),
                    },
                }
            }
        };
        Ok(Some(resolved))
    }

    /// Resolve a range end using only segments of `source`: the last such segment
    /// at or before `end`, searching back line by line no further than `first_line`.
    /// The end stops where the next segment begins.
    fn resolve_end_in_source(&self, end: Position, source: u32, first_line: u32) -> Option<Position> {
        let back = u32::from(end.column > 0);
        let column = end.column - back;

        (first_line.max(1)..=end.line).rev().find_map(|line| {
            let segments = self.map.lines.get(line as usize - 1)?;
            let limit = if line == end.line {
                segments.partition_point(|s| s.generated_column <= column)
            } else {
                segments.len()
            };
            let index = segments[..limit]
                .iter()
                .rposition(|s| s.original.is_some_and(|o| o.source_index == source))?;
            let segment = segments[index];
            let original = segment.original?;
            let next = segments.get(index + 1).map(|s| s.generated_column);

            let end_column = match next {
                Some(next) if line < end.line || next <= column => {
                    original.column.saturating_add(next.saturating_sub(segment.generated_column))
                }
                _ if line == end.line => original
                    .column
                    .saturating_add(column.saturating_sub(segment.generated_column))
                    .saturating_add(back),
                _ => original.column,
            };
            Some(Position::new(original.line.saturating_add(1), end_column))
        })
    }

    fn statements(&mut self) -> Result<(), RemapError> {
        let file = self.file;
        for (id, range) in &file.statement_map {
            let hits = file.s.get(id).copied().unwrap_or(0);
            match self.resolve_range(*range)? {
                Some(resolved) => {
                    let target = self.target(resolved.source);
                    target.statement_map.insert(id.clone(), resolved.range);
                    target.s.insert(id.clone(), hits);
                }
                None => {
                    debug!("Dropping statement {} of '{}'", id, file.path);
                    self.stats.drop_range(hits);
                }
            }
        }
        Ok(())
    }

    /// A function follows its declaration; the body range is used when the
    /// declaration cannot be resolved.
    fn functions(&mut self) -> Result<(), RemapError> {
        let file = self.file;
        for (id, meta) in &file.fn_map {
            let hits = file.f.get(id).copied().unwrap_or(0);
            let decl = self.resolve_range(meta.decl)?;
            let loc = self.resolve_range(meta.loc)?;

            let (source, decl, loc) = match (decl, loc) {
                (None, None) => {
                    debug!("Dropping function {} ({}) of '{}'", id, meta.name, file.path);
                    self.stats.drop_range(hits);
                    continue;
                }
                (Some(decl), Some(loc)) if decl.source == loc.source => {
                    (decl.source, decl.range, loc.range)
                }
                (Some(decl), Some(_)) => {
                    self.stats.cross_file_ranges += 1;
                    (decl.source, decl.range, decl.range)
                }
                (Some(only), None) | (None, Some(only)) => (only.source, only.range, only.range),
            };

            let target = self.target(source);
            target.fn_map.insert(
                id.clone(),
                FunctionMeta {
                    name: meta.name.clone(),
                    decl,
                    loc,
                    extra: Default::default(),
                },
            );
            target.f.insert(id.clone(), hits);
        }
        Ok(())
    }

    /// A branch stays whole in the source of its first resolvable location.
    /// Locations that resolve nowhere are removed along with their counter.
    fn branches(&mut self) -> Result<(), RemapError> {
        let file = self.file;
        for (id, meta) in &file.branch_map {
            let hits = file.b.get(id).map(Vec::as_slice).unwrap_or_default();
            let mut source = None;
            let mut locations = Vec::with_capacity(meta.locations.len());
            let mut kept = Vec::with_capacity(meta.locations.len());

            for (i, range) in meta.locations.iter().enumerate() {
                let count = hits.get(i).copied().unwrap_or(0);
                let resolved = if range.is_unset() {
                    None
                } else {
                    self.resolve_range(*range)?
                };
                match resolved {
                    Some(resolved) => {
                        let branch_source = *source.get_or_insert(resolved.source);
                        if resolved.source == branch_source {
                            locations.push(resolved.range);
                        } else {
                            // an arm in another file collapses onto the branch's first arm
                            self.stats.cross_file_ranges += 1;
                            let anchor = locations.first().map_or(resolved.range.start, |r| r.start);
                            locations.push(Range::zero_width(anchor));
                        }
                        kept.push(count);
                    }
                    None => {
                        debug!("Dropping location {} of branch {} in '{}'", i, id, file.path);
                        self.stats.drop_range(count);
                    }
                }
            }

            let Some(source) = source else {
                continue;
            };

            let loc = match meta.loc {
                Some(range) => self
                    .resolve_range(range)?
                    .filter(|r| r.source == source)
                    .map(|r| r.range)
                    .or_else(|| locations.first().copied()),
                None => None,
            };

            let target = self.target(source);
            target.branch_map.insert(
                id.clone(),
                BranchMeta {
                    branch_type: meta.branch_type.clone(),
                    loc,
                    locations,
                    extra: Default::default(),
                },
            );
            target.b.insert(id.clone(), kept);
        }
        Ok(())
    }
}
