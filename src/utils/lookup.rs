//! Finding source maps on disk for the command-line front end.
use crate::SourceMapLookup;
use crate::types::errors::Error;
use crate::utils::io::read_text;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const URL_MARKERS: &[&str] = &["//# sourceMappingURL=", "//@ sourceMappingURL="];

/// Resolves generated paths to source-map text, trying in order: explicit
/// pairs, maps indexed from a directory, a `<generated>.map` sidecar, and the
/// generated file's `sourceMappingURL` comment.
#[derive(Debug, Clone, Default)]
pub struct FileSourceMaps {
    base_dir: PathBuf,
    explicit: HashMap<String, PathBuf>,
    indexed: HashMap<String, PathBuf>,
}

impl FileSourceMaps {
    /// Relative generated paths are resolved against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_map(mut self, generated: impl Into<String>, map: impl Into<PathBuf>) -> Self {
        self.explicit.insert(generated.into(), map.into());
        self
    }

    /// Index every `*.map` file under `dir` by its file name without `.map` and
    /// by its `file` field. Returns the number of maps indexed.
    pub fn index_dir(&mut self, dir: &Path) -> Result<usize, Error> {
        let mut count = 0;
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to walk '{}': {}",
                    dir.display(),
                    e
                )))
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "map") {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                self.indexed.insert(stem.to_string(), path.to_path_buf());
            }
            match read_text(path).map(|text| serde_json::from_str::<Value>(&text)) {
                Ok(Ok(map)) => {
                    if let Some(file) = map.get("file").and_then(Value::as_str) {
                        self.indexed.insert(file.to_string(), path.to_path_buf());
                    }
                }
                Ok(Err(e)) => warn!("Skipping unreadable map '{}': {}", path.display(), e),
                Err(e) => warn!("Skipping unreadable map '{}': {}", path.display(), e),
            }
            count += 1;
        }
        debug!("Indexed {} source maps under '{}'", count, dir.display());
        Ok(count)
    }

    fn generated_file(&self, generated: &str) -> PathBuf {
        self.base_dir.join(generated)
    }

    fn read_quietly(path: &Path) -> Option<String> {
        read_text(path)
            .inspect_err(|e| warn!("{}", e))
            .ok()
    }

    fn indexed_for(&self, generated: &str) -> Option<&PathBuf> {
        self.indexed.get(generated).or_else(|| {
            Path::new(generated)
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| self.indexed.get(name))
        })
    }

    fn sidecar(&self, generated: &str) -> Option<String> {
        let mut sidecar = self.generated_file(generated).into_os_string();
        sidecar.push(".map");
        let sidecar = PathBuf::from(sidecar);
        sidecar
            .is_file()
            .then(|| Self::read_quietly(&sidecar))
            .flatten()
    }

    fn from_comment(&self, generated: &str) -> Option<String> {
        let file = self.generated_file(generated);
        if !file.is_file() {
            return None;
        }
        let code = Self::read_quietly(&file)?;
        let url = source_mapping_url(&code)?;

        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        Self::read_quietly(&dir.join(url))
    }
}

impl SourceMapLookup for FileSourceMaps {
    fn source_map_for(&self, generated_path: &str) -> Option<String> {
        if let Some(path) = self
            .explicit
            .get(generated_path)
            .or_else(|| self.indexed_for(generated_path))
        {
            return Self::read_quietly(path);
        }
        self.sidecar(generated_path)
            .or_else(|| self.from_comment(generated_path))
    }
}

/// The last `sourceMappingURL` annotation in a generated file.
pub fn source_mapping_url(code: &str) -> Option<&str> {
    code.lines().rev().find_map(|line| {
        let line = line.trim();
        URL_MARKERS
            .iter()
            .find_map(|marker| line.strip_prefix(marker))
            .map(str::trim)
            .filter(|url| !url.is_empty())
    })
}

/// Decode a `data:application/json;base64,...` URL.
pub fn decode_data_url(url: &str) -> Option<String> {
    let (header, payload) = url.split_once(',')?;
    if !header.ends_with(";base64") {
        warn!("Ignoring non-base64 inline source map");
        return None;
    }
    let bytes = STANDARD
        .decode(payload)
        .inspect_err(|e| warn!("Invalid inline source map: {}", e))
        .ok()?;
    String::from_utf8(bytes).ok()
}
