//! Stack file loading and include resolution.
//!
//! Provides format detection (JSON/TOML/RON), parsing of any supported format
//! into an untyped `serde_json::Value`, and the [`IncludeResolver`] seam used
//! by the stack importer to follow `include` entries.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a stack file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {}", .file.display())]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {}: {detail}", .file.display())]
    Parse { file: PathBuf, detail: String },

    /// An included file does not exist.
    #[error("included file not found: {}", .file.display())]
    NotFound { file: PathBuf },

    /// An I/O error occurred.
    #[error("cannot read {}: {source}", .file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported stack file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
    Ron,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, LoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        Some("ron") => Ok(Format::Ron),
        _ => Err(LoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Parsing
// ===========================================================================

/// Parse `content` in the given format. `file` is only used for errors.
pub fn parse_str(format: Format, content: &str, file: &Path) -> Result<Value, LoadError> {
    let parse_err = |detail: String| LoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read a file and parse it according to its extension.
pub fn read_value(path: &Path) -> Result<Value, LoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound {
                file: path.to_path_buf(),
            }
        } else {
            LoadError::Io {
                file: path.to_path_buf(),
                source,
            }
        }
    })?;
    debug!(file = %path.display(), ?format, "read stack file");
    parse_str(format, &content, path)
}

/// Resolve an include target relative to the directory of the including file.
pub fn include_path(target: &str, from: &Path) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match from.parent() {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

// ===========================================================================
// Include resolution
// ===========================================================================

/// Locates and loads the layers named by `include` entries.
pub trait IncludeResolver: fmt::Debug {
    /// Load `target`, as written in the layer loaded from `from`. Returns the
    /// resolved location (used as the origin of the new layer) and its content.
    fn resolve(&self, target: &str, from: &Path) -> Result<(PathBuf, Value), LoadError>;
}

/// Reads includes from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsIncludeResolver;

impl IncludeResolver for FsIncludeResolver {
    fn resolve(&self, target: &str, from: &Path) -> Result<(PathBuf, Value), LoadError> {
        let path = include_path(target, from);
        let value = read_value(&path)?;
        Ok((path, value))
    }
}

/// Serves includes from memory, with the same relative-path rules as the
/// filesystem resolver.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludes {
    files: BTreeMap<PathBuf, Value>,
}

impl MemoryIncludes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, value: Value) -> &mut Self {
        self.files.insert(path.into(), value);
        self
    }
}

impl IncludeResolver for MemoryIncludes {
    fn resolve(&self, target: &str, from: &Path) -> Result<(PathBuf, Value), LoadError> {
        let path = include_path(target, from);
        match self.files.get(&path) {
            Some(value) => Ok((path, value.clone())),
            None => Err(LoadError::NotFound { file: path }),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
