//! Source lookup.
//!
//! [`SourceProvider`] is a capability: the driver asks it for a module's
//! text and canonical path and does not care where either comes from. A
//! language-server host can substitute a provider that serves unsaved
//! editor buffers, or a package cache, without touching the pipeline.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A module's source text plus the absolute canonical path it was read
/// from.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub text: String,
    pub path: PathBuf,
}

/// Why a module could not be opened.
#[derive(Debug)]
pub enum LoadError {
    /// The file exists nowhere on the search path.
    FileNotFound { module: String },
    /// Not in the working directory, and no standard-library directory
    /// is configured.
    MissingStandardLibrary { module: String },
    /// The file exists but could not be read.
    Io { module: String, source: io::Error },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::FileNotFound { module } => {
                write!(f, "could not open file {}", module)
            }
            LoadError::MissingStandardLibrary { module } => {
                write!(
                    f,
                    "module {} not found and no standard library directory is configured \
                     (set ETUDE_STDLIB)",
                    module
                )
            }
            LoadError::Io { module, source } => {
                write!(f, "could not read module {}: {}", module, source)
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Maps a module name to its source.
pub trait SourceProvider {
    fn open(&self, module: &str) -> Result<SourceFile, LoadError>;
}

/// The filesystem provider: `<name>.et` in the root directory first,
/// then in the standard-library directory.
pub struct FsProvider {
    root: PathBuf,
    stdlib: Option<PathBuf>,
}

impl FsProvider {
    /// A provider rooted at the process working directory, with the
    /// stdlib directory taken from `ETUDE_STDLIB`.
    pub fn from_env() -> Self {
        FsProvider {
            root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            stdlib: std::env::var_os("ETUDE_STDLIB").map(PathBuf::from),
        }
    }

    /// A provider rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        FsProvider { root: root.into(), stdlib: None }
    }

    /// Set the standard-library directory.
    pub fn with_stdlib(mut self, stdlib: impl Into<PathBuf>) -> Self {
        self.stdlib = Some(stdlib.into());
        self
    }

    fn read(&self, module: &str, path: &Path) -> Result<SourceFile, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            module: module.to_string(),
            source,
        })?;
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(SourceFile { text, path })
    }
}

impl SourceProvider for FsProvider {
    fn open(&self, module: &str) -> Result<SourceFile, LoadError> {
        let file_name = format!("{}.et", module);

        let local = self.root.join(&file_name);
        if local.exists() {
            return self.read(module, &local);
        }

        let Some(stdlib) = &self.stdlib else {
            return Err(LoadError::MissingStandardLibrary { module: module.to_string() });
        };
        let in_stdlib = stdlib.join(&file_name);
        if in_stdlib.exists() {
            return self.read(module, &in_stdlib);
        }
        Err(LoadError::FileNotFound { module: module.to_string() })
    }
}
