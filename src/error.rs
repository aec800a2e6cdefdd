//! Error types for vendoring operations.
//!
//! Every failure the resolver, fetcher, or manifest store can produce is a
//! [`VenError`] variant. Command handlers wrap these in `anyhow` context; the
//! binary checks [`VenError::is_cancelled`] to tell an interrupt apart from a
//! real failure.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VenError>;

/// A vendored package that still imports a subpackage removed by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubpackageConflict {
    pub dependent: String,
    pub subpackage: String,
}

impl fmt::Display for SubpackageConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pkg ({}) is using subpackage ({})",
            self.dependent, self.subpackage
        )
    }
}

#[derive(Error, Debug)]
pub enum VenError {
    #[error("pkg ({package}): pkg has a constraint ({constraint}), can't import version ({requested})")]
    ConstraintConflict {
        package: String,
        constraint: String,
        requested: String,
    },

    #[error(
        "{}, which is deprecated in version: ({version}). Consider updating these packages first to solve dependency conflicts",
        format_conflicts(.conflicts)
    )]
    DeprecatedSubpackage {
        conflicts: Vec<SubpackageConflict>,
        version: String,
    },

    #[error("pkg ({package}): only git repositories are supported, found {vcs}")]
    UnsupportedVcs { package: String, vcs: String },

    #[error("pkg ({package}): {message}")]
    Vcs { package: String, message: String },

    #[error("pkg ({package}): cannot detect pkg repository: {message}")]
    RepoDiscovery { package: String, message: String },

    #[error("source directory {} does not exist", .path.display())]
    SourceMissing { path: PathBuf },

    #[error("directory {} already exists", .path.display())]
    DestinationExists { path: PathBuf },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory {} not found, perhaps version of pkg ({package}) is not compatible with code", .dir.display())]
    MissingDirectory { dir: PathBuf, package: String },

    #[error("cannot read manifest {}: {message}", .path.display())]
    ManifestParse { path: PathBuf, message: String },

    #[error("cannot serialize manifest: {0}")]
    ManifestSerialize(String),

    #[error("manifest already exists")]
    ManifestExists,

    #[error("vendor directory already exists")]
    VendorExists,

    #[error("pkg ({package}): failed to parse {tool} lock file: {message}")]
    ForeignSource {
        package: String,
        tool: String,
        message: String,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl VenError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn vcs(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vcs {
            package: package.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn format_conflicts(conflicts: &[SubpackageConflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
