//! Lock files written by other Go dependency tools.
//!
//! When a fetched package (or the project itself) ships a lock file from dep,
//! glide, godep or govendor, its pinned revisions seed the run's constraint
//! cache so that transitive dependencies land on the versions the package was
//! developed against. Sources are tried in registration order and the first
//! one that detects its lock file wins.

mod adapters;

pub use adapters::{DepSource, GlideSource, GodepSource, GovendorSource};

use crate::error::{Result, VenError};
use std::path::Path;

/// A dependency pinned by a foreign lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedPackage {
    pub name: String,
    pub revision: String,
}

pub trait ForeignSource {
    /// Short tool name used in diagnostics.
    fn name(&self) -> &'static str;

    fn detect(&self, dir: &Path) -> bool;

    fn extract(&self, dir: &Path) -> std::result::Result<Vec<PinnedPackage>, String>;
}

/// Ordered set of foreign sources.
#[derive(Default)]
pub struct ForeignRegistry {
    sources: Vec<Box<dyn ForeignSource>>,
}

impl ForeignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// dep, glide, godep, govendor, in that order.
    pub fn with_defaults() -> Self {
        Self::new()
            .register(DepSource)
            .register(GlideSource)
            .register(GodepSource)
            .register(GovendorSource)
    }

    pub fn register(mut self, source: impl ForeignSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn detect(&self, dir: &Path) -> Option<&dyn ForeignSource> {
        self.sources
            .iter()
            .find(|s| s.detect(dir))
            .map(|s| s.as_ref())
    }

    /// Pins from the first source detected in `dir`, tagged with its tool name.
    pub fn extract(&self, package: &str, dir: &Path) -> Result<Option<(&'static str, Vec<PinnedPackage>)>> {
        let Some(source) = self.detect(dir) else {
            return Ok(None);
        };
        let pins = source.extract(dir).map_err(|message| VenError::ForeignSource {
            package: package.to_string(),
            tool: source.name().to_string(),
            message,
        })?;
        Ok(Some((source.name(), pins)))
    }
}
