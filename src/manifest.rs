//! Manifest store (`Manifest.toml`).
//!
//! The manifest records everything a previous run resolved: where the vendor
//! tree lives, which build tags, directories and packages are excluded, which
//! package prefixes are local, the pinned version constraints, and one
//! [`Package`] record per vendored root.
//!
//! All keys are package path prefixes. Lookups walk from the full path up to
//! its first segment and return the most specific match:
//!
//! ```text
//! constraints: { "github.com/acme" = "v1" }
//! constraint("github.com/acme/lib/sub") -> ("github.com/acme", "v1")
//! ```
//!
//! Sets and maps are ordered so that a save always produces the same bytes for
//! the same state.

use crate::config::{DEFAULT_VENDOR_PATH, MANIFEST_BACKUP_FILE, MANIFEST_FILE};
use crate::error::{Result, VenError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Hosts whose repositories live at `host/owner/repo`.
const THREE_SEGMENT_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "golang.org",
    "gopkg.in",
];

/// One resolved root package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(skip)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub commit_hash: String,
    #[serde(default)]
    pub deps: BTreeSet<String>,
    #[serde(default)]
    pub subpackages: BTreeSet<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, commit_hash: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            commit_hash: commit_hash.into(),
            deps: BTreeSet::new(),
            subpackages: BTreeSet::new(),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "commit {}", self.commit_hash)?;
        if !self.version.is_empty() {
            write!(f, ", version: {}", self.version)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(skip)]
    project_dir: PathBuf,

    #[serde(default = "default_vendor_path")]
    pub vendor_path: String,
    #[serde(default)]
    pub exclude_build: BTreeSet<String>,
    #[serde(default)]
    pub exclude_dirs: BTreeSet<String>,
    #[serde(default)]
    pub exclude_packages: BTreeSet<String>,
    #[serde(default)]
    pub local_packages: BTreeSet<String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
    #[serde(default)]
    pub packages: BTreeMap<String, Package>,
}

fn default_vendor_path() -> String {
    DEFAULT_VENDOR_PATH.to_string()
}

impl Manifest {
    /// Fresh manifest for `project_dir` with every list empty.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            vendor_path: default_vendor_path(),
            exclude_build: BTreeSet::new(),
            exclude_dirs: BTreeSet::new(),
            exclude_packages: BTreeSet::new(),
            local_packages: BTreeSet::new(),
            constraints: BTreeMap::new(),
            packages: BTreeMap::new(),
        }
    }

    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(MANIFEST_FILE)
    }

    pub fn exists_in(project_dir: &Path) -> bool {
        Self::path_in(project_dir).exists()
    }

    /// Loads the manifest of `project_dir`, or a fresh one if none was saved yet.
    ///
    /// A `Manifest.orig.toml` left without a `Manifest.toml` next to it is an
    /// interrupted save and is loaded in its place.
    pub fn load(project_dir: impl Into<PathBuf>) -> Result<Self> {
        let project_dir = project_dir.into();
        let mut path = Self::path_in(&project_dir);
        if !path.exists() {
            let backup = project_dir.join(MANIFEST_BACKUP_FILE);
            if !backup.exists() {
                return Ok(Self::new(project_dir));
            }
            warn!("{} is missing, recovering from {}", MANIFEST_FILE, MANIFEST_BACKUP_FILE);
            path = backup;
        }

        let content = fs::read_to_string(&path).map_err(|e| VenError::io(&path, e))?;
        let mut manifest = Self::parse(&content).map_err(|message| VenError::ManifestParse {
            path: path.clone(),
            message,
        })?;
        manifest.project_dir = project_dir;
        Ok(manifest)
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let mut manifest: Manifest = toml::from_str(content).map_err(|e| e.to_string())?;
        let trimmed = manifest.vendor_path.trim_end_matches('/');
        let rel = trimmed.trim_start_matches("./");
        if rel.is_empty() || rel == "." {
            return Err(format!(
                "vendor_path {:?} must name a directory below the project",
                manifest.vendor_path
            ));
        }
        manifest.vendor_path = trimmed.to_string();
        for (name, pkg) in manifest.packages.iter_mut() {
            pkg.name = name.clone();
        }
        Ok(manifest)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VenError::ManifestSerialize(e.to_string()))
    }

    /// Persists the manifest without ever leaving a half-written file behind.
    ///
    /// The content goes to a temporary file first, which is then renamed over
    /// `Manifest.toml`, so the old manifest stays readable until the new one
    /// is complete.
    pub fn save(&self) -> Result<()> {
        let content = self.to_toml()?;
        let path = Self::path_in(&self.project_dir);
        let tmp = self.project_dir.join(format!("{}.tmp", MANIFEST_FILE));

        fs::write(&tmp, content)
            .map_err(|e| VenError::io(&tmp, e))
            .and_then(|()| fs::rename(&tmp, &path).map_err(|e| VenError::io(&path, e)))
            .inspect_err(|_| {
                let _ = fs::remove_file(&tmp);
            })?;

        // Left behind by an interrupted save.
        let backup = self.project_dir.join(MANIFEST_BACKUP_FILE);
        if backup.exists() {
            let _ = fs::remove_file(&backup);
        }
        Ok(())
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn vendor_dir(&self) -> PathBuf {
        let rel = self.vendor_path.trim_start_matches("./");
        if rel.is_empty() || rel == "." {
            self.project_dir.clone()
        } else {
            self.project_dir.join(rel)
        }
    }

    /// Directory of `pkg` inside the vendor tree.
    pub fn package_dir(&self, pkg: &str) -> PathBuf {
        let mut dir = self.vendor_dir();
        dir.extend(pkg.split('/'));
        dir
    }

    pub fn local_prefix(&self, path: &str) -> Option<&str> {
        longest_prefix_in_set(&self.local_packages, path)
    }

    pub fn excluded_prefix(&self, path: &str) -> Option<&str> {
        longest_prefix_in_set(&self.exclude_packages, path)
    }

    pub fn constraint(&self, path: &str) -> Option<(&str, &str)> {
        longest_prefix_match(&self.constraints, path).map(|(k, v)| (k, v.as_str()))
    }

    pub fn existing_package(&self, path: &str) -> Option<(&str, &Package)> {
        longest_prefix_match(&self.packages, path)
    }

    /// Stores `pkg` under its own name, replacing any previous record.
    pub fn record_package(&mut self, pkg: Package) {
        self.packages.insert(pkg.name.clone(), pkg);
    }
}

/// All prefixes of `path`, from the full path down to its first segment.
pub fn path_prefixes(path: &str) -> impl Iterator<Item = &str> {
    let mut next = (!path.is_empty()).then_some(path);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.rfind('/').map(|i| &current[..i]).filter(|p| !p.is_empty());
        Some(current)
    })
}

/// Most specific key of `map` that is a segment prefix of `path`.
pub fn longest_prefix_match<'m, V>(
    map: &'m BTreeMap<String, V>,
    path: &str,
) -> Option<(&'m str, &'m V)> {
    path_prefixes(path).find_map(|prefix| map.get_key_value(prefix).map(|(k, v)| (k.as_str(), v)))
}

fn longest_prefix_in_set<'s>(set: &'s BTreeSet<String>, path: &str) -> Option<&'s str> {
    path_prefixes(path).find_map(|prefix| set.get(prefix).map(String::as_str))
}

/// True if `prefix` equals `path` or names one of its parent paths.
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    !prefix.is_empty()
        && path.starts_with(prefix)
        && (path.len() == prefix.len() || path.as_bytes()[prefix.len()] == b'/')
}

/// Canonical root under which `pkg` is fetched and versioned.
///
/// Known hosting sites use `host/owner/repo`; `gopkg.in/pkg.vN` is a two
/// segment root. Any other domain is taken whole, the fetcher may narrow it
/// further once the repository is located.
pub fn package_root(pkg: &str) -> String {
    let parts: Vec<&str> = pkg.split('/').collect();
    if parts.len() < 3 {
        return pkg.to_string();
    }
    if parts[0] == "gopkg.in" && parts[1].contains(".v") {
        return parts[..2].join("/");
    }
    if THREE_SEGMENT_HOSTS.contains(&parts[0]) {
        parts[..3].join("/")
    } else {
        pkg.to_string()
    }
}
