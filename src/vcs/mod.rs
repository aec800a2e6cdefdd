//! VCS fetch provider.
//!
//! [`Fetcher`] places one root package into the vendor tree, either by
//! cloning it from its remote repository or by copying it from `$GOPATH/src`,
//! then pins the working tree to the requested reference and reports the
//! resolved commit and nearest tag.
//!
//! Only git is supported. The repository plumbing sits behind the [`Vcs`]
//! trait and remote discovery behind [`RepoLocator`], so both can be swapped
//! out in tests.

mod git;
mod remote;

pub use git::GitVcs;
pub use remote::{GoImportLocator, RepoLocation, RepoLocator};

use crate::cancel::CancelToken;
use crate::config::local_source_dir;
use crate::error::{Result, VenError};
use crate::fsutil;
use crate::manifest::path_prefixes;
use crate::walker::join_import_path;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Marker directories of the version control systems we can recognise.
const VCS_MARKERS: &[(&str, &str)] = &[(".git", "git"), (".hg", "hg"), (".svn", "svn"), (".bzr", "bzr")];

/// Diagnostic text reported by a repository operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct VcsError(pub String);

impl From<git2::Error> for VcsError {
    fn from(err: git2::Error) -> Self {
        Self(err.message().to_string())
    }
}

/// Repository operations the fetcher needs. All of them must work on a
/// freshly cloned directory.
pub trait Vcs {
    /// Clones `remote` into `dest`, giving up once `cancel` fires.
    fn clone_repo(&self, remote: &str, dest: &Path, cancel: &CancelToken) -> std::result::Result<(), VcsError>;

    fn checkout(&self, repo: &Path, reference: &str) -> std::result::Result<(), VcsError>;

    fn current_commit(&self, repo: &Path) -> std::result::Result<String, VcsError>;

    /// Nearest tag reachable from HEAD.
    fn nearest_tag(&self, repo: &Path) -> std::result::Result<String, VcsError>;
}

/// What to fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest<'a> {
    pub root: &'a str,
    /// Reference to check out; empty means the default branch.
    pub version: &'a str,
    pub local: bool,
    /// The reference comes from a hard constraint or a recorded commit, so
    /// failing to check it out is fatal.
    pub version_required: bool,
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fetched {
    /// Root the package was placed under. Remote discovery may narrow it.
    pub root: String,
    pub commit: String,
    /// Nearest tag, empty when the repository has none.
    pub tag: String,
    /// Label to record: the requested reference when it was checked out,
    /// the nearest tag otherwise.
    pub version: String,
}

pub trait FetchProvider {
    /// Places `request.root` under `vendor_dir` and resolves its version.
    fn fetch(&self, request: &FetchRequest<'_>, vendor_dir: &Path, cancel: &CancelToken) -> Result<Fetched>;
}

/// Default provider: git clones for remote packages, directory copies for
/// local ones.
pub struct Fetcher<V = GitVcs, L = GoImportLocator> {
    vcs: V,
    locator: L,
    gopath: PathBuf,
}

impl Fetcher {
    pub fn git(gopath: impl Into<PathBuf>) -> Self {
        Self::new(GitVcs, GoImportLocator::default(), gopath)
    }
}

impl<V: Vcs, L: RepoLocator> Fetcher<V, L> {
    pub fn new(vcs: V, locator: L, gopath: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            locator,
            gopath: gopath.into(),
        }
    }

    fn fetch_local(&self, request: &FetchRequest<'_>, vendor_dir: &Path, cancel: &CancelToken) -> Result<Fetched> {
        let src = local_source_dir(&self.gopath, request.root);
        if !src.is_dir() {
            return Err(VenError::SourceMissing { path: src });
        }
        let (root, repo_dir) = match self.local_repo(request.root) {
            Some((root, repo_dir, "git")) => (root, repo_dir),
            Some((_, _, other)) => {
                return Err(VenError::UnsupportedVcs {
                    package: request.root.to_string(),
                    vcs: other.to_string(),
                });
            }
            None => {
                return Err(VenError::vcs(
                    request.root,
                    format!("cannot detect vcs in {}", src.display()),
                ));
            }
        };
        if root != request.root {
            debug!("pkg ({}) resolved to local repository root ({})", request.root, root);
        }

        let dest = join_import_path(vendor_dir, root);
        if dest.exists() {
            return Err(VenError::DestinationExists { path: dest });
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VenError::io(parent, e))?;
        }
        println!("   {} Copying {}", "📁".blue(), root);
        fsutil::copy_dir(&repo_dir, &dest, cancel).inspect_err(|_| discard(&dest))?;
        self.resolve_version(root, &dest, request.version, request.version_required)
            .inspect_err(|_| discard(&dest))
    }

    /// Nearest directory at or above `$GOPATH/src/<pkg>` holding a VCS marker,
    /// as (import path, directory, vcs name).
    fn local_repo<'p>(&self, pkg: &'p str) -> Option<(&'p str, PathBuf, &'static str)> {
        path_prefixes(pkg).find_map(|prefix| {
            let dir = local_source_dir(&self.gopath, prefix);
            detect_vcs(&dir).map(|vcs| (prefix, dir, vcs))
        })
    }

    fn fetch_remote(&self, request: &FetchRequest<'_>, vendor_dir: &Path, cancel: &CancelToken) -> Result<Fetched> {
        cancel.checkpoint()?;
        let location = self.locator.locate(request.root)?;
        if location.vcs != "git" {
            return Err(VenError::UnsupportedVcs {
                package: request.root.to_string(),
                vcs: location.vcs,
            });
        }
        if location.root != request.root {
            debug!("pkg ({}) resolved to repository root ({})", request.root, location.root);
        }

        let dest = join_import_path(vendor_dir, &location.root);
        if dest.exists() {
            return Err(VenError::DestinationExists { path: dest });
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VenError::io(parent, e))?;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.blue} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
        );
        pb.set_message(format!("Fetching {}...", location.root));
        pb.enable_steady_tick(Duration::from_millis(100));

        if let Err(err) = self.vcs.clone_repo(&location.url, &dest, cancel) {
            pb.finish_with_message(format!("{} Failed {}", "x".red(), location.root));
            let _ = fsutil::remove_dir_all(&dest);
            cancel.checkpoint()?;
            return Err(VenError::vcs(
                &location.root,
                format!("cannot clone repo {}: {}", location.url, err),
            ));
        }
        pb.finish_with_message(format!("{} Fetched {}", "✓".green(), location.root));

        let (version, required) = match (request.version, location.default_ref.as_deref()) {
            ("", Some(default_ref)) => (default_ref, false),
            (version, _) => (version, request.version_required),
        };
        let mut fetched = self
            .resolve_version(&location.root, &dest, version, required)
            .inspect_err(|_| discard(&dest))?;
        if request.version.is_empty() && location.default_ref.is_some() {
            fetched.version = fetched.tag.clone();
        }
        Ok(fetched)
    }

    /// Pins `dest` to `version` and reads back the commit and tag.
    fn resolve_version(&self, root: &str, dest: &Path, version: &str, required: bool) -> Result<Fetched> {
        let mut checked_out = false;
        if !version.is_empty() {
            match self.vcs.checkout(dest, version) {
                Ok(()) => checked_out = true,
                Err(err) if required => {
                    return Err(VenError::vcs(root, format!("cannot checkout version {}: {}", version, err)));
                }
                Err(err) => warn!("pkg ({}): cannot checkout version {}: {}", root, version, err),
            }
        }

        let commit = self
            .vcs
            .current_commit(dest)
            .map_err(|err| VenError::vcs(root, format!("cannot resolve commit hash: {}", err)))?;
        let tag = self.vcs.nearest_tag(dest).unwrap_or_else(|err| {
            debug!("pkg ({}): no tag found: {}", root, err);
            String::new()
        });
        let version = if checked_out { version.to_string() } else { tag.clone() };

        Ok(Fetched {
            root: root.to_string(),
            commit,
            tag,
            version,
        })
    }
}

impl<V: Vcs, L: RepoLocator> FetchProvider for Fetcher<V, L> {
    fn fetch(&self, request: &FetchRequest<'_>, vendor_dir: &Path, cancel: &CancelToken) -> Result<Fetched> {
        if request.local {
            self.fetch_local(request, vendor_dir, cancel)
        } else {
            self.fetch_remote(request, vendor_dir, cancel)
        }
    }
}

/// Drops a package that was placed but could not be pinned.
fn discard(dest: &Path) {
    if let Err(err) = fsutil::remove_dir_all(dest) {
        warn!("cannot remove {}: {}", dest.display(), err);
    }
}

fn detect_vcs(dir: &Path) -> Option<&'static str> {
    VCS_MARKERS
        .iter()
        .find(|(marker, _)| dir.join(marker).exists())
        .map(|(_, name)| *name)
}
