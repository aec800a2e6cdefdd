//! Shared fixtures for the resolver integration tests.
//!
//! [`FakeRemote`] stands in for git: each published revision is a directory
//! tree under `<remote>/<revision>/<root>`, and a fetch copies that tree into
//! the vendor directory.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use ven::cancel::CancelToken;
use ven::commands::CommandContext;
use ven::error::{Result, VenError};
use ven::fsutil;
use ven::vcs::{FetchProvider, FetchRequest, Fetched};
use ven::walker::join_import_path;

/// Revision served when a fetch asks for no particular version.
pub const HEAD: &str = "HEAD";

/// One observed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCall {
    pub root: String,
    pub version: String,
    pub local: bool,
    pub required: bool,
}

pub struct FakeRemote {
    dir: TempDir,
    calls: RefCell<Vec<FetchCall>>,
    failing: RefCell<BTreeSet<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(BTreeSet::new()),
        }
    }

    /// Publishes `files` (relative path, content) for `root` at `revision`.
    pub fn publish(&self, root: &str, revision: &str, files: &[(&str, &str)]) {
        let base = join_import_path(&self.dir.path().join(revision), root);
        fs::create_dir_all(&base).unwrap();
        for (rel, content) in files {
            write_file(&base, rel, content);
        }
    }

    /// Makes every fetch of `root` fail like an unreachable remote.
    pub fn fail(&self, root: &str) {
        self.failing.borrow_mut().insert(root.to_string());
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.borrow().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl FetchProvider for FakeRemote {
    fn fetch(&self, request: &FetchRequest<'_>, vendor_dir: &Path, cancel: &CancelToken) -> Result<Fetched> {
        self.calls.borrow_mut().push(FetchCall {
            root: request.root.to_string(),
            version: request.version.to_string(),
            local: request.local,
            required: request.version_required,
        });
        if self.failing.borrow().contains(request.root) {
            return Err(VenError::vcs(request.root, "cannot clone repo: connection refused"));
        }

        let revision = if request.version.is_empty() {
            HEAD
        } else {
            request.version
        };
        let src = join_import_path(&self.dir.path().join(revision), request.root);
        if !src.is_dir() {
            return Err(VenError::vcs(
                request.root,
                format!("cannot checkout version {}", revision),
            ));
        }
        fsutil::copy_dir(&src, &join_import_path(vendor_dir, request.root), cancel)?;

        Ok(Fetched {
            root: request.root.to_string(),
            // The revision doubles as the commit so `install` can fetch it back.
            commit: revision.to_string(),
            tag: String::new(),
            version: request.version.to_string(),
        })
    }
}

/// A throwaway project directory with its own `$GOPATH`.
pub struct Project {
    pub dir: TempDir,
    pub gopath: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            gopath: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn vendor(&self) -> PathBuf {
        self.dir.path().join("vendor")
    }

    pub fn ctx(&self) -> CommandContext {
        CommandContext {
            project_dir: self.dir.path().to_path_buf(),
            gopath: self.gopath.path().to_path_buf(),
            cancel: CancelToken::new(),
        }
    }

    pub fn manifest_text(&self) -> String {
        fs::read_to_string(self.dir.path().join("Manifest.toml")).unwrap_or_default()
    }
}

pub fn write_file(base: &Path, rel: &str, content: &str) {
    let path = base.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Every file below `dir` with its content, keyed by relative path.
pub fn snapshot(dir: &Path) -> BTreeMap<String, String> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap().to_string_lossy().into_owned();
            (rel, fs::read_to_string(e.path()).unwrap())
        })
        .collect()
}
