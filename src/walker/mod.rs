//! Import graph walker.
//!
//! Walks a package's directory tree and reports the external packages its Go
//! files import, together with the local subpackages it reaches.
//!
//! ## Filtering
//!
//! - Hidden, `_`-prefixed, `vendor`, `testdata` and configured directories are skipped
//! - `package main` files are skipped unless [`WalkConfig::include_main`] is set
//! - Files ruled out by excluded build tags (file name suffix or constraint line) are skipped
//! - Standard library and relative imports are dropped
//!
//! The same directory rules drive [`Walker::prune_tree`], which strips a
//! freshly fetched package down to what the scan would read.

mod constraint;
mod source;

pub use constraint::{ConstraintLine, Expr, excluding_line, parse_constraints};
pub use source::{SourceHeader, parse_header};

use crate::error::{Result, VenError};
use crate::manifest::{Manifest, is_path_prefix, package_root, path_prefixes};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory names that only ever hold test fixtures.
const FIXTURE_DIRS: &[&str] = &["testdata", "_testdata"];

/// Non-Go files kept after a fetch because cgo or the assembler may need them.
const KEPT_EXTENSIONS: &[&str] = &["s", "S", "asm", "h", "o", "c", "cc"];

/// Architectures the go tool recognises as a `_GOOS_GOARCH` file name suffix.
const KNOWN_ARCHES: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle", "mips64",
    "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv", "riscv64", "s390", "s390x",
    "sparc", "sparc64", "wasm",
];

#[derive(Debug, Clone, Default)]
pub struct WalkConfig {
    pub exclude_dirs: BTreeSet<String>,
    pub exclude_build: BTreeSet<String>,
    pub include_main: bool,
}

impl WalkConfig {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            exclude_dirs: manifest.exclude_dirs.clone(),
            exclude_build: manifest.exclude_build.clone(),
            include_main: false,
        }
    }

    pub fn with_main(mut self) -> Self {
        self.include_main = true;
        self
    }

    /// True if any segment of the relative path `rel` names a skipped directory.
    pub fn dir_is_excluded(&self, rel: &str) -> bool {
        rel.split('/').filter(|s| !s.is_empty()).any(|name| {
            name == "vendor"
                || name.starts_with('.')
                || name.starts_with('_')
                || FIXTURE_DIRS.contains(&name)
                || self.exclude_dirs.contains(name)
        })
    }

    /// Like [`dir_is_excluded`](Self::dir_is_excluded) for an import path below `root`.
    pub fn import_is_excluded(&self, root: &str, import: &str) -> bool {
        match import.strip_prefix(root) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => self.dir_is_excluded(rest),
            _ => false,
        }
    }

    fn file_name_excluded(&self, name: &str) -> Option<String> {
        if self.exclude_build.is_empty() {
            return None;
        }
        let stem = name.strip_suffix(".go")?;
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 2 {
            return None;
        }
        let last = parts[parts.len() - 1];
        let mut candidates = vec![last];
        // `_GOOS` only counts as a tag when followed by a `_GOARCH` suffix.
        if parts.len() >= 3 && KNOWN_ARCHES.contains(&last) {
            candidates.push(parts[parts.len() - 2]);
        }
        candidates
            .into_iter()
            .find(|tag| self.exclude_build.contains(*tag))
            .map(ToString::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Std,
    Local,
    External,
}

/// Classifies `import` as seen from a file of package `pkg`.
pub fn classify_import(pkg: &str, import: &str) -> ImportKind {
    if !import.contains('/') || import.starts_with("./") || import.starts_with("../") {
        return ImportKind::Std;
    }
    let first = import.split('/').next().unwrap_or_default();
    if !first.contains('.') {
        return ImportKind::Std;
    }
    if pkg.is_empty() {
        return ImportKind::External;
    }
    if is_path_prefix(pkg, import) {
        return ImportKind::Local;
    }
    let parts: Vec<&str> = pkg.split('/').collect();
    if parts.len() > 3 && is_path_prefix(&parts[..3].join("/"), import) {
        return ImportKind::Local;
    }
    ImportKind::External
}

/// Result of scanning one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageScan {
    /// External imports, sorted and deduplicated.
    pub imports: Vec<String>,
    /// Local subpackages (import paths) reached by the scan.
    pub locals: BTreeSet<String>,
}

#[derive(Default)]
struct ScanAcc {
    imports: BTreeSet<String>,
    locals: BTreeSet<String>,
    source_dirs: BTreeSet<String>,
}

pub struct Walker<'a> {
    config: &'a WalkConfig,
}

impl<'a> Walker<'a> {
    pub fn new(config: &'a WalkConfig) -> Self {
        Self { config }
    }

    /// Scans `dir` and everything below it as package `pkg`.
    pub fn scan_all(&self, pkg: &str, dir: &Path) -> Result<PackageScan> {
        let mut acc = ScanAcc::default();
        self.scan_dir(pkg, pkg, dir, true, &mut acc)?;

        let mut locals = acc.locals;
        locals.extend(acc.source_dirs);
        Ok(PackageScan {
            imports: acc.imports.into_iter().collect(),
            locals,
        })
    }

    /// Scans only the listed subpackages of `pkg`, then any local subpackage
    /// they import, until no new one turns up.
    pub fn scan_targets(
        &self,
        pkg: &str,
        vendor_dir: &Path,
        targets: &[String],
    ) -> Result<PackageScan> {
        let mut acc = ScanAcc::default();
        let mut walked: BTreeSet<String> = BTreeSet::new();
        let mut pending: Vec<String> = targets
            .iter()
            .filter(|t| t.as_str() == pkg || !self.config.import_is_excluded(pkg, t))
            .cloned()
            .collect();

        while !pending.is_empty() {
            let mut next = Vec::new();
            for target in pending {
                if !walked.insert(target.clone()) {
                    continue;
                }
                let dir = join_import_path(vendor_dir, &target);
                acc.locals.clear();
                self.scan_dir(pkg, &target, &dir, false, &mut acc)?;
                for local in &acc.locals {
                    if is_path_prefix(pkg, local)
                        && !walked.contains(local)
                        && !self.config.import_is_excluded(pkg, local)
                    {
                        next.push(local.clone());
                    }
                }
            }
            pending = next;
        }

        Ok(PackageScan {
            imports: acc.imports.into_iter().collect(),
            locals: walked,
        })
    }

    fn scan_dir(
        &self,
        pkg: &str,
        import_path: &str,
        dir: &Path,
        recursive: bool,
        acc: &mut ScanAcc,
    ) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VenError::MissingDirectory {
                    dir: dir.to_path_buf(),
                    package: pkg.to_string(),
                });
            }
            Err(e) => return Err(VenError::io(dir, e)),
        };
        let mut entries: Vec<_> = entries
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| VenError::io(dir, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| VenError::io(&path, e))?;

            if file_type.is_dir() {
                if self.config.dir_is_excluded(&name) {
                    continue;
                }
                if recursive {
                    let child = format!("{}/{}", import_path, name);
                    self.scan_dir(pkg, &child, &path, true, acc)?;
                }
                continue;
            }
            if !name.ends_with(".go") {
                continue;
            }
            self.scan_file(pkg, import_path, &name, &path, acc)?;
        }
        Ok(())
    }

    fn scan_file(
        &self,
        pkg: &str,
        import_path: &str,
        name: &str,
        path: &Path,
        acc: &mut ScanAcc,
    ) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| VenError::io(path, e))?;
        let header = match parse_header(&content) {
            Ok(header) => header,
            Err(e) => {
                debug!("fail parse imports for file ({}): {}", path.display(), e);
                return Ok(());
            }
        };
        acc.source_dirs.insert(import_path.to_string());

        if header.imports.is_empty() {
            return Ok(());
        }
        if !self.config.include_main && header.is_main() {
            return Ok(());
        }
        if let Some(tag) = self.config.file_name_excluded(name) {
            debug!("file ({}) with build tag ({}) excluded", name, tag);
            return Ok(());
        }
        if !self.config.exclude_build.is_empty() {
            let lines = parse_constraints(&content);
            if let Some(line) = excluding_line(&lines, &self.config.exclude_build) {
                debug!(
                    "file ({}) with build constraint ({}) excluded",
                    path.display(),
                    line.text
                );
                return Ok(());
            }
        }

        for import in header.imports {
            match classify_import(pkg, &import) {
                ImportKind::Std => {}
                ImportKind::Local => {
                    acc.locals.insert(import);
                }
                ImportKind::External => {
                    acc.imports.insert(import);
                }
            }
        }
        Ok(())
    }

    /// Every directory under `dir`, including `dir` itself, as an import path of `pkg`.
    pub fn subpackage_dirs(&self, pkg: &str, dir: &Path) -> Result<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if entry.file_type().is_dir() {
                let rel = relative_import(dir, entry.path());
                out.insert(if rel.is_empty() {
                    pkg.to_string()
                } else {
                    format!("{}/{}", pkg, rel)
                });
            }
        }
        Ok(out)
    }

    /// Removes everything a scan would never read from a fetched package tree.
    pub fn prune_tree(&self, dir: &Path) -> Result<()> {
        let mut doomed_dirs: Vec<PathBuf> = Vec::new();
        let mut doomed_files: Vec<PathBuf> = Vec::new();

        let walker = WalkDir::new(dir).min_depth(1).into_iter().filter_entry(|e| {
            if e.file_type().is_dir() && self.config.dir_is_excluded(&file_name(e.path())) {
                doomed_dirs.push(e.path().to_path_buf());
                return false;
            }
            true
        });
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if entry.file_type().is_dir() {
                continue;
            }
            let name = file_name(entry.path());
            if !keep_file(&name) {
                doomed_files.push(entry.into_path());
            }
        }

        for path in doomed_dirs {
            remove_path(&path, true)?;
        }
        for path in doomed_files {
            remove_path(&path, false)?;
        }

        for entry in WalkDir::new(dir).min_depth(1).contents_first(true) {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            if entry.file_type().is_dir() {
                let empty = fs::read_dir(entry.path())
                    .map(|mut it| it.next().is_none())
                    .unwrap_or(false);
                if empty {
                    let _ = fs::remove_dir(entry.path());
                }
            }
        }
        Ok(())
    }
}

/// Groups external imports by the root they will be fetched under.
///
/// Imports falling under a root already recorded in the manifest collapse
/// into that record's root; a root nested under another root in the same
/// list collapses into the outer one.
pub fn group_by_root(manifest: &Manifest, imports: &[String]) -> BTreeMap<String, Vec<String>> {
    let rooted: Vec<(String, &String)> = imports
        .iter()
        .map(|import| {
            let root = package_root(import);
            let root = match manifest.existing_package(&root) {
                Some((existing, _)) => existing.to_string(),
                None => root,
            };
            (root, import)
        })
        .collect();
    let roots: BTreeSet<&str> = rooted.iter().map(|(root, _)| root.as_str()).collect();

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (root, import) in &rooted {
        let key = path_prefixes(root)
            .filter(|p| roots.contains(p))
            .last()
            .unwrap_or(root.as_str());
        grouped.entry(key.to_string()).or_default().push((*import).clone());
    }
    grouped
}

/// Joins a `/`-separated import path onto `base`.
pub fn join_import_path(base: &Path, import: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    path.extend(import.split('/').filter(|s| !s.is_empty()));
    path
}

fn keep_file(name: &str) -> bool {
    if name.ends_with(".go") {
        return !name.ends_with("_test.go");
    }
    match name.rsplit_once('.') {
        Some((_, ext)) => KEPT_EXTENSIONS.contains(&ext),
        None => false,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn relative_import(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn remove_path(path: &Path, is_dir: bool) -> Result<()> {
    let removed = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VenError::io(path, e)),
    }
}

fn walk_error(dir: &Path, err: walkdir::Error) -> VenError {
    let path = err.path().unwrap_or(dir).to_path_buf();
    VenError::io(path, err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify_import() {
        let pkg = "github.com/acme/app";
        assert_eq!(classify_import(pkg, "fmt"), ImportKind::Std);
        assert_eq!(classify_import(pkg, "net/http"), ImportKind::Std);
        assert_eq!(classify_import(pkg, "./util"), ImportKind::Std);
        assert_eq!(classify_import(pkg, "github.com/acme/app/db"), ImportKind::Local);
        assert_eq!(classify_import(pkg, "github.com/acme/application"), ImportKind::External);
        assert_eq!(classify_import(pkg, "github.com/pkg/errors"), ImportKind::External);
        assert_eq!(
            classify_import("github.com/acme/app/cmd/tool", "github.com/acme/app/db"),
            ImportKind::Local
        );
    }

    #[test]
    fn test_dir_exclusion() {
        let mut config = WalkConfig::default();
        config.exclude_dirs.insert("integration".into());
        assert!(config.dir_is_excluded(".git"));
        assert!(config.dir_is_excluded("vendor"));
        assert!(config.dir_is_excluded("_examples"));
        assert!(config.dir_is_excluded("a/testdata/b"));
        assert!(config.dir_is_excluded("integration"));
        assert!(!config.dir_is_excluded("internal/db"));
        assert!(config.import_is_excluded("github.com/a/b", "github.com/a/b/integration/x"));
        assert!(!config.import_is_excluded("github.com/a/b", "github.com/a/b/db"));
    }

    #[test]
    fn test_file_name_constraint() {
        let mut config = WalkConfig::default();
        config.exclude_build.insert("windows".into());
        assert_eq!(config.file_name_excluded("zsys_windows.go").as_deref(), Some("windows"));
        assert_eq!(
            config.file_name_excluded("syscall_windows_amd64.go").as_deref(),
            Some("windows")
        );
        assert_eq!(config.file_name_excluded("file_windows_test.go").as_deref(), Some("windows"));
        assert_eq!(config.file_name_excluded("windows.go"), None);
        assert_eq!(config.file_name_excluded("file_linux.go"), None);
    }

    #[test]
    fn test_file_name_middle_segment_needs_arch_suffix() {
        let mut config = WalkConfig::default();
        config.exclude_build.insert("ignore".into());
        config.exclude_build.insert("windows".into());
        assert_eq!(config.file_name_excluded("x_ignore_me.go"), None);
        assert_eq!(config.file_name_excluded("path_windows_helper.go"), None);
        assert_eq!(
            config.file_name_excluded("foo_windows_arm64_test.go").as_deref(),
            Some("windows")
        );
    }

    #[test]
    fn test_scan_keeps_file_with_tag_inside_its_name() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "x_ignore_me.go",
            "package x\nimport \"github.com/needed/dep\"\n",
        );
        write(
            tmp.path(),
            "x_ignore.go",
            "package x\nimport \"github.com/skipped/dep\"\n",
        );
        let mut config = WalkConfig::default();
        config.exclude_build.insert("ignore".into());
        let scan = Walker::new(&config).scan_all("github.com/acme/x", tmp.path()).unwrap();
        assert_eq!(scan.imports, vec!["github.com/needed/dep"]);
    }

    #[test]
    fn test_scan_all_collects_sorted_external_imports() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(
            root,
            "main.go",
            "package main\nimport (\n\"fmt\"\n\"github.com/spf13/cobra\"\n\"github.com/acme/app/db\"\n)\n",
        );
        write(
            root,
            "db/db.go",
            "package db\nimport (\n\"github.com/lib/pq\"\n\"github.com/pkg/errors\"\n)\n",
        );
        write(root, "db/db_test.go", "package db\nimport \"github.com/stretchr/testify\"\n");
        write(root, "vendor/x/x.go", "package x\nimport \"github.com/never/seen\"\n");
        write(root, ".hidden/h.go", "package h\nimport \"github.com/never/seen\"\n");

        let config = WalkConfig::default().with_main();
        let scan = Walker::new(&config).scan_all("github.com/acme/app", root).unwrap();
        assert_eq!(
            scan.imports,
            vec![
                "github.com/lib/pq",
                "github.com/pkg/errors",
                "github.com/spf13/cobra",
                "github.com/stretchr/testify",
            ]
        );
        assert!(scan.locals.contains("github.com/acme/app/db"));

        let config = WalkConfig::default();
        let scan = Walker::new(&config).scan_all("github.com/acme/app", root).unwrap();
        assert!(!scan.imports.contains(&"github.com/spf13/cobra".to_string()));
    }

    #[test]
    fn test_scan_targets_follows_local_subpackages() {
        let tmp = TempDir::new().unwrap();
        let vendor = tmp.path();
        let base = "github.com/a/lib";
        write(vendor, "github.com/a/lib/lib.go", "package lib\nimport \"github.com/a/lib/inner\"\n");
        write(
            vendor,
            "github.com/a/lib/inner/inner.go",
            "package inner\nimport \"github.com/b/dep/sub\"\n",
        );
        write(
            vendor,
            "github.com/a/lib/unused/u.go",
            "package unused\nimport \"github.com/c/never\"\n",
        );

        let config = WalkConfig::default();
        let scan = Walker::new(&config)
            .scan_targets(base, vendor, &[base.to_string()])
            .unwrap();
        assert_eq!(scan.imports, vec!["github.com/b/dep/sub"]);
        let locals: Vec<&str> = scan.locals.iter().map(String::as_str).collect();
        assert_eq!(locals, vec!["github.com/a/lib", "github.com/a/lib/inner"]);
    }

    #[test]
    fn test_scan_targets_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let config = WalkConfig::default();
        let err = Walker::new(&config)
            .scan_targets("github.com/a/lib", tmp.path(), &["github.com/a/lib/gone".to_string()])
            .unwrap_err();
        assert!(matches!(err, VenError::MissingDirectory { .. }));
    }

    #[test]
    fn test_prune_tree() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "lib.go", "package lib\n");
        write(root, "lib_test.go", "package lib\n");
        write(root, "README.md", "docs");
        write(root, "asm_amd64.s", "TEXT");
        write(root, "docs/guide.md", "docs");
        write(root, ".git/HEAD", "ref");
        write(root, "testdata/input.go", "package x\n");
        write(root, "sub/sub.go", "package sub\n");

        let config = WalkConfig::default();
        Walker::new(&config).prune_tree(root).unwrap();

        assert!(root.join("lib.go").exists());
        assert!(root.join("asm_amd64.s").exists());
        assert!(root.join("sub/sub.go").exists());
        assert!(!root.join("lib_test.go").exists());
        assert!(!root.join("README.md").exists());
        assert!(!root.join("docs").exists());
        assert!(!root.join(".git").exists());
        assert!(!root.join("testdata").exists());
    }

    #[test]
    fn test_group_by_root_merges_existing() {
        let mut manifest = Manifest::new(".");
        manifest.record_package(crate::manifest::Package::new("example.com/kit", "c1", ""));
        let imports = vec![
            "example.com/kit/log".to_string(),
            "github.com/a/b/x".to_string(),
            "github.com/a/b/y".to_string(),
            "gopkg.in/yaml.v2".to_string(),
        ];
        let grouped = group_by_root(&manifest, &imports);
        assert_eq!(grouped["example.com/kit"], vec!["example.com/kit/log"]);
        assert_eq!(grouped["github.com/a/b"], vec!["github.com/a/b/x", "github.com/a/b/y"]);
        assert_eq!(grouped["gopkg.in/yaml.v2"], vec!["gopkg.in/yaml.v2"]);
        assert_eq!(grouped.len(), 3);
    }

    #[test]
    fn test_group_by_root_is_order_independent() {
        let manifest = Manifest::new(".");
        let forward = vec!["example.com/kit".to_string(), "example.com/kit/log".to_string()];
        let backward: Vec<String> = forward.iter().rev().cloned().collect();
        let a = group_by_root(&manifest, &forward);
        let b = group_by_root(&manifest, &backward);
        assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
        assert_eq!(a.keys().collect::<Vec<_>>(), vec!["example.com/kit"]);
    }

    #[test]
    fn test_subpackage_dirs() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/b.go", "package a\n");
        let config = WalkConfig::default();
        let dirs = Walker::new(&config).subpackage_dirs("example.com/p", tmp.path()).unwrap();
        let dirs: Vec<&str> = dirs.iter().map(String::as_str).collect();
        assert_eq!(dirs, vec!["example.com/p", "example.com/p/a"]);
    }
}
