use std::path::{Path, PathBuf};

/// Manifest file name, relative to the project directory.
pub const MANIFEST_FILE: &str = "Manifest.toml";
pub const MANIFEST_BACKUP_FILE: &str = "Manifest.orig.toml";

pub const DEFAULT_VENDOR_PATH: &str = "./vendor";

/// Suffix appended to the vendor directory while an update is in flight.
pub const VENDOR_BACKUP_SUFFIX: &str = ".orig";

pub const DEFAULT_EXCLUDE_BUILDS: &[&str] =
    &["appenginevm", "appengine", "android", "integration", "ignore"];
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["test", "_fixture", "integration"];

/// Prefix on a `get` argument marking a package copied from `$GOPATH/src`.
pub const LOCAL_SOURCE_PREFIX: &str = "file://";

/// Root of the local Go workspace: `$GOPATH`, or `~/go` when unset.
pub fn gopath() -> PathBuf {
    match std::env::var_os("GOPATH") {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("go"),
    }
}

/// Directory holding local sources for `pkg` under `gopath`.
pub fn local_source_dir(gopath: &Path, pkg: &str) -> PathBuf {
    gopath.join("src").join(pkg)
}

/// Import path of `dir` relative to `$GOPATH/src`, if it lives there.
pub fn import_path_for_dir(gopath: &Path, dir: &Path) -> Option<String> {
    let rel = dir.strip_prefix(gopath.join("src")).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
