use super::{ForeignSource, PinnedPackage};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("fail read {}: {}", path.display(), e))
}

/// dep (`Gopkg.lock`, TOML).
pub struct DepSource;

#[derive(Deserialize)]
struct DepLock {
    #[serde(default)]
    projects: Vec<DepProject>,
}

#[derive(Deserialize)]
struct DepProject {
    name: String,
    #[serde(default)]
    revision: String,
}

impl DepSource {
    fn lock_path(dir: &Path) -> PathBuf {
        dir.join("Gopkg.lock")
    }
}

impl ForeignSource for DepSource {
    fn name(&self) -> &'static str {
        "dep"
    }

    fn detect(&self, dir: &Path) -> bool {
        Self::lock_path(dir).is_file()
    }

    fn extract(&self, dir: &Path) -> Result<Vec<PinnedPackage>, String> {
        let lock: DepLock = toml::from_str(&read(&Self::lock_path(dir))?)
            .map_err(|e| format!("fail unmarshal Gopkg.lock file: {}", e))?;
        Ok(lock
            .projects
            .into_iter()
            .map(|p| PinnedPackage {
                name: p.name,
                revision: p.revision,
            })
            .collect())
    }
}

/// glide (`glide.lock`, YAML).
pub struct GlideSource;

#[derive(Deserialize)]
struct GlideLock {
    #[serde(default)]
    imports: Vec<GlideImport>,
}

#[derive(Deserialize)]
struct GlideImport {
    name: String,
    #[serde(default)]
    version: String,
}

impl GlideSource {
    fn lock_path(dir: &Path) -> PathBuf {
        dir.join("glide.lock")
    }
}

impl ForeignSource for GlideSource {
    fn name(&self) -> &'static str {
        "glide"
    }

    fn detect(&self, dir: &Path) -> bool {
        Self::lock_path(dir).is_file()
    }

    fn extract(&self, dir: &Path) -> Result<Vec<PinnedPackage>, String> {
        let lock: GlideLock = serde_yaml::from_str(&read(&Self::lock_path(dir))?)
            .map_err(|e| format!("fail unmarshal glide.lock file: {}", e))?;
        Ok(lock
            .imports
            .into_iter()
            .map(|i| PinnedPackage {
                name: i.name,
                revision: i.version,
            })
            .collect())
    }
}

/// godep (`Godeps/Godeps.json`).
pub struct GodepSource;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GodepLock {
    #[serde(default)]
    deps: Vec<GodepDep>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GodepDep {
    import_path: String,
    #[serde(default)]
    rev: String,
}

impl GodepSource {
    fn lock_path(dir: &Path) -> PathBuf {
        dir.join("Godeps").join("Godeps.json")
    }
}

impl ForeignSource for GodepSource {
    fn name(&self) -> &'static str {
        "godep"
    }

    fn detect(&self, dir: &Path) -> bool {
        Self::lock_path(dir).is_file()
    }

    fn extract(&self, dir: &Path) -> Result<Vec<PinnedPackage>, String> {
        let lock: GodepLock = serde_json::from_str(&read(&Self::lock_path(dir))?)
            .map_err(|e| format!("fail unmarshal Godeps.json file: {}", e))?;
        Ok(lock
            .deps
            .into_iter()
            .map(|d| PinnedPackage {
                name: d.import_path,
                revision: d.rev,
            })
            .collect())
    }
}

/// govendor (`vendor/vendor.json`).
pub struct GovendorSource;

#[derive(Deserialize)]
struct GovendorLock {
    #[serde(default)]
    package: Vec<GovendorPackage>,
}

#[derive(Deserialize)]
struct GovendorPackage {
    path: String,
    #[serde(default)]
    revision: String,
}

impl GovendorSource {
    fn lock_path(dir: &Path) -> PathBuf {
        dir.join("vendor").join("vendor.json")
    }
}

impl ForeignSource for GovendorSource {
    fn name(&self) -> &'static str {
        "govendor"
    }

    fn detect(&self, dir: &Path) -> bool {
        Self::lock_path(dir).is_file()
    }

    fn extract(&self, dir: &Path) -> Result<Vec<PinnedPackage>, String> {
        let lock: GovendorLock = serde_json::from_str(&read(&Self::lock_path(dir))?)
            .map_err(|e| format!("fail unmarshal vendor.json file: {}", e))?;
        Ok(lock
            .package
            .into_iter()
            .map(|p| PinnedPackage {
                name: p.path,
                revision: p.revision,
            })
            .collect())
    }
}
