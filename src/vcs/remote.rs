//! Remote repository discovery.
//!
//! Well known hosting sites map straight to a clone URL. Anything else is
//! looked up through the `go-import` meta tag served at `https://<pkg>?go-get=1`.

use crate::error::{Result, VenError};
use crate::manifest::{is_path_prefix, package_root};
use regex::Regex;
use tracing::debug;

const GIT_HOSTS: &[&str] = &["github.com", "gitlab.com", "bitbucket.org"];

/// Where a root package's repository lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation {
    /// Import path of the repository root.
    pub root: String,
    pub vcs: String,
    pub url: String,
    /// Reference implied by the import path itself (`gopkg.in/x.v2` means `v2`).
    pub default_ref: Option<String>,
}

pub trait RepoLocator {
    fn locate(&self, pkg: &str) -> Result<RepoLocation>;
}

const GO_IMPORT_META: &str =
    r#"(?i)<meta\s+name\s*=\s*["']go-import["']\s+content\s*=\s*["']([^"']+)["']"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct GoImportLocator;

impl RepoLocator for GoImportLocator {
    fn locate(&self, pkg: &str) -> Result<RepoLocation> {
        if let Some(location) = known_host(pkg) {
            return Ok(location);
        }

        let url = format!("https://{}?go-get=1", pkg);
        debug!("looking up go-import meta tag at {}", url);
        let discovery = |message: String| VenError::RepoDiscovery {
            package: pkg.to_string(),
            message,
        };
        let response = ureq::get(&url)
            .header("User-Agent", concat!("ven/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| discovery(e.to_string()))?;
        let mut body = response.into_body();
        let html = body.read_to_string().map_err(|e| discovery(e.to_string()))?;

        self.parse_meta(pkg, &html)
            .ok_or_else(|| discovery(format!("no go-import meta tag found at {}", url)))
    }
}

impl GoImportLocator {
    /// Picks the `go-import` entry whose prefix covers `pkg` most specifically.
    fn parse_meta(&self, pkg: &str, html: &str) -> Option<RepoLocation> {
        let meta = Regex::new(GO_IMPORT_META).ok()?;
        meta.captures_iter(html)
            .filter_map(|caps| {
                let content = caps.get(1)?.as_str();
                let mut fields = content.split_whitespace();
                let (prefix, vcs, url) = (fields.next()?, fields.next()?, fields.next()?);
                is_path_prefix(prefix, pkg).then(|| RepoLocation {
                    root: prefix.to_string(),
                    vcs: vcs.to_string(),
                    url: url.to_string(),
                    default_ref: None,
                })
            })
            .max_by_key(|location| location.root.len())
    }
}

fn known_host(pkg: &str) -> Option<RepoLocation> {
    let parts: Vec<&str> = pkg.split('/').collect();
    if parts.len() >= 3 && GIT_HOSTS.contains(&parts[0]) {
        let root = parts[..3].join("/");
        return Some(RepoLocation {
            url: format!("https://{}.git", root),
            root,
            vcs: "git".to_string(),
            default_ref: None,
        });
    }
    if parts[0] == "gopkg.in" {
        return gopkg_in(pkg);
    }
    None
}

/// `gopkg.in/pkg.vN` is `github.com/go-pkg/pkg`, `gopkg.in/user/pkg.vN` is
/// `github.com/user/pkg`, both at branch or tag `vN`.
fn gopkg_in(pkg: &str) -> Option<RepoLocation> {
    let root = package_root(pkg);
    let parts: Vec<&str> = root.split('/').collect();
    let (user, versioned) = match parts.as_slice() {
        [_, versioned] => (None, *versioned),
        [_, user, versioned] => (Some(*user), *versioned),
        _ => return None,
    };
    let (name, major) = versioned.rsplit_once(".v")?;
    if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let owner = user.map(str::to_string).unwrap_or_else(|| format!("go-{}", name));
    let url = format!("https://github.com/{}/{}.git", owner, name);
    let default_ref = Some(format!("v{}", major));
    Some(RepoLocation {
        root: root.clone(),
        vcs: "git".to_string(),
        url,
        default_ref,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_hosts() {
        let loc = known_host("github.com/pkg/errors/sub").unwrap();
        assert_eq!(loc.root, "github.com/pkg/errors");
        assert_eq!(loc.url, "https://github.com/pkg/errors.git");
        assert!(known_host("example.com/a/b").is_none());
        assert!(known_host("github.com/only").is_none());
    }

    #[test]
    fn test_gopkg_in() {
        let loc = known_host("gopkg.in/yaml.v2").unwrap();
        assert_eq!(loc.root, "gopkg.in/yaml.v2");
        assert_eq!(loc.url, "https://github.com/go-yaml/yaml.git");
        assert_eq!(loc.default_ref.as_deref(), Some("v2"));

        let loc = known_host("gopkg.in/natefinch/lumberjack.v2/sub").unwrap();
        assert_eq!(loc.root, "gopkg.in/natefinch/lumberjack.v2");
        assert_eq!(loc.url, "https://github.com/natefinch/lumberjack.git");
    }

    #[test]
    fn test_parse_meta_prefers_covering_prefix() {
        let html = r#"<html><head>
<meta name="go-import" content="go.uber.org/zap git https://github.com/uber-go/zap">
<meta name="go-import" content="go.uber.org/other git https://github.com/uber-go/other">
</head></html>"#;
        let locator = GoImportLocator::default();
        let loc = locator.parse_meta("go.uber.org/zap/zapcore", html).unwrap();
        assert_eq!(loc.root, "go.uber.org/zap");
        assert_eq!(loc.url, "https://github.com/uber-go/zap");
        assert_eq!(loc.vcs, "git");
        assert!(locator.parse_meta("go.uber.org/atomic", html).is_none());
    }

    #[test]
    fn test_parse_meta_reports_vcs() {
        let html = r#"<meta name="go-import" content="example.org/x hg https://hg.example.org/x">"#;
        let loc = GoImportLocator::default().parse_meta("example.org/x", html).unwrap();
        assert_eq!(loc.vcs, "hg");
    }
}
