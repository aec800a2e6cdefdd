//! `ven fetch`

use super::CommandContext;
use crate::config::import_path_for_dir;
use crate::error::VenError;
use crate::foreign::ForeignRegistry;
use crate::fsutil;
use crate::manifest::Manifest;
use crate::resolve::Resolver;
use crate::vcs::FetchProvider;
use anyhow::{Context, Result};
use colored::*;
use tracing::warn;

/// Vendors every external package the project imports.
///
/// `package` overrides the project's import path, which otherwise comes from
/// the project directory's location under `$GOPATH/src`.
pub fn run(
    ctx: &CommandContext,
    fetcher: &dyn FetchProvider,
    package: Option<&str>,
    update: bool,
) -> Result<()> {
    let mut manifest = Manifest::load(&ctx.project_dir)?;
    let vendor_dir = manifest.vendor_dir();
    if vendor_dir.exists() {
        return Err(VenError::VendorExists.into());
    }

    let pkg = match package {
        Some(pkg) => pkg.to_string(),
        None => import_path_for_dir(&ctx.gopath, &ctx.project_dir).unwrap_or_else(|| {
            warn!(
                "project is outside {}/src, every domain import is treated as external",
                ctx.gopath.display()
            );
            String::new()
        }),
    };
    println!("{} Fetching dependencies of {}", "🔍".blue(), display_name(&pkg));

    let foreign = ForeignRegistry::with_defaults();
    let resolved = Resolver::new(&mut manifest, fetcher, &foreign, ctx.cancel.clone())
        .resolve_project(&pkg, &ctx.project_dir, update);
    let outcome = resolved.and_then(|()| manifest.save());

    if let Err(err) = outcome {
        if let Err(cleanup) = fsutil::remove_dir_all(&vendor_dir) {
            warn!("cannot remove vendor: {}", cleanup);
        }
        return Err(err).context("failed to fetch project dependencies");
    }

    println!("{} Vendored {} packages", "✓".green(), manifest.packages.len());
    Ok(())
}

fn display_name(pkg: &str) -> &str {
    if pkg.is_empty() { "project" } else { pkg }
}
