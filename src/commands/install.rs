//! `ven install`

use super::CommandContext;
use crate::error::VenError;
use crate::foreign::ForeignRegistry;
use crate::fsutil;
use crate::manifest::Manifest;
use crate::resolve::Resolver;
use crate::vcs::FetchProvider;
use anyhow::{Context, Result};
use colored::*;
use tracing::warn;

/// Recreates the vendor tree from the commits recorded in the manifest.
///
/// The vendor directory must not exist yet. Whatever was written is removed
/// again if the run fails or is interrupted.
pub fn run(ctx: &CommandContext, fetcher: &dyn FetchProvider) -> Result<()> {
    let mut manifest = Manifest::load(&ctx.project_dir)?;
    let vendor_dir = manifest.vendor_dir();
    if vendor_dir.exists() {
        return Err(VenError::VendorExists.into());
    }

    let foreign = ForeignRegistry::new();
    let count = manifest.packages.len();
    println!("{} Installing {} packages...", "📦".blue(), count);

    let outcome = Resolver::new(&mut manifest, fetcher, &foreign, ctx.cancel.clone()).install();
    if let Err(err) = outcome {
        if let Err(cleanup) = fsutil::remove_dir_all(&vendor_dir) {
            warn!("cannot remove vendor: {}", cleanup);
        }
        return Err(err).context("install failed");
    }

    println!("{} Installed {} packages", "✓".green(), count);
    Ok(())
}
