//! `ven init`

use crate::config::MANIFEST_FILE;
use crate::error::VenError;
use crate::manifest::Manifest;
use anyhow::Result;
use colored::*;
use std::path::Path;

/// Writes a fresh manifest seeded with the given exclusions.
pub fn run(project_dir: &Path, exclude_builds: &[String], exclude_dirs: &[String]) -> Result<()> {
    if Manifest::exists_in(project_dir) {
        return Err(VenError::ManifestExists.into());
    }

    let mut manifest = Manifest::new(project_dir);
    manifest.exclude_build.extend(exclude_builds.iter().cloned());
    manifest.exclude_dirs.extend(exclude_dirs.iter().cloned());
    manifest.save()?;

    println!("{} Created {}", "✓".green(), MANIFEST_FILE);
    Ok(())
}
