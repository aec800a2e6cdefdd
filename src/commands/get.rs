//! `ven get`

use super::CommandContext;
use crate::config::LOCAL_SOURCE_PREFIX;
use crate::foreign::ForeignRegistry;
use crate::manifest::{Manifest, package_root};
use crate::resolve::{ImportOptions, Resolver};
use crate::transaction::VendorTransaction;
use crate::vcs::FetchProvider;
use anyhow::{Context, Result};
use colored::*;

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub update: bool,
    pub update_deps: bool,
    /// Record each `pkg@version` as a constraint.
    pub constraint: bool,
}

/// A parsed `[file://]path[@version]` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageArg {
    pub path: String,
    pub version: String,
    pub local: bool,
}

impl PackageArg {
    pub fn parse(arg: &str) -> Self {
        let (local, rest) = match arg.strip_prefix(LOCAL_SOURCE_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, arg),
        };
        let (path, version) = rest.split_once('@').unwrap_or((rest, ""));
        Self {
            path: path.trim_end_matches('/').to_string(),
            version: version.to_string(),
            local,
        }
    }

    /// Request options; asking for a root scans every subpackage.
    pub fn import_options(&self, opts: &GetOptions) -> ImportOptions {
        ImportOptions {
            version: self.version.clone(),
            local: self.local,
            fetch_all: self.path == package_root(&self.path),
            update: opts.update,
            update_deps: opts.update_deps,
            ..ImportOptions::default()
        }
    }
}

/// Vendors `packages` and their dependencies, then saves the manifest.
///
/// Updates run inside a [`VendorTransaction`], so a failure leaves the
/// vendor tree exactly as it was.
pub fn run(
    ctx: &CommandContext,
    fetcher: &dyn FetchProvider,
    packages: &[String],
    opts: &GetOptions,
) -> Result<()> {
    let args: Vec<PackageArg> = packages.iter().map(|p| PackageArg::parse(p)).collect();

    let mut manifest = Manifest::load(&ctx.project_dir)?;
    if opts.constraint {
        for arg in args.iter().filter(|a| !a.version.is_empty()) {
            manifest
                .constraints
                .insert(package_root(&arg.path), arg.version.clone());
        }
    }

    let tx = VendorTransaction::begin(&manifest.vendor_dir(), opts.update || opts.update_deps)
        .context("cannot backup vendor")?;

    let foreign = ForeignRegistry::with_defaults();
    let (resolved, new_packages) = {
        let mut resolver = Resolver::new(&mut manifest, fetcher, &foreign, ctx.cancel.clone());
        let resolved = args
            .iter()
            .try_for_each(|arg| resolver.resolve(&arg.path, arg.import_options(opts)));
        (resolved, resolver.new_packages().to_vec())
    };
    let outcome = resolved.and_then(|()| manifest.save());

    match outcome {
        Ok(()) => {
            tx.commit();
            println!(
                "{} {} new packages, {} in manifest",
                "✓".green(),
                new_packages.len(),
                manifest.packages.len()
            );
            Ok(())
        }
        Err(err) => {
            tx.rollback(&new_packages).context("cannot restore vendor")?;
            Err(err.into())
        }
    }
}
