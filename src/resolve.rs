//! Resolution orchestrator.
//!
//! A [`Resolver`] takes one requested package at a time and works through
//! its transitive closure with an explicit worklist:
//!
//! 1. excluded roots are skipped once per run
//! 2. local roots are copied from `$GOPATH/src` instead of fetched
//! 3. a manifest constraint pins the version, a lock file pin fills in a missing one
//! 4. an existing record is reused unless an update or new subpackages demand work
//! 5. the root is fetched, seeded from foreign lock files and pruned
//! 6. an update that drops subpackages still imported elsewhere fails
//! 7. the requested subpackages are scanned for further imports
//! 8. the record is stored and the root marked processed
//! 9. every imported root is queued with only the update-deps flag carried over
//!
//! All run-scoped state (processed roots, lock file pins, new roots for
//! rollback) lives on the resolver and dies with it.

use crate::cancel::CancelToken;
use crate::error::{Result, SubpackageConflict, VenError};
use crate::foreign::ForeignRegistry;
use crate::fsutil;
use crate::manifest::{Manifest, Package, package_root};
use crate::vcs::{FetchProvider, FetchRequest, Fetched};
use crate::walker::{WalkConfig, Walker, group_by_root};
use colored::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// One resolution request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Reference to fetch; empty means the latest revision.
    pub version: String,
    pub local: bool,
    /// Import paths inside the root that must be scanned.
    pub subpackages: Vec<String>,
    /// Scan the whole tree instead of just `subpackages`.
    pub fetch_all: bool,
    /// Re-fetch the package even if it is already vendored.
    pub update: bool,
    /// Re-fetch dependencies as well.
    pub update_deps: bool,
}

impl ImportOptions {
    /// Options for a root discovered while scanning another package.
    pub fn dependency(subpackages: Vec<String>, update_deps: bool) -> Self {
        Self {
            subpackages,
            update: update_deps,
            update_deps,
            ..Self::default()
        }
    }
}

/// What step 4 decided for a root.
enum Plan {
    Satisfied,
    /// Keep the vendored copy, scan only the newly requested subpackages.
    ScanOnly { record: Package, new_subpackages: Vec<String> },
    /// Replace the vendored copy of a known root.
    Refetch { record: Package, new_subpackages: Vec<String> },
    FetchNew { new_subpackages: Vec<String> },
}

pub struct Resolver<'a> {
    manifest: &'a mut Manifest,
    fetcher: &'a dyn FetchProvider,
    foreign: &'a ForeignRegistry,
    cancel: CancelToken,
    walk: WalkConfig,
    processed: BTreeSet<String>,
    excluded_seen: BTreeSet<String>,
    cached_constraints: BTreeMap<String, String>,
    new_packages: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        manifest: &'a mut Manifest,
        fetcher: &'a dyn FetchProvider,
        foreign: &'a ForeignRegistry,
        cancel: CancelToken,
    ) -> Self {
        let walk = WalkConfig::from_manifest(&*manifest);
        Self {
            manifest,
            fetcher,
            foreign,
            cancel,
            walk,
            processed: BTreeSet::new(),
            excluded_seen: BTreeSet::new(),
            cached_constraints: BTreeMap::new(),
            new_packages: Vec::new(),
        }
    }

    /// Roots fetched for the first time during this run, in fetch order.
    pub fn new_packages(&self) -> &[String] {
        &self.new_packages
    }

    /// Resolves `pkg` and everything it imports.
    pub fn resolve(&mut self, pkg: &str, opts: ImportOptions) -> Result<()> {
        let mut pending = vec![(pkg.to_string(), opts)];
        while let Some((pkg, opts)) = pending.pop() {
            self.cancel.checkpoint()?;
            let deps = self.import_package(&pkg, &opts)?;
            for (root, subpackages) in deps.into_iter().rev() {
                pending.push((root, ImportOptions::dependency(subpackages, opts.update_deps)));
            }
        }
        Ok(())
    }

    /// Resolves the external imports of the project checked out in `dir`.
    pub fn resolve_project(&mut self, pkg: &str, dir: &Path, update: bool) -> Result<()> {
        self.seed_constraints(pkg, dir);

        let config = self.walk.clone().with_main();
        let scan = Walker::new(&config).scan_all(pkg, dir)?;
        let grouped = group_by_root(&*self.manifest, &scan.imports);
        debug!("project ({}) imports {} roots", pkg, grouped.len());

        for (root, subpackages) in grouped {
            let opts = ImportOptions {
                subpackages,
                update,
                update_deps: update,
                ..ImportOptions::default()
            };
            self.resolve(&root, opts)?;
        }
        Ok(())
    }

    /// Fetches every recorded package at its recorded commit, without scanning.
    pub fn install(&mut self) -> Result<()> {
        let packages: Vec<(String, String)> = self
            .manifest
            .packages
            .iter()
            .map(|(name, pkg)| (name.clone(), pkg.commit_hash.clone()))
            .collect();

        for (name, commit) in packages {
            self.cancel.checkpoint()?;
            let local = self.manifest.local_prefix(&name).is_some();
            let request = FetchRequest {
                root: &name,
                version: &commit,
                local,
                version_required: true,
            };
            let fetched = self.fetcher.fetch(&request, &self.manifest.vendor_dir(), &self.cancel)?;
            self.new_packages.push(fetched.root.clone());
            Walker::new(&self.walk).prune_tree(&self.manifest.package_dir(&fetched.root))?;
            println!("   {} {} ({})", "✓".green(), fetched.root, short_hash(&fetched.commit));
        }
        Ok(())
    }

    /// Handles one queued request and returns the roots it imports.
    fn import_package(&mut self, pkg: &str, opts: &ImportOptions) -> Result<BTreeMap<String, Vec<String>>> {
        let mut root = package_root(pkg);
        if let Some(prefix) = self.manifest.excluded_prefix(&root) {
            if self.excluded_seen.insert(prefix.to_string()) {
                info!("pkg ({}) is excluded from import", prefix);
            }
            return Ok(BTreeMap::new());
        }

        let local = opts.local || self.manifest.local_prefix(&root).is_some();
        let (version, version_required) = self.effective_version(&root, &opts.version)?;

        let existing = self
            .manifest
            .existing_package(&root)
            .map(|(name, record)| (name.to_string(), record.clone()));
        let existing = existing.map(|(name, record)| {
            root = name;
            record
        });

        let mut requested = opts.subpackages.clone();
        if pkg != root && !requested.iter().any(|s| s == pkg) {
            requested.push(pkg.to_string());
        }
        let plan = match existing {
            None => Plan::FetchNew {
                new_subpackages: self.eligible_targets(&root, &requested),
            },
            Some(record) => self.plan_existing(&root, record, &requested, &version, opts.update),
        };

        let (mut record, targets) = match plan {
            Plan::Satisfied => return Ok(BTreeMap::new()),
            Plan::ScanOnly {
                record,
                new_subpackages,
            } => (record, new_subpackages),
            Plan::Refetch {
                record: previous,
                new_subpackages,
            } => {
                fsutil::remove_dir_all(&self.manifest.package_dir(&root))?;
                let fetched = self.fetch(&root, &version, local, version_required, false)?;
                root = fetched.root.clone();
                let record = self.refreshed_record(&previous, &fetched)?;
                let mut targets = new_subpackages;
                targets.push(root.clone());
                targets.extend(record.subpackages.iter().cloned());
                (record, targets)
            }
            Plan::FetchNew { new_subpackages } => {
                let fetched = self.fetch(&root, &version, local, version_required, true)?;
                root = fetched.root.clone();
                let mut targets = new_subpackages;
                targets.push(root.clone());
                (Package::new(&root, &fetched.commit, &fetched.version), targets)
            }
        };

        let walker = Walker::new(&self.walk);
        let scan = if opts.fetch_all {
            walker.scan_all(&root, &self.manifest.package_dir(&root))?
        } else {
            walker.scan_targets(&root, &self.manifest.vendor_dir(), &targets)?
        };
        record.deps.extend(scan.imports.iter().cloned());
        record
            .subpackages
            .extend(scan.locals.into_iter().filter(|s| s != &root));
        debug!("pkg ({}): {}", root, record);

        let grouped = group_by_root(&*self.manifest, &scan.imports);
        self.manifest.record_package(record);
        self.processed.insert(root.clone());
        if local && self.manifest.local_prefix(&root).is_none() {
            self.manifest.local_packages.insert(root);
        }
        Ok(grouped)
    }

    /// Step 4 for a root that is already in the manifest.
    fn plan_existing(
        &self,
        root: &str,
        record: Package,
        requested: &[String],
        version: &str,
        update: bool,
    ) -> Plan {
        let new_subpackages: Vec<String> = self
            .eligible_targets(root, requested)
            .into_iter()
            .filter(|s| s != root && !record.subpackages.contains(s))
            .collect();
        let imports_update = !new_subpackages.is_empty();

        let already_current = if self.processed.contains(root) {
            true
        } else if !update {
            if !imports_update {
                info!("pkg ({}): already in manifest with {}", root, record);
            }
            true
        } else if !version.is_empty() && version == record.version {
            if !imports_update {
                info!("pkg ({}): already up to date", root);
            }
            true
        } else {
            false
        };

        match (already_current, imports_update) {
            (true, false) => Plan::Satisfied,
            (true, true) => Plan::ScanOnly {
                record,
                new_subpackages,
            },
            (false, _) => Plan::Refetch {
                record,
                new_subpackages,
            },
        }
    }

    /// Requested subpackages that are neither excluded directories nor excluded packages.
    fn eligible_targets(&self, root: &str, requested: &[String]) -> Vec<String> {
        requested
            .iter()
            .filter(|s| !self.walk.import_is_excluded(root, s))
            .filter(|s| self.manifest.excluded_prefix(s).is_none())
            .cloned()
            .collect()
    }

    /// Manifest constraints win over the request; lock file pins fill gaps.
    fn effective_version(&self, root: &str, requested: &str) -> Result<(String, bool)> {
        if let Some((_, constraint)) = self.manifest.constraint(root)
            && !constraint.is_empty()
        {
            if !requested.is_empty() && requested != constraint {
                return Err(VenError::ConstraintConflict {
                    package: root.to_string(),
                    constraint: constraint.to_string(),
                    requested: requested.to_string(),
                });
            }
            return Ok((constraint.to_string(), true));
        }
        if requested.is_empty()
            && let Some(pinned) = self.cached_constraints.get(root)
        {
            debug!("pkg ({}): using pinned version ({}) from lock file", root, pinned);
            return Ok((pinned.clone(), false));
        }
        Ok((requested.to_string(), false))
    }

    /// Steps 5 and the post-fetch housekeeping: fetch, read lock files, prune.
    fn fetch(&mut self, root: &str, version: &str, local: bool, required: bool, is_new: bool) -> Result<Fetched> {
        let request = FetchRequest {
            root,
            version,
            local,
            version_required: required,
        };
        let fetched = self.fetcher.fetch(&request, &self.manifest.vendor_dir(), &self.cancel)?;
        if is_new {
            self.new_packages.push(fetched.root.clone());
        }

        let dir = self.manifest.package_dir(&fetched.root);
        self.seed_constraints(&fetched.root, &dir);
        Walker::new(&self.walk).prune_tree(&dir)?;

        let label = if fetched.version.is_empty() {
            short_hash(&fetched.commit).to_string()
        } else {
            fetched.version.clone()
        };
        println!("   {} {} ({})", "✓".green(), fetched.root, label);
        Ok(fetched)
    }

    /// Step 6: a re-fetched root keeps its subpackages minus those that
    /// vanished, unless another package still imports one of them.
    fn refreshed_record(&self, previous: &Package, fetched: &Fetched) -> Result<Package> {
        let root = &fetched.root;
        let on_disk = Walker::new(&self.walk).subpackage_dirs(root, &self.manifest.package_dir(root))?;
        let deprecated: BTreeSet<&String> = previous
            .subpackages
            .iter()
            .filter(|s| !on_disk.contains(*s))
            .collect();

        let mut refreshed = Package::new(root, &fetched.commit, &fetched.version);
        if !deprecated.is_empty() {
            let conflicts: Vec<SubpackageConflict> = self
                .manifest
                .packages
                .iter()
                .filter(|(name, _)| *name != root)
                .flat_map(|(name, other)| {
                    deprecated
                        .iter()
                        .filter(|sub| other.deps.contains(**sub))
                        .map(|sub| SubpackageConflict {
                            dependent: name.clone(),
                            subpackage: (*sub).clone(),
                        })
                })
                .collect();
            if !conflicts.is_empty() {
                return Err(VenError::DeprecatedSubpackage {
                    conflicts,
                    version: refreshed.to_string(),
                });
            }
            debug!("pkg ({}): dropping removed subpackages {:?}", root, deprecated);
        }

        refreshed.subpackages = previous
            .subpackages
            .iter()
            .filter(|s| !deprecated.contains(s))
            .cloned()
            .collect();
        Ok(refreshed)
    }

    /// Seeds the run's pinned versions from the first lock file found in `dir`.
    fn seed_constraints(&mut self, package: &str, dir: &Path) {
        match self.foreign.extract(package, dir) {
            Ok(Some((tool, pins))) => {
                info!("pkg ({}): detected {} vendoring", package, tool);
                for pin in pins {
                    if pin.revision.is_empty() {
                        continue;
                    }
                    self.cached_constraints
                        .entry(package_root(&pin.name))
                        .or_insert(pin.revision);
                }
            }
            Ok(None) => {}
            Err(err) => warn!("{}", err),
        }
    }
}

fn short_hash(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use std::cell::Cell;

    /// Provider that must never be reached.
    struct NoFetch(Cell<usize>);

    impl FetchProvider for NoFetch {
        fn fetch(&self, request: &FetchRequest<'_>, _vendor_dir: &Path, _cancel: &CancelToken) -> Result<Fetched> {
            self.0.set(self.0.get() + 1);
            Err(VenError::vcs(request.root, "offline"))
        }
    }

    #[test]
    fn test_dependency_options_carry_only_update_deps() {
        let opts = ImportOptions::dependency(vec!["github.com/a/b/c".into()], true);
        assert!(opts.update);
        assert!(opts.update_deps);
        assert!(!opts.fetch_all);
        assert!(opts.version.is_empty());

        let opts = ImportOptions::dependency(Vec::new(), false);
        assert!(!opts.update && !opts.update_deps);
    }

    #[test]
    fn test_excluded_root_is_skipped() {
        let mut manifest = Manifest::new(".");
        manifest.exclude_packages.insert("github.com/skip".into());
        let fetcher = NoFetch(Cell::new(0));
        let foreign = ForeignRegistry::new();
        let mut resolver = Resolver::new(&mut manifest, &fetcher, &foreign, CancelToken::new());
        resolver
            .resolve("github.com/skip/me/sub", ImportOptions::default())
            .unwrap();
        resolver.resolve("github.com/skip/me", ImportOptions::default()).unwrap();
        assert_eq!(fetcher.0.get(), 0);
        assert!(resolver.new_packages().is_empty());
    }

    #[test]
    fn test_constraint_conflict_is_reported_before_fetch() {
        let mut manifest = Manifest::new(".");
        manifest
            .constraints
            .insert("github.com/a/b".into(), "v1".into());
        let fetcher = NoFetch(Cell::new(0));
        let foreign = ForeignRegistry::new();
        let mut resolver = Resolver::new(&mut manifest, &fetcher, &foreign, CancelToken::new());
        let opts = ImportOptions {
            version: "v2".into(),
            ..ImportOptions::default()
        };
        let err = resolver.resolve("github.com/a/b", opts).unwrap_err();
        assert!(matches!(err, VenError::ConstraintConflict { .. }));
        assert_eq!(fetcher.0.get(), 0);
    }

    #[test]
    fn test_effective_version_prefers_constraint_then_pins() {
        let mut manifest = Manifest::new(".");
        manifest
            .constraints
            .insert("github.com/a".into(), "v1".into());
        let fetcher = NoFetch(Cell::new(0));
        let foreign = ForeignRegistry::new();
        let mut resolver = Resolver::new(&mut manifest, &fetcher, &foreign, CancelToken::new());
        resolver
            .cached_constraints
            .insert("github.com/c/d".into(), "abc123".into());

        assert_eq!(
            resolver.effective_version("github.com/a/b", "").unwrap(),
            ("v1".to_string(), true)
        );
        assert_eq!(
            resolver.effective_version("github.com/c/d", "").unwrap(),
            ("abc123".to_string(), false)
        );
        assert_eq!(
            resolver.effective_version("github.com/c/d", "v3").unwrap(),
            ("v3".to_string(), false)
        );
    }

    #[test]
    fn test_cancelled_before_first_package() {
        let mut manifest = Manifest::new(".");
        let fetcher = NoFetch(Cell::new(0));
        let foreign = ForeignRegistry::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut resolver = Resolver::new(&mut manifest, &fetcher, &foreign, cancel);
        let err = resolver.resolve("github.com/a/b", ImportOptions::default()).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fetcher.0.get(), 0);
    }

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash("0123456789"), "0123456");
        assert_eq!(short_hash("abc"), "abc");
    }
}
