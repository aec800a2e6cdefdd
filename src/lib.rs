//! # ven - Go source dependency vendoring
//!
//! ven discovers the external packages a Go project imports, fetches pinned
//! revisions of them into a vendor directory and records the result in
//! `Manifest.toml`, so later runs are idempotent and reproducible.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a manifest with the default exclusions
//! ven init
//!
//! # Vendor everything the project imports
//! ven fetch
//!
//! # Add or update single packages
//! ven get github.com/pkg/errors@v0.8.0
//! ven get -u github.com/spf13/cobra
//!
//! # Recreate vendor/ from the manifest
//! ven install
//! ```
//!
//! ## Module Organization
//!
//! - [`manifest`] - Manifest store with longest-prefix lookups
//! - [`walker`] - Import graph walker and build constraint filtering
//! - [`vcs`] - Git fetch provider and remote discovery
//! - [`foreign`] - Lock files of other Go dependency tools
//! - [`resolve`] - Resolution orchestrator
//! - [`transaction`] - Vendor backup and rollback
//! - [`commands`] - CLI command handlers

/// Cooperative cancellation token.
pub mod cancel;

/// CLI command handlers.
pub mod commands;

/// File names, defaults and `$GOPATH` helpers.
pub mod config;

/// Error types.
pub mod error;

/// Foreign lock file adapters (dep, glide, godep, govendor).
pub mod foreign;

/// Directory copy and removal helpers.
pub mod fsutil;

/// Manifest store (`Manifest.toml`).
pub mod manifest;

/// Resolution orchestrator.
pub mod resolve;

/// Vendor tree backup and rollback.
pub mod transaction;

/// Version control fetch provider.
pub mod vcs;

/// Import graph walker.
pub mod walker;
