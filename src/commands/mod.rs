//! CLI command handlers
//!
//! Each handler loads the manifest of the current project, drives the
//! resolver and reports the outcome. Handlers take the fetch provider as a
//! parameter so they can run against something other than real git remotes.

pub mod fetch;
pub mod get;
pub mod init;
pub mod install;

use crate::cancel::CancelToken;
use crate::config;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Where a command runs and how it can be interrupted.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub project_dir: PathBuf,
    pub gopath: PathBuf,
    pub cancel: CancelToken,
}

impl CommandContext {
    /// Context for the current working directory.
    pub fn current(cancel: CancelToken) -> Result<Self> {
        let project_dir = std::env::current_dir().context("cannot get current directory")?;
        Ok(Self {
            project_dir,
            gopath: config::gopath(),
            cancel,
        })
    }
}
