//! # ven CLI Entry Point
//!
//! Parses arguments with clap, installs the tracing subscriber and the
//! interrupt handler, then routes to the command handlers.
//!
//! ## Commands
//!
//! - `init` - create `Manifest.toml`
//! - `fetch` - vendor everything the project imports
//! - `get` - vendor (or update) the given packages
//! - `install` - recreate the vendor tree from the manifest
//! - `completions` - print shell completions

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use tracing_subscriber::EnvFilter;

use ven::cancel::CancelToken;
use ven::commands::{self, CommandContext};
use ven::config::{DEFAULT_EXCLUDE_BUILDS, DEFAULT_EXCLUDE_DIRS};
use ven::error::VenError;
use ven::vcs::Fetcher;

#[derive(Parser)]
#[command(name = "ven")]
#[command(about = "Vendor Go source dependencies", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Print diagnostics while resolving
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a manifest for the current project
    Init {
        /// Build tags whose files are ignored
        #[arg(long, value_delimiter = ',', default_values = DEFAULT_EXCLUDE_BUILDS.iter().copied())]
        exclude_builds: Vec<String>,
        /// Directory names that are never scanned
        #[arg(long, value_delimiter = ',', default_values = DEFAULT_EXCLUDE_DIRS.iter().copied())]
        exclude_dirs: Vec<String>,
    },
    /// Vendor every package the current project imports
    Fetch {
        /// Re-fetch packages that are already in the manifest
        #[arg(short, long)]
        update: bool,
        /// Import path of the project (default: derived from $GOPATH/src)
        #[arg(long)]
        package: Option<String>,
    },
    /// Vendor packages with their dependencies
    ///
    /// Accepts `file://` for packages copied from $GOPATH/src and `@ref` for a
    /// tag, branch or commit.
    Get {
        /// Packages to import
        #[arg(required = true)]
        packages: Vec<String>,
        /// Update the packages if they are already vendored
        #[arg(short, long)]
        update: bool,
        /// Update the dependencies of the packages as well
        #[arg(long)]
        update_deps: bool,
        /// Record `pkg@version` as a constraint
        #[arg(short, long)]
        constraint: bool,
    },
    /// Recreate the vendor tree from the manifest
    Install,
    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ven=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, cancel: CancelToken) -> Result<()> {
    match &cli.command {
        Commands::Init {
            exclude_builds,
            exclude_dirs,
        } => {
            let ctx = CommandContext::current(cancel)?;
            commands::init::run(&ctx.project_dir, exclude_builds, exclude_dirs)
        }
        Commands::Fetch { update, package } => {
            let ctx = CommandContext::current(cancel)?;
            let fetcher = Fetcher::git(&ctx.gopath);
            commands::fetch::run(&ctx, &fetcher, package.as_deref(), *update)
        }
        Commands::Get {
            packages,
            update,
            update_deps,
            constraint,
        } => {
            let ctx = CommandContext::current(cancel)?;
            let fetcher = Fetcher::git(&ctx.gopath);
            let opts = commands::get::GetOptions {
                update: *update,
                update_deps: *update_deps,
                constraint: *constraint,
            };
            commands::get::run(&ctx, &fetcher, packages, &opts)
        }
        Commands::Install => {
            let ctx = CommandContext::current(cancel)?;
            let fetcher = Fetcher::git(&ctx.gopath);
            commands::install::run(&ctx, &fetcher)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!("cannot install interrupt handler: {}", err);
    }

    if let Err(err) = run(&cli, cancel) {
        let cancelled = err
            .downcast_ref::<VenError>()
            .is_some_and(VenError::is_cancelled);
        if cancelled {
            eprintln!("{} Interrupted, partial changes were rolled back", "!".yellow());
            std::process::exit(130);
        }
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}
