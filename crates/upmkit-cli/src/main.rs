#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;
use upmkit_core::Config;

#[derive(Parser, Debug)]
#[command(name = "upmkit")]
#[command(author, version, about = "Add registry packages to a Unity project manifest", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    /// Unity project directory, relative to the working directory
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    chdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Add packages to Packages/manifest.json
    Add {
        /// Packages to add, as `name` or `name@version`
        #[arg(required = true, value_name = "PKG")]
        packages: Vec<String>,

        /// Primary registry URL
        #[arg(short, long, env = "UPMKIT_REGISTRY", value_name = "URL")]
        registry: Option<String>,

        /// Do not fall back to the Unity registry for missing packages
        #[arg(long)]
        no_upstream: bool,

        /// Upstream registry URL
        #[arg(long, env = "UPMKIT_UPSTREAM_REGISTRY", value_name = "URL", hide = true)]
        upstream_registry: Option<String>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);

    match cli.command {
        Commands::Add {
            packages,
            registry,
            no_upstream,
            upstream_registry,
        } => {
            let action = commands::add::AddAction {
                packages,
                chdir: cli.chdir,
                registry,
                upstream: !no_upstream,
                upstream_registry,
            };
            let code = commands::add::run(&config.cwd, action, cli.json)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Version => commands::version::run(cli.json),
    }
}
