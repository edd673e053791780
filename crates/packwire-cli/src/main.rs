#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "packwire")]
#[command(author, version, about = "Build orchestration for front-end bundles", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (logs and command results)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the development server
    Dev {
        /// Port to listen on (overrides PORT and the config file)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Config file (default: packwire.json in the project root)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Do not open the browser
        #[arg(long)]
        no_open: bool,
    },

    /// Build production assets
    Build {
        /// Config file (default: packwire.json in the project root)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Write report.json with asset sizes
        #[arg(long)]
        report: bool,

        /// Emit gzip sidecars
        #[arg(long)]
        gzip: bool,
    },

    /// Print the assembled build configuration as JSON
    Inspect {
        /// Which configuration to assemble
        #[arg(long, value_enum, default_value_t = commands::inspect::InspectMode::Dev)]
        mode: commands::inspect::InspectMode,

        /// Config file (default: packwire.json in the project root)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = match &cli.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir().into_diagnostic()?,
    };

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Dev {
            port,
            config,
            no_open,
        } => {
            let action = commands::dev::DevAction {
                cwd,
                config,
                port,
                open: !no_open,
            };
            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::dev::run(action))
        }
        Commands::Build {
            config,
            report,
            gzip,
        } => commands::build::run(
            commands::build::BuildAction {
                cwd,
                config,
                report,
                gzip,
            },
            cli.json,
        ),
        Commands::Inspect { mode, config } => {
            commands::inspect::run(&cwd, config.as_deref(), mode)
        }
        Commands::Version => commands::version::run(),
    }
}
