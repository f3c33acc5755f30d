#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minivite")]
#[command(author, version, about = "A dev-time ES module server with hot reload", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Start the dev server
    Dev {
        /// Directory to serve (defaults to the current directory)
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "MINIVITE_PORT")]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Path to the config file (defaults to minivite.config.json in the root)
        #[arg(short, long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Change debounce window in milliseconds (overrides the config file)
        #[arg(long, value_name = "MS")]
        debounce: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.json);

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::Dev {
            root,
            port,
            host,
            config,
            debounce,
        } => {
            let root = match root {
                Some(root) => root,
                None => std::env::current_dir().into_diagnostic()?,
            };
            let action = commands::dev::DevAction {
                root,
                port,
                host,
                config,
                debounce_ms: debounce,
            };

            let rt = tokio::runtime::Runtime::new().into_diagnostic()?;
            rt.block_on(commands::dev::run(action))
        }
    }
}
