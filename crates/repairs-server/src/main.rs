#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use repairs_core::config::ServiceConfig;
use repairs_core::error::{ErrorCode, RepairError};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "repairs: repair ticket service",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to REPAIRS_CONFIG, then .repairs/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run the HTTP API",
        after_help = "EXAMPLES:\n    # Serve on the configured address\n    SECRET_API_KEY=... repairs serve\n\n    # Override the bind address\n    repairs serve --bind 0.0.0.0:8080"
    )]
    Serve(cmd::serve::ServeArgs),

    #[command(
        about = "Create a repair ticket",
        after_help = "EXAMPLES:\n    # Create a ticket\n    repairs create --item Laptop --description \"No power\"\n\n    # Credit it to a tenant and conversation\n    repairs create --item Laptop -d \"No power\" --tenant-id T1 --conversation-id C1 --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        about = "List repair tickets",
        after_help = "EXAMPLES:\n    # Everything\n    repairs list\n\n    # New tickets assigned to anyone named jane\n    repairs list --status New --assigned-to jane"
    )]
    List(cmd::list::ListArgs),

    #[command(about = "Show one repair ticket")]
    Show(cmd::show::ShowArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("REPAIRS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "repairs=debug,info"
        } else {
            "repairs=info,warn"
        })
    });

    let format = env::var("REPAIRS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(std::io::stderr);
            registry.with(layer).init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();

    let config = match ServiceConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            let code = err
                .downcast_ref::<RepairError>()
                .map_or(ErrorCode::ConfigParseError, RepairError::code);
            render_error(
                output,
                &CliError::with_details(
                    format!("{err:#}"),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            return Err(err);
        }
    };

    match &cli.command {
        Commands::Serve(args) => cmd::serve::run_serve(args, &config),
        Commands::Create(args) => cmd::create::run_create(args, &config, output),
        Commands::List(args) => cmd::list::run_list(args, &config, output),
        Commands::Show(args) => cmd::show::run_show(args, &config, output),
    }
}
