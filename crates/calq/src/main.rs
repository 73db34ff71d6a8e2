use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use commands::compile::CompileOptions;
use commands::query::QueryOptions;
use commands::{CommandContext, CommandError};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                let error_json = serde_json::json!({
                    "error": {
                        "code": error_code(&e),
                        "message": e.to_string(),
                    }
                });
                match serde_json::to_string_pretty(&error_json) {
                    Ok(text) => eprintln!("{text}"),
                    Err(_) => eprintln!("Error: {e}"),
                }
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Routes library `tracing` events through `env_logger`.
///
/// `RUST_LOG` still overrides the level picked by `--verbose`.
fn init_logging(verbose: bool) {
    env_logger::Builder::new()
        .parse_filters(if verbose { "debug" } else { "warn" })
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

async fn run(cli: &Cli) -> commands::Result<()> {
    let ctx = CommandContext::from_cli(cli);

    match &cli.command {
        Commands::Compile { filter } => {
            let opts = CompileOptions {
                filter: filter.clone(),
            };
            commands::compile::execute(&ctx, &opts)
        }
        Commands::Query {
            filter,
            snapshot,
            collections,
            recursive,
        } => {
            let opts = QueryOptions {
                filter: filter.clone(),
                snapshot: snapshot.clone(),
                collections: collections.clone(),
                recursive: *recursive,
            };
            commands::query::execute(&ctx, &opts).await
        }
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config::execute_show(&ctx),
            Some(ConfigCommands::Path) => commands::config::execute_path(&ctx),
        },
    }
}

/// Returns the error code string for JSON output.
fn error_code(e: &CommandError) -> &'static str {
    match e {
        CommandError::Filter(_) => "FILTER_ERROR",
        CommandError::Query(err) => match err.status_code() {
            400 => "FILTER_ERROR",
            403 => "FORBIDDEN",
            404 => "NOT_FOUND",
            _ => "RETRIEVAL_ERROR",
        },
        CommandError::Store(_) => "SNAPSHOT_ERROR",
        CommandError::Config(_) => "CONFIG_ERROR",
        CommandError::Read { .. } => "IO_ERROR",
        CommandError::Json(_) => "JSON_ERROR",
        CommandError::Toml(_) => "CONFIG_ERROR",
    }
}

/// Returns the exit status for an error: 2 for bad input, 3 for failures on
/// our side.
fn exit_status(e: &CommandError) -> u8 {
    if e.is_client_error() {
        2
    } else {
        3
    }
}
