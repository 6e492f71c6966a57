mod cli;

use clap::Parser;
use cli::{commands, error::CliError, output, ux};


async fn run_command(args: &cli::Cli) -> Result<output::CommandData, CliError> {
    let options = args.connect_options();

    match &args.command {
        cli::Commands::Query { args } => {
            let parameters = args.parameters();
            let limit = args.limit;

            let report = if args.run_async {
                commands::query_async(options, &args.sql, &parameters, limit).await?
            } else {
                // The blocking client must stay off the async workers.
                let sql = args.sql.clone();
                tokio::task::spawn_blocking(move || {
                    commands::query(options, &sql, &parameters, limit)
                }).await??
            };
            Ok(output::CommandData::Query(report))
        }
        cli::Commands::Ping { } => {
            let report = tokio::task::spawn_blocking(move || commands::ping(options)).await??;
            Ok(output::CommandData::Ping(report))
        }
    }
}


/// Entry point for the druid-sql CLI tool.
///
/// Subcommands:
/// - `query`: Execute a SQL statement and print its columns and rows.
/// - `ping`: Verify that the SQL endpoint answers.
///
/// Connection settings such as `--host` and `--user` are parsed from the
/// command line or the `DRUID_*` environment variables.
#[tokio::main]
async fn main() {
    let args: cli::Cli = cli::Cli::parse();

    if let Err(e) = ux::setup_logging(args.verbose, args.quiet, args.json) {
        eprintln!("{e}");
        std::process::exit(2);
    }

    let result = run_command(&args).await;
    let output = output::CliOutput::from_result(args.command.to_string(), result);

    if args.json {
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to serialize output: {e}");
                std::process::exit(2);
            }
        }
    } else {
        ux::render_human_output(&output);
    }

    if let output::CliStatus::Error = output.status {
        std::process::exit(1);
    }
}
