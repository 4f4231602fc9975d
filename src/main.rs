mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use cli::Commands;
use commands::{run_baseline, run_compare, run_heal};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

/// Logs go to stderr so JSON on stdout stays machine readable.
fn init_logging(verbose: bool) {
    let default = if verbose { "vsme=debug,vsme_lib=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Compare {
            baseline,
            actual,
            tolerance,
            ignore_regions,
            diff_output,
            format,
            output,
        } => run_compare(
            &raw_args,
            args.config,
            baseline,
            actual,
            tolerance,
            ignore_regions,
            diff_output,
            format,
            output,
        ),
        Commands::Heal {
            page,
            element,
            locator,
            history,
            llm,
            preset,
            threshold,
            strategies,
            format,
            output,
        } => {
            run_heal(
                &raw_args,
                args.config,
                args.verbose,
                page,
                element,
                locator,
                history,
                llm,
                preset.map(Into::into),
                threshold,
                strategies,
                format,
                output,
            )
            .await
        }
        Commands::Baseline { action } => run_baseline(action),
    }
}
