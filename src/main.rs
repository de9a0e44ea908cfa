//! wabot - WhatsApp command bot.

use clap::Parser;
use std::process::ExitCode;

use wabot::cli::Commands;
use wabot::logging;

#[tokio::main]
async fn main() -> ExitCode {
    // The guard flushes buffered log lines on drop.
    let _log_guard = match logging::init() {
        Ok((guard, _dir)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args = Commands::parse();

    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
