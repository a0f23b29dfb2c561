use clap::Parser;
use discord_to_playlist::cli::Args;
use discord_to_playlist::report;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // stdout is for the progress log
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let args = Args::parse();
    match discord_to_playlist::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report::print_fatal(&e);
            ExitCode::FAILURE
        }
    }
}
