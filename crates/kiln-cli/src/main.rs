mod commands;
mod config;
mod output;

use clap::Parser;
use color_eyre::eyre::Result;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;

use commands::Command;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Deploy a compiled contract and verify its source on a block explorer")]
#[command(version)]
struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "KILN_VERBOSITY", default_value_t = LevelFilter::WARN)]
    verbosity: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            on_signal.cancel();
        }
    });

    cli.command.run(cancel).await
}
