use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod cli;
mod config;
mod driver;
mod players;
mod results;
mod session;
mod telemetry;
mod upload;

use app::AppFactory;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Args::parse();
    let config = AppFactory::create_config(args.env)?;

    match args.command {
        cli::Command::Search { query } => cli::handle_search(&config, query),
        cli::Command::Upload { path } => cli::handle_upload(&config, &path),
        cli::Command::Info {} => cli::handle_info(&config),
        cli::Command::Shell {} => cli::handle_shell(&config),
    }
}
