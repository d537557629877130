use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    app::AppFactory,
    config::Config,
    players::PlayerKey,
    session::{Applied, SearchSession},
    upload::MediaFile,
};

use super::{
    render::{TerminalPlayerFactory, TerminalRenderer},
    shell,
};

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")
}

/// Session with terminal players and rendering, plus the players' ready signals.
fn terminal_session(config: &Config) -> Result<(SearchSession, UnboundedReceiver<PlayerKey>)> {
    let backend = AppFactory::create_backend(config)?;
    let telemetry = AppFactory::create_telemetry(config);
    let (players, ready) = TerminalPlayerFactory::new();

    let mut session = AppFactory::create_session(config, backend, telemetry, Box::new(players));
    session.add_observer(Box::new(TerminalRenderer::new(config.page_size)));

    Ok((session, ready))
}

fn outcome(applied: Option<Applied>) -> Result<()> {
    match applied {
        Some(Applied::Success) => Ok(()),
        Some(Applied::Failed) => bail!("search failed"),
        Some(Applied::Stale) => bail!("search was superseded"),
        None => bail!("nothing to search for"),
    }
}

/// Let every player created for the final result set play.
fn play_ready(session: &mut SearchSession, ready: &mut UnboundedReceiver<PlayerKey>) {
    while let Ok(key) = ready.try_recv() {
        session.player_ready(&key);
    }
}

pub fn handle_search(config: &Config, query: String) -> Result<()> {
    let (mut session, mut ready) = terminal_session(config)?;

    runtime()?.block_on(async {
        session.load_index_info().await;
        tokio::select! {
            applied = session.run_text(&query) => outcome(applied),
            _ = tokio::signal::ctrl_c() => bail!("interrupted"),
        }
    })?;

    play_ready(&mut session, &mut ready);
    session.teardown();
    Ok(())
}

pub fn handle_upload(config: &Config, path: &Path) -> Result<()> {
    let file = MediaFile::from_path(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let (mut session, mut ready) = terminal_session(config)?;

    runtime()?.block_on(async {
        session.load_index_info().await;
        tokio::select! {
            applied = session.run_file(file) => outcome(applied),
            _ = tokio::signal::ctrl_c() => bail!("interrupted"),
        }
    })?;

    play_ready(&mut session, &mut ready);
    session.teardown();
    Ok(())
}

pub fn handle_info(config: &Config) -> Result<()> {
    let backend = AppFactory::create_backend(config)?;
    let base_url = config.base_url()?;

    let info = runtime()?
        .block_on(backend.index_info())
        .with_context(|| format!("failed to fetch index stats from {base_url}"))?;

    println!("backend:  {base_url} ({:?})", config.environment);
    println!("indexed:  {} vectors", info.total_vectors);
    Ok(())
}

pub fn handle_shell(config: &Config) -> Result<()> {
    shell::run(config)
}
