//! Terminal presentation of a search session.

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::{
    players::{Player, PlayerFactory, PlayerKey, PlayerOptions},
    results::{MediaType, ResultItem},
    session::{SessionObserver, SessionState},
};

fn media_label(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "image",
        MediaType::Video => "video",
        MediaType::Text => "text",
    }
}

pub fn format_result(index: usize, item: &ResultItem) -> String {
    format!(
        "{:>3}. {:.3}  {:<5}  {}  {}",
        index + 1,
        item.score,
        media_label(item.media_type),
        item.file_name,
        item.clip_url()
    )
}

/// Lines for results `from..from + page_size`.
pub fn format_page(results: &[ResultItem], from: usize, page_size: usize) -> Vec<String> {
    results
        .iter()
        .enumerate()
        .skip(from)
        .take(page_size)
        .map(|(idx, item)| format_result(idx, item))
        .collect()
}

/// Heading printed above a settled result set.
pub fn format_header(state: &SessionState) -> String {
    let count = match state.results.len() {
        1 => "1 result".to_string(),
        n => format!("{n} results"),
    };

    let mut header = match state.search_time_ms {
        Some(ms) => format!("{count} in {:.2}s", ms as f64 / 1000.0),
        None => count,
    };

    if let Some(summary) = state.summary() {
        header = format!("{summary}: {header}");
    }

    header
}

/// Prints every settled attempt and shows a spinner while one is running.
///
/// When `settled` is set, a snapshot is sent each time the session goes
/// from busy back to idle.
pub struct TerminalRenderer {
    page_size: usize,
    spinner: Option<ProgressBar>,
    was_busy: bool,
    settled: Option<std_mpsc::Sender<SessionState>>,
}

impl TerminalRenderer {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            spinner: None,
            was_busy: false,
            settled: None,
        }
    }

    pub fn with_settled(mut self, settled: std_mpsc::Sender<SessionState>) -> Self {
        self.settled = Some(settled);
        self
    }

    fn start_spinner(&mut self, message: &'static str) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    fn print_outcome(&self, state: &SessionState) {
        if let Some(error) = &state.error_message {
            eprintln!("{error}");
            return;
        }

        if !state.search_complete {
            return;
        }

        println!("{}", format_header(state));
        for line in format_page(&state.results, 0, self.page_size) {
            println!("{line}");
        }

        let rest = state.results.len().saturating_sub(self.page_size);
        if rest > 0 {
            println!("     ... {rest} more");
        }
    }
}

impl SessionObserver for TerminalRenderer {
    fn on_transition(&mut self, state: &SessionState) {
        let busy = state.is_loading_results();

        match state.status_line() {
            Some(line) if self.spinner.is_none() => self.start_spinner(line),
            Some(_) => {}
            None => {
                if let Some(spinner) = self.spinner.take() {
                    spinner.finish_and_clear();
                }
            }
        }

        if self.was_busy && !busy {
            self.print_outcome(state);
            if let Some(settled) = &self.settled {
                if settled.send(state.clone()).is_err() {
                    log::debug!("nobody waiting for settled state");
                }
            }
        }

        self.was_busy = busy;
    }
}

/// Players for a terminal: there is nothing to buffer, so each one reports
/// ready as soon as it is created and "plays" by printing its clip url.
pub struct TerminalPlayerFactory {
    ready: mpsc::UnboundedSender<PlayerKey>,
}

impl TerminalPlayerFactory {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlayerKey>) {
        let (ready, ready_rx) = mpsc::unbounded_channel();
        (Self { ready }, ready_rx)
    }
}

struct TerminalPlayer {
    key: PlayerKey,
    item: ResultItem,
}

impl Player for TerminalPlayer {
    fn seek(&mut self, seconds: f64) {
        println!(
            "  > {} from {seconds}s: {}",
            self.item.file_name,
            self.item.clip_url()
        );
    }

    fn dispose(&mut self) {
        log::trace!("player {} disposed", self.key);
    }
}

impl PlayerFactory for TerminalPlayerFactory {
    fn create(
        &self,
        key: &PlayerKey,
        item: &ResultItem,
        options: &PlayerOptions,
    ) -> Box<dyn Player> {
        log::trace!("player {key} created ({options:?})");

        if self.ready.send(key.clone()).is_err() {
            log::debug!("player {key} created after the session stopped listening");
        }

        Box::new(TerminalPlayer {
            key: key.clone(),
            item: item.clone(),
        })
    }
}
