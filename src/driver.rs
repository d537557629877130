//! Single-task event loop around a [`SearchSession`].
//!
//! User intents and finished network calls arrive on two channels and are
//! applied one at a time, so the session never sees concurrent mutation.
//! Network calls run on spawned tasks; on a current-thread runtime they share
//! the loop's thread.

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::{
    app::SearchError,
    players::PlayerKey,
    results::IndexInfo,
    session::{AttemptRequest, Completion, PendingAttempt, SearchSession},
    upload::MediaFile,
};

/// Everything the presentation layer can ask of a session.
#[derive(Debug)]
pub enum Intent {
    Input(String),
    Focus,
    Blur,
    Submit,
    SelectSuggestion(String),
    SelectFile(MediaFile),
    DragEnter,
    DragLeave,
    Drop(Option<MediaFile>),
    Clear,
    PlayerReady(PlayerKey),
    /// The first `n` results have been on screen.
    Scrolled(usize),
    Shutdown,
}

pub type IntentSender = mpsc::UnboundedSender<Intent>;

/// Span covering one attempt's network call, so everything logged while it
/// runs carries the generation and what was searched for.
pub fn attempt_span(pending: &PendingAttempt) -> tracing::Span {
    match pending.request() {
        AttemptRequest::Text(query) => tracing::info_span!(
            "attempt",
            generation = pending.generation(),
            query = %query
        ),
        AttemptRequest::Media(file) => tracing::info_span!(
            "attempt",
            generation = pending.generation(),
            file = %file.name,
            content_type = %file.content_type
        ),
    }
}

enum Resolved {
    Attempt(Completion),
    IndexInfo(Result<IndexInfo, SearchError>),
}

pub struct SessionDriver {
    session: SearchSession,
    intents: mpsc::UnboundedReceiver<Intent>,
    resolved_tx: mpsc::UnboundedSender<Resolved>,
    resolved_rx: mpsc::UnboundedReceiver<Resolved>,
    pending: usize,
}

impl SessionDriver {
    pub fn new(session: SearchSession) -> (Self, IntentSender) {
        let (intent_tx, intents) = mpsc::unbounded_channel();
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        let driver = Self {
            session,
            intents,
            resolved_tx,
            resolved_rx,
            pending: 0,
        };

        (driver, intent_tx)
    }

    /// Run until `Intent::Shutdown`, or until every sender is gone and nothing
    /// is in flight. Tears the session down and hands it back.
    pub async fn run(mut self) -> SearchSession {
        self.fetch_index_info();

        let mut intents_closed = false;

        loop {
            if intents_closed && self.pending == 0 {
                break;
            }

            tokio::select! {
                intent = self.intents.recv(), if !intents_closed => match intent {
                    Some(Intent::Shutdown) => break,
                    Some(intent) => self.dispatch(intent),
                    None => {
                        log::debug!("intent channel closed, {} calls in flight", self.pending);
                        intents_closed = true;
                    }
                },
                Some(resolved) = self.resolved_rx.recv() => {
                    self.pending -= 1;
                    match resolved {
                        Resolved::Attempt(completion) => {
                            self.session.complete(completion);
                        }
                        Resolved::IndexInfo(info) => self.session.apply_index_info(info),
                    }
                }
            }
        }

        let players = self.session.players();
        if !players.is_empty() {
            log::debug!("disposing {} players", players.len());
        }
        log::debug!(
            "session {} stopped with {} results",
            self.session.session_id(),
            self.session.state().results.len()
        );
        self.session.teardown();
        self.session
    }

    #[tracing::instrument(level = "trace", skip(self))]
    fn dispatch(&mut self, intent: Intent) {
        let pending = match intent {
            Intent::Input(text) => {
                self.session.set_query(&text);
                None
            }
            Intent::Focus => {
                self.session.focus();
                None
            }
            Intent::Blur => {
                self.session.blur();
                None
            }
            Intent::Submit => self.session.submit(),
            Intent::SelectSuggestion(text) => {
                self.session.select_suggestion(&text);
                None
            }
            Intent::SelectFile(file) => self.session.select_file(file),
            Intent::DragEnter => {
                self.session.drag_enter();
                None
            }
            Intent::DragLeave => {
                self.session.drag_leave();
                None
            }
            Intent::Drop(file) => self.session.drop_file(file),
            Intent::Clear => {
                self.session.clear();
                log::debug!("cleared, now at generation {}", self.session.generation());
                None
            }
            Intent::PlayerReady(key) => {
                self.session.player_ready(&key);
                None
            }
            Intent::Scrolled(viewed) => {
                self.session.scrolled(viewed);
                None
            }
            Intent::Shutdown => None,
        };

        if let Some(pending) = pending {
            self.spawn_attempt(pending);
        }
    }

    fn spawn_attempt(&mut self, pending: PendingAttempt) {
        let span = attempt_span(&pending);
        let tx = self.resolved_tx.clone();
        self.pending += 1;

        tokio::spawn(
            async move {
                log::debug!("attempt started");
                let completion = pending.run().await;
                log::debug!("attempt finished in {:?}", completion.elapsed);
                if tx.send(Resolved::Attempt(completion)).is_err() {
                    log::debug!("session gone before attempt finished");
                }
            }
            .instrument(span),
        );
    }

    fn fetch_index_info(&mut self) {
        let backend = self.session.backend();
        let tx = self.resolved_tx.clone();
        self.pending += 1;

        tokio::spawn(async move {
            let info = backend.index_info().await;
            let _ = tx.send(Resolved::IndexInfo(info));
        });
    }
}
