//! Search session controller.
//!
//! `SearchSession` is the only writer of [`SessionState`]. Every attempt is
//! split in two: a synchronous `submit_*` that validates preconditions and
//! moves the state to Uploading/Searching, returning a [`PendingAttempt`], and
//! [`SearchSession::complete`] which commits whatever the attempt produced.
//! The network call happens in between, on whatever task runs
//! [`PendingAttempt::run`].
//!
//! Each attempt and each `clear()` bumps a generation counter. A completion
//! is only applied when its generation is still current, so a response that
//! arrives after the user cleared or moved on is dropped instead of
//! overwriting newer state.

use std::{
    fmt::Display,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Serialize;

use crate::{
    app::{SearchBackend, SearchError},
    players::{MediaPlayerRegistry, PlayerKey},
    results::{IndexInfo, ResultItem},
    telemetry::{EventName, ScrollTracker, TelemetryEvent, TelemetrySink},
    upload::{MediaFile, UploadPipeline},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    None,
    Text,
    Image,
    Video,
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self {
            Mode::None => "none",
            Mode::Text => "text",
            Mode::Image => "image",
            Mode::Video => "video",
        };
        write!(f, "{mode}")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Idle,
    Uploading,
    Searching,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// Empty string means "no text query".
    pub query: String,
    pub mode: Mode,
    pub results: Vec<ResultItem>,
    pub status: Status,
    pub search_complete: bool,
    pub search_time_ms: Option<u64>,
    pub error_message: Option<String>,
    pub suggestions_visible: bool,
    pub dragging: bool,
    pub total_vectors: Option<u64>,
}

impl SessionState {
    pub fn is_input_empty(&self) -> bool {
        self.query.trim().is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.status != Status::Idle
    }

    pub fn can_submit(&self) -> bool {
        !self.is_input_empty() && !self.is_busy()
    }

    pub fn is_loading_results(&self) -> bool {
        self.is_busy()
    }

    pub fn status_line(&self) -> Option<&'static str> {
        match self.status {
            Status::Idle => None,
            Status::Uploading => Some("Uploading, embedding, and searching..."),
            Status::Searching => Some("Searching..."),
        }
    }

    /// "Searched 1,234 styles for ..." once a search completed and the index
    /// size is known.
    pub fn summary(&self) -> Option<String> {
        if !self.search_complete {
            return None;
        }
        let total = self.total_vectors?;

        let subject = match self.mode {
            Mode::Text => format!(" for {}", self.query),
            Mode::Image => " for your image".to_string(),
            Mode::Video => " for your video".to_string(),
            Mode::None => String::new(),
        };

        Some(format!("Searched {} styles{subject}", group_thousands(total)))
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Post-transition hook for the presentation layer.
pub trait SessionObserver: Send {
    fn on_transition(&mut self, state: &SessionState);
}

#[derive(Clone, Debug)]
pub enum AttemptRequest {
    Text(String),
    Media(MediaFile),
}

#[derive(Clone, Debug)]
pub struct AttemptOutput {
    pub mode: Mode,
    pub results: Vec<ResultItem>,
}

/// What an attempt was about, kept for the `search_results` event.
#[derive(Clone, Debug, PartialEq)]
pub enum Subject {
    Query(String),
    File { name: String, content_type: String },
}

/// An accepted attempt whose network call has not run yet.
pub struct PendingAttempt {
    generation: u64,
    request: AttemptRequest,
    started: Instant,
    backend: Arc<dyn SearchBackend>,
    pipeline: UploadPipeline,
}

impl PendingAttempt {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> &AttemptRequest {
        &self.request
    }

    pub async fn run(self) -> Completion {
        let (subject, outcome) = match self.request {
            AttemptRequest::Text(query) => {
                let outcome = self
                    .backend
                    .search_text(&query)
                    .await
                    .map(|results| AttemptOutput {
                        mode: Mode::Text,
                        results,
                    });
                (Subject::Query(query), outcome)
            }
            AttemptRequest::Media(file) => {
                let outcome = self
                    .pipeline
                    .run(&file)
                    .await
                    .map(|outcome| AttemptOutput {
                        mode: outcome.kind.mode(),
                        results: outcome.results,
                    });
                let subject = Subject::File {
                    name: file.name,
                    content_type: file.content_type,
                };
                (subject, outcome)
            }
        };

        Completion {
            generation: self.generation,
            elapsed: self.started.elapsed(),
            subject,
            outcome,
        }
    }
}

/// Result of a finished attempt, ready to be handed to [`SearchSession::complete`].
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub elapsed: Duration,
    pub subject: Subject,
    pub outcome: Result<AttemptOutput, SearchError>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Success,
    Failed,
    /// Superseded by `clear()` or a newer attempt; nothing but the status changed.
    Stale,
}

pub struct SearchSession {
    state: SessionState,
    session_id: String,
    generation: u64,
    in_flight: Option<u64>,
    backend: Arc<dyn SearchBackend>,
    pipeline: UploadPipeline,
    players: MediaPlayerRegistry,
    telemetry: Arc<dyn TelemetrySink>,
    observers: Vec<Box<dyn SessionObserver>>,
    scroll: ScrollTracker,
}

impl SearchSession {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        pipeline: UploadPipeline,
        players: MediaPlayerRegistry,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            state: SessionState::default(),
            session_id: rusty_ulid::generate_ulid_string(),
            generation: 0,
            in_flight: None,
            backend,
            pipeline,
            players,
            telemetry,
            observers: vec![],
            scroll: ScrollTracker::default(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn players(&self) -> &MediaPlayerRegistry {
        &self.players
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn backend(&self) -> Arc<dyn SearchBackend> {
        self.backend.clone()
    }

    /// Fetch the index size for display and emit `page_viewed`.
    pub async fn load_index_info(&mut self) {
        let info = self.backend.index_info().await;
        self.apply_index_info(info);
    }

    /// Best effort: a failed stats fetch is logged and the count stays unknown.
    pub fn apply_index_info(&mut self, info: Result<IndexInfo, SearchError>) {
        match info {
            Ok(info) => {
                self.state.total_vectors = Some(info.total_vectors);
                self.commit();
            }
            Err(err) => log::error!("error fetching stats: {err}"),
        }

        self.telemetry.track(
            TelemetryEvent::new(EventName::PageViewed)
                .with("timestamp", chrono::Utc::now().to_rfc3339())
                .with("session_id", self.session_id.clone())
                .with("total_vectors", self.state.total_vectors)
                .with("app_version", env!("CARGO_PKG_VERSION"))
                .with("platform", std::env::consts::OS),
        );
    }

    /// Text input changed.
    pub fn set_query(&mut self, text: &str) {
        self.state.query = text.to_string();
        self.state.suggestions_visible = !text.trim().is_empty();
        self.commit();
    }

    pub fn focus(&mut self) {
        self.state.suggestions_visible = true;
        self.commit();
    }

    pub fn blur(&mut self) {
        self.state.suggestions_visible = false;
        self.commit();
    }

    /// Fill the input with a suggestion. Does not search.
    pub fn select_suggestion(&mut self, text: &str) {
        self.state.query = text.to_string();
        self.state.suggestions_visible = false;
        self.commit();
    }

    /// Submit the current input.
    pub fn submit(&mut self) -> Option<PendingAttempt> {
        if !self.state.can_submit() {
            log::debug!("nothing to submit");
            return None;
        }
        let query = self.state.query.clone();
        self.submit_text(&query)
    }

    /// Start a text search. No-op when the trimmed query is empty or another
    /// attempt is in flight.
    pub fn submit_text(&mut self, query: &str) -> Option<PendingAttempt> {
        if query.trim().is_empty() {
            log::debug!("ignoring empty query");
            return None;
        }
        if self.state.is_busy() {
            log::debug!("ignoring submit while {:?}", self.state.status);
            return None;
        }

        self.state.query = query.to_string();
        self.state.suggestions_visible = false;

        Some(self.begin(
            Status::Searching,
            Some(Mode::Text),
            AttemptRequest::Text(query.to_string()),
        ))
    }

    /// Start an upload search. No-op while another attempt is in flight.
    pub fn submit_file(&mut self, file: MediaFile) -> Option<PendingAttempt> {
        if self.state.is_busy() {
            log::debug!("ignoring {} while {:?}", file.name, self.state.status);
            return None;
        }

        Some(self.begin(Status::Uploading, None, AttemptRequest::Media(file)))
    }

    /// File picked through the file chooser.
    pub fn select_file(&mut self, file: MediaFile) -> Option<PendingAttempt> {
        if self.state.is_busy() {
            log::debug!("ignoring selected file while {:?}", self.state.status);
            return None;
        }

        self.telemetry
            .track(TelemetryEvent::new(EventName::FileSelected));
        self.submit_file(file)
    }

    pub fn drag_enter(&mut self) {
        self.state.dragging = true;
        self.commit();
    }

    pub fn drag_leave(&mut self) {
        self.state.dragging = false;
        self.commit();
    }

    /// A drop always ends the drag; it only starts an attempt when it carried
    /// a file and the session is idle.
    pub fn drop_file(&mut self, file: Option<MediaFile>) -> Option<PendingAttempt> {
        self.state.dragging = false;

        let Some(file) = file else {
            self.commit();
            return None;
        };

        if self.state.is_busy() {
            log::debug!("ignoring dropped {} while {:?}", file.name, self.state.status);
            self.commit();
            return None;
        }

        self.telemetry
            .track(TelemetryEvent::new(EventName::FileDropped));
        self.submit_file(file)
    }

    /// Reset query, results and annotations. Any attempt still in flight is
    /// abandoned: its response will be discarded when it arrives.
    pub fn clear(&mut self) {
        self.generation += 1;

        self.state.query.clear();
        self.state.results.clear();
        self.state.mode = Mode::None;
        self.state.suggestions_visible = false;
        self.reset_annotations();

        self.commit();
    }

    /// Commit a finished attempt.
    pub fn complete(&mut self, completion: Completion) -> Applied {
        if self.in_flight == Some(completion.generation) {
            self.in_flight = None;
            self.state.status = Status::Idle;
        }

        if completion.generation != self.generation {
            log::debug!(
                "discarding stale completion (generation {} != {})",
                completion.generation,
                self.generation
            );
            self.commit();
            return Applied::Stale;
        }

        match completion.outcome {
            Ok(output) => {
                let elapsed_ms = completion.elapsed.as_millis() as u64;

                self.state.results = output.results;
                self.state.mode = output.mode;
                self.state.search_complete = true;
                self.state.search_time_ms = Some(elapsed_ms);
                self.state.error_message = None;
                if output.mode != Mode::Text {
                    self.state.query.clear();
                }
                self.commit();

                log::info!(
                    "{} search returned {} results in {elapsed_ms}ms",
                    self.state.mode,
                    self.state.results.len()
                );

                let mut event = TelemetryEvent::new(EventName::SearchResults)
                    .with("mode", self.state.mode.to_string())
                    .with("elapsed_ms", elapsed_ms)
                    .with("result_count", self.state.results.len());
                event = match completion.subject {
                    Subject::Query(query) => event.with("query", query),
                    Subject::File { name, content_type } => event
                        .with("file_name", name)
                        .with("content_type", content_type),
                };
                self.telemetry.track(event);

                Applied::Success
            }
            Err(err) => {
                err.log();
                self.state.error_message = Some(err.user_message());
                self.commit();

                Applied::Failed
            }
        }
    }

    /// Ready signal from a player.
    pub fn player_ready(&mut self, key: &PlayerKey) -> bool {
        self.players.mark_ready(key)
    }

    /// The user has seen the first `viewed` results.
    pub fn scrolled(&mut self, viewed: usize) -> bool {
        self.scroll
            .observe(viewed, self.state.results.len(), self.telemetry.as_ref())
    }

    /// Submit and wait for the attempt in one step.
    pub async fn run_text(&mut self, query: &str) -> Option<Applied> {
        let pending = self.submit_text(query)?;
        let completion = pending.run().await;
        Some(self.complete(completion))
    }

    pub async fn run_file(&mut self, file: MediaFile) -> Option<Applied> {
        let pending = self.select_file(file)?;
        let completion = pending.run().await;
        Some(self.complete(completion))
    }

    /// Dispose every player. The session stays usable.
    pub fn teardown(&mut self) {
        self.players.dispose_all();
    }

    fn begin(
        &mut self,
        status: Status,
        mode: Option<Mode>,
        request: AttemptRequest,
    ) -> PendingAttempt {
        self.reset_annotations();

        self.generation += 1;
        self.in_flight = Some(self.generation);
        self.state.status = status;
        if let Some(mode) = mode {
            self.state.mode = mode;
        }
        self.commit();

        PendingAttempt {
            generation: self.generation,
            request,
            started: Instant::now(),
            backend: self.backend.clone(),
            pipeline: self.pipeline.clone(),
        }
    }

    fn reset_annotations(&mut self) {
        self.state.search_complete = false;
        self.state.search_time_ms = None;
        self.state.error_message = None;
    }

    /// Runs after every committed transition: players first, then observers.
    fn commit(&mut self) {
        let report = self.players.reconcile(&self.state.results);
        if !report.is_noop() {
            log::debug!(
                "players: {} created, {} disposed",
                report.created.len(),
                report.disposed.len()
            );
        }

        for observer in self.observers.iter_mut() {
            observer.on_transition(&self.state);
        }
    }
}
