//! Interactive shell.
//!
//! Prompts run on a plain thread because `inquire` blocks. Each line becomes
//! one or more [`Intent`]s for the session driver, which runs on the tokio
//! runtime. After an attempt is accepted the prompt thread waits for the
//! renderer to report that the session settled before prompting again.

use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::thread;

use anyhow::{Context, Result};
use inquire::InquireError;

use crate::{
    app::AppFactory,
    cli::render::{format_page, TerminalPlayerFactory, TerminalRenderer},
    config::Config,
    driver::{Intent, IntentSender, SessionDriver},
    session::SessionState,
    upload::MediaFile,
};

/// One parsed shell line.
#[derive(Debug, PartialEq)]
pub enum Line {
    /// Empty input: offer suggestions.
    Suggest,
    Query(String),
    /// An existing file, e.g. a path pasted by dragging a file into the terminal.
    Dropped(String),
    Select(String),
    More,
    Clear,
    Help,
    Quit,
    Unknown(String),
}

impl Line {
    pub fn parse(input: &str, is_file: impl Fn(&str) -> bool) -> Self {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return Line::Suggest;
        }

        if let Some(command) = trimmed.strip_prefix(':') {
            let (name, arg) = command
                .split_once(char::is_whitespace)
                .map(|(name, arg)| (name, arg.trim()))
                .unwrap_or((command, ""));

            return match name {
                "file" | "f" if !arg.is_empty() => Line::Select(unquote(arg).to_string()),
                "more" | "m" => Line::More,
                "clear" | "c" => Line::Clear,
                "help" | "h" => Line::Help,
                "quit" | "q" => Line::Quit,
                _ => Line::Unknown(trimmed.to_string()),
            };
        }

        let path = unquote(trimmed);
        if is_file(path) {
            return Line::Dropped(path.to_string());
        }

        Line::Query(input.to_string())
    }
}

/// Terminals quote dragged paths that contain spaces.
fn unquote(path: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = path
            .strip_prefix(quote)
            .and_then(|p| p.strip_suffix(quote))
        {
            return inner;
        }
    }
    path
}

const HELP: &str = "\
type a query and press enter to search
enter on an empty line to pick a suggestion
paste or drag a file path to search by image or video
:file <path>   search by file
:more          next page of results
:clear         reset
:quit          exit";

struct Prompt {
    intents: IntentSender,
    settled: std_mpsc::Receiver<SessionState>,
    suggestions: Vec<String>,
    page_size: usize,
    last: Option<SessionState>,
    shown: usize,
}

impl Prompt {
    fn send(&self, intent: Intent) -> Result<()> {
        self.intents
            .send(intent)
            .map_err(|_| anyhow::anyhow!("session stopped"))
    }

    /// Block until the running attempt settles.
    fn wait(&mut self) -> Result<()> {
        let state = self.settled.recv().context("session stopped")?;
        self.shown = self.page_size.min(state.results.len());
        self.last = Some(state);
        Ok(())
    }

    fn search(&mut self, query: String) -> Result<()> {
        self.send(Intent::Input(query))?;
        self.send(Intent::Submit)?;
        self.wait()
    }

    fn suggest(&mut self) -> Result<()> {
        self.send(Intent::Focus)?;

        let choice = inquire::Select::new("Try one of", self.suggestions.clone()).prompt();
        match choice {
            // submit() ignores blank input, so there would be nothing to wait for
            Ok(choice) if choice.trim().is_empty() => self.send(Intent::Blur),
            Ok(choice) => {
                self.send(Intent::SelectSuggestion(choice))?;
                self.send(Intent::Submit)?;
                self.wait()
            }
            Err(InquireError::OperationCanceled) => self.send(Intent::Blur),
            Err(err) => Err(err.into()),
        }
    }

    fn upload(&mut self, path: &str, dropped: bool) -> Result<()> {
        if dropped {
            self.send(Intent::DragEnter)?;
        }

        let file = match MediaFile::from_path(Path::new(path)) {
            Ok(file) => file,
            Err(err) => {
                if dropped {
                    self.send(Intent::DragLeave)?;
                }
                eprintln!("{}", err.user_message());
                return Ok(());
            }
        };

        if dropped {
            self.send(Intent::Drop(Some(file)))?;
        } else {
            self.send(Intent::SelectFile(file))?;
        }
        self.wait()
    }

    fn more(&mut self) -> Result<()> {
        let Some(state) = &self.last else {
            println!("nothing to show yet");
            return Ok(());
        };

        let lines = format_page(&state.results, self.shown, self.page_size);
        if lines.is_empty() {
            println!("no more results");
            return Ok(());
        }

        for line in &lines {
            println!("{line}");
        }
        self.shown += lines.len();

        self.send(Intent::Scrolled(self.shown))
    }

    fn clear(&mut self) -> Result<()> {
        self.last = None;
        self.shown = 0;
        self.send(Intent::Clear)
    }

    fn run(mut self) -> Result<()> {
        let result = self.repl();
        if self.intents.send(Intent::Shutdown).is_err() {
            log::debug!("session already stopped");
        }
        result
    }

    fn repl(&mut self) -> Result<()> {
        println!("{HELP}");

        loop {
            let input = match inquire::Text::new("scout>").prompt() {
                Ok(input) => input,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
                Err(err) => return Err(err.into()),
            };

            let line = Line::parse(&input, |p| Path::new(p).is_file());
            log::debug!("shell: {line:?}");

            match line {
                Line::Suggest => self.suggest()?,
                Line::Query(query) => self.search(query)?,
                Line::Dropped(path) => self.upload(&path, true)?,
                Line::Select(path) => self.upload(&path, false)?,
                Line::More => self.more()?,
                Line::Clear => self.clear()?,
                Line::Help => println!("{HELP}"),
                Line::Quit => break,
                Line::Unknown(command) => println!("unknown command {command}, try :help"),
            }
        }

        Ok(())
    }
}

pub fn run(config: &Config) -> Result<()> {
    let backend = AppFactory::create_backend(config)?;
    let telemetry = AppFactory::create_telemetry(config);
    let (players, mut ready) = TerminalPlayerFactory::new();
    let (settled_tx, settled) = std_mpsc::channel();

    let mut session = AppFactory::create_session(config, backend, telemetry, Box::new(players));
    session.add_observer(Box::new(
        TerminalRenderer::new(config.page_size).with_settled(settled_tx),
    ));
    log::debug!("shell session {}", session.session_id());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (driver, intents) = SessionDriver::new(session);

        let forward = intents.clone();
        tokio::spawn(async move {
            while let Some(key) = ready.recv().await {
                if forward.send(Intent::PlayerReady(key)).is_err() {
                    break;
                }
            }
        });

        let prompt = Prompt {
            intents,
            settled,
            suggestions: config.suggestions.clone(),
            page_size: config.page_size,
            last: None,
            shown: 0,
        };
        let prompt = thread::spawn(move || prompt.run());

        driver.run().await;

        match prompt.join() {
            Ok(result) => result,
            Err(_) => anyhow::bail!("shell prompt thread panicked"),
        }
    })
}
