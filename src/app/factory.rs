use crate::{
    app::{backend::SearchBackend, remote::RemoteBackend},
    config::{Config, Environment},
    players::{MediaPlayerRegistry, PlayerFactory},
    session::SearchSession,
    telemetry::{HttpTelemetry, LogTelemetry, NoopTelemetry, TelemetrySink},
    upload::UploadPipeline,
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::sync::Arc;

/// Wires configuration, backend, telemetry and players into a session.
pub struct AppFactory;

impl AppFactory {
    /// Load config from the base path, then apply environment overrides.
    /// `env` (from the command line) wins over SCOUT_ENV.
    pub fn create_config(env: Option<Environment>) -> Result<Config> {
        let base_path = Self::get_base_path()?;
        let mut config = Config::load_with(&base_path)?;

        config.apply_env(|key| std::env::var(key).ok())?;
        if let Some(env) = env {
            config.environment = env;
        }

        Ok(config)
    }

    /// SCOUT_BASE_PATH, or ~/.local/share/scout
    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("SCOUT_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;

        Ok(format!("{}/.local/share/scout", home.to_string_lossy()))
    }

    pub fn create_backend(config: &Config) -> Result<Arc<dyn SearchBackend>> {
        let base_url = config.base_url()?;
        log::info!("using backend {base_url} ({:?})", config.environment);
        Ok(Arc::new(RemoteBackend::new(&base_url)))
    }

    pub fn create_telemetry(config: &Config) -> Arc<dyn TelemetrySink> {
        if !config.telemetry.enabled {
            return Arc::new(NoopTelemetry);
        }

        match &config.telemetry.endpoint {
            Some(endpoint) => Arc::new(HttpTelemetry::new(endpoint)),
            None => Arc::new(LogTelemetry),
        }
    }

    pub fn create_session(
        config: &Config,
        backend: Arc<dyn SearchBackend>,
        telemetry: Arc<dyn TelemetrySink>,
        players: Box<dyn PlayerFactory>,
    ) -> SearchSession {
        let pipeline = UploadPipeline::new(backend.clone(), config.max_video_bytes);
        SearchSession::new(
            backend,
            pipeline,
            MediaPlayerRegistry::new(players),
            telemetry,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::{MockBackend, RecordingPlayers};

    #[test]
    fn test_telemetry_selection() {
        let mut config = Config::default();
        // disabled sink accepts events silently
        AppFactory::create_telemetry(&config)
            .track(crate::telemetry::TelemetryEvent::new(crate::telemetry::EventName::PageViewed));

        config.telemetry.enabled = true;
        AppFactory::create_telemetry(&config)
            .track(crate::telemetry::TelemetryEvent::new(crate::telemetry::EventName::PageViewed));
    }

    #[test]
    fn test_create_backend_rejects_bad_environment() {
        let mut config = Config::default();
        config.environment = Environment::Preview;
        assert!(AppFactory::create_backend(&config).is_err());
    }

    #[test]
    fn test_create_session_starts_idle() {
        let config = Config::default();
        let session = AppFactory::create_session(
            &config,
            Arc::new(MockBackend::default()),
            Arc::new(NoopTelemetry),
            Box::new(RecordingPlayers::default()),
        );

        assert!(!session.state().is_busy());
        assert!(session.players().is_empty());
        assert_eq!(session.generation(), 0);
    }
}
