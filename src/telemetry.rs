//! Fire-and-forget analytics.
//!
//! Sinks never report failure to the caller and never block the session:
//! a dropped event is logged and forgotten.

use std::fmt::Display;

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    PageViewed,
    ScrollDepth,
    FileSelected,
    FileDropped,
    SearchResults,
}

impl Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventName::PageViewed => "page_viewed",
            EventName::ScrollDepth => "scroll_depth",
            EventName::FileSelected => "file_selected",
            EventName::FileDropped => "file_dropped",
            EventName::SearchResults => "search_results",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TelemetryEvent {
    pub name: EventName,
    pub props: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn new(name: EventName) -> Self {
        Self {
            name,
            props: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }
}

pub trait TelemetrySink: Send + Sync {
    fn track(&self, event: TelemetryEvent);
}

pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn track(&self, _event: TelemetryEvent) {}
}

/// Writes events to the log.
pub struct LogTelemetry;

impl TelemetrySink for LogTelemetry {
    fn track(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event.props) {
            Ok(props) => log::info!("telemetry {}: {props}", event.name),
            Err(err) => log::warn!("telemetry {}: unserializable props: {err}", event.name),
        }
    }
}

/// Posts events to a collector endpoint on a detached task.
pub struct HttpTelemetry {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTelemetry {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl TelemetrySink for HttpTelemetry {
    fn track(&self, event: TelemetryEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("telemetry {} dropped: no runtime", event.name);
            return;
        };

        let request = self.client.post(&self.endpoint).json(&event);
        runtime.spawn(async move {
            match request.send().await {
                Ok(resp) if !resp.status().is_success() => {
                    log::debug!("telemetry {} rejected: {}", event.name, resp.status())
                }
                Ok(_) => {}
                Err(err) => log::debug!("telemetry {} dropped: {err}", event.name),
            }
        });
    }
}

/// Emits `scroll_depth` once, the first time the viewed share of the result
/// list goes past half.
#[derive(Debug, Default)]
pub struct ScrollTracker {
    tracked: bool,
}

impl ScrollTracker {
    pub fn observe(&mut self, viewed: usize, total: usize, sink: &dyn TelemetrySink) -> bool {
        if self.tracked || total == 0 {
            return false;
        }

        let pct = viewed as f64 / total as f64 * 100.0;
        if pct > 50.0 {
            sink.track(TelemetryEvent::new(EventName::ScrollDepth).with("depth", "50%"));
            self.tracked = true;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::RecordingTelemetry;

    #[test]
    fn test_event_builder() {
        let event = TelemetryEvent::new(EventName::SearchResults)
            .with("mode", "text")
            .with("elapsed_ms", 42);

        assert_eq!(event.props["mode"], "text");
        assert_eq!(event.props["elapsed_ms"], 42);
        assert_eq!(event.name.to_string(), "search_results");
    }

    #[test]
    fn test_scroll_depth_fires_once() {
        let sink = RecordingTelemetry::default();
        let mut tracker = ScrollTracker::default();

        assert!(!tracker.observe(12, 30, &sink));
        assert!(tracker.observe(24, 30, &sink));
        assert!(!tracker.observe(30, 30, &sink));

        assert_eq!(sink.names(), vec![EventName::ScrollDepth]);
    }

    #[test]
    fn test_scroll_depth_ignores_empty() {
        let sink = RecordingTelemetry::default();
        let mut tracker = ScrollTracker::default();
        assert!(!tracker.observe(0, 0, &sink));
        assert!(sink.names().is_empty());
    }

    #[test]
    fn test_http_telemetry_without_runtime_is_silent() {
        HttpTelemetry::new("http://127.0.0.1:9/events").track(TelemetryEvent::new(EventName::PageViewed));
    }
}
