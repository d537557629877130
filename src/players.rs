//! Pool of per-result playback handles.
//!
//! The registry is owned by one session and reconciled against that
//! session's result set after every committed transition. After a pass the
//! live key set equals the set of video hits in `results`, exactly.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;

use crate::results::ResultItem;

/// Stable handle identifier: position plus source url, so re-rendering an
/// unchanged result set maps onto the same keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerKey(String);

impl PlayerKey {
    pub fn for_result(index: usize, item: &ResultItem) -> Self {
        PlayerKey(format!("video-{index}-{}", item.source_url))
    }
}

impl Display for PlayerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerOptions {
    /// width:height
    pub aspect_ratio: (u32, u32),
    pub fluid: bool,
    pub controls: bool,
    pub muted: bool,
    /// Start buffering as soon as the player exists
    pub preload: bool,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            aspect_ratio: (1, 1),
            fluid: true,
            controls: true,
            muted: true,
            preload: true,
        }
    }
}

/// One underlying playback resource.
pub trait Player: Send {
    fn seek(&mut self, seconds: f64);
    fn dispose(&mut self);
}

pub trait PlayerFactory: Send {
    /// Create and configure a player. The environment reports readiness later
    /// through [`MediaPlayerRegistry::mark_ready`].
    fn create(&self, key: &PlayerKey, item: &ResultItem, options: &PlayerOptions)
        -> Box<dyn Player>;
}

struct PlayerHandle {
    player: Box<dyn Player>,
    start_offset_sec: f64,
    seeked: bool,
}

/// What a reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconciliation {
    pub created: Vec<PlayerKey>,
    pub disposed: Vec<PlayerKey>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.disposed.is_empty()
    }
}

pub struct MediaPlayerRegistry {
    factory: Box<dyn PlayerFactory>,
    options: PlayerOptions,
    handles: HashMap<PlayerKey, PlayerHandle>,
}

impl MediaPlayerRegistry {
    pub fn new(factory: Box<dyn PlayerFactory>) -> Self {
        Self {
            factory,
            options: PlayerOptions::default(),
            handles: HashMap::new(),
        }
    }

    /// Bring the live handle set into agreement with `results`.
    ///
    /// Runs to completion synchronously; running it twice on the same
    /// results creates and disposes nothing the second time.
    pub fn reconcile(&mut self, results: &[ResultItem]) -> Reconciliation {
        let wanted: Vec<(PlayerKey, &ResultItem)> = results
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_video())
            .map(|(idx, item)| (PlayerKey::for_result(idx, item), item))
            .collect();
        let wanted_keys: BTreeSet<&PlayerKey> = wanted.iter().map(|(key, _)| key).collect();

        let mut report = Reconciliation::default();

        let mut stale: Vec<PlayerKey> = self
            .handles
            .keys()
            .filter(|key| !wanted_keys.contains(key))
            .cloned()
            .collect();
        stale.sort();

        for key in stale {
            if let Some(mut handle) = self.handles.remove(&key) {
                handle.player.dispose();
                log::debug!("disposed player {key}");
                report.disposed.push(key);
            }
        }

        for (key, item) in wanted {
            if self.handles.contains_key(&key) {
                continue;
            }

            let player = self.factory.create(&key, item, &self.options);
            log::debug!("created player {key}");
            self.handles.insert(
                key.clone(),
                PlayerHandle {
                    player,
                    start_offset_sec: item.start_offset_sec,
                    seeked: false,
                },
            );
            report.created.push(key);
        }

        report
    }

    /// Ready signal for `key`. Seeks to the clip start the first time only;
    /// signals for unknown (already disposed) keys are ignored.
    pub fn mark_ready(&mut self, key: &PlayerKey) -> bool {
        let Some(handle) = self.handles.get_mut(key) else {
            log::debug!("ready signal for unknown player {key}");
            return false;
        };

        if handle.seeked {
            return false;
        }

        handle.player.seek(handle.start_offset_sec);
        handle.seeked = true;
        true
    }

    /// Dispose every remaining handle. Used on session teardown.
    pub fn dispose_all(&mut self) -> usize {
        let keys = self.keys();

        for key in &keys {
            if let Some(mut handle) = self.handles.remove(key) {
                handle.player.dispose();
            }
        }

        if !keys.is_empty() {
            log::debug!("disposed {} players on teardown", keys.len());
        }
        keys.len()
    }

    pub fn keys(&self) -> BTreeSet<PlayerKey> {
        self.handles.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for MediaPlayerRegistry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::{image_item, video_item, PlayerEvent, RecordingPlayers};

    fn video_keys(results: &[ResultItem]) -> BTreeSet<PlayerKey> {
        results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_video())
            .map(|(i, r)| PlayerKey::for_result(i, r))
            .collect()
    }

    #[test]
    fn test_reconcile_matches_video_results() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));

        let results = vec![
            image_item("a.png", 0.9),
            video_item("b.mp4", 3.0),
            video_item("c.mp4", 7.0),
        ];

        let report = registry.reconcile(&results);
        assert_eq!(report.created.len(), 2);
        assert!(report.disposed.is_empty());
        assert_eq!(registry.keys(), video_keys(&results));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));
        let results = vec![video_item("b.mp4", 3.0), video_item("c.mp4", 7.0)];

        registry.reconcile(&results);
        let events_after_first = players.events().len();

        let second = registry.reconcile(&results);
        assert!(second.is_noop());
        assert_eq!(players.events().len(), events_after_first);
    }

    #[test]
    fn test_reconcile_disposes_removed() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));

        registry.reconcile(&[video_item("b.mp4", 3.0), video_item("c.mp4", 7.0)]);
        let next = vec![video_item("c.mp4", 7.0)];
        let report = registry.reconcile(&next);

        // every old key is positional, so both go and one comes back at index 0
        assert_eq!(report.disposed.len(), 2);
        assert_eq!(report.created.len(), 1);
        assert_eq!(registry.keys(), video_keys(&next));
        assert_eq!(players.disposed_count(), 2);
    }

    #[test]
    fn test_empty_results_dispose_everything() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));

        registry.reconcile(&[video_item("b.mp4", 3.0)]);
        registry.reconcile(&[]);

        assert!(registry.is_empty());
        assert_eq!(players.disposed_count(), 1);
    }

    #[test]
    fn test_seek_once_after_ready() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));

        let results = vec![video_item("b.mp4", 12.0)];
        registry.reconcile(&results);
        let key = PlayerKey::for_result(0, &results[0]);

        // no seek before the ready signal
        assert!(!players
            .events()
            .iter()
            .any(|e| matches!(e, PlayerEvent::Seek(..))));

        assert!(registry.mark_ready(&key));
        assert!(!registry.mark_ready(&key));

        let seeks: Vec<_> = players
            .events()
            .into_iter()
            .filter(|e| matches!(e, PlayerEvent::Seek(..)))
            .collect();
        assert_eq!(seeks, vec![PlayerEvent::Seek(key, 12.0)]);
    }

    #[test]
    fn test_ready_for_disposed_player_is_ignored() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));

        let results = vec![video_item("b.mp4", 12.0)];
        registry.reconcile(&results);
        let key = PlayerKey::for_result(0, &results[0]);
        registry.reconcile(&[]);

        assert!(!registry.mark_ready(&key));
    }

    #[test]
    fn test_created_with_square_muted_controls() {
        let players = RecordingPlayers::default();
        let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));
        registry.reconcile(&[video_item("b.mp4", 1.0)]);

        let options = players.last_options().unwrap();
        assert_eq!(options.aspect_ratio, (1, 1));
        assert!(options.controls);
        assert!(options.muted);
        assert!(options.fluid);
        assert!(options.preload);
    }

    #[test]
    fn test_drop_disposes_all() {
        let players = RecordingPlayers::default();
        {
            let mut registry = MediaPlayerRegistry::new(Box::new(players.clone()));
            registry.reconcile(&[video_item("b.mp4", 1.0), video_item("c.mp4", 2.0)]);
        }
        assert_eq!(players.disposed_count(), 2);
    }
}
