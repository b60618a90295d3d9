//! Queue state machine
//!
//! Three parts: the current track, the upcoming list (next first), and the
//! played list (most recent first). The current track is never also present
//! in `upcoming` or `played`.
//!
//! `advance` and `go_back` are exact mirrors: with nothing else in between,
//! one undoes the other.

use serde::{Deserialize, Serialize};
use soul_core::types::{Track, TrackId};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Observable queue state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    /// Track being played
    pub current: Option<Track>,
    /// Tracks to play next, in order
    pub upcoming: VecDeque<Track>,
    /// Tracks already played, most recent first
    pub played: VecDeque<Track>,
}

/// Queue engine
#[derive(Debug, Clone, Default)]
pub struct QueueEngine {
    state: QueueState,
}

impl QueueEngine {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue from existing state
    pub fn from_state(state: QueueState) -> Self {
        Self { state }
    }

    /// Current state
    pub fn state(&self) -> &QueueState {
        &self.state
    }

    /// Current track
    pub fn current(&self) -> Option<&Track> {
        self.state.current.as_ref()
    }

    /// Upcoming tracks
    pub fn upcoming(&self) -> &VecDeque<Track> {
        &self.state.upcoming
    }

    /// Played tracks, most recent first
    pub fn played(&self) -> &VecDeque<Track> {
        &self.state.played
    }

    /// Move to the next track
    ///
    /// The current track goes to the front of `played`. Returns `None` and
    /// leaves the queue untouched when `upcoming` is empty.
    ///
    /// With nothing current the head of `upcoming` is promoted and `played`
    /// is left alone. [`go_back`](Self::go_back) never clears the current
    /// track, so that step is not undone.
    pub fn advance(&mut self) -> Option<&Track> {
        let next = self.state.upcoming.pop_front()?;
        if let Some(previous) = self.state.current.replace(next) {
            self.state.played.push_front(previous);
        }
        self.state.current.as_ref()
    }

    /// Move to the previous track
    ///
    /// The current track goes to the front of `upcoming`. Returns `None` and
    /// leaves the queue untouched when `played` is empty or nothing is current.
    pub fn go_back(&mut self) -> Option<&Track> {
        if self.state.current.is_none() {
            return None;
        }
        let previous = self.state.played.pop_front()?;
        if let Some(current) = self.state.current.replace(previous) {
            self.state.upcoming.push_front(current);
        }
        self.state.current.as_ref()
    }

    /// Append a track to the end of `upcoming`
    ///
    /// The current track is not enqueued. A track already waiting in
    /// `upcoming` moves to the back. Returns `false` if nothing changed.
    pub fn enqueue_next(&mut self, track: Track) -> bool {
        if self.state.current.as_ref() == Some(&track) {
            debug!(track_id = %track.id, "Ignoring enqueue of the current track");
            return false;
        }
        self.state.upcoming.retain(|t| t != &track);
        self.state.upcoming.push_back(track);
        true
    }

    /// Make `track` current right away
    ///
    /// The displaced current track (if any, and if different) is pushed to the
    /// front of `played` and returned.
    pub fn play_immediately(&mut self, track: Track) -> Option<Track> {
        self.state.upcoming.retain(|t| t != &track);
        self.state.played.retain(|t| t != &track);

        let displaced = match self.state.current.take() {
            Some(previous) if previous != track => {
                self.state.played.push_front(previous.clone());
                Some(previous)
            }
            _ => None,
        };
        self.state.current = Some(track);
        displaced
    }

    /// Replace the queue with a collection split around `track`
    ///
    /// Tracks before the selection become `played` (most recent first), tracks
    /// after it become `upcoming`. If the selection is not in the collection
    /// the whole collection becomes `upcoming`.
    pub fn play_from_collection(&mut self, track: Track, collection: &[Track]) {
        let position = collection.iter().position(|t| t == &track);

        let (before, after) = match position {
            Some(index) => (&collection[..index], &collection[index + 1..]),
            None => (&collection[..0], collection),
        };

        // First occurrence wins if the collection repeats an id
        let mut seen: HashSet<&TrackId> = HashSet::new();
        seen.insert(&track.id);

        let mut played = VecDeque::with_capacity(before.len());
        for t in before {
            if seen.insert(&t.id) {
                played.push_front(t.clone());
            }
        }

        let mut upcoming = VecDeque::with_capacity(after.len());
        for t in after {
            if seen.insert(&t.id) {
                upcoming.push_back(t.clone());
            }
        }

        debug!(
            track_id = %track.id,
            played = played.len(),
            upcoming = upcoming.len(),
            "Queue replaced from collection"
        );

        self.state = QueueState {
            current: Some(track),
            upcoming,
            played,
        };
    }

    /// Empty the queue
    pub fn clear(&mut self) {
        self.state = QueueState::default();
    }
}
