use std::collections::BTreeMap;

use ambience_backend::Volume;
use ambience_catalog::TrackId;
use serde::Serialize;

/// Where a track is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackPhase {
    Idle,
    Starting,
    Playing,
    Stopping,
}

/// What the view layer renders from. Tracks without an entry are at the
/// default volume and not playing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub volumes: BTreeMap<TrackId, Volume>,
    pub playing: BTreeMap<TrackId, bool>,
    pub initialized: bool,
}

impl SessionState {
    pub fn volume(&self, id: &str) -> Volume {
        self.volumes.get(id).copied().unwrap_or_default()
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.playing.get(id).copied().unwrap_or(false)
    }

    pub fn playing_tracks(&self) -> impl Iterator<Item = &TrackId> {
        self.playing
            .iter()
            .filter(|(_, playing)| **playing)
            .map(|(id, _)| id)
    }
}
