use ambience_backend::{BackendAcquireError, BackendPlayError, GateError};
use ambience_catalog::TrackId;
use thiserror::Error;

/// A track failed to start. Only that track is affected; the session keeps
/// running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot play '{track}': {cause}")]
pub struct PlaybackError {
    pub track: TrackId,
    #[source]
    pub cause: PlaybackCause,
}

impl PlaybackError {
    pub fn new(track: &TrackId, cause: impl Into<PlaybackCause>) -> Self {
        Self {
            track: track.clone(),
            cause: cause.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackCause {
    #[error(transparent)]
    Acquire(#[from] BackendAcquireError),

    #[error(transparent)]
    Play(#[from] BackendPlayError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("track is not in the catalog")]
    UnknownTrack,

    #[error("session has been torn down")]
    SessionClosed,
}
