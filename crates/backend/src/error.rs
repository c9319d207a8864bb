//! Errors surfaced by the playback backends.
//!
//! All of them carry a rendered reason string rather than the driver's error
//! value, so they stay `Clone` and can be handed to several waiters.

use thiserror::Error;

/// A playable resource could not be created for a track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load '{locator}': {reason}")]
pub struct BackendAcquireError {
    pub locator: String,
    pub reason: String,
}

/// The platform refused to start playback (autoplay policy, lost device, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("playback rejected: {reason}")]
pub struct BackendPlayError {
    pub reason: String,
}

/// The audio output could not be unlocked. Retrying on a later user gesture is
/// expected to work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("audio unlock failed: {reason}")]
pub struct GateError {
    pub reason: String,
}

/// A best-effort platform call (pause, stop, volume, dispose) failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} failed: {reason}")]
pub struct BackendCallError {
    pub op: &'static str,
    pub reason: String,
}

pub(crate) fn reason(err: &anyhow::Error) -> String {
    format!("{err:#}")
}
