use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use ambience_backend::{Backend, BackendKind, GateError, Handle, Volume};
use ambience_catalog::{Catalog, Track, TrackId};
use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::config::SessionConfig;
use crate::error::{PlaybackCause, PlaybackError};
use crate::gate::{Gate, GateState};
use crate::state::{SessionState, TrackPhase};

/// Outcome of a toggle-style command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Started,
    Stopped,
    /// Another transition for the track was already in flight, or there was
    /// nothing to do.
    Ignored,
}

/// Owns one backend and at most one handle per track.
///
/// All methods take `&self` and must run on a single thread. Commands for
/// different tracks interleave freely; a second command for a track that is
/// mid-transition is ignored.
pub struct Session {
    catalog: Catalog,
    backend: Backend,
    gate: Gate,
    handles: RefCell<HashMap<TrackId, Handle>>,
    transitions: RefCell<HashMap<TrackId, TrackPhase>>,
    closed: Cell<bool>,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(catalog: Catalog, backend: Backend, config: SessionConfig) -> Self {
        backend.configure(&config.policy);

        let gate = Gate::new();
        let mut state = SessionState {
            initialized: gate.observe(&backend) == GateState::Unlocked,
            ..SessionState::default()
        };
        for (id, raw) in &config.volumes {
            match catalog.get(id) {
                Some(track) => {
                    state.volumes.insert(track.id.clone(), Volume::clamped(*raw));
                }
                None => warn!("config sets a volume for unknown track '{id}'"),
            }
        }

        info!(
            "session ready: {} tracks on the {} backend",
            catalog.len(),
            backend.kind()
        );
        let (state, _) = watch::channel(state);
        Self {
            catalog,
            backend,
            gate,
            handles: RefCell::new(HashMap::new()),
            transitions: RefCell::new(HashMap::new()),
            closed: Cell::new(false),
            state,
        }
    }

    /// A session on this platform's default backend.
    pub fn with_platform(catalog: Catalog, config: SessionConfig) -> anyhow::Result<Self> {
        Ok(Self::new(catalog, Backend::detect()?, config))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Every state change is published here.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.state.borrow().is_playing(id)
    }

    pub fn volume(&self, id: &str) -> Volume {
        self.state.borrow().volume(id)
    }

    pub fn phase(&self, id: &str) -> TrackPhase {
        if let Some(phase) = self.transitions.borrow().get(id) {
            return *phase;
        }
        if self.is_playing(id) {
            TrackPhase::Playing
        } else {
            TrackPhase::Idle
        }
    }

    /// Record a sticky volume and forward it to the live handle, if any.
    /// Returns the clamped value.
    pub fn set_volume(&self, id: &str, raw: i64) -> Volume {
        let volume = Volume::clamped(raw);
        let Some(track) = self.catalog.get(id) else {
            warn!("ignoring volume for unknown track '{id}'");
            return volume;
        };

        self.update(|state| {
            state.volumes.insert(track.id.clone(), volume);
        });
        if let Some(handle) = self.handle(&track.id) {
            if let Err(err) = self.backend.set_volume(handle, volume) {
                warn!("'{}': {err}", track.id);
            }
        }
        volume
    }

    pub async fn toggle(&self, id: &str) -> Result<Toggled, PlaybackError> {
        let track = self.track(id)?;
        let playing = self.is_playing(id);
        let phase = if playing {
            TrackPhase::Stopping
        } else {
            TrackPhase::Starting
        };
        let Some(_transition) = Transition::begin(&self.transitions, &track.id, phase) else {
            debug!("'{id}' is busy, toggle ignored");
            return Ok(Toggled::Ignored);
        };

        if playing {
            self.stop_track(track).await;
            Ok(Toggled::Stopped)
        } else {
            self.start_track(track).await?;
            Ok(Toggled::Started)
        }
    }

    /// Pause `id` if it is playing.
    pub async fn stop(&self, id: &str) -> Result<Toggled, PlaybackError> {
        let track = self.track(id)?;
        if !self.is_playing(id) {
            return Ok(Toggled::Ignored);
        }
        let Some(_transition) =
            Transition::begin(&self.transitions, &track.id, TrackPhase::Stopping)
        else {
            return Ok(Toggled::Ignored);
        };

        self.stop_track(track).await;
        Ok(Toggled::Stopped)
    }

    /// Rewind `id` to the start and play it, whether or not it was playing.
    pub async fn restart(&self, id: &str) -> Result<Toggled, PlaybackError> {
        let track = self.track(id)?;
        let Some(transition) = Transition::begin(&self.transitions, &track.id, TrackPhase::Stopping)
        else {
            debug!("'{id}' is busy, restart ignored");
            return Ok(Toggled::Ignored);
        };

        if let Some(handle) = self.handle(&track.id) {
            if let Err(err) = self.backend.stop(handle).await {
                warn!("'{id}': {err}");
            }
            self.set_playing(&track.id, false);
        }

        transition.advance(TrackPhase::Starting);
        self.start_track(track).await?;
        Ok(Toggled::Started)
    }

    /// Stop every playing track. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let playing: Vec<TrackId> = self.state.borrow().playing_tracks().cloned().collect();
        let outcomes = join_all(playing.iter().map(|id| self.stop(id.as_str()))).await;
        outcomes
            .into_iter()
            .filter(|outcome| matches!(outcome, Ok(Toggled::Stopped)))
            .count()
    }

    /// Unlock audio output. Call from a user gesture on platforms that need
    /// one; elsewhere it returns immediately.
    pub async fn unlock_audio(&self) -> Result<(), GateError> {
        self.gate.unlock(&self.backend).await?;
        self.mark_initialized();
        Ok(())
    }

    /// Dispose every handle and close the session. Safe to call repeatedly.
    pub async fn teardown(&self) {
        let first = !self.closed.replace(true);
        let handles: Vec<(TrackId, Handle)> = self.handles.borrow_mut().drain().collect();
        if first {
            info!("tearing down session, releasing {} handles", handles.len());
        }

        for (id, handle) in handles {
            debug!("disposing '{id}'");
            self.backend.dispose(handle).await;
        }
        self.state.send_if_modified(|state| {
            let changed = !state.playing.is_empty();
            state.playing.clear();
            changed
        });
    }

    fn track(&self, id: &str) -> Result<&Track, PlaybackError> {
        if self.closed.get() {
            return Err(PlaybackError::new(&TrackId::new(id), PlaybackCause::SessionClosed));
        }
        self.catalog
            .get(id)
            .ok_or_else(|| PlaybackError::new(&TrackId::new(id), PlaybackCause::UnknownTrack))
    }

    fn handle(&self, id: &TrackId) -> Option<Handle> {
        self.handles.borrow().get(id).copied()
    }

    fn update(&self, modify: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(modify);
    }

    fn set_playing(&self, id: &TrackId, playing: bool) {
        self.update(|state| {
            state.playing.insert(id.clone(), playing);
        });
    }

    fn mark_initialized(&self) {
        if !self.state.borrow().initialized {
            self.update(|state| state.initialized = true);
        }
    }

    fn ensure_open(&self, track: &Track) -> Result<(), PlaybackError> {
        if self.closed.get() {
            return Err(PlaybackError::new(&track.id, PlaybackCause::SessionClosed));
        }
        Ok(())
    }

    async fn start_track(&self, track: &Track) -> Result<(), PlaybackError> {
        if !self.state.borrow().initialized {
            self.unlock_audio()
                .await
                .map_err(|err| PlaybackError::new(&track.id, err))?;
            self.ensure_open(track)?;
        }

        let volume = self.volume(track.id.as_str());
        let handle = match self.handle(&track.id) {
            Some(handle) => {
                if let Err(err) = self.backend.set_volume(handle, volume) {
                    warn!("'{}': {err}", track.id);
                }
                handle
            }
            None => self.acquire(track, volume).await?,
        };

        debug!("starting '{}'", track.id);
        self.backend
            .start(handle)
            .await
            .map_err(|err| PlaybackError::new(&track.id, err))?;
        self.ensure_open(track)?;

        self.set_playing(&track.id, true);
        Ok(())
    }

    async fn acquire(&self, track: &Track, volume: Volume) -> Result<Handle, PlaybackError> {
        let handle = self
            .backend
            .acquire(track, volume)
            .await
            .map_err(|err| PlaybackError::new(&track.id, err))?;

        if self.closed.get() {
            self.backend.dispose(handle).await;
            return Err(PlaybackError::new(&track.id, PlaybackCause::SessionClosed));
        }

        info!("acquired '{}' from {}", track.id, track.source);
        self.handles.borrow_mut().insert(track.id.clone(), handle);

        // The volume may have moved while the handle was loading.
        let current = self.volume(track.id.as_str());
        if current != volume {
            if let Err(err) = self.backend.set_volume(handle, current) {
                warn!("'{}': {err}", track.id);
            }
        }
        Ok(handle)
    }

    /// The intent to stop always wins: a failed pause is logged and the
    /// track is reported stopped anyway.
    async fn stop_track(&self, track: &Track) {
        if let Some(handle) = self.handle(&track.id) {
            debug!("pausing '{}'", track.id);
            if let Err(err) = self.backend.pause(handle).await {
                warn!("'{}': {err}", track.id);
            }
        }
        if !self.closed.get() {
            self.set_playing(&track.id, false);
        }
    }
}

/// Marks a track as mid-transition until dropped.
struct Transition<'a> {
    transitions: &'a RefCell<HashMap<TrackId, TrackPhase>>,
    track: TrackId,
}

impl<'a> Transition<'a> {
    fn begin(
        transitions: &'a RefCell<HashMap<TrackId, TrackPhase>>,
        track: &TrackId,
        phase: TrackPhase,
    ) -> Option<Self> {
        let mut in_flight = transitions.borrow_mut();
        if in_flight.contains_key(track) {
            return None;
        }
        in_flight.insert(track.clone(), phase);
        Some(Self {
            transitions,
            track: track.clone(),
        })
    }

    fn advance(&self, phase: TrackPhase) {
        if let Some(current) = self.transitions.borrow_mut().get_mut(&self.track) {
            *current = phase;
        }
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        self.transitions.borrow_mut().remove(&self.track);
    }
}
