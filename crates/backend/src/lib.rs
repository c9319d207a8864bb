//! Playback backends for the ambient mixer.
//!
//! A [`Backend`] is one of two closed variants, picked once at startup and
//! never mixed: [`ElementBackend`] for browser-style media elements and
//! [`NativeBackend`] for sound objects. Both expose the same operations over
//! an opaque [`Handle`].

mod driver;
mod element;
mod error;
mod native;
mod volume;

#[cfg(not(target_arch = "wasm32"))]
pub mod mixer;
#[cfg(all(any(test, feature = "testing"), not(target_arch = "wasm32")))]
pub mod testing;
#[cfg(target_arch = "wasm32")]
pub mod web;

use std::fmt;

use ambience_catalog::Track;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;

pub use driver::{
    AudioSessionPolicy, ElementDriver, ElementId, NativeDriver, SoundId, SoundOptions,
};
pub use element::ElementBackend;
pub use error::{BackendAcquireError, BackendCallError, BackendPlayError, GateError};
pub use native::NativeBackend;
pub use volume::{DEFAULT_VOLUME, MAX_VOLUME, Volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Element,
    Native,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Element => f.write_str("element"),
            BackendKind::Native => f.write_str("native"),
        }
    }
}

/// A backend-owned playable resource. Handles from the other variant are
/// treated as never acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(Slot);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Element(ElementId),
    Native(SoundId),
}

pub enum Backend {
    Element(ElementBackend),
    Native(NativeBackend),
}

impl Backend {
    pub fn element(driver: impl ElementDriver + 'static) -> Self {
        Backend::Element(ElementBackend::new(driver))
    }

    pub fn native(driver: impl NativeDriver + 'static) -> Self {
        Backend::Native(NativeBackend::new(driver))
    }

    /// The platform's backend: media elements in the browser, the cpal mixer
    /// everywhere else.
    #[cfg(target_arch = "wasm32")]
    pub fn detect() -> anyhow::Result<Self> {
        Ok(Self::element(web::WebAudioDriver::new()))
    }

    /// The platform's backend: media elements in the browser, the cpal mixer
    /// everywhere else.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn detect() -> anyhow::Result<Self> {
        Ok(Self::native(mixer::MixerDriver::start()?))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Element(_) => BackendKind::Element,
            Backend::Native(_) => BackendKind::Native,
        }
    }

    /// Whether audio must be unlocked by a user gesture before it can play.
    pub fn requires_unlock(&self) -> bool {
        matches!(self, Backend::Element(_))
    }

    /// Forward the app's audio policy to the platform. Only sound-object
    /// platforms have one.
    pub fn configure(&self, policy: &AudioSessionPolicy) {
        if let Backend::Native(backend) = self {
            backend.configure(policy);
        }
    }

    pub fn unlock(&self) -> LocalBoxFuture<'static, Result<(), GateError>> {
        match self {
            Backend::Element(backend) => backend.unlock(),
            Backend::Native(_) => futures_util::future::ready(Ok(())).boxed_local(),
        }
    }

    /// Allocate a looping resource for `track` at `volume`. On failure
    /// nothing stays allocated.
    pub async fn acquire(&self, track: &Track, volume: Volume) -> Result<Handle, BackendAcquireError> {
        match self {
            Backend::Element(backend) => backend
                .acquire(track, volume)
                .map(|id| Handle(Slot::Element(id))),
            Backend::Native(backend) => backend
                .acquire(track, volume)
                .await
                .map(|id| Handle(Slot::Native(id))),
        }
    }

    pub async fn start(&self, handle: Handle) -> Result<(), BackendPlayError> {
        match (self, handle.0) {
            (Backend::Element(backend), Slot::Element(id)) => backend.start(id).await,
            (Backend::Native(backend), Slot::Native(id)) => backend.start(id).await,
            _ => Err(mismatch()),
        }
    }

    /// Halt output, keeping the position. Pausing a paused handle is fine.
    pub async fn pause(&self, handle: Handle) -> Result<(), BackendCallError> {
        match (self, handle.0) {
            (Backend::Element(backend), Slot::Element(id)) => backend.pause(id),
            (Backend::Native(backend), Slot::Native(id)) => backend.pause(id).await,
            _ => Ok(()),
        }
    }

    /// Halt output and rewind to the start.
    pub async fn stop(&self, handle: Handle) -> Result<(), BackendCallError> {
        match (self, handle.0) {
            (Backend::Element(backend), Slot::Element(id)) => backend.stop(id),
            (Backend::Native(backend), Slot::Native(id)) => backend.stop(id).await,
            _ => Ok(()),
        }
    }

    pub fn set_volume(&self, handle: Handle, volume: Volume) -> Result<(), BackendCallError> {
        match (self, handle.0) {
            (Backend::Element(backend), Slot::Element(id)) => backend.set_volume(id, volume),
            (Backend::Native(backend), Slot::Native(id)) => backend.set_volume(id, volume),
            _ => Ok(()),
        }
    }

    pub async fn dispose(&self, handle: Handle) {
        match (self, handle.0) {
            (Backend::Element(backend), Slot::Element(id)) => backend.dispose(id),
            (Backend::Native(backend), Slot::Native(id)) => backend.dispose(id).await,
            _ => {}
        }
    }
}

fn mismatch() -> BackendPlayError {
    BackendPlayError {
        reason: "handle belongs to a different backend".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeElementDriver, FakeNativeDriver};

    fn rain() -> Track {
        Track::new("rain", "Rain", "#4a90e2", "rain.ogg")
    }

    #[tokio::test]
    async fn test_kinds() {
        let (element, _) = FakeElementDriver::new();
        let (native, _) = FakeNativeDriver::new();

        let element = Backend::element(element);
        let native = Backend::native(native);

        assert_eq!(element.kind(), BackendKind::Element);
        assert!(element.requires_unlock());
        assert_eq!(native.kind(), BackendKind::Native);
        assert!(!native.requires_unlock());
    }

    #[tokio::test]
    async fn test_native_unlock_is_immediate() {
        let (driver, script) = FakeNativeDriver::new();
        let backend = Backend::native(driver);

        backend.unlock().await.expect("native never locks");
        assert!(script.calls().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_handle_is_ignored() {
        let (element_driver, element_script) = FakeElementDriver::new();
        let (native_driver, native_script) = FakeNativeDriver::new();
        let element = Backend::element(element_driver);
        let native = Backend::native(native_driver);

        let native_handle = native.acquire(&rain(), Volume::DEFAULT).await.expect("acquire");
        element_script.clear();

        element.set_volume(native_handle, Volume::FULL).expect("no-op");
        element.pause(native_handle).await.expect("no-op");
        element.dispose(native_handle).await;
        assert!(element.start(native_handle).await.is_err());
        assert!(element_script.calls().is_empty());
        assert_eq!(native_script.count(|c| matches!(c, Call::Load { .. })), 1);
    }

    #[tokio::test]
    async fn test_element_round_trip() {
        let (driver, script) = FakeElementDriver::new();
        let backend = Backend::element(driver);

        let handle = backend.acquire(&rain(), Volume::DEFAULT).await.expect("acquire");
        backend.start(handle).await.expect("start");
        backend.pause(handle).await.expect("pause");
        backend.pause(handle).await.expect("pausing twice is fine");
        backend.dispose(handle).await;

        assert_eq!(script.count(|c| matches!(c, Call::Play(_))), 1);
        assert_eq!(script.count(|c| matches!(c, Call::Pause(_))), 3);
        assert_eq!(script.count(|c| matches!(c, Call::Release(_))), 1);
    }

    #[tokio::test]
    async fn test_native_play_rejection_surfaces() {
        let (driver, script) = FakeNativeDriver::new();
        script.reject_play("rain.ogg");
        let backend = Backend::native(driver);

        let handle = backend.acquire(&rain(), Volume::DEFAULT).await.expect("acquire");
        let err = backend.start(handle).await.expect_err("play rejected");
        assert!(err.reason.contains("NotAllowedError"));
    }
}
