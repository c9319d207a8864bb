//! Platform audio primitives.
//!
//! Two families of platform APIs exist and they disagree on where the
//! asynchrony sits: a browser-style media element is created synchronously and
//! played asynchronously, a mobile-style sound object is loaded asynchronously
//! and has its volume set synchronously. Each family gets its own trait.
//!
//! Everything here runs on a single cooperative thread, hence `?Send`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundId(pub u64);

/// Media-element style API (`new Audio(src)`, `play()`, `pause()`).
#[async_trait(?Send)]
pub trait ElementDriver {
    /// Create an element bound to `src`. Nothing is fetched until played.
    fn create(&self, src: &str) -> anyhow::Result<ElementId>;

    fn set_looping(&self, id: ElementId, looping: bool) -> anyhow::Result<()>;

    /// `volume` is a linear gain in `0.0..=1.0`.
    fn set_volume(&self, id: ElementId, volume: f32) -> anyhow::Result<()>;

    fn set_current_time(&self, id: ElementId, seconds: f64) -> anyhow::Result<()>;

    /// Resolves once playback actually began; rejects on autoplay denial.
    async fn play(&self, id: ElementId) -> anyhow::Result<()>;

    fn pause(&self, id: ElementId) -> anyhow::Result<()>;

    /// Detach the element from its source so the platform can free it.
    fn release(&self, id: ElementId);

    /// Resume (creating if needed) the page's audio output. Only succeeds
    /// from within a user gesture on most browsers.
    async fn resume_output(&self) -> anyhow::Result<()>;
}

/// Options applied when a sound object is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundOptions {
    pub looping: bool,
    pub volume: f32,
    pub should_play: bool,
}

/// How the app's audio should coexist with the rest of the device. Forwarded
/// once to the platform; the platform's own policy does the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSessionPolicy {
    pub plays_in_silent_mode: bool,
    pub stays_active_in_background: bool,
    pub duck_others: bool,
}

impl Default for AudioSessionPolicy {
    fn default() -> Self {
        Self {
            plays_in_silent_mode: true,
            stays_active_in_background: true,
            duck_others: false,
        }
    }
}

/// Sound-object style API (`createAsync`, `playAsync`, `setVolumeAsync`).
#[async_trait(?Send)]
pub trait NativeDriver {
    fn configure(&self, policy: &AudioSessionPolicy) -> anyhow::Result<()>;

    async fn load(&self, uri: &str, options: SoundOptions) -> anyhow::Result<SoundId>;

    async fn play(&self, id: SoundId) -> anyhow::Result<()>;

    async fn pause(&self, id: SoundId) -> anyhow::Result<()>;

    /// Pause and rewind to the start.
    async fn stop(&self, id: SoundId) -> anyhow::Result<()>;

    fn set_volume(&self, id: SoundId, volume: f32) -> anyhow::Result<()>;

    async fn unload(&self, id: SoundId) -> anyhow::Result<()>;
}
