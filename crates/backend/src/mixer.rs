//! Native driver over the in-process cpal mixer.

use std::cell::{Cell, RefCell};

use ambience_catalog::SourceLocator;
use ambience_engine::{MixerHandle, VoiceId};
use async_trait::async_trait;
use log::{debug, info};

use crate::driver::{AudioSessionPolicy, NativeDriver, SoundId, SoundOptions};

pub struct MixerDriver {
    mixer: RefCell<MixerHandle>,
    next_id: Cell<u64>,
}

impl MixerDriver {
    /// Open the default output device.
    pub fn start() -> anyhow::Result<Self> {
        Ok(Self::with_mixer(ambience_engine::start()?))
    }

    pub fn with_mixer(mixer: MixerHandle) -> Self {
        Self {
            mixer: RefCell::new(mixer),
            next_id: Cell::new(0),
        }
    }
}

#[async_trait(?Send)]
impl NativeDriver for MixerDriver {
    fn configure(&self, policy: &AudioSessionPolicy) -> anyhow::Result<()> {
        // Desktop output has no session category; the OS mixer decides.
        info!(
            "desktop output ignores session policy (silent mode: {}, background: {}, duck others: {})",
            policy.plays_in_silent_mode, policy.stays_active_in_background, policy.duck_others
        );
        Ok(())
    }

    async fn load(&self, uri: &str, options: SoundOptions) -> anyhow::Result<SoundId> {
        let sample_rate = self.mixer.borrow().sample_rate();
        let locator = SourceLocator(uri.to_string());
        let audio = tokio::task::spawn_blocking(move || {
            ambience_decode::load_source(&locator, sample_rate)
        })
        .await??;

        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        let mut mixer = self.mixer.borrow_mut();
        mixer.insert(VoiceId(id), audio, options.volume)?;
        if options.should_play {
            mixer.play(VoiceId(id))?;
        }
        // looping is the mixer's only mode
        Ok(SoundId(id))
    }

    async fn play(&self, id: SoundId) -> anyhow::Result<()> {
        self.mixer.borrow_mut().play(VoiceId(id.0))?;
        Ok(())
    }

    async fn pause(&self, id: SoundId) -> anyhow::Result<()> {
        self.mixer.borrow_mut().pause(VoiceId(id.0))?;
        Ok(())
    }

    async fn stop(&self, id: SoundId) -> anyhow::Result<()> {
        let mut mixer = self.mixer.borrow_mut();
        mixer.pause(VoiceId(id.0))?;
        mixer.rewind(VoiceId(id.0))?;
        Ok(())
    }

    fn set_volume(&self, id: SoundId, volume: f32) -> anyhow::Result<()> {
        self.mixer.borrow_mut().set_gain(VoiceId(id.0), volume)?;
        Ok(())
    }

    // The buffer is freed by a later push once the audio thread has dropped
    // the voice.
    async fn unload(&self, id: SoundId) -> anyhow::Result<()> {
        let mut mixer = self.mixer.borrow_mut();
        mixer.remove(VoiceId(id.0))?;
        debug!("unloaded voice {}, {} still loaded", id.0, mixer.voice_count());
        Ok(())
    }
}
