//! Scripted in-memory drivers.
//!
//! Every call is recorded on a shared [`Script`], failures are injected per
//! source, and every asynchronous operation yields once before completing so
//! concurrent callers really interleave.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;

use crate::driver::{
    AudioSessionPolicy, ElementDriver, ElementId, NativeDriver, SoundId, SoundOptions,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Configure(AudioSessionPolicy),
    Create(String),
    Load {
        uri: String,
        looping: bool,
        volume: f32,
        should_play: bool,
    },
    SetLooping(u64, bool),
    SetVolume(u64, f32),
    SetCurrentTime(u64, f64),
    Play(u64),
    Pause(u64),
    Stop(u64),
    Release(u64),
    Unload(u64),
    ResumeOutput,
}

#[derive(Debug, Default)]
pub struct Script {
    calls: RefCell<Vec<Call>>,
    failing_sources: RefCell<HashSet<String>>,
    rejected_sources: RefCell<HashSet<String>>,
    unlock_failures: Cell<usize>,
    fail_volume: Cell<bool>,
    fail_pause: Cell<bool>,
    sources: RefCell<HashMap<u64, String>>,
    next_id: Cell<u64>,
}

impl Script {
    /// Creating or loading `src` fails from now on.
    pub fn fail_acquire(&self, src: &str) {
        self.failing_sources.borrow_mut().insert(src.to_string());
    }

    /// Playing anything bound to `src` is rejected until [`Script::allow_play`].
    pub fn reject_play(&self, src: &str) {
        self.rejected_sources.borrow_mut().insert(src.to_string());
    }

    pub fn allow_play(&self, src: &str) {
        self.rejected_sources.borrow_mut().remove(src);
    }

    /// The next `times` unlock attempts fail.
    pub fn fail_unlock_times(&self, times: usize) {
        self.unlock_failures.set(times);
    }

    pub fn fail_volume(&self) {
        self.fail_volume.set(true);
    }

    pub fn fail_pause(&self) {
        self.fail_pause.set(true);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn allocate(&self, src: &str) -> anyhow::Result<u64> {
        if self.failing_sources.borrow().contains(src) {
            anyhow::bail!("cannot open {src}");
        }
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.sources.borrow_mut().insert(id, src.to_string());
        Ok(id)
    }

    fn check_play(&self, id: u64) -> anyhow::Result<()> {
        let sources = self.sources.borrow();
        let src = sources
            .get(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown id {id}"))?;
        if self.rejected_sources.borrow().contains(src) {
            anyhow::bail!("NotAllowedError: play() requires a user gesture");
        }
        Ok(())
    }

    fn check_volume(&self) -> anyhow::Result<()> {
        if self.fail_volume.get() {
            anyhow::bail!("volume is read-only");
        }
        Ok(())
    }

    fn check_pause(&self) -> anyhow::Result<()> {
        if self.fail_pause.get() {
            anyhow::bail!("pause interrupted");
        }
        Ok(())
    }
}

pub struct FakeElementDriver {
    script: Rc<Script>,
}

impl FakeElementDriver {
    pub fn new() -> (Self, Rc<Script>) {
        let script = Rc::new(Script::default());
        (
            Self {
                script: Rc::clone(&script),
            },
            script,
        )
    }
}

#[async_trait(?Send)]
impl ElementDriver for FakeElementDriver {
    fn create(&self, src: &str) -> anyhow::Result<ElementId> {
        self.script.record(Call::Create(src.to_string()));
        self.script.allocate(src).map(ElementId)
    }

    fn set_looping(&self, id: ElementId, looping: bool) -> anyhow::Result<()> {
        self.script.record(Call::SetLooping(id.0, looping));
        Ok(())
    }

    fn set_volume(&self, id: ElementId, volume: f32) -> anyhow::Result<()> {
        self.script.record(Call::SetVolume(id.0, volume));
        self.script.check_volume()
    }

    fn set_current_time(&self, id: ElementId, seconds: f64) -> anyhow::Result<()> {
        self.script.record(Call::SetCurrentTime(id.0, seconds));
        Ok(())
    }

    async fn play(&self, id: ElementId) -> anyhow::Result<()> {
        self.script.record(Call::Play(id.0));
        tokio::task::yield_now().await;
        self.script.check_play(id.0)
    }

    fn pause(&self, id: ElementId) -> anyhow::Result<()> {
        self.script.record(Call::Pause(id.0));
        self.script.check_pause()
    }

    fn release(&self, id: ElementId) {
        self.script.record(Call::Release(id.0));
    }

    async fn resume_output(&self) -> anyhow::Result<()> {
        self.script.record(Call::ResumeOutput);
        tokio::task::yield_now().await;
        let failures = self.script.unlock_failures.get();
        if failures > 0 {
            self.script.unlock_failures.set(failures - 1);
            anyhow::bail!("AudioContext was not allowed to start");
        }
        Ok(())
    }
}

pub struct FakeNativeDriver {
    script: Rc<Script>,
}

impl FakeNativeDriver {
    pub fn new() -> (Self, Rc<Script>) {
        let script = Rc::new(Script::default());
        (
            Self {
                script: Rc::clone(&script),
            },
            script,
        )
    }
}

#[async_trait(?Send)]
impl NativeDriver for FakeNativeDriver {
    fn configure(&self, policy: &AudioSessionPolicy) -> anyhow::Result<()> {
        self.script.record(Call::Configure(*policy));
        Ok(())
    }

    async fn load(&self, uri: &str, options: SoundOptions) -> anyhow::Result<SoundId> {
        self.script.record(Call::Load {
            uri: uri.to_string(),
            looping: options.looping,
            volume: options.volume,
            should_play: options.should_play,
        });
        tokio::task::yield_now().await;
        self.script.allocate(uri).map(SoundId)
    }

    async fn play(&self, id: SoundId) -> anyhow::Result<()> {
        self.script.record(Call::Play(id.0));
        tokio::task::yield_now().await;
        self.script.check_play(id.0)
    }

    async fn pause(&self, id: SoundId) -> anyhow::Result<()> {
        self.script.record(Call::Pause(id.0));
        tokio::task::yield_now().await;
        self.script.check_pause()
    }

    async fn stop(&self, id: SoundId) -> anyhow::Result<()> {
        self.script.record(Call::Stop(id.0));
        tokio::task::yield_now().await;
        Ok(())
    }

    fn set_volume(&self, id: SoundId, volume: f32) -> anyhow::Result<()> {
        self.script.record(Call::SetVolume(id.0, volume));
        self.script.check_volume()
    }

    async fn unload(&self, id: SoundId) -> anyhow::Result<()> {
        self.script.record(Call::Unload(id.0));
        tokio::task::yield_now().await;
        Ok(())
    }
}
