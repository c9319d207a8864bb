use std::cell::RefCell;
use std::collections::HashSet;

use ambience_catalog::Track;
use log::{debug, info, warn};

use crate::driver::{AudioSessionPolicy, NativeDriver, SoundId, SoundOptions};
use crate::error::{BackendAcquireError, BackendCallError, BackendPlayError, reason};
use crate::volume::Volume;

/// Sound-object backend: asynchronous load, synchronous volume, no unlock.
pub struct NativeBackend {
    driver: Box<dyn NativeDriver>,
    live: RefCell<HashSet<SoundId>>,
}

impl NativeBackend {
    pub fn new(driver: impl NativeDriver + 'static) -> Self {
        Self {
            driver: Box::new(driver),
            live: RefCell::new(HashSet::new()),
        }
    }

    pub fn configure(&self, policy: &AudioSessionPolicy) {
        match self.driver.configure(policy) {
            Ok(()) => info!("audio session configured: {policy:?}"),
            Err(err) => warn!("audio session configuration failed: {err:#}"),
        }
    }

    pub async fn acquire(&self, track: &Track, volume: Volume) -> Result<SoundId, BackendAcquireError> {
        let options = SoundOptions {
            looping: true,
            volume: volume.gain(),
            should_play: false,
        };
        let id = self
            .driver
            .load(track.source.as_str(), options)
            .await
            .map_err(|err| BackendAcquireError {
                locator: track.source.to_string(),
                reason: reason(&err),
            })?;

        self.live.borrow_mut().insert(id);
        debug!("loaded sound {id:?} for '{}'", track.id);
        Ok(id)
    }

    pub async fn start(&self, id: SoundId) -> Result<(), BackendPlayError> {
        if !self.is_live(id) {
            return Err(BackendPlayError {
                reason: format!("sound {} was unloaded", id.0),
            });
        }
        self.driver.play(id).await.map_err(|err| BackendPlayError {
            reason: reason(&err),
        })
    }

    pub async fn pause(&self, id: SoundId) -> Result<(), BackendCallError> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.driver.pause(id).await.map_err(|err| BackendCallError {
            op: "pause",
            reason: reason(&err),
        })
    }

    pub async fn stop(&self, id: SoundId) -> Result<(), BackendCallError> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.driver.stop(id).await.map_err(|err| BackendCallError {
            op: "stop",
            reason: reason(&err),
        })
    }

    pub fn set_volume(&self, id: SoundId, volume: Volume) -> Result<(), BackendCallError> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.driver
            .set_volume(id, volume.gain())
            .map_err(|err| BackendCallError {
                op: "set volume",
                reason: reason(&err),
            })
    }

    pub async fn dispose(&self, id: SoundId) {
        if !self.live.borrow_mut().remove(&id) {
            return;
        }
        if let Err(err) = self.driver.unload(id).await {
            warn!("unloading sound {} failed: {err:#}", id.0);
        }
    }

    fn is_live(&self, id: SoundId) -> bool {
        self.live.borrow().contains(&id)
    }
}
