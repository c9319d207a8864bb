use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use ambience_catalog::Track;
use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;
use log::{debug, warn};

use crate::driver::{ElementDriver, ElementId};
use crate::error::{BackendAcquireError, BackendCallError, BackendPlayError, GateError, reason};
use crate::volume::Volume;

/// Browser-style backend: synchronous creation, asynchronous play, and an
/// output that stays locked until a user gesture resumes it.
pub struct ElementBackend {
    driver: Rc<dyn ElementDriver>,
    live: RefCell<HashSet<ElementId>>,
}

impl ElementBackend {
    pub fn new(driver: impl ElementDriver + 'static) -> Self {
        Self {
            driver: Rc::new(driver),
            live: RefCell::new(HashSet::new()),
        }
    }

    pub fn acquire(&self, track: &Track, volume: Volume) -> Result<ElementId, BackendAcquireError> {
        let locator = track.source.as_str();
        let acquire_error = |err: anyhow::Error| BackendAcquireError {
            locator: locator.to_string(),
            reason: reason(&err),
        };

        let id = self.driver.create(locator).map_err(acquire_error)?;
        let configured = self
            .driver
            .set_looping(id, true)
            .and_then(|()| self.driver.set_volume(id, volume.gain()));
        if let Err(err) = configured {
            self.driver.release(id);
            return Err(acquire_error(err));
        }

        self.live.borrow_mut().insert(id);
        debug!("created element {id:?} for '{}'", track.id);
        Ok(id)
    }

    pub async fn start(&self, id: ElementId) -> Result<(), BackendPlayError> {
        if !self.is_live(id) {
            return Err(BackendPlayError {
                reason: format!("element {} was released", id.0),
            });
        }
        self.driver.play(id).await.map_err(|err| BackendPlayError {
            reason: reason(&err),
        })
    }

    /// Pausing keeps the current position so the next start resumes.
    pub fn pause(&self, id: ElementId) -> Result<(), BackendCallError> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.driver.pause(id).map_err(|err| call_error("pause", &err))
    }

    /// Pause and rewind to position 0.
    pub fn stop(&self, id: ElementId) -> Result<(), BackendCallError> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.driver.pause(id).map_err(|err| call_error("stop", &err))?;
        self.driver
            .set_current_time(id, 0.0)
            .map_err(|err| call_error("stop", &err))
    }

    pub fn set_volume(&self, id: ElementId, volume: Volume) -> Result<(), BackendCallError> {
        if !self.is_live(id) {
            return Ok(());
        }
        self.driver
            .set_volume(id, volume.gain())
            .map_err(|err| call_error("set volume", &err))
    }

    pub fn dispose(&self, id: ElementId) {
        if !self.live.borrow_mut().remove(&id) {
            return;
        }
        if let Err(err) = self.driver.pause(id) {
            warn!("pausing element {} before release failed: {err:#}", id.0);
        }
        self.driver.release(id);
    }

    /// The returned future owns its driver reference so callers may share it.
    pub fn unlock(&self) -> LocalBoxFuture<'static, Result<(), GateError>> {
        let driver = Rc::clone(&self.driver);
        async move {
            driver.resume_output().await.map_err(|err| GateError {
                reason: reason(&err),
            })
        }
        .boxed_local()
    }

    fn is_live(&self, id: ElementId) -> bool {
        self.live.borrow().contains(&id)
    }
}

fn call_error(op: &'static str, err: &anyhow::Error) -> BackendCallError {
    BackendCallError {
        op,
        reason: reason(err),
    }
}
