//! One-time audio unlock.
//!
//! Browsers refuse to produce sound until a user gesture resumes the page's
//! audio output. The gate remembers whether that happened and makes sure only
//! one unlock attempt is in flight at a time.

use std::cell::RefCell;

use ambience_backend::{Backend, GateError};
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Shared};
use log::{debug, info};

type Attempt = Shared<LocalBoxFuture<'static, Result<(), GateError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Locked,
    Unlocking,
    Unlocked,
}

enum Inner {
    Locked,
    Unlocking(Attempt),
    Unlocked,
}

pub struct Gate {
    inner: RefCell<Inner>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner::Locked),
        }
    }

    pub fn state(&self) -> GateState {
        match &*self.inner.borrow() {
            Inner::Locked => GateState::Locked,
            Inner::Unlocking(_) => GateState::Unlocking,
            Inner::Unlocked => GateState::Unlocked,
        }
    }

    /// Open the gate without any work if `backend` never needs an unlock.
    pub fn observe(&self, backend: &Backend) -> GateState {
        let mut inner = self.inner.borrow_mut();
        if matches!(*inner, Inner::Locked) && !backend.requires_unlock() {
            debug!("{} backend needs no unlock", backend.kind());
            *inner = Inner::Unlocked;
        }
        drop(inner);
        self.state()
    }

    /// Unlock the backend's output. Callers arriving while an attempt is in
    /// flight await that same attempt. A failed attempt leaves the gate
    /// locked so a later gesture can retry.
    pub async fn unlock(&self, backend: &Backend) -> Result<(), GateError> {
        if self.observe(backend) == GateState::Unlocked {
            return Ok(());
        }

        let attempt = {
            let mut inner = self.inner.borrow_mut();
            match &*inner {
                Inner::Unlocked => return Ok(()),
                Inner::Unlocking(attempt) => attempt.clone(),
                Inner::Locked => {
                    debug!("unlocking {} audio output", backend.kind());
                    let attempt = backend.unlock().shared();
                    *inner = Inner::Unlocking(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = attempt.clone().await;

        // Whoever finishes first settles the state for this attempt.
        let mut inner = self.inner.borrow_mut();
        let settles = matches!(&*inner, Inner::Unlocking(current) if current.ptr_eq(&attempt));
        if settles {
            *inner = match outcome {
                Ok(()) => {
                    info!("audio output unlocked");
                    Inner::Unlocked
                }
                Err(_) => Inner::Locked,
            };
        }
        outcome
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambience_backend::testing::{Call, FakeElementDriver, FakeNativeDriver};

    #[test]
    fn test_native_gate_opens_on_observation() {
        let (driver, script) = FakeNativeDriver::new();
        let backend = Backend::native(driver);
        let gate = Gate::new();

        assert_eq!(gate.state(), GateState::Locked);
        assert_eq!(gate.observe(&backend), GateState::Unlocked);
        assert!(script.calls().is_empty());
    }

    #[test]
    fn test_element_gate_stays_locked_until_unlocked() {
        let (driver, _) = FakeElementDriver::new();
        let backend = Backend::element(driver);
        let gate = Gate::new();

        assert_eq!(gate.observe(&backend), GateState::Locked);
    }

    #[tokio::test]
    async fn test_failed_unlock_can_be_retried() {
        let (driver, script) = FakeElementDriver::new();
        script.fail_unlock_times(1);
        let backend = Backend::element(driver);
        let gate = Gate::new();

        assert!(gate.unlock(&backend).await.is_err());
        assert_eq!(gate.state(), GateState::Locked);

        gate.unlock(&backend).await.expect("second attempt");
        assert_eq!(gate.state(), GateState::Unlocked);

        gate.unlock(&backend).await.expect("already unlocked");
        assert_eq!(script.count(|c| *c == Call::ResumeOutput), 2);
    }

    #[tokio::test]
    async fn test_concurrent_unlocks_share_one_attempt() {
        let (driver, script) = FakeElementDriver::new();
        let backend = Backend::element(driver);
        let gate = Gate::new();

        let mut first = Box::pin(gate.unlock(&backend));
        assert!(futures_util::poll!(&mut first).is_pending());
        assert_eq!(gate.state(), GateState::Unlocking);

        let (first, second) = tokio::join!(first, gate.unlock(&backend));

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(gate.state(), GateState::Unlocked);
        assert_eq!(script.count(|c| *c == Call::ResumeOutput), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failure_is_shared() {
        let (driver, script) = FakeElementDriver::new();
        script.fail_unlock_times(1);
        let backend = Backend::element(driver);
        let gate = Gate::new();

        let (first, second) = tokio::join!(gate.unlock(&backend), gate.unlock(&backend));

        assert_eq!(first, second);
        assert!(first.is_err());
        assert_eq!(gate.state(), GateState::Locked);
        assert_eq!(script.count(|c| *c == Call::ResumeOutput), 1);
    }
}
