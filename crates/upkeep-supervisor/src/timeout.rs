use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Disarmed,
    Expired,
}

#[derive(Debug, Default)]
struct GuardFlags {
    cancelled: bool,
    expired: bool,
}

// Expiry and disarm decide under the same lock; whichever takes it first wins.
#[derive(Debug)]
pub struct ResponseTimeout {
    flags: Arc<Mutex<GuardFlags>>,
    wake: Option<Sender<()>>,
    timer: Option<JoinHandle<()>>,
}

impl ResponseTimeout {
    pub fn arm<F>(limit: Duration, on_expire: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let flags = Arc::new(Mutex::new(GuardFlags::default()));
        let (wake, wait) = mpsc::channel::<()>();
        let timer_flags = Arc::clone(&flags);

        let timer = thread::Builder::new()
            .name("upkeep-response-timeout".to_string())
            .spawn(move || {
                if !matches!(wait.recv_timeout(limit), Err(RecvTimeoutError::Timeout)) {
                    return;
                }
                let mut flags = lock_unpoisoned(&timer_flags);
                if flags.cancelled {
                    return;
                }
                flags.expired = true;
                tracing::warn!("no helper response within {limit:?}; tearing the helper down");
                on_expire();
            })?;

        Ok(Self {
            flags,
            wake: Some(wake),
            timer: Some(timer),
        })
    }

    pub fn disarm(&mut self) -> GuardOutcome {
        let outcome = {
            let mut flags = lock_unpoisoned(&self.flags);
            flags.cancelled = true;
            if flags.expired {
                GuardOutcome::Expired
            } else {
                GuardOutcome::Disarmed
            }
        };

        if let Some(wake) = self.wake.take() {
            let _ = wake.send(());
        }
        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                tracing::warn!("response timeout thread panicked");
            }
        }
        outcome
    }

    pub fn has_expired(&self) -> bool {
        lock_unpoisoned(&self.flags).expired
    }
}

impl Drop for ResponseTimeout {
    fn drop(&mut self) {
        self.disarm();
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
