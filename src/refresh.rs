//! Lifecycle shared by the background threads that keep the feature store fresh.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, RecvTimeoutError, SyncSender},
        Arc, Condvar, Mutex,
    },
    time::Duration,
};

use crate::{Error, Result};

/// Outcome of the first load of a refresh thread.
///
/// Holds `None` until features have been loaded. Holds `Some(Ok(()))` once they have been loaded
/// successfully, `Some(Err(...))` if the thread gave up before that.
#[derive(Clone, Default)]
pub(crate) struct ReadySignal {
    inner: Arc<ReadyState>,
}

#[derive(Default)]
struct ReadyState {
    result: Mutex<Option<Result<()>>>,
    changed: Condvar,
}

impl ReadySignal {
    /// Record the outcome of a load. A successful load is final; later calls are no-ops.
    fn set(&self, value: Result<()>) {
        let Ok(mut slot) = self.inner.result.lock() else {
            return;
        };
        if !matches!(*slot, Some(Ok(()))) {
            *slot = Some(value);
            self.inner.changed.notify_all();
        }
    }

    /// Record `value` unless an outcome is already known.
    fn set_if_empty(&self, value: Result<()>) {
        let Ok(mut slot) = self.inner.result.lock() else {
            return;
        };
        if slot.is_none() {
            *slot = Some(value);
            self.inner.changed.notify_all();
        }
    }

    /// Block until features have been loaded for the first time, or loading failed fatally.
    pub fn wait(&self) -> Result<()> {
        let mut lock = self
            .inner
            .result
            .lock()
            .map_err(|_| Error::RefreshThreadPanicked)?;
        loop {
            match &*lock {
                // Already loaded (or failed). Return Ok(()) or the error.
                Some(result) => return result.clone(),
                None => {
                    lock = self
                        .inner
                        .changed
                        .wait(lock)
                        .map_err(|_| Error::RefreshThreadPanicked)?;
                }
            }
        }
    }

    /// Whether features have been loaded at least once. Never blocks.
    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.inner
            .result
            .lock()
            .map(|slot| matches!(*slot, Some(Ok(()))))
            .unwrap_or(false)
    }
}

/// Handle passed to the body of a refresh thread.
pub(crate) struct RefreshContext {
    stop_receiver: Receiver<()>,
    stopped: Arc<AtomicBool>,
    ready: ReadySignal,
}

impl RefreshContext {
    /// Record the outcome of a load. Only the first successful load (or a fatal error before it)
    /// is kept.
    pub fn report(&self, value: Result<()>) {
        self.ready.set(value);
    }

    /// Whether the owner asked the thread to stop.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Sleep for `timeout`, waking up early if a stop is requested. Returns `true` if the thread
    /// should exit.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.stop_receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => self.is_stopped(),
            Ok(()) => {
                log::debug!(target: "molasses", "refresh thread received stop command");
                true
            }
            Err(RecvTimeoutError::Disconnected) => {
                // The owning handle is gone.
                log::debug!(target: "molasses", "refresh thread received disconnected");
                true
            }
        }
    }
}

/// A background thread refreshing features, either by polling or by listening to a stream.
pub(crate) struct RefreshThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to wake the thread up when it should stop.
    stop_sender: SyncSender<()>,

    /// Checked by threads that are blocked on I/O rather than on `stop_sender`.
    stopped: Arc<AtomicBool>,

    ready: ReadySignal,
}

impl RefreshThread {
    /// Spawn a named thread running `body`. A panic inside `body` is reported as
    /// [`Error::RefreshThreadPanicked`]. If `body` returns before features were loaded, waiters
    /// get [`Error::NotStarted`].
    pub fn spawn(
        name: &str,
        body: impl FnOnce(&RefreshContext) + Send + 'static,
    ) -> std::io::Result<RefreshThread> {
        // Using `sync_channel` here as it makes `stop_sender` `Sync`. Buffer size of 1 is enough:
        // if it is full, another stop command is already pending.
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);
        let stopped = Arc::new(AtomicBool::new(false));
        let ready = ReadySignal::default();

        let context = RefreshContext {
            stop_receiver,
            stopped: Arc::clone(&stopped),
            ready: ready.clone(),
        };

        let join_handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    body(&context);
                }));

                match outcome {
                    Ok(()) => context.ready.set_if_empty(Err(Error::NotStarted)),
                    Err(_) => {
                        log::error!(target: "molasses", "refresh thread panicked");
                        context.report(Err(Error::RefreshThreadPanicked));
                    }
                }
            })?;

        Ok(RefreshThread {
            join_handle,
            stop_sender,
            stopped,
            ready,
        })
    }

    /// Signal completing when features have been loaded for the first time.
    pub fn ready(&self) -> &ReadySignal {
        &self.ready
    }

    /// Stop the thread. Calling it more than once is harmless.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        // Error means the thread already exited or a stop command is already pending. Either way
        // the thread is going to stop.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the thread and block waiting for it to exit.
    pub fn shutdown(self) -> Result<()> {
        self.stop();
        self.join_handle
            .join()
            .map_err(|_| Error::RefreshThreadPanicked)?;
        Ok(())
    }
}
