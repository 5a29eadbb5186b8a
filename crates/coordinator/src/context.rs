use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{bounded, unbounded, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to spawn serial worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("serial worker has shut down")]
    Disconnected,
    #[error("serial job panicked")]
    JobPanicked,
}

/// A dedicated worker thread that runs submitted jobs one at a time, in
/// submission order.
///
/// [`run_sync`](SerialContext::run_sync) blocks the caller until its job has
/// finished. Calls made from the worker thread itself run inline instead of
/// queueing behind themselves.
pub struct SerialContext {
    sender: Option<Sender<Job>>,
    worker: ThreadId,
    join_handle: Option<JoinHandle<()>>,
}

impl SerialContext {
    pub fn spawn(label: &str) -> Result<Self, ContextError> {
        let (sender, receiver) = unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(format!("gifdeck-sync-{label}"))
            .spawn(move || {
                for job in receiver.iter() {
                    job();
                }
                tracing::trace!("serial worker drained");
            })
            .map_err(ContextError::Spawn)?;

        Ok(Self {
            sender: Some(sender),
            worker: handle.thread().id(),
            join_handle: Some(handle),
        })
    }

    pub fn run_sync<R, F>(&self, job: F) -> Result<R, ContextError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if thread::current().id() == self.worker {
            return panic::catch_unwind(AssertUnwindSafe(job)).map_err(|_| ContextError::JobPanicked);
        }

        let sender = self.sender.as_ref().ok_or(ContextError::Disconnected)?;
        let (reply_tx, reply_rx) = bounded(1);
        sender
            .send(Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job));
                let _ = reply_tx.send(outcome);
            }))
            .map_err(|_| ContextError::Disconnected)?;

        match reply_rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ContextError::JobPanicked),
            Err(_) => Err(ContextError::Disconnected),
        }
    }

    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker
    }
}

impl fmt::Debug for SerialContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialContext")
            .field("worker", &self.worker)
            .field("running", &self.sender.is_some())
            .finish()
    }
}

impl Drop for SerialContext {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.join_handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn runs_jobs_on_worker_and_returns_values() {
        let context = SerialContext::spawn("test").unwrap();
        let caller = thread::current().id();
        let ran_on = context.run_sync(|| thread::current().id()).unwrap();
        assert_ne!(ran_on, caller);
        assert_eq!(context.run_sync(|| 40 + 2).unwrap(), 42);
    }

    #[test]
    fn jobs_from_many_threads_never_overlap() {
        let context = Arc::new(SerialContext::spawn("overlap").unwrap());
        let active = Arc::new(Mutex::new(0usize));
        let max_seen = Arc::new(Mutex::new(0usize));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let context = Arc::clone(&context);
                let active = Arc::clone(&active);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..25 {
                        let active = Arc::clone(&active);
                        let max_seen = Arc::clone(&max_seen);
                        context
                            .run_sync(move || {
                                let now = {
                                    let mut guard = active.lock().unwrap();
                                    *guard += 1;
                                    *guard
                                };
                                {
                                    let mut max = max_seen.lock().unwrap();
                                    *max = (*max).max(now);
                                }
                                thread::yield_now();
                                *active.lock().unwrap() -= 1;
                            })
                            .unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*max_seen.lock().unwrap(), 1);
    }

    #[test]
    fn nested_submission_runs_inline() {
        let context = Arc::new(SerialContext::spawn("nested").unwrap());
        let inner = Arc::clone(&context);
        let value = context
            .run_sync(move || inner.run_sync(|| 7).unwrap())
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn panicking_job_is_reported_and_worker_survives() {
        let context = SerialContext::spawn("panic").unwrap();
        let result: Result<(), _> = context.run_sync(|| panic!("boom"));
        assert!(matches!(result, Err(ContextError::JobPanicked)));
        assert_eq!(context.run_sync(|| 1).unwrap(), 1);
    }
}
