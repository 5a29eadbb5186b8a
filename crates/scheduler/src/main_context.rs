use crossbeam_channel::{unbounded, Receiver, Sender};

type MainJob = Box<dyn FnOnce() + Send + 'static>;

/// Creates a connected publisher/queue pair for the UI-owning thread.
pub fn main_context() -> (MainContext, MainQueue) {
    let (sender, receiver) = unbounded();
    (MainContext { sender }, MainQueue { receiver })
}

/// Posts work to the UI-owning thread without waiting for it.
#[derive(Clone)]
pub struct MainContext {
    sender: Sender<MainJob>,
}

impl MainContext {
    /// Queues `job`; returns `false` if the queue has been dropped.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        self.sender.send(Box::new(job)).is_ok()
    }
}

/// Receiving end owned by the UI thread.
pub struct MainQueue {
    receiver: Receiver<MainJob>,
}

impl MainQueue {
    /// Runs the jobs queued so far and returns how many ran.
    ///
    /// Jobs posted while draining wait for the next call.
    pub fn run_pending(&self) -> usize {
        let pending = self.receiver.len();
        let mut ran = 0;
        for job in self.receiver.try_iter().take(pending) {
            job();
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn post_does_not_run_until_drained() {
        let (context, queue) = main_context();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for value in 0..3 {
            let seen = Arc::clone(&seen);
            assert!(context.post(move || seen.lock().unwrap().push(value)));
        }
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.pending(), 3);

        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn post_after_queue_dropped_reports_failure() {
        let (context, queue) = main_context();
        drop(queue);
        assert!(!context.post(|| {}));
    }
}
