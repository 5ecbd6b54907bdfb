//! The coordination thread.
//!
//! One OS thread runs a current-thread tokio runtime with two cooperative
//! loops: the queue's draining loop and a dispatch loop for callbacks handed
//! over by producers. Every callback the crate invokes runs on this thread.

use crate::config::QueueConfig;
use crate::error::Result;
use crate::queue::{QueueHandle, SerializationQueue};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const COORDINATOR_THREAD_NAME: &str = "permission-coordinator";

type Job = Box<dyn FnOnce() + Send>;

/// Hands closures to the coordination thread
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Run `job` on the coordination thread. Returns false if the
    /// coordinator has stopped, in which case the job is dropped unrun.
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }
}

async fn run_dispatch(mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        job();
    }
    debug!("Dispatch loop finished");
}

/// Owns the coordination thread and the producer-side handles into it
#[derive(Debug)]
pub struct Coordinator {
    queue: QueueHandle,
    dispatcher: Dispatcher,
    thread: thread::JoinHandle<()>,
}

impl Coordinator {
    /// Spawn the coordination thread and start draining
    pub fn start(config: QueueConfig) -> Result<Self> {
        config.validate()?;

        let queue = SerializationQueue::new(config);
        let handle = queue.handle();
        let (dispatcher, jobs) = Dispatcher::channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = thread::Builder::new()
            .name(COORDINATOR_THREAD_NAME.to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    info!("Permission coordinator started");
                    tokio::join!(queue.run(), run_dispatch(jobs));
                    info!("Permission coordinator stopped");
                });
            })?;

        Ok(Self {
            queue: handle,
            dispatcher,
            thread,
        })
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// True when called from the coordination thread
    pub fn is_current_thread() -> bool {
        thread::current().name() == Some(COORDINATOR_THREAD_NAME)
    }

    /// Drop this coordinator's handles and wait for the thread to finish.
    ///
    /// Blocks until every other clone of the queue handle and dispatcher is
    /// gone too.
    pub fn shutdown(self) {
        let Self {
            queue,
            dispatcher,
            thread,
        } = self;
        drop(queue);
        drop(dispatcher);
        if thread.join().is_err() {
            warn!("Permission coordinator thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    #[test]
    fn test_dispatch_runs_on_coordinator_thread() {
        let coordinator = Coordinator::start(QueueConfig::default()).unwrap();
        let (tx, rx) = std_mpsc::channel();

        assert!(!Coordinator::is_current_thread());
        assert!(coordinator
            .dispatcher()
            .dispatch(move || tx.send(Coordinator::is_current_thread()).unwrap()));

        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
        coordinator.shutdown();
    }

    #[test]
    fn test_dispatch_preserves_order() {
        let coordinator = Coordinator::start(QueueConfig::default()).unwrap();
        let (tx, rx) = std_mpsc::channel();

        for i in 0..5 {
            let tx = tx.clone();
            coordinator.dispatcher().dispatch(move || tx.send(i).unwrap());
        }

        let received: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        coordinator.shutdown();
    }

    #[test]
    fn test_shutdown_joins_once_handles_are_released() {
        let coordinator = Coordinator::start(QueueConfig::default()).unwrap();
        let queue = coordinator.queue().clone();
        assert!(!queue.is_closed());

        drop(queue);
        coordinator.shutdown();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = Coordinator::start(QueueConfig::with_capacity(0)).unwrap_err();
        assert!(matches!(err, crate::PermissionError::Config(_)));
    }
}
