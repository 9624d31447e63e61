//! Execution contexts for delivering completions.
//!
//! # Design
//! Completions are produced on the runtime task that drove the call. The
//! callback shapes then hand the result to an [`Executor`], which decides
//! where the user's closure runs. The default, [`Spawn`], is an explicit
//! hand-off to a fresh task. [`SerialQueue`] plays the part of a main
//! thread: jobs wait until the owner of its [`QueueRunner`] drains them.

use tokio::runtime::Handle;
use tokio::sync::mpsc;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Run the job on the completing task, immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl Executor for Inline {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Spawn the job as a new task on a runtime. Without an explicit handle
/// the current runtime is used; outside any runtime the job runs inline.
#[derive(Debug, Clone, Default)]
pub struct Spawn {
    handle: Option<Handle>,
}

impl Spawn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(handle: Handle) -> Self {
        Self { handle: Some(handle) }
    }
}

impl Executor for Spawn {
    fn execute(&self, job: Job) {
        match self.handle.clone().or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                let job = Spawned(Some(job));
                handle.spawn(async move { job.run() });
            }
            None => job(),
        }
    }
}

/// A spawned job that still runs, inline, if its task is dropped unpolled.
struct Spawned(Option<Job>);

impl Spawned {
    fn run(mut self) {
        if let Some(job) = self.0.take() {
            job();
        }
    }
}

impl Drop for Spawned {
    fn drop(&mut self) {
        if let Some(job) = self.0.take() {
            tracing::warn!("runtime shut down before the completion ran; running it inline");
            job();
        }
    }
}

/// A FIFO queue of jobs drained by whoever owns the [`QueueRunner`].
#[derive(Debug, Clone)]
pub struct SerialQueue {
    sender: mpsc::UnboundedSender<Job>,
}

pub struct QueueRunner {
    receiver: mpsc::UnboundedReceiver<Job>,
}

impl SerialQueue {
    pub fn new() -> (SerialQueue, QueueRunner) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (SerialQueue { sender }, QueueRunner { receiver })
    }
}

impl Executor for SerialQueue {
    fn execute(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::warn!("serial queue runner is gone; completion dropped");
        }
    }
}

impl QueueRunner {
    /// Run every job queued so far without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Wait for the next job and run it. Returns `false` once every
    /// [`SerialQueue`] handle has been dropped and the queue is empty.
    pub async fn run_next(&mut self) -> bool {
        match self.receiver.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for QueueRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueRunner").finish_non_exhaustive()
    }
}
