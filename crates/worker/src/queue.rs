//! Job queue carrying task ids from the gateway to the worker pool.

use tokio::sync::mpsc;

/// Why a job could not be enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    Full,
    Closed,
}

pub(crate) enum JobSender {
    Bounded(mpsc::Sender<String>),
    Unbounded(mpsc::UnboundedSender<String>),
}

pub(crate) enum JobReceiver {
    Bounded(mpsc::Receiver<String>),
    Unbounded(mpsc::UnboundedReceiver<String>),
}

/// Bounded queue of `capacity` jobs; `0` means unbounded.
pub(crate) fn job_queue(capacity: usize) -> (JobSender, JobReceiver) {
    if capacity == 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        (JobSender::Unbounded(tx), JobReceiver::Unbounded(rx))
    } else {
        let (tx, rx) = mpsc::channel(capacity);
        (JobSender::Bounded(tx), JobReceiver::Bounded(rx))
    }
}

impl JobSender {
    /// Enqueue without waiting.
    pub(crate) fn try_send(&self, task_id: String) -> Result<(), EnqueueError> {
        match self {
            JobSender::Bounded(tx) => tx.try_send(task_id).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            }),
            JobSender::Unbounded(tx) => tx.send(task_id).map_err(|_| EnqueueError::Closed),
        }
    }
}

impl JobReceiver {
    pub(crate) async fn recv(&mut self) -> Option<String> {
        match self {
            JobReceiver::Bounded(rx) => rx.recv().await,
            JobReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}
