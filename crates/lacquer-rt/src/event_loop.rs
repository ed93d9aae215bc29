//! Wake-up plumbing for the coordinator thread.
//!
//! Workers never run host code themselves. They stage work and post a
//! [`Notice`] through a [`WakeHandle`]; the coordinator drains notices on
//! its own thread and acts on them there.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::bridge::Dispatch;
use crate::job::JobId;

/// A notice delivered to the coordinator thread.
pub(crate) enum Notice {
    /// A bridge has a staged call waiting for its handler.
    Dispatch(Arc<dyn Dispatch>),
    /// A worker finished a job and posted its outcome.
    JobDone(JobId),
}

/// Cloneable handle workers use to wake the coordinator.
#[derive(Clone)]
pub(crate) struct WakeHandle {
    tx: Sender<Notice>,
}

impl WakeHandle {
    /// Delivers a notice. Returns false when the loop is gone.
    pub(crate) fn notify(&self, notice: Notice) -> bool {
        self.tx.send(notice).is_ok()
    }
}

/// Creates the wake handle and the receiving end the coordinator drains.
pub(crate) fn notice_channel() -> (WakeHandle, Receiver<Notice>) {
    let (tx, rx) = unbounded();
    (WakeHandle { tx }, rx)
}
