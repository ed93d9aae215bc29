//! Pending-call registry for deferred importer completions.
//!
//! Each bridged importer call a job makes is appended to that job's
//! registry and identified by its index. Host code settles a call through
//! the [`ImportDone`] token minted at registration; the token can travel
//! to any thread and outlive the render. Completions that name an index
//! that is out of range or already settled are logged and ignored, never
//! an error. Indices are not reused within a job.

use std::sync::Arc;

use parking_lot::Mutex;

use lacquer_engine::ImportEntry;

use crate::bridge::{CallResult, Responder};
use crate::error::BridgeFault;

/// The entries an importer call produces once the host settles it.
pub type ImportResult = CallResult<Vec<ImportEntry>>;

/// Table of importer calls still waiting on host code, owned by one job.
pub(crate) struct PendingCalls {
    slots: Mutex<Vec<Option<Responder<Vec<ImportEntry>>>>>,
}

impl PendingCalls {
    pub(crate) fn new() -> Arc<PendingCalls> {
        Arc::new(PendingCalls { slots: Mutex::new(Vec::new()) })
    }

    /// Appends a waiting call and returns its index.
    pub(crate) fn register(self: &Arc<Self>, responder: Responder<Vec<ImportEntry>>) -> ImportDone {
        let mut slots = self.slots.lock();
        let index = slots.len();
        slots.push(Some(responder));
        log::debug!("registered import call {}", index);
        ImportDone { inner: Some((Arc::clone(self), index)) }
    }

    /// Settles the call at `index`. Returns whether a call was actually
    /// waiting there.
    pub(crate) fn complete(&self, index: usize, result: ImportResult) -> bool {
        let responder = {
            let mut slots = self.slots.lock();
            slots.get_mut(index).and_then(Option::take)
        };
        match responder {
            Some(responder) => {
                // Settle outside the table lock; the responder takes the
                // bridge lock of a blocked worker.
                responder.finish(result);
                true
            }
            None => {
                log::warn!("ignoring completion for unknown import call {}", index);
                false
            }
        }
    }
}

/// Completion token for one deferred importer call.
///
/// Host code holds this while it resolves an import on its own schedule
/// and settles it with [`resolve`](ImportDone::resolve) or
/// [`reject`](ImportDone::reject), from any thread. Dropping the token
/// unsettled reports the call as abandoned so the render never hangs on
/// forgotten host code.
pub struct ImportDone {
    inner: Option<(Arc<PendingCalls>, usize)>,
}

impl ImportDone {
    /// Position of this call in its job's pending-call table.
    pub fn index(&self) -> usize {
        match &self.inner {
            Some((_, index)) => *index,
            None => usize::MAX,
        }
    }

    /// Settles the import with the entries the engine should load.
    pub fn resolve(mut self, entries: Vec<ImportEntry>) {
        if let Some((calls, index)) = self.inner.take() {
            calls.complete(index, Ok(entries));
        }
    }

    /// Settles the import with a host-side error message.
    pub fn reject(mut self, message: impl Into<String>) {
        if let Some((calls, index)) = self.inner.take() {
            calls.complete(index, Err(BridgeFault::Rejected(message.into())));
        }
    }
}

impl Drop for ImportDone {
    fn drop(&mut self) {
        if let Some((calls, index)) = self.inner.take() {
            // During a handler panic the bridge reports the panic itself,
            // with the panic message.
            if std::thread::panicking() {
                return;
            }
            log::debug!("import call {} dropped without completing", index);
            calls.complete(index, Err(BridgeFault::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::CompleteSink;

    /// Accepts every completion and records it, newest last.
    struct RecordingSink {
        seen: Mutex<Vec<ImportResult>>,
    }

    impl RecordingSink {
        fn new() -> Arc<RecordingSink> {
            Arc::new(RecordingSink { seen: Mutex::new(Vec::new()) })
        }
    }

    impl CompleteSink<Vec<ImportEntry>> for RecordingSink {
        fn complete(&self, _epoch: u64, result: ImportResult) -> bool {
            self.seen.lock().push(result);
            true
        }
    }

    fn responder(sink: &Arc<RecordingSink>) -> Responder<Vec<ImportEntry>> {
        Responder::new(Arc::clone(sink) as Arc<dyn CompleteSink<Vec<ImportEntry>>>, 1)
    }

    #[test]
    fn test_out_of_range_completion_is_a_no_op() {
        let calls = PendingCalls::new();
        assert!(!calls.complete(3, Ok(Vec::new())));
    }

    #[test]
    fn test_indices_settle_independently_and_only_once() {
        let sink = RecordingSink::new();
        let calls = PendingCalls::new();
        let first = calls.register(responder(&sink));
        let second = calls.register(responder(&sink));
        assert_eq!((first.index(), second.index()), (0, 1));

        first.resolve(vec![ImportEntry::contents("x { y: 1; }")]);
        assert!(!calls.complete(0, Ok(Vec::new())), "double completion must be ignored");
        second.reject("no such module");

        let seen = sink.seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_ok());
        assert_eq!(seen[1], Err(BridgeFault::Rejected("no such module".to_string())));
    }

    #[test]
    fn test_dropped_token_reports_abandonment() {
        let sink = RecordingSink::new();
        let calls = PendingCalls::new();
        let token = calls.register(responder(&sink));
        drop(token);
        assert_eq!(sink.seen.lock().as_slice(), &[Err(BridgeFault::Abandoned)]);
        // The slot is spent; a late completion by index is ignored.
        assert!(!calls.complete(0, Ok(Vec::new())));
    }
}
