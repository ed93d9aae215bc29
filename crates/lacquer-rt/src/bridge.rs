//! Cross-thread callback bridge.
//!
//! A bridge carries one call at a time from a blocking worker thread to a
//! handler that must only run on the coordinator thread, then carries the
//! handler's verdict back. In [`BridgeMode::Synchronous`] both sides share
//! a thread and the handler runs inline. In [`BridgeMode::CrossThread`]
//! the worker stages its arguments in the bridge, wakes the coordinator,
//! and blocks on a condition variable until a result is posted.
//!
//! The rendezvous settles exactly once per call, whatever the handler
//! does: resolve, reject, panic, or drop its [`Responder`] on the floor.
//! Each call gets a fresh epoch; completions quoting an older epoch are
//! discarded, so a responder that escapes a timed-out or misbehaving call
//! cannot bleed into the next one.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::BridgeFault;
use crate::event_loop::{Notice, WakeHandle};

/// Result of one bridged call: the host's value, or the fault that stood
/// in for it.
pub type CallResult<R> = Result<R, BridgeFault>;

/// Handler side of a bridge. Invoked with the staged arguments and a
/// single-use [`Responder`]; completion may happen inside the call or
/// later, from any thread the responder is moved to.
pub type Handler<A, R> = Box<dyn Fn(A, Responder<R>) + Send + Sync>;

/// How a bridge reaches its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    /// Caller and handler share a thread; the handler runs inline.
    Synchronous,
    /// Caller blocks while the coordinator thread runs the handler.
    CrossThread,
}

/// Per-call rendezvous state, guarded by the core's mutex.
struct Cell<A, R> {
    /// Arguments staged by the caller, taken by dispatch.
    pending_args: Option<A>,
    /// Result posted by the handler side, taken by the caller.
    result_slot: Option<CallResult<R>>,
    /// Held from arm to collect; overlapping calls are rejected.
    busy: bool,
    /// Bumped per call. Completions quoting an older epoch are stale.
    epoch: u64,
    /// Set at teardown. Fails the pending call and all future ones.
    closed: bool,
}

/// Shared state between the calling side, the dispatching side and any
/// responder still in flight.
pub(crate) struct BridgeCore<A, R> {
    name: String,
    handler: Handler<A, R>,
    cell: Mutex<Cell<A, R>>,
    signal: Condvar,
    invocations: AtomicU64,
}

/// Type-erased dispatch of one staged call. The coordinator loop carries
/// `Arc<dyn Dispatch>` notices without knowing argument or result types.
pub(crate) trait Dispatch: Send + Sync {
    fn dispatch(self: Arc<Self>);
}

/// Where a responder posts its completion.
pub(crate) trait CompleteSink<R>: Send + Sync {
    /// Posts the result for the call identified by `epoch`. Returns false
    /// when that call is no longer waiting.
    fn complete(&self, epoch: u64, result: CallResult<R>) -> bool;
}

/// Teardown handle to a bridge, type-erased so the host can poison every
/// bridge of a job without knowing their argument types.
pub(crate) trait Poison: Send + Sync {
    /// Fails the pending call and all future calls with
    /// [`BridgeFault::LoopClosed`], waking any blocked caller.
    fn poison(&self);
}

impl<A: Send + 'static, R: Send + 'static> Poison for BridgeCore<A, R> {
    fn poison(&self) {
        let mut cell = self.cell.lock();
        cell.closed = true;
        self.signal.notify_all();
    }
}

impl<A: Send + 'static, R: Send + 'static> Dispatch for BridgeCore<A, R> {
    fn dispatch(self: Arc<Self>) {
        let (args, epoch) = {
            let mut cell = self.cell.lock();
            match cell.pending_args.take() {
                Some(args) => (args, cell.epoch),
                None => {
                    // Caller gave up before we got scheduled.
                    log::debug!("bridge `{}`: stale dispatch, nothing staged", self.name);
                    return;
                }
            }
        };
        let responder = Responder::new(Arc::clone(&self) as Arc<dyn CompleteSink<R>>, epoch);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(args, responder)))
        {
            let message = panic_message(payload.as_ref());
            log::error!("bridge `{}`: handler panicked: {}", self.name, message);
            self.complete(epoch, Err(BridgeFault::HandlerPanicked(message)));
        }
    }
}

impl<A: Send + 'static, R: Send + 'static> CompleteSink<R> for BridgeCore<A, R> {
    fn complete(&self, epoch: u64, result: CallResult<R>) -> bool {
        let mut cell = self.cell.lock();
        if cell.epoch != epoch || !cell.busy {
            log::debug!("bridge `{}`: dropping stale completion for call #{}", self.name, epoch);
            return false;
        }
        if cell.result_slot.is_some() {
            log::warn!("bridge `{}`: duplicate completion for call #{}", self.name, epoch);
            return false;
        }
        // Post under the lock, then signal. The caller re-checks the slot
        // after every wakeup, so a missed signal cannot lose the result.
        cell.result_slot = Some(result);
        self.signal.notify_one();
        true
    }
}

/// Single-use completion token handed to a bridge handler.
///
/// Exactly one of [`resolve`](Responder::resolve),
/// [`reject`](Responder::reject) or [`finish`](Responder::finish) settles
/// the call. The token may outlive the handler invocation: move it into a
/// queue or another thread and complete later. Dropping it unsettled posts
/// [`BridgeFault::Abandoned`] so the caller never waits forever.
pub struct Responder<R> {
    sink: Option<Arc<dyn CompleteSink<R>>>,
    epoch: u64,
}

impl<R> Responder<R> {
    pub(crate) fn new(sink: Arc<dyn CompleteSink<R>>, epoch: u64) -> Self {
        Responder { sink: Some(sink), epoch }
    }

    /// Settles the call with a value.
    pub fn resolve(self, value: R) {
        self.finish(Ok(value));
    }

    /// Settles the call with a host-side error message.
    pub fn reject(self, message: impl Into<String>) {
        self.finish(Err(BridgeFault::Rejected(message.into())));
    }

    /// Settles the call with an explicit result.
    pub fn finish(mut self, result: CallResult<R>) {
        if let Some(sink) = self.sink.take() {
            sink.complete(self.epoch, result);
        }
    }
}

impl<R> Drop for Responder<R> {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            // During a handler panic the dispatcher reports the panic
            // itself, with the panic message.
            if std::thread::panicking() {
                return;
            }
            sink.complete(self.epoch, Err(BridgeFault::Abandoned));
        }
    }
}

/// Caller side of a bridge.
pub struct CallbackBridge<A, R> {
    core: Arc<BridgeCore<A, R>>,
    mode: BridgeMode,
    waker: WakeHandle,
    deadline: Option<Duration>,
}

impl<A: Send + 'static, R: Send + 'static> CallbackBridge<A, R> {
    pub(crate) fn new(
        name: impl Into<String>,
        mode: BridgeMode,
        waker: WakeHandle,
        deadline: Option<Duration>,
        handler: Handler<A, R>,
    ) -> Self {
        CallbackBridge {
            core: Arc::new(BridgeCore {
                name: name.into(),
                handler,
                cell: Mutex::new(Cell {
                    pending_args: None,
                    result_slot: None,
                    busy: false,
                    epoch: 0,
                    closed: false,
                }),
                signal: Condvar::new(),
                invocations: AtomicU64::new(0),
            }),
            mode,
            waker,
            deadline,
        }
    }

    /// Carries one call across the bridge and blocks until it settles.
    pub fn invoke(&self, args: A) -> CallResult<R> {
        let epoch = self.arm(args)?;
        match self.mode {
            BridgeMode::Synchronous => {
                Arc::clone(&self.core).dispatch();
                self.collect_sync(epoch)
            }
            BridgeMode::CrossThread => {
                let notice = Notice::Dispatch(Arc::clone(&self.core) as Arc<dyn Dispatch>);
                if !self.waker.notify(notice) {
                    self.disarm(epoch);
                    return Err(BridgeFault::LoopClosed);
                }
                self.wait(epoch)
            }
        }
    }

    /// Hands the host a teardown handle to this bridge.
    pub(crate) fn poison_handle(&self) -> Arc<dyn Poison> {
        Arc::clone(&self.core) as Arc<dyn Poison>
    }

    /// Stages the arguments and claims the bridge for one call.
    fn arm(&self, args: A) -> Result<u64, BridgeFault> {
        let mut cell = self.core.cell.lock();
        if cell.closed {
            return Err(BridgeFault::LoopClosed);
        }
        if cell.busy {
            log::warn!("bridge `{}`: rejecting overlapping call", self.core.name);
            return Err(BridgeFault::Overlap);
        }
        cell.busy = true;
        cell.epoch += 1;
        cell.pending_args = Some(args);
        cell.result_slot = None;
        let total = self.core.invocations.fetch_add(1, Ordering::Relaxed) + 1;
        log::debug!("bridge `{}`: staged call #{} ({} lifetime)", self.core.name, cell.epoch, total);
        Ok(cell.epoch)
    }

    /// Releases a claim that never reached the coordinator.
    fn disarm(&self, epoch: u64) {
        let mut cell = self.core.cell.lock();
        if cell.epoch == epoch {
            cell.busy = false;
            cell.pending_args = None;
            cell.result_slot = None;
            cell.epoch += 1;
        }
    }

    /// Collects the result of an inline dispatch.
    fn collect_sync(&self, epoch: u64) -> CallResult<R> {
        let mut cell = self.core.cell.lock();
        let result = match cell.result_slot.take() {
            Some(result) => result,
            None => {
                // The handler stashed its responder instead of settling.
                // Expire the epoch so a later resolve cannot bleed into
                // the next call on this bridge.
                log::warn!(
                    "bridge `{}`: call #{} deferred during a synchronous render",
                    self.core.name,
                    epoch
                );
                cell.epoch += 1;
                Err(BridgeFault::DeferredInSync)
            }
        };
        cell.busy = false;
        cell.pending_args = None;
        result
    }

    /// Blocks until the coordinator settles the call, or the deadline
    /// passes.
    fn wait(&self, epoch: u64) -> CallResult<R> {
        let started = Instant::now();
        let mut cell = self.core.cell.lock();
        loop {
            if let Some(result) = cell.result_slot.take() {
                cell.busy = false;
                return result;
            }
            if cell.closed {
                cell.busy = false;
                cell.pending_args = None;
                cell.epoch += 1;
                return Err(BridgeFault::LoopClosed);
            }
            match self.deadline {
                None => self.core.signal.wait(&mut cell),
                Some(limit) => {
                    let remaining = limit.checked_sub(started.elapsed()).unwrap_or(Duration::ZERO);
                    let timed_out = self.core.signal.wait_for(&mut cell, remaining).timed_out();
                    if timed_out && cell.result_slot.is_none() {
                        log::warn!(
                            "bridge `{}`: call #{} timed out after {:?}",
                            self.core.name,
                            epoch,
                            limit
                        );
                        cell.busy = false;
                        cell.pending_args = None;
                        cell.epoch += 1;
                        return Err(BridgeFault::TimedOut);
                    }
                }
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
