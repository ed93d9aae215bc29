//! Render jobs: the coordinator-side record, the outcome slot shared with
//! the worker, and the worker threads themselves.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use lacquer_engine::EngineOptions;

use crate::bridge::{panic_message, Poison};
use crate::error::RenderError;
use crate::event_loop::{Notice, WakeHandle};
use crate::options::{RenderOutput, RenderStats};

/// Identifies a job within its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub(crate) usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {}", self.0)
    }
}

/// Lifecycle of a render job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Accepted, not yet handed to a worker.
    Created,
    /// Worker spawn requested.
    Scheduled,
    /// Worker is rendering.
    Running,
    /// Outcome delivered and callbacks run.
    Completed,
}

pub(crate) type JobOutcome = Result<RenderOutput, RenderError>;

/// State shared between a job's worker and the coordinator.
pub(crate) struct JobShared {
    pub(crate) state: Mutex<JobState>,
    pub(crate) outcome: Mutex<Option<JobOutcome>>,
}

impl JobShared {
    pub(crate) fn new() -> Arc<JobShared> {
        Arc::new(JobShared {
            state: Mutex::new(JobState::Created),
            outcome: Mutex::new(None),
        })
    }
}

/// Coordinator-side record of one render job.
pub(crate) struct Job {
    pub(crate) shared: Arc<JobShared>,
    pub(crate) worker: Option<JoinHandle<()>>,
    /// Teardown handles to the job's bridges, poisoned if the host is
    /// dropped while the job is still running.
    pub(crate) bridges: Vec<Arc<dyn Poison>>,
    pub(crate) on_success: Box<dyn FnOnce(RenderOutput)>,
    pub(crate) on_error: Box<dyn FnOnce(RenderError)>,
}

impl Job {
    /// Joins the worker, marks the job completed and invokes exactly one
    /// of the two callbacks with the posted outcome.
    pub(crate) fn finalize(mut self, id: JobId) {
        if let Some(worker) = self.worker.take() {
            if let Err(payload) = worker.join() {
                let message = panic_message(payload.as_ref());
                log::error!("{}: worker panicked: {}", id, message);
                let mut outcome = self.shared.outcome.lock();
                if outcome.is_none() {
                    *outcome = Some(Err(RenderError::Worker(message)));
                }
            }
        }
        *self.shared.state.lock() = JobState::Completed;
        let outcome = self.shared.outcome.lock().take().unwrap_or_else(|| {
            Err(RenderError::Worker("worker exited without posting an outcome".to_string()))
        });
        match outcome {
            Ok(output) => {
                log::debug!("{}: completed with {} bytes of css", id, output.css.len());
                (self.on_success)(output);
            }
            Err(error) => {
                log::debug!("{}: failed: {}", id, error);
                (self.on_error)(error);
            }
        }
    }
}

/// What the engine runs for one job. The synchronous entry points run
/// this inline; asynchronous ones hand it to a worker. Both paths share
/// it, so a render behaves the same either way.
pub(crate) struct EngineTask {
    pub(crate) input: RenderInput,
    pub(crate) options: EngineOptions,
    pub(crate) entry_label: String,
}

pub(crate) enum RenderInput {
    Source(String),
    File(PathBuf),
}

impl EngineTask {
    /// Runs the compile with timing stats wrapped around it.
    pub(crate) fn run(self) -> JobOutcome {
        let start_ms = now_ms();
        let timer = Instant::now();
        let compiled = match &self.input {
            RenderInput::Source(text) => lacquer_engine::compile(text, &self.options),
            RenderInput::File(path) => lacquer_engine::compile_file(path, &self.options),
        }?;
        Ok(RenderOutput {
            css: compiled.css,
            included_files: compiled.included_files,
            stats: RenderStats {
                entry: self.entry_label,
                start_ms,
                end_ms: now_ms(),
                duration_ms: timer.elapsed().as_millis() as u64,
            },
        })
    }
}

/// Milliseconds since the unix epoch; 0 if the clock reads before it.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Spawns the worker thread for a job. The worker posts its outcome into
/// `shared` before notifying, so the coordinator always finds it there.
pub(crate) fn spawn_worker(
    id: JobId,
    task: EngineTask,
    shared: Arc<JobShared>,
    waker: WakeHandle,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("lacquer-render-{}", id.0))
        .spawn(move || {
            *shared.state.lock() = JobState::Running;
            log::debug!("{}: worker running", id);
            let outcome = task.run();
            *shared.outcome.lock() = Some(outcome);
            if !waker.notify(Notice::JobDone(id)) {
                log::warn!("{}: coordinator gone before completion", id);
            }
        })
}
