//! The coordinator host: owns the notice loop and the job table, and
//! exposes the render entry points.
//!
//! A host is bound to the thread that creates it and is not `Send`.
//! Every handler declared in [`RenderOptions`] runs on that thread: the
//! synchronous entry points call handlers inline, and the asynchronous
//! ones run them from [`Host::run_until_idle`] or [`Host::turn`] while
//! worker threads block on their bridges. Completion callbacks run on
//! this thread too, after the worker has been joined.

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use slab::Slab;

use lacquer_engine::{EngineOptions, FunctionHost, ImportHook};

use crate::bridge::{BridgeMode, Poison};
use crate::error::RenderError;
use crate::event_loop::{notice_channel, Notice, WakeHandle};
use crate::handlers::{BridgedFunctions, BridgedImporter};
use crate::job::{spawn_worker, EngineTask, Job, JobId, JobShared, JobState, RenderInput};
use crate::options::{RenderOptions, RenderOutput};
use crate::registry::PendingCalls;

/// Coordinator for renders and the host callbacks they trigger.
pub struct Host {
    jobs: Slab<Job>,
    waker: WakeHandle,
    notices: Receiver<Notice>,
}

impl Host {
    pub fn new() -> Host {
        let (waker, notices) = notice_channel();
        Host { jobs: Slab::new(), waker, notices }
    }

    /// Renders stylesheet text on a worker thread. Exactly one of the two
    /// callbacks runs on this thread once the job finishes; drive the
    /// host with [`run_until_idle`](Host::run_until_idle) or
    /// [`turn`](Host::turn) until it does.
    pub fn render<S, E>(
        &mut self,
        source: impl Into<String>,
        options: RenderOptions,
        on_success: S,
        on_error: E,
    ) -> Result<JobId, RenderError>
    where
        S: FnOnce(RenderOutput) + 'static,
        E: FnOnce(RenderError) + 'static,
    {
        let label = options.input_label.clone().unwrap_or_else(|| "data".to_string());
        self.submit(
            RenderInput::Source(source.into()),
            options,
            label,
            Box::new(on_success),
            Box::new(on_error),
        )
    }

    /// Renders a stylesheet file on a worker thread.
    pub fn render_file<S, E>(
        &mut self,
        path: impl Into<PathBuf>,
        options: RenderOptions,
        on_success: S,
        on_error: E,
    ) -> Result<JobId, RenderError>
    where
        S: FnOnce(RenderOutput) + 'static,
        E: FnOnce(RenderError) + 'static,
    {
        let path = path.into();
        let label = options.input_label.clone().unwrap_or_else(|| path.display().to_string());
        self.submit(
            RenderInput::File(path),
            options,
            label,
            Box::new(on_success),
            Box::new(on_error),
        )
    }

    /// Renders stylesheet text on the calling thread, blocking until it
    /// finishes. Handlers are called directly; one that defers its
    /// completion fails the call.
    pub fn render_sync(
        &self,
        source: impl Into<String>,
        options: RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        let label = options.input_label.clone().unwrap_or_else(|| "data".to_string());
        let (engine_options, _) = self.engine_options(&options, BridgeMode::Synchronous, &label)?;
        EngineTask {
            input: RenderInput::Source(source.into()),
            options: engine_options,
            entry_label: label,
        }
        .run()
    }

    /// Renders a stylesheet file on the calling thread.
    pub fn render_file_sync(
        &self,
        path: impl Into<PathBuf>,
        options: RenderOptions,
    ) -> Result<RenderOutput, RenderError> {
        let path = path.into();
        let label = options.input_label.clone().unwrap_or_else(|| path.display().to_string());
        let (engine_options, _) = self.engine_options(&options, BridgeMode::Synchronous, &label)?;
        EngineTask { input: RenderInput::File(path), options: engine_options, entry_label: label }
            .run()
    }

    /// Services notices until every submitted job has completed.
    pub fn run_until_idle(&mut self) {
        while !self.jobs.is_empty() {
            match self.notices.recv() {
                Ok(notice) => self.handle(notice),
                Err(_) => break,
            }
        }
    }

    /// Services a single notice, blocking until one arrives. Returns
    /// false once no jobs remain.
    pub fn turn(&mut self) -> bool {
        if self.jobs.is_empty() {
            return false;
        }
        match self.notices.recv() {
            Ok(notice) => {
                self.handle(notice);
                !self.jobs.is_empty()
            }
            Err(_) => false,
        }
    }

    /// Number of jobs that have not completed yet.
    pub fn active_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Current state of a job, or `None` once it has completed and left
    /// the table.
    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        self.jobs.get(id.0).map(|job| *job.shared.state.lock())
    }

    fn handle(&mut self, notice: Notice) {
        match notice {
            Notice::Dispatch(dispatch) => dispatch.dispatch(),
            Notice::JobDone(id) => {
                if self.jobs.contains(id.0) {
                    self.jobs.remove(id.0).finalize(id);
                } else {
                    log::warn!("{}: completion notice for unknown job", id);
                }
            }
        }
    }

    fn submit(
        &mut self,
        input: RenderInput,
        options: RenderOptions,
        label: String,
        on_success: Box<dyn FnOnce(RenderOutput)>,
        on_error: Box<dyn FnOnce(RenderError)>,
    ) -> Result<JobId, RenderError> {
        let (engine_options, bridges) =
            self.engine_options(&options, BridgeMode::CrossThread, &label)?;
        let shared = JobShared::new();
        let entry = self.jobs.vacant_entry();
        let id = JobId(entry.key());
        let task = EngineTask { input, options: engine_options, entry_label: label };
        log::debug!("{}: submitted (`{}`)", id, task.entry_label);

        *shared.state.lock() = JobState::Scheduled;
        let worker = match spawn_worker(id, task, Arc::clone(&shared), self.waker.clone()) {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Deliver the failure through the normal completion path
                // so the error callback still runs on this thread.
                log::error!("{}: failed to spawn worker: {}", id, e);
                *shared.outcome.lock() = Some(Err(RenderError::Spawn(e.to_string())));
                self.waker.notify(Notice::JobDone(id));
                None
            }
        };
        entry.insert(Job { shared, worker, bridges, on_success, on_error });
        Ok(id)
    }

    /// Builds the engine options for one render, wiring the declared
    /// handlers up to fresh bridges.
    fn engine_options(
        &self,
        options: &RenderOptions,
        mode: BridgeMode,
        label: &str,
    ) -> Result<(EngineOptions, Vec<Arc<dyn Poison>>), RenderError> {
        let deadline = options.callback_timeout;
        let mut poisons = Vec::new();

        let functions =
            BridgedFunctions::build(&options.functions, mode, &self.waker, deadline)?;
        if let Some(functions) = &functions {
            poisons.extend(functions.poison_handles());
        }
        let importer = options.importer.clone().map(|handler| {
            BridgedImporter::build(handler, mode, &self.waker, deadline, PendingCalls::new())
        });
        if let Some(importer) = &importer {
            poisons.push(importer.poison_handle());
        }

        let engine_options = EngineOptions {
            style: options.style,
            precision: options.precision,
            source_comments: options.source_comments,
            include_paths: options.include_paths.clone(),
            input_label: label.to_string(),
            functions: functions.map(|f| f as Arc<dyn FunctionHost>),
            importer: importer.map(|i| i as Arc<dyn ImportHook>),
        };
        Ok((engine_options, poisons))
    }
}

impl Default for Host {
    fn default() -> Host {
        Host::new()
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        // Fail outstanding bridge calls so blocked workers can exit, then
        // wait for them. Their completion callbacks never run.
        log::warn!("host dropped with {} active job(s)", self.jobs.len());
        for (_, job) in self.jobs.iter() {
            for bridge in &job.bridges {
                bridge.poison();
            }
        }
        for (key, job) in self.jobs.iter_mut() {
            if let Some(worker) = job.worker.take() {
                if worker.join().is_err() {
                    log::error!("job {}: worker panicked during teardown", key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_sync_render_produces_css_and_stats() {
        let host = Host::new();
        let output = host.render_sync("a{b:1px}", RenderOptions::default()).expect("render");
        assert_eq!(output.css, "a {\n  b: 1px; }\n");
        assert_eq!(output.stats.entry, "data");
    }

    #[test]
    fn test_async_render_completes_on_this_thread() {
        let mut host = Host::new();
        let seen: Rc<RefCell<Option<RenderOutput>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        let id = host
            .render(
                "a{b:1px}",
                RenderOptions::default(),
                move |output| *slot.borrow_mut() = Some(output),
                |error| panic!("render failed: {}", error),
            )
            .expect("submit");
        assert!(matches!(
            host.job_state(id),
            Some(JobState::Scheduled) | Some(JobState::Running)
        ));
        host.run_until_idle();
        assert_eq!(host.active_jobs(), 0);
        assert_eq!(host.job_state(id), None);
        let output = seen.borrow_mut().take().expect("completed");
        assert_eq!(output.css, "a {\n  b: 1px; }\n");
    }

    #[test]
    fn test_bad_signature_is_rejected_at_submission() {
        let mut host = Host::new();
        let mut options = RenderOptions::default();
        options.functions.push((
            "broken($a".to_string(),
            crate::handlers::FunctionHandler::Immediate(Arc::new(|_| Ok(lacquer_value::Value::Null))),
        ));
        let submitted = host.render("a{b:1px}", options, |_| {}, |_| {});
        assert!(matches!(submitted, Err(RenderError::Signature(_))));
        assert_eq!(host.active_jobs(), 0);
    }
}
