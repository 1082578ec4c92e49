use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use crossbeam_channel::{Receiver, bounded};

use crate::error::StateError;

use super::{StopToken, SubmissionGate, TaskControl, TaskOutcome, TaskPhase};

static NEXT_TASK_ID: AtomicUsize = AtomicUsize::new(0);

/// Marks the task done when the worker returns or unwinds.
struct DoneGuard(Arc<TaskControl>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.set_phase(TaskPhase::Done);
    }
}

/// Owner-side view of a task running on its own worker thread.
pub struct TaskHandle<F> {
    id: usize,
    control: Arc<TaskControl>,
    result_rx: Receiver<anyhow::Result<TaskOutcome<F>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<F: Send + 'static> TaskHandle<F> {
    /// Starts `work` on a new thread named `vibwa-task-<n>`.
    pub fn spawn<W>(work: W) -> anyhow::Result<Self>
    where
        W: FnOnce(StopToken) -> anyhow::Result<TaskOutcome<F>> + Send + 'static,
    {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let control = Arc::new(TaskControl::new());
        let (result_tx, result_rx) = bounded(1);

        let worker = {
            let control = control.clone();
            thread::Builder::new()
                .name(format!("vibwa-task-{id}"))
                .spawn(move || {
                    control.set_phase(TaskPhase::Running);
                    let _done = DoneGuard(control.clone());
                    let result = work(StopToken::new(control));
                    if let Err(e) = &result {
                        log::error!("Task {id} failed: {e:?}");
                    }
                    let _ = result_tx.send(result);
                })?
        };

        Ok(Self {
            id,
            control,
            result_rx,
            worker: Some(worker),
        })
    }
}

impl<F> TaskHandle<F> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn phase(&self) -> TaskPhase {
        self.control.phase()
    }

    pub fn is_started(&self) -> bool {
        self.phase() != TaskPhase::Pending
    }

    pub fn is_running(&self) -> bool {
        self.phase() == TaskPhase::Running
    }

    pub fn is_done(&self) -> bool {
        self.phase() == TaskPhase::Done
    }

    pub fn status_message(&self) -> &'static str {
        match (self.phase(), self.control.gate()) {
            (TaskPhase::Pending, _) => "Task is waiting to start.",
            (TaskPhase::Running, SubmissionGate::StopRequested) => "Task cancellation requested.",
            (TaskPhase::Running, SubmissionGate::Submitted) => "Task is executing on the device.",
            (TaskPhase::Running, SubmissionGate::Open) => "Task is preparing.",
            (TaskPhase::Done, SubmissionGate::StopRequested) => "Task was cancelled.",
            (TaskPhase::Done, _) => "Task finished.",
        }
    }

    /// Requests a stop. True when the request will be observed by the worker.
    pub fn cancel(&self) -> bool {
        if self.is_done() {
            return false;
        }
        match self.control.request_stop() {
            SubmissionGate::Open => true,
            SubmissionGate::StopRequested => false,
            SubmissionGate::Submitted => {
                log::warn!("Task {} already submitted to the device; cancel ignored", self.id);
                false
            }
        }
    }

    /// Blocks until the worker exits and returns its outcome.
    pub fn wait(&mut self) -> anyhow::Result<TaskOutcome<F>> {
        let worker = self.worker.take().ok_or(StateError::ResultConsumed)?;
        if worker.join().is_err() {
            anyhow::bail!("task {} worker panicked", self.id);
        }
        match self.result_rx.try_recv() {
            Ok(result) => result,
            Err(_) => anyhow::bail!("task {} worker exited without a result", self.id),
        }
    }
}

impl<F> Drop for TaskHandle<F> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.control.request_stop();
            worker.join().ok();
        }
    }
}
