use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskPhase {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubmissionGate {
    Open,
    StopRequested,
    Submitted,
}

/// Flags shared between a task handle and its worker thread.
pub struct TaskControl {
    phase: AtomicU8,
    gate: AtomicU8,
}

impl Default for TaskControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskControl {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(TaskPhase::Pending as u8),
            gate: AtomicU8::new(SubmissionGate::Open as u8),
        }
    }

    pub fn set_phase(&self, phase: TaskPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn phase(&self) -> TaskPhase {
        match self.phase.load(Ordering::Acquire) {
            0 => TaskPhase::Pending,
            1 => TaskPhase::Running,
            _ => TaskPhase::Done,
        }
    }

    pub fn gate(&self) -> SubmissionGate {
        match self.gate.load(Ordering::Acquire) {
            0 => SubmissionGate::Open,
            1 => SubmissionGate::StopRequested,
            _ => SubmissionGate::Submitted,
        }
    }

    /// Asks the worker to stop and returns the gate state it found.
    ///
    /// Has no effect once GPU work was submitted.
    pub fn request_stop(&self) -> SubmissionGate {
        match self.gate.compare_exchange(
            SubmissionGate::Open as u8,
            SubmissionGate::StopRequested as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => SubmissionGate::Open,
            Err(_) => self.gate(),
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.gate() == SubmissionGate::StopRequested
    }

    /// Closes the gate for cancellation. False when a stop was requested first.
    pub fn begin_submission(&self) -> bool {
        self.gate
            .compare_exchange(
                SubmissionGate::Open as u8,
                SubmissionGate::Submitted as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Worker-side view of a [`TaskControl`].
#[derive(Clone)]
pub struct StopToken {
    control: Arc<TaskControl>,
}

impl StopToken {
    pub fn new(control: Arc<TaskControl>) -> Self {
        Self { control }
    }

    pub fn stop_requested(&self) -> bool {
        self.control.stop_requested()
    }

    /// Must be called right before the command buffer is submitted.
    pub fn begin_submission(&self) -> bool {
        self.control.begin_submission()
    }
}
