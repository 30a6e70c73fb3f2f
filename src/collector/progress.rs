//! Progress reporting for collection runs
//!
//! Progress is a fraction in `0.0..=1.0`. Fixed checkpoints mark the setup
//! phases; the dispatch phase spreads the rest of the range evenly over the
//! windows as they are handed to the worker pool. Emitted values never
//! decrease.

use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Emitted when a run starts
pub const PROGRESS_STARTED: f32 = 0.0;
/// Emitted once the access token is available
pub const PROGRESS_CREDENTIAL_ACQUIRED: f32 = 0.1;
/// Emitted once earlier results have been removed
pub const PROGRESS_PRIOR_DATA_CLEARED: f32 = 0.2;
/// Dispatch progress starts from here
pub const PROGRESS_BASELINE: f32 = 0.3;
/// Emitted after every task finished successfully
pub const PROGRESS_DONE: f32 = 1.0;

/// Receiver of progress values
pub trait ProgressSink: Send + Sync {
    /// Called with each new progress value
    fn report(&self, progress: f32);
}

impl ProgressSink for UnboundedSender<f32> {
    fn report(&self, progress: f32) {
        // A dropped receiver just means nobody is watching.
        let _ = self.send(progress);
    }
}

/// Adapts a closure into a [`ProgressSink`]
pub struct ProgressFn<F>(pub F);

impl<F> ProgressSink for ProgressFn<F>
where
    F: Fn(f32) + Send + Sync,
{
    fn report(&self, progress: f32) {
        (self.0)(progress)
    }
}

/// Lifecycle of a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started
    Idle,
    /// Access token obtained
    CredentialAcquired,
    /// Earlier results removed
    PriorDataCleared,
    /// Handing windows to the worker pool
    Dispatching {
        /// Windows submitted so far
        dispatched: usize,
        /// Windows in this run
        total: usize,
    },
    /// Waiting for the last tasks
    Draining,
    /// Every window collected
    Done,
    /// Run ended with an error
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CredentialAcquired => write!(f, "credential acquired"),
            Self::PriorDataCleared => write!(f, "prior data cleared"),
            Self::Dispatching { dispatched, total } => {
                write!(f, "dispatching {dispatched}/{total}")
            }
            Self::Draining => write!(f, "draining"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Progress after `dispatched` of `total` windows were submitted
///
/// With no windows the run is already complete.
pub fn dispatch_progress(dispatched: usize, total: usize) -> f32 {
    if total == 0 {
        return PROGRESS_DONE;
    }
    let ratio = (dispatched.min(total) as f32) / (total as f32);
    (PROGRESS_BASELINE + ratio * (PROGRESS_DONE - PROGRESS_BASELINE)).min(PROGRESS_DONE)
}

/// Tracks run state and forwards monotonic progress to a sink
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    state: RunState,
    last: Option<f32>,
}

impl<'a> ProgressReporter<'a> {
    /// Create an idle reporter
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            state: RunState::Idle,
            last: None,
        }
    }

    /// Current run state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run started
    pub fn started(&mut self) {
        self.emit(PROGRESS_STARTED);
    }

    /// Access token obtained
    pub fn credential_acquired(&mut self) {
        self.transition(RunState::CredentialAcquired);
        self.emit(PROGRESS_CREDENTIAL_ACQUIRED);
    }

    /// Earlier results removed
    pub fn prior_data_cleared(&mut self) {
        self.transition(RunState::PriorDataCleared);
        self.emit(PROGRESS_PRIOR_DATA_CLEARED);
    }

    /// Windows computed, dispatch about to begin
    pub fn windows_ready(&mut self, total: usize) {
        self.transition(RunState::Dispatching {
            dispatched: 0,
            total,
        });
        self.emit(dispatch_progress(0, total));
    }

    /// Next window is about to be submitted
    ///
    /// Progress reflects the windows handed over before this one, so the
    /// dispatch phase stays below [`PROGRESS_DONE`] until [`done`](Self::done).
    pub fn dispatching_window(&mut self) {
        if let RunState::Dispatching { dispatched, total } = self.state {
            debug!("{}", format_progress(dispatched, total));
            self.emit(dispatch_progress(dispatched, total));
            self.state = RunState::Dispatching {
                dispatched: dispatched + 1,
                total,
            };
        }
    }

    /// Every window submitted, waiting for workers
    pub fn draining(&mut self) {
        self.transition(RunState::Draining);
    }

    /// Run completed successfully
    pub fn done(&mut self) {
        self.transition(RunState::Done);
        self.emit(PROGRESS_DONE);
    }

    /// Run ended with an error
    pub fn failed(&mut self) {
        self.transition(RunState::Failed);
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Collection state changed");
        self.state = next;
    }

    fn emit(&mut self, value: f32) {
        let value = value.clamp(0.0, PROGRESS_DONE);
        match self.last {
            Some(last) if value <= last => {}
            _ => {
                self.last = Some(value);
                self.sink.report(value);
            }
        }
    }
}

/// Human-readable dispatch progress line for logging
pub fn format_progress(dispatched: usize, total: usize) -> String {
    format!(
        "[PROGRESS] Dispatched {dispatched}/{total} windows - {:.1}% complete",
        dispatch_progress(dispatched, total) * 100.0
    )
}
