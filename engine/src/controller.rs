// === RUN CONTROLLER ===
// Owns the RunState and drives at most one background worker. The worker
// computes only: it owns its ResultSet, toolkit and memory probe, and its
// last act is posting a RunOutcome on a one-shot channel. The foreground
// receives that outcome and acknowledges it, which is when the state
// becomes Completed. A worker whose handle was dropped releases the
// controller itself, back to Idle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::memory_probe::ProbeFactory;
use crate::plan::Plan;
use crate::record::ResultSet;
use crate::runner::{CancelToken, RunEvent, RunSummary, Runner};
use crate::stress::{run_stress, StressConfig, StressIteration};
use crate::toolkit::ToolkitFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Cancelling = 2,
    Completed = 3,
}

impl RunState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Cancelling,
            3 => Self::Completed,
            _ => Self::Idle,
        }
    }

    /// True while a worker is alive or its outcome has not been acknowledged.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Running | Self::Cancelling)
    }
}

/// What a worker executes.
#[derive(Debug, Clone)]
pub enum Workload {
    Once(Plan),
    Stress(StressConfig),
}

/// Everything the foreground learns about a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// Records of the run (for stress runs: of the last iteration).
    pub results: ResultSet,
    pub summary: RunSummary,
    pub iterations: Vec<StressIteration>,
    /// The worker panicked outside any step.
    pub crashed: bool,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn cancelled(&self) -> bool {
        self.summary.cancelled
    }

    /// Ran to the end without cancellation or crash.
    pub fn is_success(&self) -> bool {
        !self.summary.cancelled && !self.crashed
    }

    fn lost(run_id: Uuid, elapsed: Duration) -> Self {
        Self {
            run_id,
            results: ResultSet::new(),
            summary: RunSummary::default(),
            iterations: Vec::new(),
            crashed: true,
            elapsed,
        }
    }
}

/// Foreground end of one run.
///
/// Whoever holds the handle owns the run's outcome and is expected to pass
/// it to [`RunController::acknowledge`]. Dropping the handle abandons the
/// outcome; the worker then returns the controller to `Idle` when it
/// finishes, so `start` works again without an acknowledgement.
pub struct RunHandle {
    run_id: Uuid,
    started: Instant,
    done: oneshot::Receiver<RunOutcome>,
    events: Option<UnboundedReceiver<RunEvent>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Progress events of this run. Can be taken once.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<RunEvent>> {
        self.events.take()
    }

    /// Resolve once the worker has posted its outcome.
    pub async fn wait(self) -> RunOutcome {
        let run_id = self.run_id;
        let started = self.started;
        self.done
            .await
            .unwrap_or_else(|_| RunOutcome::lost(run_id, started.elapsed()))
    }

    /// Block the calling thread until the outcome arrives. Not for use
    /// inside an async runtime.
    pub fn wait_blocking(self) -> RunOutcome {
        let run_id = self.run_id;
        let started = self.started;
        self.done
            .blocking_recv()
            .unwrap_or_else(|_| RunOutcome::lost(run_id, started.elapsed()))
    }

    /// Non-blocking poll for foreground loops that tick.
    pub fn try_outcome(&mut self) -> Option<RunOutcome> {
        match self.done.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(RunOutcome::lost(self.run_id, self.started.elapsed()))
            }
        }
    }
}

// State the worker needs to reach after its handle is gone.
struct Shared {
    state: AtomicU8,
    current: Mutex<Option<Uuid>>,
}

impl Shared {
    fn load(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn store(&self, state: RunState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn set_current(&self, run_id: Option<Uuid>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = run_id;
    }

    /// End `run_id` in state `to`, if it is still the current run.
    fn release(&self, run_id: Uuid, to: RunState) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if *current != Some(run_id) {
            return false;
        }
        *current = None;
        self.store(to);
        true
    }
}

pub struct RunController {
    shared: Arc<Shared>,
    cancel: CancelToken,
    toolkit: ToolkitFactory,
    probe: ProbeFactory,
}

impl RunController {
    pub fn new(toolkit: ToolkitFactory, probe: ProbeFactory) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(RunState::Idle as u8),
                current: Mutex::new(None),
            }),
            cancel: CancelToken::new(),
            toolkit,
            probe,
        }
    }

    pub fn state(&self) -> RunState {
        self.shared.load()
    }

    /// Start a single pass over `plan`. `None` if a run is already active.
    pub fn start(&self, plan: Plan) -> Option<RunHandle> {
        self.start_workload(Workload::Once(plan))
    }

    pub fn start_stress(&self, config: StressConfig) -> Option<RunHandle> {
        self.start_workload(Workload::Stress(config))
    }

    pub fn start_workload(&self, workload: Workload) -> Option<RunHandle> {
        if !self.claim() {
            debug!("start ignored, run already active");
            return None;
        }
        self.cancel.reset();

        let run_id = Uuid::new_v4();
        self.shared.set_current(Some(run_id));

        let (done_tx, done_rx) = oneshot::channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.clone();
        let toolkit = Arc::clone(&self.toolkit);
        let probe = Arc::clone(&self.probe);
        let shared = Arc::clone(&self.shared);
        let started = Instant::now();

        let spawned = thread::Builder::new()
            .name(format!("bench-{}", run_id))
            .spawn(move || {
                let mut results = ResultSet::new();
                let mut iterations = Vec::new();

                let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                    let mut toolkit = toolkit();
                    let mut probe = probe();
                    let mut runner = Runner::new(toolkit.as_mut(), probe.as_mut(), cancel.clone())
                        .with_events(event_tx);
                    match &workload {
                        Workload::Once(plan) => runner.run(plan, &mut results),
                        Workload::Stress(config) => {
                            let stress = run_stress(&mut runner, config, &cancel);
                            iterations = stress.iterations;
                            if let Some(last) = iterations.last() {
                                results = last.results.clone();
                            }
                            stress.summary
                        }
                    }
                }));

                let (summary, crashed) = match attempt {
                    Ok(summary) => (summary, false),
                    Err(_) => {
                        error!("benchmark worker {} panicked", run_id);
                        let summary = RunSummary {
                            steps: Vec::new(),
                            cancelled: cancel.is_cancelled(),
                        };
                        (summary, true)
                    }
                };

                let outcome = RunOutcome {
                    run_id,
                    results,
                    summary,
                    iterations,
                    crashed,
                    elapsed: started.elapsed(),
                };
                info!(
                    "run {} finished in {:.3}s ({} records, cancelled: {})",
                    run_id,
                    outcome.elapsed.as_secs_f64(),
                    outcome.results.len(),
                    outcome.cancelled()
                );
                if done_tx.send(outcome).is_err() {
                    warn!("run {} finished but nobody is waiting", run_id);
                    shared.release(run_id, RunState::Idle);
                }
            });

        if let Err(e) = spawned {
            error!("could not spawn benchmark worker: {}", e);
            self.shared.set_current(None);
            self.shared.store(RunState::Idle);
            return None;
        }

        info!("run {} started", run_id);
        Some(RunHandle {
            run_id,
            started,
            done: done_rx,
            events: Some(event_rx),
        })
    }

    /// Idle/Completed -> Running, atomically.
    fn claim(&self) -> bool {
        for from in [RunState::Idle, RunState::Completed] {
            if self
                .shared
                .state
                .compare_exchange(
                    from as u8,
                    RunState::Running as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return true;
            }
        }
        false
    }

    /// Ask the active run to stop at its next checkpoint. Returns whether a
    /// running run was asked; a no-op in every other state.
    pub fn cancel(&self) -> bool {
        let asked = self
            .shared
            .state
            .compare_exchange(
                RunState::Running as u8,
                RunState::Cancelling as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if asked {
            self.cancel.cancel();
            info!("cancellation requested");
        }
        asked
    }

    /// Record that the foreground has received `outcome`. Only the outcome
    /// of the current run moves the state to Completed.
    pub fn acknowledge(&self, outcome: &RunOutcome) -> bool {
        if !self.shared.release(outcome.run_id, RunState::Completed) {
            warn!("ignoring outcome of stale run {}", outcome.run_id);
            return false;
        }
        true
    }

    /// Start, wait and acknowledge in one call, from a thread that may block.
    pub fn run_blocking(&self, workload: Workload) -> Option<RunOutcome> {
        let handle = self.start_workload(workload)?;
        let outcome = handle.wait_blocking();
        self.acknowledge(&outcome);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_probe::unavailable_factory;
    use crate::plan::{StepKind, StepSpec};
    use crate::toolkit::headless_factory;

    fn controller() -> RunController {
        RunController::new(headless_factory(), unavailable_factory())
    }

    #[test]
    fn starts_idle_and_cancel_is_noop() {
        let ctl = controller();
        assert_eq!(ctl.state(), RunState::Idle);
        assert!(!ctl.cancel());
        assert_eq!(ctl.state(), RunState::Idle);
    }

    #[test]
    fn blocking_run_reaches_completed() {
        let ctl = controller();
        let outcome = ctl
            .run_blocking(Workload::Once(Plan::single(StepKind::Treeview, 25)))
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(ctl.state(), RunState::Completed);
        assert_eq!(outcome.results.get("treeview").unwrap().metric("items"), Some(25.0));
        assert!(!ctl.cancel());
    }

    #[test]
    fn second_start_while_running_is_rejected() {
        let ctl = controller();
        let plan = Plan::new(vec![StepSpec::new(StepKind::LabelUpdates, 200_000)]);
        let handle = ctl.start(plan.clone()).unwrap();
        assert!(ctl.start(plan).is_none());

        let outcome = handle.wait_blocking();
        assert_eq!(ctl.state(), RunState::Running);
        assert!(ctl.acknowledge(&outcome));
        assert_eq!(ctl.state(), RunState::Completed);
    }

    #[test]
    fn dropped_handle_frees_the_controller() {
        let ctl = controller();
        let handle = ctl.start(Plan::single(StepKind::Treeview, 50)).unwrap();
        drop(handle);

        let deadline = Instant::now() + Duration::from_secs(10);
        let next = loop {
            if let Some(next) = ctl.start(Plan::single(StepKind::Treeview, 5)) {
                break next;
            }
            assert!(Instant::now() < deadline, "controller stuck in {:?}", ctl.state());
            thread::sleep(Duration::from_millis(5));
        };

        let outcome = next.wait_blocking();
        assert!(outcome.is_success());
        assert!(ctl.acknowledge(&outcome));
        assert_eq!(ctl.state(), RunState::Completed);
    }

    #[test]
    fn stale_outcome_is_not_acknowledged() {
        let ctl = controller();
        let first = ctl
            .run_blocking(Workload::Once(Plan::single(StepKind::Treeview, 1)))
            .unwrap();
        let handle = ctl.start(Plan::single(StepKind::Treeview, 1)).unwrap();

        assert!(!ctl.acknowledge(&first));
        assert_eq!(ctl.state(), RunState::Running);

        let second = handle.wait_blocking();
        assert!(ctl.acknowledge(&second));
    }
}
