// === BENCHMARK RUNNER ===
// Executes a Plan step by step against a Toolkit, writing one
// MeasurementRecord per successful step. A step that fails, is invalid or
// panics is reported and skipped; only cancellation ends a run early.

use std::hint::black_box;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::error::StepError;
use crate::memory_probe::MemoryProbe;
use crate::plan::{Plan, StepKind, StepSpec};
use crate::record::{MeasurementRecord, Metrics, ResultSet};
use crate::report::result_line;
use crate::toolkit::{Geometry, Toolkit, WidgetKind};

const MB: usize = 1024 * 1024;
const PAGE_STRIDE: usize = 1024;

/// Shared cancellation flag. The foreground sets it, the worker only reads it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a single step ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Record written; carries the display line.
    Completed(String),
    Invalid(String),
    Failed(String),
    Cancelled,
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub kind: StepKind,
    pub size: i64,
    pub outcome: StepOutcome,
}

impl StepReport {
    /// Status text for the step's result label.
    pub fn status_line(&self) -> String {
        match &self.outcome {
            StepOutcome::Completed(line) => line.clone(),
            StepOutcome::Invalid(msg) => format!("{}: {}", self.kind.title(), msg),
            StepOutcome::Failed(msg) => format!("{}: Error - {}", self.kind.title(), msg),
            StepOutcome::Cancelled => format!("{}: Cancelled", self.kind.title()),
        }
    }
}

/// Progress notifications for the display collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    IterationStarted { iteration: u32, total: u32 },
    StepStarted { kind: StepKind, size: i64 },
    StepFinished(StepReport),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub steps: Vec<StepReport>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_completed()).count()
    }
}

pub struct Runner<'a> {
    toolkit: &'a mut dyn Toolkit,
    probe: &'a mut dyn MemoryProbe,
    cancel: CancelToken,
    events: Option<UnboundedSender<RunEvent>>,
}

impl<'a> Runner<'a> {
    pub fn new(
        toolkit: &'a mut dyn Toolkit,
        probe: &'a mut dyn MemoryProbe,
        cancel: CancelToken,
    ) -> Self {
        Self {
            toolkit,
            probe,
            cancel,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run every step of `plan` in order, writing into `results`.
    pub fn run(&mut self, plan: &Plan, results: &mut ResultSet) -> RunSummary {
        let mut summary = RunSummary::default();

        for spec in &plan.steps {
            if self.cancel.is_cancelled() {
                info!("run cancelled before {}", spec.kind.name());
                summary.cancelled = true;
                break;
            }

            let report = self.run_step(*spec, results);
            let cancelled = report.outcome == StepOutcome::Cancelled;
            summary.steps.push(report);
            if cancelled {
                summary.cancelled = true;
                break;
            }
        }

        summary
    }

    /// Run one step. Never panics and never propagates a step error.
    pub fn run_step(&mut self, spec: StepSpec, results: &mut ResultSet) -> StepReport {
        self.emit(RunEvent::StepStarted {
            kind: spec.kind,
            size: spec.size,
        });
        debug!("starting {} with size {}", spec.kind.name(), spec.size);

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| self.execute(spec)));
        let outcome = match attempt {
            Ok(Ok(Some(record))) => {
                let line = result_line(&record);
                info!("{}", line);
                results.insert(record);
                StepOutcome::Completed(line)
            }
            Ok(Ok(None)) => StepOutcome::Cancelled,
            Ok(Err(StepError::InvalidParameter { what, .. })) => {
                warn!("{} skipped: invalid {}", spec.kind.name(), what);
                StepOutcome::Invalid(format!("Invalid {}.", what))
            }
            Ok(Err(e)) => {
                warn!("{} failed: {}", spec.kind.name(), e);
                StepOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let e = StepError::UnexpectedFailure(panic_message(payload.as_ref()));
                warn!("{} failed: {}", spec.kind.name(), e);
                StepOutcome::Failed(e.to_string())
            }
        };

        let report = StepReport {
            kind: spec.kind,
            size: spec.size,
            outcome,
        };
        self.emit(RunEvent::StepFinished(report.clone()));
        report
    }

    pub(crate) fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // The receiver may have gone away; the run does not care.
            let _ = tx.send(event);
        }
    }

    /// `Ok(None)` means the step observed cancellation and wrote nothing.
    fn execute(&mut self, spec: StepSpec) -> Result<Option<MeasurementRecord>, StepError> {
        let count = positive(spec)?;
        match spec.kind {
            StepKind::Treeview => self.treeview(count),
            StepKind::LabelUpdates => self.label_updates(count),
            StepKind::Windows => self.windows(count),
            StepKind::Widgets => self.widgets(count),
            StepKind::Memory => self.memory(count),
        }
    }

    fn checkpoint(&mut self, i: usize, every: usize) -> bool {
        if i % every == 0 {
            self.toolkit.flush();
            return self.cancel.is_cancelled();
        }
        false
    }

    fn treeview(&mut self, items: usize) -> Result<Option<MeasurementRecord>, StepError> {
        let every = StepKind::Treeview.checkpoint_every();
        let mut rng = rand::rng();
        self.toolkit.clear_rows();

        let start = Instant::now();
        for i in 0..items {
            if self.checkpoint(i, every) {
                return Ok(None);
            }
            let value = format!("Data {}", rng.random_range(0..=1000));
            self.toolkit.insert_row(&format!("Item {}", i + 1), &value);
        }
        self.toolkit.flush();
        let duration = start.elapsed().as_secs_f64();

        Ok(Some(MeasurementRecord::new(
            "treeview",
            Metrics::new()
                .with("items", items as f64)
                .with("duration", duration)
                .with("rate", rate(items as f64, duration)),
        )))
    }

    fn label_updates(&mut self, updates: usize) -> Result<Option<MeasurementRecord>, StepError> {
        let every = StepKind::LabelUpdates.checkpoint_every();
        let maximum = updates as f32;
        self.toolkit.set_progress(0.0, maximum);
        self.toolkit.flush();

        let start = Instant::now();
        for i in 0..updates {
            if self.checkpoint(i, every) {
                return Ok(None);
            }
            self.toolkit
                .set_label(&format!("Dynamic Label: Update {}/{}", i + 1, updates));
            self.toolkit.set_progress((i + 1) as f32, maximum);
        }
        self.toolkit
            .set_label(&format!("Dynamic Label: Update {}/{}", updates, updates));
        self.toolkit.set_progress(maximum, maximum);
        self.toolkit.flush();
        let duration = start.elapsed().as_secs_f64();

        Ok(Some(MeasurementRecord::new(
            "label_updates",
            Metrics::new()
                .with("updates", updates as f64)
                .with("duration", duration)
                .with("rate", rate(updates as f64, duration)),
        )))
    }

    fn windows(&mut self, count: usize) -> Result<Option<MeasurementRecord>, StepError> {
        let every = StepKind::Windows.checkpoint_every();
        let mut rng = rand::rng();
        let mut opened = Vec::with_capacity(count);

        let start = Instant::now();
        for i in 0..count {
            if self.checkpoint(i, every) {
                for id in opened {
                    self.toolkit.close_window(id);
                }
                self.toolkit.flush();
                return Ok(None);
            }
            let geometry = Geometry::new(
                150,
                50,
                rng.random_range(50..=800),
                rng.random_range(50..=600),
            );
            let id = self
                .toolkit
                .open_window(&format!("Test Win {}", i + 1), geometry);
            self.toolkit
                .add_widget(id, 0, WidgetKind::Label, &format!("Window {}", i + 1));
            opened.push(id);
        }
        self.toolkit.flush();
        let creation_duration = start.elapsed().as_secs_f64();

        let destroy_start = Instant::now();
        for id in opened {
            self.toolkit.close_window(id);
        }
        self.toolkit.flush();
        let destroy_duration = destroy_start.elapsed().as_secs_f64();

        Ok(Some(MeasurementRecord::new(
            "windows",
            Metrics::new()
                .with("count", count as f64)
                .with("creation_duration", creation_duration)
                .with("destroy_duration", destroy_duration)
                .with("total_duration", creation_duration + destroy_duration),
        )))
    }

    fn widgets(&mut self, sets: usize) -> Result<Option<MeasurementRecord>, StepError> {
        let every = StepKind::Widgets.checkpoint_every();
        let container = self
            .toolkit
            .open_window("Bulk Widget Creation Test", Geometry::new(400, 300, 0, 0));

        let start = Instant::now();
        for i in 0..sets {
            if self.checkpoint(i, every) {
                self.toolkit.close_window(container);
                return Ok(None);
            }
            self.toolkit
                .add_widget(container, i, WidgetKind::Label, &format!("Set {}:", i + 1));
            self.toolkit.add_widget(container, i, WidgetKind::Button, "B");
            self.toolkit
                .add_widget(container, i, WidgetKind::Entry, &i.to_string());
            self.toolkit.add_widget(container, i, WidgetKind::Checkbox, "C");
        }
        self.toolkit.flush();
        let duration = start.elapsed().as_secs_f64();
        self.toolkit.close_window(container);

        let widgets = (sets * 4) as f64;
        Ok(Some(MeasurementRecord::new(
            "widgets",
            Metrics::new()
                .with("sets", sets as f64)
                .with("widgets", widgets)
                .with("duration", duration)
                .with("rate", rate(widgets, duration)),
        )))
    }

    fn memory(&mut self, size_mb: usize) -> Result<Option<MeasurementRecord>, StepError> {
        let bytes = size_mb.checked_mul(MB).ok_or(StepError::InvalidParameter {
            what: StepKind::Memory.parameter(),
            value: size_mb as i64,
        })?;
        let every = StepKind::Memory.checkpoint_every();
        let start_memory = self.resident_mb()?;

        let start = Instant::now();
        // A request the allocator refuses fails this step, not the process.
        let mut data: Vec<u8> = Vec::new();
        data.try_reserve_exact(bytes).map_err(|e| {
            StepError::UnexpectedFailure(format!("cannot allocate {} MB: {}", size_mb, e))
        })?;
        data.resize(bytes, 0);
        let alloc_done = Instant::now();

        for (n, i) in (0..data.len()).step_by(PAGE_STRIDE).enumerate() {
            if n % every == 0 && self.cancel.is_cancelled() {
                drop(data);
                return Ok(None);
            }
            data[i] = (i % 256) as u8;
        }
        black_box(&mut data);
        let write_done = Instant::now();

        let peak_memory = self.resident_mb()?;

        drop(data);
        let cleanup_done = Instant::now();

        Ok(Some(MeasurementRecord::new(
            "memory",
            Metrics::new()
                .with("size_mb", size_mb as f64)
                .with("alloc_time", (alloc_done - start).as_secs_f64())
                .with("write_time", (write_done - alloc_done).as_secs_f64())
                .with("cleanup_time", (cleanup_done - write_done).as_secs_f64())
                .with("memory_increase_mb", peak_memory - start_memory),
        )))
    }

    fn resident_mb(&mut self) -> Result<f64, StepError> {
        self.probe
            .resident_mb()
            .ok_or_else(|| StepError::ResourceUnavailable("process memory query".to_string()))
    }
}

fn positive(spec: StepSpec) -> Result<usize, StepError> {
    match usize::try_from(spec.size) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(StepError::InvalidParameter {
            what: spec.kind.parameter(),
            value: spec.size,
        }),
    }
}

/// `count / duration`, or zero for a zero duration.
pub fn rate(count: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        count / duration
    } else {
        0.0
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "step panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_probe::UnavailableProbe;
    use crate::toolkit::{HeadlessToolkit, WindowId};

    /// Fixed readings, rising by 10 MB per call.
    struct FakeProbe(f64);

    impl MemoryProbe for FakeProbe {
        fn resident_mb(&mut self) -> Option<f64> {
            self.0 += 10.0;
            Some(self.0)
        }
    }

    /// Cancels the run once the given number of windows have been opened.
    struct CancellingToolkit {
        inner: HeadlessToolkit,
        cancel: CancelToken,
        cancel_after_windows: usize,
        opened: usize,
    }

    impl Toolkit for CancellingToolkit {
        fn name(&self) -> &str {
            "cancelling"
        }
        fn clear_rows(&mut self) {
            self.inner.clear_rows()
        }
        fn insert_row(&mut self, item: &str, value: &str) {
            self.inner.insert_row(item, value)
        }
        fn row_count(&self) -> usize {
            self.inner.row_count()
        }
        fn set_label(&mut self, text: &str) {
            self.inner.set_label(text)
        }
        fn set_progress(&mut self, value: f32, maximum: f32) {
            self.inner.set_progress(value, maximum)
        }
        fn open_window(&mut self, title: &str, geometry: Geometry) -> WindowId {
            self.opened += 1;
            if self.opened >= self.cancel_after_windows {
                self.cancel.cancel();
            }
            self.inner.open_window(title, geometry)
        }
        fn add_widget(&mut self, window: WindowId, row: usize, kind: WidgetKind, text: &str) {
            self.inner.add_widget(window, row, kind, text)
        }
        fn close_window(&mut self, window: WindowId) {
            self.inner.close_window(window)
        }
        fn open_window_count(&self) -> usize {
            self.inner.open_window_count()
        }
        fn flush(&mut self) {
            self.inner.flush()
        }
    }

    fn run_plan(plan: &Plan) -> (ResultSet, RunSummary, HeadlessToolkit) {
        let mut toolkit = HeadlessToolkit::new();
        let mut probe = FakeProbe(100.0);
        let mut results = ResultSet::new();
        let summary = Runner::new(&mut toolkit, &mut probe, CancelToken::new()).run(plan, &mut results);
        (results, summary, toolkit)
    }

    #[test]
    fn treeview_and_label_updates_record_counts() {
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Treeview, 100),
            StepSpec::new(StepKind::LabelUpdates, 50),
        ]);
        let (results, summary, toolkit) = run_plan(&plan);

        assert_eq!(results.len(), 2);
        assert!(!summary.cancelled);

        let tree = results.get("treeview").unwrap();
        assert_eq!(tree.metric("items"), Some(100.0));
        let duration = tree.metric("duration").unwrap();
        assert!(duration >= 0.0);
        let expected = if duration > 0.0 { 100.0 / duration } else { 0.0 };
        assert_eq!(tree.metric("rate"), Some(expected));

        let labels = results.get("label_updates").unwrap();
        assert_eq!(labels.metric("updates"), Some(50.0));
        assert!(labels.metric("duration").unwrap() >= 0.0);

        assert_eq!(toolkit.row_count(), 100);
        assert_eq!(toolkit.label(), "Dynamic Label: Update 50/50");
        assert_eq!(toolkit.progress(), (50.0, 50.0));
    }

    #[test]
    fn zero_windows_is_invalid_and_run_continues() {
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Windows, 0),
            StepSpec::new(StepKind::Widgets, 3),
        ]);
        let (results, summary, _) = run_plan(&plan);

        assert!(!results.contains("windows"));
        assert_eq!(
            summary.steps[0].outcome,
            StepOutcome::Invalid("Invalid number of windows.".to_string())
        );
        assert_eq!(summary.steps[0].status_line(), "Windows: Invalid number of windows.");
        assert_eq!(results.get("widgets").unwrap().metric("widgets"), Some(12.0));
    }

    #[test]
    fn negative_size_is_invalid() {
        let (results, summary, _) = run_plan(&Plan::single(StepKind::Memory, -5));
        assert!(results.is_empty());
        assert!(matches!(summary.steps[0].outcome, StepOutcome::Invalid(_)));
    }

    #[test]
    fn windows_are_all_destroyed() {
        let (results, _, toolkit) = run_plan(&Plan::single(StepKind::Windows, 12));
        let windows = results.get("windows").unwrap();
        assert_eq!(windows.metric("count"), Some(12.0));
        let total = windows.metric("total_duration").unwrap();
        let sum = windows.metric("creation_duration").unwrap() + windows.metric("destroy_duration").unwrap();
        assert!((total - sum).abs() < 1e-12);
        assert_eq!(toolkit.open_window_count(), 0);
    }

    #[test]
    fn memory_uses_probe_delta() {
        let (results, _, _) = run_plan(&Plan::single(StepKind::Memory, 2));
        let memory = results.get("memory").unwrap();
        assert_eq!(memory.metric("size_mb"), Some(2.0));
        assert_eq!(memory.metric("memory_increase_mb"), Some(10.0));
        assert!(memory.metric("alloc_time").unwrap() >= 0.0);
    }

    #[test]
    fn unallocatable_memory_size_fails_the_step_only() {
        let too_big = (isize::MAX as usize / MB + 1) as i64;
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Memory, too_big),
            StepSpec::new(StepKind::Treeview, 10),
        ]);
        let (results, summary, _) = run_plan(&plan);

        match &summary.steps[0].outcome {
            StepOutcome::Failed(msg) => assert!(msg.contains("cannot allocate"), "{}", msg),
            other => panic!("expected a failed memory step, got {:?}", other),
        }
        assert!(!results.contains("memory"));
        assert_eq!(results.get("treeview").unwrap().metric("items"), Some(10.0));
        assert!(!summary.cancelled);
    }

    #[test]
    fn memory_without_probe_fails_but_run_continues() {
        let mut toolkit = HeadlessToolkit::new();
        let mut probe = UnavailableProbe;
        let mut results = ResultSet::new();
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Memory, 1),
            StepSpec::new(StepKind::Treeview, 5),
        ]);
        let summary = Runner::new(&mut toolkit, &mut probe, CancelToken::new()).run(&plan, &mut results);

        assert_eq!(
            summary.steps[0].outcome,
            StepOutcome::Failed("process memory query unavailable".to_string())
        );
        assert!(!results.contains("memory"));
        assert!(results.contains("treeview"));
    }

    #[test]
    fn running_twice_keeps_second_record() {
        let mut toolkit = HeadlessToolkit::new();
        let mut probe = FakeProbe(0.0);
        let mut results = ResultSet::new();
        let mut runner = Runner::new(&mut toolkit, &mut probe, CancelToken::new());

        runner.run(&Plan::single(StepKind::Treeview, 10), &mut results);
        runner.run(&Plan::single(StepKind::Treeview, 20), &mut results);

        assert_eq!(results.len(), 1);
        assert_eq!(results.get("treeview").unwrap().metric("items"), Some(20.0));
    }

    #[test]
    fn cancel_during_step_keeps_earlier_records_only() {
        let cancel = CancelToken::new();
        let mut toolkit = CancellingToolkit {
            inner: HeadlessToolkit::new(),
            cancel: cancel.clone(),
            cancel_after_windows: 15,
            opened: 0,
        };
        let mut probe = FakeProbe(0.0);
        let mut results = ResultSet::new();
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Treeview, 10),
            StepSpec::new(StepKind::LabelUpdates, 10),
            StepSpec::new(StepKind::Windows, 40),
            StepSpec::new(StepKind::Widgets, 10),
            StepSpec::new(StepKind::Memory, 1),
        ]);

        let summary = Runner::new(&mut toolkit, &mut probe, cancel).run(&plan, &mut results);

        assert!(summary.cancelled);
        assert_eq!(results.names().collect::<Vec<_>>(), vec!["treeview", "label_updates"]);
        assert_eq!(summary.steps.len(), 3);
        assert_eq!(summary.steps[2].outcome, StepOutcome::Cancelled);
        assert_eq!(toolkit.open_window_count(), 0);
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut toolkit = HeadlessToolkit::new();
        let mut probe = FakeProbe(0.0);
        let mut results = ResultSet::new();
        let summary = Runner::new(&mut toolkit, &mut probe, cancel)
            .run(&Plan::single(StepKind::Treeview, 10), &mut results);

        assert!(summary.cancelled);
        assert!(summary.steps.is_empty());
        assert!(results.is_empty());
    }

    #[test]
    fn panicking_step_is_reported_as_failure() {
        struct PanickingProbe;
        impl MemoryProbe for PanickingProbe {
            fn resident_mb(&mut self) -> Option<f64> {
                panic!("probe exploded")
            }
        }

        let mut toolkit = HeadlessToolkit::new();
        let mut probe = PanickingProbe;
        let mut results = ResultSet::new();
        let plan = Plan::new(vec![
            StepSpec::new(StepKind::Memory, 1),
            StepSpec::new(StepKind::LabelUpdates, 3),
        ]);
        let summary = Runner::new(&mut toolkit, &mut probe, CancelToken::new()).run(&plan, &mut results);

        assert_eq!(
            summary.steps[0].outcome,
            StepOutcome::Failed("unexpected failure: probe exploded".to_string())
        );
        assert!(results.contains("label_updates"));
    }

    #[test]
    fn events_bracket_each_step() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut toolkit = HeadlessToolkit::new();
        let mut probe = FakeProbe(0.0);
        let mut results = ResultSet::new();
        Runner::new(&mut toolkit, &mut probe, CancelToken::new())
            .with_events(tx)
            .run(&Plan::single(StepKind::Treeview, 3), &mut results);

        assert_eq!(
            rx.try_recv().unwrap(),
            RunEvent::StepStarted {
                kind: StepKind::Treeview,
                size: 3
            }
        );
        match rx.try_recv().unwrap() {
            RunEvent::StepFinished(report) => assert!(report.outcome.is_completed()),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn rate_is_zero_for_zero_duration() {
        assert_eq!(rate(10.0, 0.0), 0.0);
        assert_eq!(rate(10.0, 2.0), 5.0);
    }
}
