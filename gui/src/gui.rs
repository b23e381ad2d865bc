/**
 * Widget Bench GUI
 * gui.rs
 * Graphical front end for the widget toolkit benchmarks. The window owns the
 * display; benchmarks run on the RunController's worker against an offscreen
 * iced toolkit, and this loop only drains their progress events and applies
 * the final outcome.
 */
// === LIBRARY IMPORTS ===
use bench_engine::memory_probe::sysinfo_factory;
use bench_engine::persist::{self, SavedRun};
use bench_engine::report::{self, not_run_line, performance_summary, result_line};
use bench_engine::stress::stress_report;
use bench_engine::{
    BenchSettings, Comparison, MemoryUsage, Plan, ResourceMonitor, ResourceSample, ResultSet,
    RunController, RunEvent, RunOutcome, RunState, StepKind, StressConfig, SystemInfo, Workload,
};
use chrono::Local;
use iced::widget::{
    toggler, Button, Checkbox, Column, Container, PickList, ProgressBar, Row, Rule, Scrollable,
    Space, Text, TextInput,
};
use iced::keyboard::{self, KeyCode, Modifiers};
use iced::{alignment, window, Alignment, Application, Color, Command, Element, Length, Settings, Theme};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::iced_toolkit::iced_factory;

const TICK: Duration = Duration::from_millis(100);
const MONITOR_TICK: Duration = Duration::from_secs(1);
const LOG_LIMIT: usize = 200;

// === THEME SELECTION ===
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeChoice {
    #[default]
    Light,
    Dark,
}

static THEMES: [ThemeChoice; 2] = [ThemeChoice::Light, ThemeChoice::Dark];

impl ThemeChoice {
    fn theme(self) -> Theme {
        match self {
            Self::Light => Theme::Light,
            Self::Dark => Theme::Dark,
        }
    }

    fn report_name(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl std::fmt::Display for ThemeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "Light"),
            Self::Dark => write!(f, "Dark"),
        }
    }
}

// === APPLICATION MESSAGES ===
#[derive(Debug, Clone)]
pub enum Message {
    // Inputs
    SizeChanged(StepKind, String),
    IterationsChanged(String),
    MultiplierChanged(String),
    PathChanged(String),
    ThemeSelected(ThemeChoice),
    AutoSaveToggled(bool),
    VerboseToggled(bool),
    SystemInfoToggled(bool),
    MonitorToggled(bool),
    MonitorTick,
    QuitPressed,

    // Runs
    RunTestPressed(StepKind),
    RunAllPressed,
    StressPressed,
    CancelPressed,
    Tick,
    RunFinished(RunOutcome),
    ResetPressed,

    // Files
    SaveResultsPressed,
    ResultsSaved(Result<PathBuf, String>),
    LoadResultsPressed,
    ResultsLoaded(Result<SavedRun, String>),
    ExportCsvPressed,
    HtmlReportPressed,
    Exported(Result<PathBuf, String>),

    // Comparison
    AddToComparisonPressed,
    ClearComparisonPressed,
    ExportComparisonPressed,
}

// What the active run was started as; decides how its outcome is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RunKind {
    Single(StepKind),
    All,
    Stress { multiplier: f64 },
}

// === MAIN APPLICATION STRUCT ===
pub struct GuiApp {
    settings: BenchSettings,
    controller: RunController,

    // Inputs, kept as typed text until a run parses them.
    sizes: Vec<(StepKind, String)>,
    iterations: String,
    multiplier: String,
    path: String,
    theme: ThemeChoice,
    show_system_info: bool,
    monitor: Option<ResourceMonitor>,

    // Run tracking
    active: Option<RunKind>,
    events: Option<UnboundedReceiver<RunEvent>>,
    steps_total: usize,
    steps_done: usize,

    // Display state
    results: ResultSet,
    result_lines: Vec<(StepKind, String)>,
    status_message: String,
    output: Option<String>,
    log: Vec<String>,
    comparison: Comparison,
    system_info: SystemInfo,
    memory: MemoryUsage,
    usage: Option<ResourceSample>,
}

impl GuiApp {
    fn size_input(&self, kind: StepKind) -> &str {
        self.sizes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| s.as_str())
            .unwrap_or_default()
    }

    // Unparseable input becomes 0, which the runner reports as invalid.
    fn size_value(&self, kind: StepKind) -> i64 {
        self.size_input(kind).trim().parse().unwrap_or(0)
    }

    fn current_plan(&self) -> Plan {
        let mut sizes = self.settings.sizes;
        for kind in StepKind::ALL {
            sizes.set(kind, self.size_value(kind));
        }
        Plan::standard(&sizes)
    }

    fn set_line(&mut self, kind: StepKind, line: String) {
        if let Some(entry) = self.result_lines.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = line;
        }
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() >= LOG_LIMIT {
            self.log.remove(0);
        }
        self.log.push(line);
    }

    fn system_lines(&self) -> Vec<String> {
        self.system_info.detail_lines(&self.memory)
    }

    fn is_running(&self) -> bool {
        self.active.is_some() || self.controller.state().is_busy()
    }

    /*
     * Hand a workload to the controller. The worker's outcome comes back
     * through Command::perform as RunFinished; progress is drained on Tick.
     */
    fn start(&mut self, workload: Workload, kind: RunKind) -> Command<Message> {
        let steps_total = match &workload {
            Workload::Once(plan) => plan.len(),
            Workload::Stress(config) => config.plan.len().saturating_mul(config.iterations as usize),
        };
        let Some(mut handle) = self.controller.start_workload(workload) else {
            self.status_message = "A benchmark is already running.".to_string();
            return Command::none();
        };
        info!("gui started run {}", handle.run_id());

        self.events = handle.take_events();
        self.active = Some(kind);
        self.steps_total = steps_total;
        self.steps_done = 0;
        self.status_message = match kind {
            RunKind::Single(k) => format!("Running {}...", k.title()),
            RunKind::All => "Running all tests...".to_string(),
            RunKind::Stress { .. } => "Running stress test...".to_string(),
        };
        Command::perform(handle.wait(), Message::RunFinished)
    }

    fn drain_events(&mut self) {
        let mut drained = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
        }
        for event in drained {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: RunEvent) {
        match event {
            RunEvent::IterationStarted { iteration, total } => {
                self.status_message = format!("Running stress iteration {}/{}...", iteration, total);
                self.push_log(format!("--- Running iteration {}/{} ---", iteration, total));
            }
            RunEvent::StepStarted { kind, size } => {
                self.set_line(kind, format!("{}: Running with {}...", kind.title(), size));
                if self.settings.verbose {
                    self.push_log(format!("started {} ({})", kind.name(), size));
                }
            }
            RunEvent::StepFinished(report) => {
                self.steps_done += 1;
                let line = report.status_line();
                if self.settings.verbose {
                    self.push_log(line.clone());
                }
                self.set_line(report.kind, line);
            }
        }
    }

    /*
     * Apply a finished run. Records overwrite earlier ones of the same name so
     * single-test runs fill in the table; a run that was cancelled keeps
     * whatever completed before the checkpoint.
     */
    fn finish(&mut self, outcome: RunOutcome) -> Command<Message> {
        if !self.controller.acknowledge(&outcome) {
            return Command::none();
        }
        self.drain_events();
        self.events = None;
        let kind = self.active.take();

        for record in outcome.results.iter() {
            self.results.insert(record.clone());
        }
        for report in &outcome.summary.steps {
            let line = match self.results.get(report.kind.name()) {
                Some(record) if report.outcome.is_completed() => result_line(record),
                _ => report.status_line(),
            };
            self.set_line(report.kind, line);
        }

        if outcome.crashed {
            self.status_message = "Benchmark worker crashed. Partial results shown.".to_string();
        } else if outcome.cancelled() {
            self.status_message = "Tests cancelled.".to_string();
        } else {
            self.status_message = format!("Tests complete in {:.2}s.", outcome.elapsed.as_secs_f64());
        }

        match kind {
            Some(RunKind::Stress { multiplier }) => {
                self.output = Some(stress_report(&outcome.iterations, multiplier));
            }
            Some(RunKind::All) if outcome.is_success() => {
                self.output = Some(performance_summary(&self.results, Local::now()));
                if self.settings.auto_save {
                    self.auto_save();
                }
            }
            _ => {}
        }
        Command::none()
    }

    // Runs synchronously on the foreground loop, after a successful full run.
    fn auto_save(&mut self) {
        let run = SavedRun::new(&self.results, self.system_info.clone(), Local::now());
        match persist::autosave(&self.settings.results_dir, &run, Local::now()) {
            Ok(path) => {
                self.push_log(format!("Results auto-saved to {}", path.display()));
            }
            Err(e) => {
                warn!("auto-save failed: {}", e);
                self.push_log(format!("Auto-save failed: {}", e));
            }
        }
    }

    fn target_path(&self, default_name: &str) -> PathBuf {
        let typed = self.path.trim();
        if typed.is_empty() {
            self.settings.results_dir.join(default_name)
        } else {
            PathBuf::from(typed)
        }
    }

    fn reset(&mut self) {
        self.results.clear();
        self.result_lines = StepKind::ALL.into_iter().map(|k| (k, not_run_line(k))).collect();
        self.output = None;
        self.log.clear();
        self.steps_done = 0;
        self.steps_total = 0;
        self.status_message = "Results reset.".to_string();
    }
}

// === APPLICATION IMPLEMENTATION ===
impl Application for GuiApp {
    type Executor = iced::executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = BenchSettings;

    fn new(settings: BenchSettings) -> (Self, Command<Self::Message>) {
        let sizes = StepKind::ALL
            .into_iter()
            .map(|k| (k, settings.sizes.get(k).to_string()))
            .collect();
        (
            GuiApp {
                controller: RunController::new(iced_factory(), sysinfo_factory()),
                sizes,
                iterations: settings.stress_iterations.to_string(),
                multiplier: settings.stress_multiplier.to_string(),
                path: String::new(),
                theme: ThemeChoice::default(),
                show_system_info: false,
                monitor: None,
                active: None,
                events: None,
                steps_total: 0,
                steps_done: 0,
                results: ResultSet::new(),
                result_lines: StepKind::ALL.into_iter().map(|k| (k, not_run_line(k))).collect(),
                status_message: "Ready.".to_string(),
                output: None,
                log: Vec::new(),
                comparison: Comparison::new(),
                system_info: SystemInfo::collect("iced"),
                memory: MemoryUsage::default(),
                usage: None,
                settings,
            },
            Command::none(),
        )
    }

    fn title(&self) -> String {
        "Widget Toolkit Benchmark".into()
    }

    fn theme(&self) -> Theme {
        self.theme.theme()
    }

    fn update(&mut self, message: Self::Message) -> Command<Self::Message> {
        match message {
            // === INPUT FIELD CHANGES ===
            Message::SizeChanged(kind, value) => {
                if let Some(entry) = self.sizes.iter_mut().find(|(k, _)| *k == kind) {
                    entry.1 = value;
                }
            }
            Message::IterationsChanged(value) => self.iterations = value,
            Message::MultiplierChanged(value) => self.multiplier = value,
            Message::PathChanged(value) => self.path = value,
            Message::ThemeSelected(theme) => self.theme = theme,
            Message::AutoSaveToggled(on) => self.settings.auto_save = on,
            Message::VerboseToggled(on) => self.settings.verbose = on,
            Message::SystemInfoToggled(on) => {
                if on {
                    self.system_info = SystemInfo::collect("iced");
                    self.memory = MemoryUsage::current();
                }
                self.show_system_info = on;
            }
            Message::MonitorToggled(on) => {
                if on {
                    let mut monitor = ResourceMonitor::new();
                    self.usage = Some(monitor.sample());
                    self.monitor = Some(monitor);
                } else {
                    self.monitor = None;
                    self.usage = None;
                }
            }
            Message::MonitorTick => {
                if let Some(monitor) = self.monitor.as_mut() {
                    self.usage = Some(monitor.sample());
                }
            }
            Message::QuitPressed => {
                if self.controller.cancel() {
                    info!("cancelling active run before quitting");
                }
                return window::close();
            }

            // === RUNS ===
            Message::RunTestPressed(kind) => {
                let plan = Plan::single(kind, self.size_value(kind));
                return self.start(Workload::Once(plan), RunKind::Single(kind));
            }
            Message::RunAllPressed => {
                let plan = self.current_plan();
                return self.start(Workload::Once(plan), RunKind::All);
            }
            Message::StressPressed => {
                let iterations = self.iterations.trim().parse::<i64>().unwrap_or(0);
                let multiplier = self.multiplier.trim().parse::<f64>().unwrap_or(0.0);
                match StressConfig::new(self.current_plan(), iterations, multiplier) {
                    Ok(config) => {
                        return self.start(Workload::Stress(config), RunKind::Stress { multiplier });
                    }
                    Err(e) => self.status_message = format!("Invalid input: {}", e),
                }
            }
            Message::CancelPressed => {
                if self.controller.cancel() {
                    self.status_message = "Cancelling...".to_string();
                }
            }
            Message::Tick => self.drain_events(),
            Message::RunFinished(outcome) => return self.finish(outcome),
            Message::ResetPressed => {
                if self.is_running() {
                    self.status_message = "Cannot reset while tests are running.".to_string();
                } else {
                    self.reset();
                }
            }

            // === FILES ===
            Message::SaveResultsPressed => {
                if self.results.is_empty() {
                    self.status_message = "No test results to save. Run some tests first.".to_string();
                    return Command::none();
                }
                let run = SavedRun::new(&self.results, self.system_info.clone(), Local::now());
                let path = self.target_path(&persist::autosave_file_name(Local::now()));
                return save_results(path, run);
            }
            Message::ResultsSaved(result) => match result {
                Ok(path) => self.status_message = format!("Results saved to {}", path.display()),
                Err(e) => self.status_message = format!("Could not save results: {}", e),
            },
            Message::LoadResultsPressed => {
                let path = self.path.trim();
                if path.is_empty() {
                    self.status_message = "Enter a results file path to load.".to_string();
                    return Command::none();
                }
                return load_results(PathBuf::from(path));
            }
            Message::ResultsLoaded(result) => match result {
                Ok(run) => {
                    if self.is_running() {
                        self.status_message = "Cannot load results while tests are running.".to_string();
                        return Command::none();
                    }
                    self.reset();
                    self.results = run.test_results;
                    for (kind, line) in report::result_lines(&self.results) {
                        self.set_line(kind, line);
                    }
                    self.status_message = format!("Results loaded ({})", run.timestamp);
                }
                Err(e) => self.status_message = format!("Could not load results: {}", e),
            },
            Message::ExportCsvPressed => {
                if self.results.is_empty() {
                    self.status_message = "No test results to export. Run some tests first.".to_string();
                    return Command::none();
                }
                let name = format!("widget_bench_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
                return write_file(self.target_path(&name), report::results_csv(&self.results));
            }
            Message::HtmlReportPressed => {
                if self.results.is_empty() {
                    self.status_message = "No test results to generate report. Run some tests first.".to_string();
                    return Command::none();
                }
                let html = report::html_report(
                    &self.results,
                    &self.system_info,
                    self.theme.report_name(),
                    Local::now(),
                );
                let name = format!("widget_bench_report_{}.html", Local::now().format("%Y%m%d_%H%M%S"));
                return write_file(self.target_path(&name), html);
            }
            Message::Exported(result) => match result {
                Ok(path) => self.status_message = format!("Wrote {}", path.display()),
                Err(e) => self.status_message = format!("Export failed: {}", e),
            },

            // === COMPARISON ===
            Message::AddToComparisonPressed => {
                let stamp = Local::now().format(persist::TIMESTAMP_FORMAT).to_string();
                if self.comparison.add(stamp, &self.results) {
                    self.status_message =
                        format!("Added to comparison ({} snapshots).", self.comparison.len());
                } else {
                    self.status_message = "No test results to compare. Run some tests first.".to_string();
                }
            }
            Message::ClearComparisonPressed => {
                self.comparison.clear();
                self.status_message = "Comparison cleared.".to_string();
            }
            Message::ExportComparisonPressed => match self.comparison.to_csv() {
                Some(csv) => {
                    let name = format!("widget_bench_comparison_{}.csv", Local::now().format("%Y%m%d_%H%M%S"));
                    return write_file(self.target_path(&name), csv);
                }
                None => {
                    self.status_message = "Need at least 2 results to export comparison.".to_string();
                }
            },
        }
        Command::none()
    }

    fn view(&self) -> Element<'_, Self::Message> {
        let running = self.is_running();

        // === HEADER SECTION ===
        let header = Column::new()
            .push(
                Text::new("Widget Toolkit Benchmark")
                    .size(32)
                    .style(Color::from_rgb(0.3, 0.4, 0.5)),
            )
            .push(
                Text::new(format!("Toolkit: iced  |  State: {:?}", self.controller.state()))
                    .size(16)
                    .style(Color::from_rgb(0.5, 0.5, 0.5)),
            )
            .spacing(5)
            .width(Length::Fill)
            .align_items(Alignment::Center);

        // === OPTIONS ===
        let options = Row::new()
            .push(Text::new("Theme:"))
            .push(
                PickList::new(&THEMES[..], Some(self.theme), Message::ThemeSelected)
                    .width(Length::Fixed(100.0)),
            )
            .push(Space::with_width(Length::Fixed(20.0)))
            .push(Checkbox::new("Auto-save", self.settings.auto_save, Message::AutoSaveToggled))
            .push(Checkbox::new("Verbose", self.settings.verbose, Message::VerboseToggled))
            .push(Space::with_width(Length::Fill))
            .push(Text::new("Monitor"))
            .push(toggler(None, self.monitor.is_some(), Message::MonitorToggled).width(Length::Fixed(40.0)))
            .push(Text::new("System info"))
            .push(toggler(None, self.show_system_info, Message::SystemInfoToggled).width(Length::Fixed(40.0)))
            .spacing(10)
            .align_items(Alignment::Center);

        let system_section = if self.show_system_info {
            let lines = self
                .system_lines()
                .into_iter()
                .fold(Column::new().spacing(2), |col, line| col.push(Text::new(line).size(14)));
            Column::new().push(
                Container::new(lines)
                    .style(iced::theme::Container::Box)
                    .padding(10)
                    .width(Length::Fill),
            )
        } else {
            Column::new()
        };

        let monitor_section = match &self.usage {
            Some(usage) => {
                let readings = Column::new()
                    .push(Text::new("Real-time System Monitor").size(16))
                    .push(Text::new(usage.cpu_line()).size(14))
                    .push(ProgressBar::new(0.0..=100.0, usage.cpu_fraction()).height(Length::Fixed(8.0)))
                    .push(Text::new(usage.memory_line()).size(14))
                    .push(ProgressBar::new(0.0..=100.0, usage.memory_fraction()).height(Length::Fixed(8.0)))
                    .spacing(4);
                Column::new().push(
                    Container::new(readings)
                        .style(iced::theme::Container::Box)
                        .padding(10)
                        .width(Length::Fill),
                )
            }
            None => Column::new(),
        };

        // === BENCHMARK ROWS ===
        let mut benchmarks = Column::new().push(Text::new("Benchmarks:").size(18)).spacing(8);
        for (kind, line) in &self.result_lines {
            let kind = *kind;
            let run_button = Button::new(Text::new("Run").horizontal_alignment(alignment::Horizontal::Center))
                .padding([4, 12])
                .style(iced::theme::Button::Secondary);
            let run_button = if running {
                run_button
            } else {
                run_button.on_press(Message::RunTestPressed(kind))
            };
            benchmarks = benchmarks.push(
                Row::new()
                    .push(Text::new(kind.title()).width(Length::Fixed(130.0)))
                    .push(
                        TextInput::new(kind.parameter(), self.size_input(kind))
                            .on_input(move |value| Message::SizeChanged(kind, value))
                            .padding(5)
                            .width(Length::Fixed(100.0)),
                    )
                    .push(run_button)
                    .push(Text::new(line.as_str()).size(14).width(Length::Fill))
                    .spacing(10)
                    .align_items(Alignment::Center),
            );
        }

        // === PROGRESS ===
        let fraction = if self.steps_total == 0 {
            0.0
        } else {
            self.steps_done as f32 / self.steps_total as f32
        };
        let progress = Column::new()
            .push(ProgressBar::new(0.0..=1.0, fraction).height(Length::Fixed(10.0)))
            .push(Text::new(self.status_message.as_str()).size(14))
            .spacing(5);

        // === ACTION BUTTONS ===
        let run_all = if running {
            action_button("RUNNING...", iced::theme::Button::Secondary, None)
        } else {
            action_button("RUN ALL", iced::theme::Button::Primary, Some(Message::RunAllPressed))
        };
        let cancel_enabled = self.controller.state() == RunState::Running;
        let primary_row = Row::new()
            .push(Container::new(run_all).width(Length::FillPortion(2)))
            .push(action_button(
                "CANCEL",
                iced::theme::Button::Destructive,
                cancel_enabled.then_some(Message::CancelPressed),
            ))
            .push(action_button(
                "RESET",
                iced::theme::Button::Secondary,
                (!running).then_some(Message::ResetPressed),
            ))
            .spacing(10)
            .width(Length::Fill);

        let stress_row = Row::new()
            .push(Text::new("Stress:"))
            .push(
                TextInput::new("iterations", &self.iterations)
                    .on_input(Message::IterationsChanged)
                    .padding(5)
                    .width(Length::Fixed(80.0)),
            )
            .push(
                TextInput::new("multiplier", &self.multiplier)
                    .on_input(Message::MultiplierChanged)
                    .padding(5)
                    .width(Length::Fixed(80.0)),
            )
            .push(action_button(
                "STRESS TEST",
                iced::theme::Button::Secondary,
                (!running).then_some(Message::StressPressed),
            ))
            .spacing(10)
            .align_items(Alignment::Center);

        let file_row = Row::new()
            .push(
                TextInput::new("File path (blank: results directory)", &self.path)
                    .on_input(Message::PathChanged)
                    .padding(5)
                    .width(Length::Fill),
            )
            .push(action_button("SAVE", iced::theme::Button::Secondary, Some(Message::SaveResultsPressed)))
            .push(action_button("LOAD", iced::theme::Button::Secondary, Some(Message::LoadResultsPressed)))
            .push(action_button("CSV", iced::theme::Button::Secondary, Some(Message::ExportCsvPressed)))
            .push(action_button("HTML", iced::theme::Button::Secondary, Some(Message::HtmlReportPressed)))
            .spacing(10)
            .align_items(Alignment::Center);

        // === COMPARISON ===
        let mut comparison = Column::new()
            .push(
                Row::new()
                    .push(Text::new(format!("Comparison ({} snapshots)", self.comparison.len())).size(18))
                    .push(Space::with_width(Length::Fill))
                    .push(action_button("ADD", iced::theme::Button::Secondary, Some(Message::AddToComparisonPressed)))
                    .push(action_button("CLEAR", iced::theme::Button::Secondary, Some(Message::ClearComparisonPressed)))
                    .push(action_button("EXPORT", iced::theme::Button::Secondary, Some(Message::ExportComparisonPressed)))
                    .spacing(10)
                    .align_items(Alignment::Center),
            )
            .spacing(4);
        if let Some(rows) = self.comparison.rows() {
            comparison = comparison.push(comparison_row(["Test", "Run 1", "Run 2", "Difference", "Improvement"].map(String::from)));
            for row in rows {
                comparison = comparison.push(comparison_row(row.columns()));
            }
        }

        // === RESULTS DISPLAY SECTION ===
        let mut text = self.output.clone().unwrap_or_else(|| "No summary yet.".to_string());
        if !self.log.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.log.join("\n"));
        }
        let results_view = Container::new(Scrollable::new(Text::new(text).size(14)).height(Length::Fixed(300.0)))
            .style(iced::theme::Container::Box)
            .padding(10)
            .width(Length::Fill);

        // === MAIN LAYOUT ===
        let content = Column::new()
            .push(header)
            .push(Rule::horizontal(1))
            .push(options)
            .push(system_section)
            .push(monitor_section)
            .push(Space::with_height(Length::Fixed(10.0)))
            .push(benchmarks)
            .push(progress)
            .push(primary_row)
            .push(stress_row)
            .push(file_row)
            .push(Rule::horizontal(1))
            .push(comparison)
            .push(results_view)
            .spacing(10)
            .width(Length::Fill);

        Container::new(Scrollable::new(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .padding(20)
            .into()
    }

    // Drain worker progress while a run is active, refresh the monitor while
    // it is shown, and listen for keyboard shortcuts.
    fn subscription(&self) -> iced::Subscription<Message> {
        let mut subscriptions = vec![iced::subscription::events_with(shortcut_event)];
        if self.events.is_some() {
            subscriptions.push(iced::time::every(TICK).map(|_| Message::Tick));
        }
        if self.monitor.is_some() {
            subscriptions.push(iced::time::every(MONITOR_TICK).map(|_| Message::MonitorTick));
        }
        iced::Subscription::batch(subscriptions)
    }
}

fn shortcut_event(event: iced::Event, _status: iced::event::Status) -> Option<Message> {
    match event {
        iced::Event::Keyboard(keyboard::Event::KeyPressed { key_code, modifiers }) => {
            shortcut(key_code, modifiers)
        }
        _ => None,
    }
}

/// Ctrl (Cmd on macOS) + S, O or Q.
fn shortcut(key_code: KeyCode, modifiers: Modifiers) -> Option<Message> {
    if !modifiers.command() {
        return None;
    }
    match key_code {
        KeyCode::S => Some(Message::SaveResultsPressed),
        KeyCode::O => Some(Message::LoadResultsPressed),
        KeyCode::Q => Some(Message::QuitPressed),
        _ => None,
    }
}

// === HELPER FUNCTIONS ===
fn action_button(label: &str, style: iced::theme::Button, on_press: Option<Message>) -> Button<'_, Message> {
    let button = Button::new(
        Text::new(label)
            .size(14)
            .horizontal_alignment(alignment::Horizontal::Center),
    )
    .padding([6, 14])
    .style(style);
    match on_press {
        Some(message) => button.on_press(message),
        None => button,
    }
}

fn comparison_row(columns: [String; 5]) -> Row<'static, Message> {
    columns
        .into_iter()
        .fold(Row::new().spacing(10), |row, cell| {
            row.push(Text::new(cell).size(14).width(Length::FillPortion(1)))
        })
}

/*
 * Save results as JSON off the update loop. Errors come back as text for
 * the status line.
 */
fn save_results(path: PathBuf, run: SavedRun) -> Command<Message> {
    Command::perform(
        async move {
            persist::save(&path, &run).map_err(|e| e.to_string())?;
            Ok(path)
        },
        Message::ResultsSaved,
    )
}

fn load_results(path: PathBuf) -> Command<Message> {
    Command::perform(
        async move {
            debug!("loading results from {}", path.display());
            persist::load(&path).map_err(|e| e.to_string())
        },
        Message::ResultsLoaded,
    )
}

fn write_file(path: PathBuf, contents: String) -> Command<Message> {
    Command::perform(
        async move {
            persist::write_text(&path, &contents).map_err(|e| e.to_string())?;
            Ok(path)
        },
        Message::Exported,
    )
}

/*
 * Launch the window. Settings come from the settings file the CLI also reads.
 */
pub fn run(settings: BenchSettings) -> iced::Result {
    GuiApp::run(Settings {
        window: window::Settings {
            size: (1000, 900),
            ..window::Settings::default()
        },
        ..Settings::with_flags(settings)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> GuiApp {
        GuiApp::new(BenchSettings::default()).0
    }

    #[test]
    fn starts_with_not_run_lines() {
        let app = app();
        assert_eq!(app.result_lines.len(), 5);
        assert_eq!(app.result_lines[0].1, "Treeview: Not run");
        assert_eq!(app.size_value(StepKind::Windows), 50);
    }

    #[test]
    fn unparsable_size_becomes_zero() {
        let mut app = app();
        let _ = app.update(Message::SizeChanged(StepKind::Widgets, "abc".into()));
        assert_eq!(app.size_value(StepKind::Widgets), 0);
        assert_eq!(app.current_plan().steps[3].size, 0);
    }

    #[test]
    fn events_update_result_lines() {
        let mut app = app();
        app.apply_event(RunEvent::StepStarted {
            kind: StepKind::Memory,
            size: 10,
        });
        assert_eq!(app.result_lines[4].1, "Memory: Running with 10...");
    }

    #[test]
    fn invalid_stress_input_is_reported() {
        let mut app = app();
        let _ = app.update(Message::IterationsChanged("0".into()));
        let _ = app.update(Message::StressPressed);
        assert!(app.status_message.starts_with("Invalid input"));
        assert!(app.active.is_none());
    }

    #[test]
    fn command_shortcuts_map_to_file_actions() {
        assert!(matches!(shortcut(KeyCode::S, Modifiers::COMMAND), Some(Message::SaveResultsPressed)));
        assert!(matches!(shortcut(KeyCode::O, Modifiers::COMMAND), Some(Message::LoadResultsPressed)));
        assert!(matches!(shortcut(KeyCode::Q, Modifiers::COMMAND), Some(Message::QuitPressed)));
        assert!(shortcut(KeyCode::S, Modifiers::empty()).is_none());
        assert!(shortcut(KeyCode::S, Modifiers::SHIFT).is_none());
        assert!(shortcut(KeyCode::X, Modifiers::COMMAND).is_none());
    }

    #[test]
    fn save_shortcut_without_results_reports_status() {
        let mut app = app();
        let message = shortcut(KeyCode::S, Modifiers::COMMAND).unwrap();
        let _ = app.update(message);
        assert!(app.status_message.starts_with("No test results to save"));
    }

    #[test]
    fn monitor_toggle_samples_and_clears() {
        let mut app = app();
        let _ = app.update(Message::MonitorToggled(true));
        let usage = app.usage.unwrap();
        assert!(usage.memory.total >= usage.memory.used());
        let _ = app.update(Message::MonitorTick);
        assert!(app.usage.is_some());

        let _ = app.update(Message::MonitorToggled(false));
        assert!(app.monitor.is_none());
        assert!(app.usage.is_none());
        let _ = app.update(Message::MonitorTick);
        assert!(app.usage.is_none());
    }

    #[test]
    fn system_info_panel_shows_cpu_and_memory_detail() {
        let mut app = app();
        let _ = app.update(Message::SystemInfoToggled(true));
        let lines = app.system_lines();
        assert_eq!(lines.len(), 8);
        assert!(lines[2].starts_with("CPU Cores: "));
        assert!(lines[7].starts_with("Memory (Used): "));
    }

    #[test]
    fn comparison_needs_results() {
        let mut app = app();
        let _ = app.update(Message::AddToComparisonPressed);
        assert!(app.comparison.is_empty());
        assert!(app.status_message.starts_with("No test results"));
    }
}
