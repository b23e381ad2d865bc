// widget-bench command line front end.
// Runs the benchmark suite headless, in stress mode, or works with saved
// result files. The main thread is the foreground loop: it drains progress
// events, prints them and acknowledges the final outcome.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use bench_engine::memory_probe::sysinfo_factory;
use bench_engine::persist::{self, SavedRun};
use bench_engine::report::{self, performance_summary, results_csv};
use bench_engine::stress::stress_report;
use bench_engine::toolkit::headless_factory;
use bench_engine::{
    BenchSettings, Comparison, Plan, ResultSet, RunController, RunEvent, RunOutcome, StepKind,
    MemoryUsage, SystemInfo, Workload,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "widget-bench", version, about = "Benchmark a widget toolkit")]
struct Cli {
    /// Settings file (JSON). Defaults to ./widget-bench.json when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmarks once (default)
    Run(RunArgs),
    /// Run the benchmarks repeatedly with scaled sizes
    Stress(StressArgs),
    /// Print the summary of a saved results file
    Load(LoadArgs),
    /// Compare two saved results files
    Compare(CompareArgs),
    /// Show system information
    Sysinfo,
}

#[derive(Args, Debug, Default, Clone)]
struct SizeArgs {
    #[arg(long)]
    tree_items: Option<i64>,
    #[arg(long)]
    label_updates: Option<i64>,
    #[arg(long)]
    windows: Option<i64>,
    #[arg(long)]
    widgets: Option<i64>,
    #[arg(long)]
    memory_mb: Option<i64>,
    /// Run only these benchmarks (e.g. --only treeview --only memory)
    #[arg(long)]
    only: Vec<String>,
}

#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Save results as JSON
    #[arg(long)]
    save: Option<PathBuf>,
    /// Export results as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write an HTML report
    #[arg(long)]
    html: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    sizes: SizeArgs,
    #[command(flatten)]
    output: OutputArgs,
    /// Do not auto-save after a successful run
    #[arg(long)]
    no_auto_save: bool,
    /// Cancel the run after this many seconds
    #[arg(long)]
    cancel_after: Option<f64>,
}

#[derive(Args, Debug)]
struct StressArgs {
    #[command(flatten)]
    sizes: SizeArgs,
    #[arg(long)]
    iterations: Option<i64>,
    #[arg(long)]
    multiplier: Option<f64>,
    #[arg(long)]
    cancel_after: Option<f64>,
}

#[derive(Args, Debug)]
struct LoadArgs {
    file: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args, Debug)]
struct CompareArgs {
    first: PathBuf,
    second: PathBuf,
    /// Export the per-metric comparison as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = match BenchSettings::discover(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    settings.verbose |= cli.verbose;

    let result = match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run_once(&settings, args),
        Command::Stress(args) => run_stress(&settings, args),
        Command::Load(args) => load(args),
        Command::Compare(args) => compare(args),
        Command::Sysinfo => {
            let usage = MemoryUsage::current();
            for line in SystemInfo::collect("headless").detail_lines(&usage) {
                println!("{}", line);
            }
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "widget_bench=debug,bench_engine=debug"
    } else {
        "widget_bench=info,bench_engine=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Settings sizes, overridden by flags, filtered by `--only`.
fn build_plan(settings: &BenchSettings, args: &SizeArgs) -> Result<Plan, String> {
    let mut sizes = settings.sizes;
    let overrides = [
        (StepKind::Treeview, args.tree_items),
        (StepKind::LabelUpdates, args.label_updates),
        (StepKind::Windows, args.windows),
        (StepKind::Widgets, args.widgets),
        (StepKind::Memory, args.memory_mb),
    ];
    for (kind, size) in overrides {
        if let Some(size) = size {
            sizes.set(kind, size);
        }
    }

    let mut plan = Plan::standard(&sizes);
    if !args.only.is_empty() {
        let mut wanted = Vec::new();
        for name in &args.only {
            wanted.push(StepKind::from_name(name).ok_or_else(|| format!("unknown benchmark '{}'", name))?);
        }
        plan.steps.retain(|s| wanted.contains(&s.kind));
    }
    Ok(plan)
}

/// Foreground loop: print events, honour `--cancel-after`, return the
/// acknowledged outcome.
fn drive(controller: &RunController, workload: Workload, cancel_after: Option<f64>) -> Result<RunOutcome, String> {
    let mut handle = controller
        .start_workload(workload)
        .ok_or("a run is already in progress")?;
    let mut events = handle.take_events();
    let deadline = cancel_after.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));

    loop {
        if let Some(rx) = events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                print_event(&event);
            }
        }
        if let Some(outcome) = handle.try_outcome() {
            if let Some(rx) = events.as_mut() {
                while let Ok(event) = rx.try_recv() {
                    print_event(&event);
                }
            }
            controller.acknowledge(&outcome);
            return Ok(outcome);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) && controller.cancel() {
            warn!("cancel-after deadline reached, cancelling");
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::IterationStarted { iteration, total } => {
            println!("--- Running iteration {}/{} ---", iteration, total)
        }
        RunEvent::StepStarted { kind, size } => println!("{}: Running with {}...", kind.title(), size),
        RunEvent::StepFinished(report) => println!("{}", report.status_line()),
    }
}

fn run_once(settings: &BenchSettings, args: RunArgs) -> Result<(), String> {
    let plan = build_plan(settings, &args.sizes)?;
    let controller = RunController::new(headless_factory(), sysinfo_factory());
    let outcome = drive(&controller, Workload::Once(plan), args.cancel_after)?;

    println!();
    println!("{}", performance_summary(&outcome.results, Local::now()));

    if outcome.cancelled() {
        println!("\nRun cancelled; {} benchmark(s) recorded.", outcome.results.len());
    }
    if outcome.crashed {
        error!("benchmark worker crashed, partial results only");
    }

    let system = SystemInfo::collect("headless");
    if outcome.is_success() && settings.auto_save && !args.no_auto_save && !outcome.results.is_empty() {
        let run = SavedRun::new(&outcome.results, system.clone(), Local::now());
        match persist::autosave(&settings.results_dir, &run, Local::now()) {
            Ok(path) => info!("auto-saved results to {}", path.display()),
            // Auto-save is best effort.
            Err(e) => warn!("auto-save failed: {}", e),
        }
    }

    write_outputs(&outcome.results, &system, &args.output)
}

fn run_stress(settings: &BenchSettings, args: StressArgs) -> Result<(), String> {
    let plan = build_plan(settings, &args.sizes)?;
    let iterations = args.iterations.unwrap_or(settings.stress_iterations);
    let multiplier = args.multiplier.unwrap_or(settings.stress_multiplier);
    let config = bench_engine::StressConfig::new(plan, iterations, multiplier)
        .map_err(|e| format!("Invalid input: {}", e))?;

    let controller = RunController::new(headless_factory(), sysinfo_factory());
    let outcome = drive(&controller, Workload::Stress(config), args.cancel_after)?;

    println!();
    println!("{}", stress_report(&outcome.iterations, multiplier));
    if outcome.cancelled() {
        println!("Stress test stopped after {} iteration(s).", outcome.iterations.len());
    }
    Ok(())
}

fn write_outputs(results: &ResultSet, system: &SystemInfo, output: &OutputArgs) -> Result<(), String> {
    if let Some(path) = &output.save {
        let run = SavedRun::new(results, system.clone(), Local::now());
        persist::save(path, &run).map_err(|e| format!("Could not save results: {}", e))?;
        println!("Results saved to {}", path.display());
    }
    if let Some(path) = &output.csv {
        export(path, results, "export", results_csv)?;
    }
    if let Some(path) = &output.html {
        export(path, results, "generate report", |r| {
            report::html_report(r, system, "default", Local::now())
        })?;
    }
    Ok(())
}

fn export(path: &Path, results: &ResultSet, verb: &str, render: impl Fn(&ResultSet) -> String) -> Result<(), String> {
    if results.is_empty() {
        return Err(format!("No test results to {}. Run some tests first.", verb));
    }
    persist::write_text(path, &render(results)).map_err(|e| e.to_string())?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn load(args: LoadArgs) -> Result<(), String> {
    let run = persist::load(&args.file).map_err(|e| format!("Could not load results: {}", e))?;
    println!("Results from {} ({})", args.file.display(), run.timestamp);
    for line in run.system_info.lines().into_iter().take(3) {
        println!("  {}", line);
    }
    println!();
    for (_, line) in report::result_lines(&run.test_results) {
        println!("{}", line);
    }
    println!();
    println!("{}", performance_summary(&run.test_results, Local::now()));
    write_outputs(&run.test_results, &run.system_info, &args.output)
}

fn compare(args: CompareArgs) -> Result<(), String> {
    let mut comparison = Comparison::new();
    for path in [&args.first, &args.second] {
        let run = persist::load(path).map_err(|e| format!("Could not load results: {}", e))?;
        comparison.add(run.timestamp, &run.test_results);
    }

    let rows = comparison
        .rows()
        .ok_or("Need at least 2 test results to compare.")?;
    println!("{:<16}{:>12}{:>12}{:>12}{:>12}", "Test", "Run 1", "Run 2", "Difference", "Improvement");
    for row in rows {
        let [test, r1, r2, diff, imp] = row.columns();
        println!("{:<16}{:>12}{:>12}{:>12}{:>12}", test, r1, r2, diff, imp);
    }

    if let Some(path) = &args.csv {
        let csv = comparison.to_csv().ok_or("Need at least 2 results to export comparison.")?;
        persist::write_text(path, &csv).map_err(|e| e.to_string())?;
        println!("Comparison exported to {}", path.display());
    }
    Ok(())
}
