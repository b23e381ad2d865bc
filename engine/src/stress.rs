//! Stress mode: the same plan, scaled, run several times in one worker.
//!
//! Cancellation is observed between iterations and, through the runner,
//! inside every step of an iteration.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::plan::Plan;
use crate::record::ResultSet;
use crate::runner::{CancelToken, RunEvent, RunSummary, Runner};

#[derive(Debug, Clone, PartialEq)]
pub struct StressConfig {
    pub plan: Plan,
    pub iterations: u32,
    pub multiplier: f64,
    /// Pause between two iterations.
    pub pause: Duration,
}

impl StressConfig {
    pub fn new(plan: Plan, iterations: i64, multiplier: f64) -> Result<Self, ConfigError> {
        if iterations <= 0 {
            return Err(ConfigError::NotPositive("iterations"));
        }
        if !(multiplier > 0.0) {
            return Err(ConfigError::NotPositive("multiplier"));
        }
        Ok(Self {
            plan,
            iterations: u32::try_from(iterations).unwrap_or(u32::MAX),
            multiplier,
            pause: Duration::from_millis(500),
        })
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Results of one iteration, numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressIteration {
    pub iteration: u32,
    pub results: ResultSet,
}

#[derive(Debug, Clone, Default)]
pub struct StressSummary {
    pub iterations: Vec<StressIteration>,
    /// Summary of the last iteration that ran.
    pub summary: RunSummary,
}

pub fn run_stress(runner: &mut Runner<'_>, config: &StressConfig, cancel: &CancelToken) -> StressSummary {
    let scaled = config.plan.scaled(config.multiplier);
    let mut out = StressSummary::default();

    for i in 0..config.iterations {
        if cancel.is_cancelled() {
            out.summary.cancelled = true;
            break;
        }
        runner.emit(RunEvent::IterationStarted {
            iteration: i + 1,
            total: config.iterations,
        });
        info!("stress iteration {}/{}", i + 1, config.iterations);

        let mut results = ResultSet::new();
        out.summary = runner.run(&scaled, &mut results);
        if !results.is_empty() {
            out.iterations.push(StressIteration {
                iteration: i + 1,
                results,
            });
        }
        if out.summary.cancelled {
            break;
        }
        if i + 1 < config.iterations && !config.pause.is_zero() {
            thread::sleep(config.pause);
        }
    }

    out
}

/// avg / min / max of one metric across iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub samples: usize,
}

/// benchmark -> metric -> stats, benchmarks and metrics sorted by name.
pub fn aggregate(iterations: &[StressIteration]) -> BTreeMap<String, BTreeMap<String, MetricStats>> {
    let mut values: BTreeMap<String, BTreeMap<String, Vec<f64>>> = BTreeMap::new();
    for it in iterations {
        for record in it.results.iter() {
            let metrics = values.entry(record.name.clone()).or_default();
            for (name, value) in record.metrics.iter() {
                metrics.entry(name.to_string()).or_default().push(value);
            }
        }
    }

    values
        .into_iter()
        .map(|(bench, metrics)| {
            let stats = metrics
                .into_iter()
                .map(|(name, v)| {
                    let min = v.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let avg = v.iter().sum::<f64>() / v.len() as f64;
                    (
                        name,
                        MetricStats {
                            avg,
                            min,
                            max,
                            samples: v.len(),
                        },
                    )
                })
                .collect();
            (bench, stats)
        })
        .collect()
}

pub fn stress_report(iterations: &[StressIteration], multiplier: f64) -> String {
    if iterations.is_empty() {
        return "No stress test results to display.".to_string();
    }

    let mut report = String::from("STRESS TEST RESULTS\n");
    report.push_str(&"=".repeat(50));
    report.push_str("\n\n");
    let _ = writeln!(report, "Iterations: {}", iterations.len());
    let _ = writeln!(report, "Load Multiplier: {}\n", multiplier);

    for (bench, metrics) in aggregate(iterations) {
        let _ = writeln!(report, "{} TEST:", bench.to_uppercase());
        for (metric, s) in metrics {
            let _ = writeln!(
                report,
                "  {}: avg={:.4}, min={:.4}, max={:.4}",
                metric, s.avg, s.min, s.max
            );
        }
        report.push('\n');
    }
    report
}
