//! Widget toolkit benchmark engine.
//!
//! A [`Runner`] executes an ordered [`Plan`] of timed benchmarks against a
//! [`Toolkit`], writing one [`MeasurementRecord`] per step into a
//! [`ResultSet`]. A [`RunController`] runs it on a single background worker
//! with cooperative cancellation and hands the outcome back to whichever
//! foreground loop owns the display.

pub mod compare;
pub mod config;
pub mod controller;
pub mod error;
pub mod memory_probe;
pub mod monitor;
pub mod persist;
pub mod plan;
pub mod record;
pub mod report;
pub mod runner;
pub mod stress;
pub mod system_info;
pub mod toolkit;

pub use compare::{Comparison, ComparisonRow, Snapshot};
pub use config::BenchSettings;
pub use controller::{RunController, RunHandle, RunOutcome, RunState, Workload};
pub use error::{ConfigError, PersistError, StepError};
pub use memory_probe::{MemoryProbe, ProbeFactory, SysinfoProbe};
pub use monitor::{ResourceMonitor, ResourceSample};
pub use persist::SavedRun;
pub use plan::{Plan, StepKind, StepSizes, StepSpec};
pub use record::{MeasurementRecord, Metrics, ResultSet};
pub use runner::{CancelToken, RunEvent, RunSummary, Runner, StepOutcome, StepReport};
pub use stress::{StressConfig, StressIteration};
pub use system_info::{MemoryUsage, SystemInfo};
pub use toolkit::{Geometry, HeadlessToolkit, Toolkit, ToolkitFactory, WidgetKind, WindowId};
