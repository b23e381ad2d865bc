// Resident memory of this process, used by the memory benchmark.
// The memory step asks for a reading before allocating and again at the
// peak; a probe that cannot answer makes that step fail, nothing more.

use std::sync::Arc;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::warn;

const MB: f64 = 1024.0 * 1024.0;

pub trait MemoryProbe {
    /// Current resident set size in MB, or `None` when it cannot be read.
    fn resident_mb(&mut self) -> Option<f64>;
}

pub type ProbeFactory = Arc<dyn Fn() -> Box<dyn MemoryProbe> + Send + Sync>;

pub fn sysinfo_factory() -> ProbeFactory {
    Arc::new(|| Box::new(SysinfoProbe::new()) as Box<dyn MemoryProbe>)
}

/// Reads the current process through `sysinfo`.
pub struct SysinfoProbe {
    sys: System,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("cannot determine own pid, memory readings disabled: {}", e);
                None
            }
        };
        Self {
            sys: System::new(),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_mb(&mut self) -> Option<f64> {
        let pid = self.pid?;
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.sys.process(pid).map(|p| p.memory() as f64 / MB)
    }
}

/// Probe for platforms (and tests) without process memory information.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProbe;

impl MemoryProbe for UnavailableProbe {
    fn resident_mb(&mut self) -> Option<f64> {
        None
    }
}

pub fn unavailable_factory() -> ProbeFactory {
    Arc::new(|| Box::new(UnavailableProbe) as Box<dyn MemoryProbe>)
}
