//! Live CPU and memory readings for the performance monitor.

use sysinfo::System;

use crate::system_info::MemoryUsage;

/// One reading of machine-wide load.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory: MemoryUsage,
}

impl ResourceSample {
    pub fn cpu_line(&self) -> String {
        format!("CPU Usage: {:.1}%", self.cpu_percent)
    }

    pub fn memory_line(&self) -> String {
        format!(
            "Memory Usage: {:.1}% ({:.1} GB / {:.1} GB)",
            self.memory.used_percent(),
            self.memory.used_gb(),
            self.memory.total_gb()
        )
    }

    /// CPU usage clamped to a progress bar's 0..=100 range.
    pub fn cpu_fraction(&self) -> f32 {
        self.cpu_percent.clamp(0.0, 100.0)
    }

    pub fn memory_fraction(&self) -> f32 {
        self.memory.used_percent().clamp(0.0, 100.0) as f32
    }
}

/// Keeps one `System` between samples so CPU usage is measured over the
/// interval since the previous call.
pub struct ResourceMonitor {
    sys: System,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        Self { sys }
    }

    /// Read current usage. The first reading after `new` covers a very short
    /// interval and may be inaccurate.
    pub fn sample(&mut self) -> ResourceSample {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        ResourceSample {
            cpu_percent: self.sys.global_cpu_usage(),
            memory: MemoryUsage::from_system(&self.sys),
        }
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_match_monitor_format() {
        let sample = ResourceSample {
            cpu_percent: 12.34,
            memory: MemoryUsage {
                total: 8 * 1024 * 1024 * 1024,
                available: 6 * 1024 * 1024 * 1024,
            },
        };
        assert_eq!(sample.cpu_line(), "CPU Usage: 12.3%");
        assert_eq!(sample.memory_line(), "Memory Usage: 25.0% (2.0 GB / 8.0 GB)");
        assert_eq!(sample.memory_fraction(), 25.0);
    }

    #[test]
    fn fractions_stay_in_bar_range() {
        let sample = ResourceSample {
            cpu_percent: 180.0,
            memory: MemoryUsage::default(),
        };
        assert_eq!(sample.cpu_fraction(), 100.0);
        assert_eq!(sample.memory_fraction(), 0.0);
    }

    #[test]
    fn samples_are_within_range() {
        let mut monitor = ResourceMonitor::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let sample = monitor.sample();
        assert!(sample.cpu_percent >= 0.0);
        assert!(sample.memory.total >= sample.memory.used());
        assert!((0.0..=100.0).contains(&sample.memory_fraction()));
    }
}
