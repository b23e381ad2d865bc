//! Platform metadata saved next to results and shown in reports.

use serde::{Deserialize, Serialize};
use sysinfo::System;

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Description of the machine a run happened on.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SystemInfo {
    pub platform: String,
    /// Logical cores.
    pub cpu_count: usize,
    pub physical_cores: Option<usize>,
    pub cpu_model: String,
    pub cpu_frequency_mhz: u64,
    pub memory_total_gb: u64,
    pub toolkit: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            platform: "unknown".to_string(),
            cpu_count: 0,
            physical_cores: None,
            cpu_model: String::new(),
            cpu_frequency_mhz: 0,
            memory_total_gb: 0,
            toolkit: String::new(),
        }
    }
}

impl SystemInfo {
    /// Collect information about the current machine.
    pub fn collect(toolkit: &str) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        let cpu = sys.cpus().first();

        Self {
            platform: platform_string(),
            cpu_count: num_cpus::get(),
            physical_cores: System::physical_core_count(),
            cpu_model: cpu.map(|c| c.brand().trim().to_string()).unwrap_or_default(),
            cpu_frequency_mhz: cpu.map(|c| c.frequency()).unwrap_or(0),
            memory_total_gb: sys.total_memory() / (1024 * 1024 * 1024),
            toolkit: toolkit.to_string(),
        }
    }

    /// Lines describing the machine as recorded.
    pub fn lines(&self) -> Vec<String> {
        let physical = self
            .physical_cores
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let frequency = match self.cpu_frequency_mhz {
            0 => "unknown".to_string(),
            mhz => format!("{} MHz", mhz),
        };
        let model = if self.cpu_model.is_empty() { "unknown" } else { self.cpu_model.as_str() };

        vec![
            format!("Platform: {}", self.platform),
            format!("CPU: {}", model),
            format!("CPU Cores: {} physical, {} logical", physical, self.cpu_count),
            format!("CPU Frequency: {}", frequency),
            format!("Memory (Total): {} GB", self.memory_total_gb),
            format!("Toolkit: {}", self.toolkit),
        ]
    }

    /// The recorded lines followed by the current memory situation.
    pub fn detail_lines(&self, memory: &MemoryUsage) -> Vec<String> {
        let mut lines = self.lines();
        lines.push(format!("Memory (Available): {:.2} GB", memory.available as f64 / GB));
        lines.push(format!(
            "Memory (Used): {:.2} GB ({:.1}%)",
            memory.used() as f64 / GB,
            memory.used_percent()
        ));
        lines
    }
}

/// Physical memory of the machine, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryUsage {
    pub total: u64,
    pub available: u64,
}

impl MemoryUsage {
    pub fn current() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self::from_system(&sys)
    }

    pub(crate) fn from_system(sys: &System) -> Self {
        Self {
            total: sys.total_memory(),
            available: sys.available_memory(),
        }
    }

    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// `(total - available) / total`, as a percentage.
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used() as f64 / self.total as f64 * 100.0
    }

    pub fn used_gb(&self) -> f64 {
        self.used() as f64 / GB
    }

    pub fn total_gb(&self) -> f64 {
        self.total as f64 / GB
    }
}

/// e.g. `Linux 6.1.0 (Debian GNU/Linux 12) x86_64`
fn platform_string() -> String {
    let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let kernel = System::kernel_version().unwrap_or_default();
    let mut platform = format!("{} {}", name, kernel).trim().to_string();
    if let Some(long) = System::long_os_version() {
        platform.push_str(&format!(" ({})", long));
    }
    platform.push(' ');
    platform.push_str(std::env::consts::ARCH);
    platform
}

/// Format bytes to human-readable format
pub fn get_size_format(bytes: u64, factor: u64, suffix: &str) -> String {
    let units = ["", "K", "M", "G", "T", "P"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= factor as f64 && unit_index < units.len() - 1 {
        size /= factor as f64;
        unit_index += 1;
    }

    format!("{:.2} {}{}", size, units[unit_index], suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_format_picks_unit() {
        assert_eq!(get_size_format(512, 1024, "B"), "512.00 B");
        assert_eq!(get_size_format(3 * 1024 * 1024, 1024, "B"), "3.00 MB");
    }

    #[test]
    fn collect_reports_cores() {
        let info = SystemInfo::collect("headless");
        assert!(info.cpu_count >= 1);
        assert_eq!(info.toolkit, "headless");
        assert!(!info.platform.is_empty());
    }

    #[test]
    fn collect_reads_cpu_details() {
        let info = SystemInfo::collect("headless");
        if let Some(physical) = info.physical_cores {
            assert!(physical >= 1);
            assert!(physical <= info.cpu_count);
        }
        let lines = info.lines();
        assert!(lines[2].ends_with(&format!("{} logical", info.cpu_count)));
    }

    #[test]
    fn missing_fields_default() {
        let info: SystemInfo = serde_json::from_str(r#"{"platform":"x","cpu_count":4}"#).unwrap();
        assert_eq!(info.cpu_count, 4);
        assert_eq!(info.memory_total_gb, 0);
        assert_eq!(info.physical_cores, None);
        assert_eq!(info.cpu_frequency_mhz, 0);
        assert!(info.cpu_model.is_empty());
    }

    #[test]
    fn cpu_details_round_trip_through_json() {
        let info = SystemInfo {
            physical_cores: Some(4),
            cpu_model: "Test CPU".to_string(),
            cpu_frequency_mhz: 3200,
            cpu_count: 8,
            ..SystemInfo::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"physical_cores\":4"));
        let back: SystemInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    #[test]
    fn lines_show_unknown_cpu_details() {
        let lines = SystemInfo::default().lines();
        assert_eq!(lines[1], "CPU: unknown");
        assert_eq!(lines[2], "CPU Cores: unknown physical, 0 logical");
        assert_eq!(lines[3], "CPU Frequency: unknown");
    }

    #[test]
    fn detail_lines_report_used_memory() {
        let info = SystemInfo {
            physical_cores: Some(4),
            cpu_count: 8,
            cpu_frequency_mhz: 2400,
            ..SystemInfo::default()
        };
        let memory = MemoryUsage {
            total: 16 * 1024 * 1024 * 1024,
            available: 4 * 1024 * 1024 * 1024,
        };
        let lines = info.detail_lines(&memory);
        assert_eq!(lines[2], "CPU Cores: 4 physical, 8 logical");
        assert_eq!(lines[3], "CPU Frequency: 2400 MHz");
        assert_eq!(lines[6], "Memory (Available): 4.00 GB");
        assert_eq!(lines[7], "Memory (Used): 12.00 GB (75.0%)");
    }

    #[test]
    fn used_percent_handles_empty_and_odd_readings() {
        assert_eq!(MemoryUsage::default().used_percent(), 0.0);
        let odd = MemoryUsage { total: 100, available: 150 };
        assert_eq!(odd.used(), 0);
        let half = MemoryUsage { total: 200, available: 100 };
        assert_eq!(half.used_percent(), 50.0);
    }
}
