// Results files: pretty JSON with `timestamp`, `system_info` and
// `test_results`, where `test_results` mirrors the ResultSet.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PersistError;
use crate::record::ResultSet;
use crate::system_info::SystemInfo;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SavedRun {
    pub timestamp: String,
    pub system_info: SystemInfo,
    pub test_results: ResultSet,
}

impl SavedRun {
    pub fn new(results: &ResultSet, system_info: SystemInfo, at: DateTime<Local>) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            system_info,
            test_results: results.clone(),
        }
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> PersistError + '_ {
    move |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `run` to `path`, creating parent directories as needed.
pub fn save(path: &Path, run: &SavedRun) -> Result<(), PersistError> {
    if run.test_results.is_empty() {
        return Err(PersistError::Empty("save"));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, run).map_err(|source| PersistError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err(path))?;

    info!("results saved to {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<SavedRun, PersistError> {
    let file = File::open(path).map_err(io_err(path))?;
    let run: SavedRun =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| PersistError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(
        "loaded {} records from {}",
        run.test_results.len(),
        path.display()
    );
    Ok(run)
}

/// `widget_bench_results_YYYYmmdd_HHMMSS.json`
pub fn autosave_file_name(at: DateTime<Local>) -> String {
    format!("widget_bench_results_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Save under `dir` with a timestamped name. Returns the written path.
pub fn autosave(dir: &Path, run: &SavedRun, at: DateTime<Local>) -> Result<PathBuf, PersistError> {
    let path = dir.join(autosave_file_name(at));
    save(&path, run)?;
    Ok(path)
}

/// Write a rendered report (CSV, HTML) to disk.
pub fn write_text(path: &Path, contents: &str) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, contents).map_err(io_err(path))?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MeasurementRecord, Metrics};
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap()
    }

    fn sample() -> ResultSet {
        let mut results = ResultSet::new();
        results.insert(MeasurementRecord::new(
            "label_updates",
            Metrics::new()
                .with("updates", 50.0)
                .with("duration", 0.012345678901)
                .with("rate", 4050.000737),
        ));
        results.insert(MeasurementRecord::new(
            "memory",
            Metrics::new()
                .with("size_mb", 100.0)
                .with("memory_increase_mb", -0.25),
        ));
        results
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.json");
        let run = SavedRun::new(&sample(), SystemInfo::default(), at());

        save(&path, &run).unwrap();
        let back = load(&path).unwrap();

        assert_eq!(back, run);
        assert_eq!(back.timestamp, "2024-05-06 07:08:09");
        assert_eq!(back.test_results.names().collect::<Vec<_>>(), vec!["label_updates", "memory"]);
    }

    #[test]
    fn empty_results_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let run = SavedRun::new(&ResultSet::new(), SystemInfo::default(), at());
        let err = save(&dir.path().join("x.json"), &run).unwrap_err();
        assert!(matches!(err, PersistError::Empty("save")));
    }

    #[test]
    fn loads_file_without_optional_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.json");
        fs::write(
            &path,
            r#"{"timestamp": "2023-01-01 00:00:00",
                "system_info": {"platform": "macOS-14", "python_version": "3.12", "cpu_count": 8, "memory_total_gb": 16},
                "test_results": {"treeview": {"items": 1000, "duration": 0.5, "rate": 2000.0}}}"#,
        )
        .unwrap();

        let run = load(&path).unwrap();
        assert_eq!(run.system_info.cpu_count, 8);
        assert_eq!(run.test_results.get("treeview").unwrap().metric("items"), Some(1000.0));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(PersistError::Json { .. })));
        assert!(matches!(load(&dir.path().join("missing.json")), Err(PersistError::Io { .. })));
    }

    #[test]
    fn autosave_uses_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let run = SavedRun::new(&sample(), SystemInfo::default(), at());
        let path = autosave(dir.path(), &run, at()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "widget_bench_results_20240506_070809.json"
        );
        assert!(path.exists());
    }
}
