use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::record::ResultSet;
use crate::report::{csv_field, format_value};

/// A ResultSet captured for later comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub results: ResultSet,
}

/// Duration comparison of one benchmark between two runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub test: String,
    pub run1: f64,
    pub run2: f64,
    pub difference: f64,
    /// Positive when run 2 was faster.
    pub improvement_pct: f64,
}

impl ComparisonRow {
    pub fn columns(&self) -> [String; 5] {
        [
            self.test.clone(),
            format!("{:.4}s", self.run1),
            format!("{:.4}s", self.run2),
            format!("{:+.4}s", self.difference),
            format!("{:+.1}%", self.improvement_pct),
        ]
    }
}

fn improvement(before: f64, after: f64) -> f64 {
    if before != 0.0 {
        (before - after) / before * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Comparison {
    snapshots: Vec<Snapshot>,
}

impl Comparison {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty result sets are not worth comparing and are ignored.
    pub fn add(&mut self, timestamp: impl Into<String>, results: &ResultSet) -> bool {
        if results.is_empty() {
            return false;
        }
        self.snapshots.push(Snapshot {
            timestamp: timestamp.into(),
            results: results.clone(),
        });
        true
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    fn last_two(&self) -> Option<(&ResultSet, &ResultSet)> {
        match self.snapshots.as_slice() {
            [.., a, b] => Some((&a.results, &b.results)),
            _ => None,
        }
    }

    /// `duration` of every benchmark present in both of the last two runs.
    pub fn rows(&self) -> Option<Vec<ComparisonRow>> {
        let (run1, run2) = self.last_two()?;
        let rows = run1
            .iter()
            .filter_map(|r1| {
                let r2 = run2.get(&r1.name)?;
                let (t1, t2) = (r1.metric("duration")?, r2.metric("duration")?);
                Some(ComparisonRow {
                    test: r1.name.clone(),
                    run1: t1,
                    run2: t2,
                    difference: t2 - t1,
                    improvement_pct: improvement(t1, t2),
                })
            })
            .collect();
        Some(rows)
    }

    /// Every metric common to the last two runs, as CSV.
    pub fn to_csv(&self) -> Option<String> {
        let (run1, run2) = self.last_two()?;
        let mut out = String::from("Test,Metric,Run 1,Run 2,Difference,Improvement %\n");
        for r1 in run1.iter() {
            let Some(r2) = run2.get(&r1.name) else {
                continue;
            };
            for (metric, v1) in r1.metrics.iter() {
                let Some(v2) = r2.metric(metric) else {
                    continue;
                };
                let _ = writeln!(
                    out,
                    "{},{},{},{},{},{:.1}",
                    csv_field(&r1.name),
                    csv_field(metric),
                    format_value(v1),
                    format_value(v2),
                    format_value(v2 - v1),
                    improvement(v1, v2)
                );
            }
        }
        Some(out)
    }
}
