// === REPORTS ===
// Text, CSV and HTML renderings of a ResultSet. Pure functions: callers
// decide where the output goes.

use std::fmt::Write as _;

use chrono::{DateTime, Local};

use crate::plan::StepKind;
use crate::record::{MeasurementRecord, ResultSet};
use crate::runner::rate;
use crate::system_info::SystemInfo;

const TREEVIEW_RATE_HINT: f64 = 1000.0;
const WIDGET_RATE_HINT: f64 = 100.0;

/// One-line result shown in a benchmark's result label.
pub fn result_line(record: &MeasurementRecord) -> String {
    let m = |name: &str| record.metric(name).unwrap_or(0.0);
    match StepKind::from_name(&record.name) {
        Some(StepKind::Treeview) => format!(
            "Treeview: Populated {:.0} items in {:.4} seconds.",
            m("items"),
            m("duration")
        ),
        Some(StepKind::LabelUpdates) => format!(
            "Label/Progress: {:.0} updates in {:.4} seconds.",
            m("updates"),
            m("duration")
        ),
        Some(StepKind::Windows) => format!(
            "Windows: {:.0} created in {:.4}s, destroyed in {:.4}s. Total: {:.4}s",
            m("count"),
            m("creation_duration"),
            m("destroy_duration"),
            m("total_duration")
        ),
        Some(StepKind::Widgets) => format!(
            "Widget Creation: {:.0} widgets in {:.0} sets created in {:.4}s.",
            m("widgets"),
            m("sets"),
            m("duration")
        ),
        Some(StepKind::Memory) => format!(
            "Memory: {:.0}MB - Alloc: {:.4}s, Write: {:.4}s, Cleanup: {:.4}s, Peak: +{:.1}MB",
            m("size_mb"),
            m("alloc_time"),
            m("write_time"),
            m("cleanup_time"),
            m("memory_increase_mb")
        ),
        None => {
            let metrics: Vec<String> = record
                .metrics
                .iter()
                .map(|(k, v)| format!("{}={}", k, format_value(v)))
                .collect();
            format!("{}: {}", record.name, metrics.join(", "))
        }
    }
}

/// Label text before any result exists.
pub fn not_run_line(kind: StepKind) -> String {
    format!("{}: Not run", kind.title())
}

/// Result label text for every benchmark, in run order.
pub fn result_lines(results: &ResultSet) -> Vec<(StepKind, String)> {
    StepKind::ALL
        .into_iter()
        .map(|kind| {
            let line = results
                .get(kind.name())
                .map(result_line)
                .unwrap_or_else(|| not_run_line(kind));
            (kind, line)
        })
        .collect()
}

/// Multi-line performance summary.
pub fn performance_summary(results: &ResultSet, at: DateTime<Local>) -> String {
    if results.is_empty() {
        return "No test results available. Run some tests first.".to_string();
    }

    let mut s = String::from("PERFORMANCE SUMMARY\n");
    s.push_str(&"=".repeat(50));
    s.push_str("\n\n");

    let mut total = 0.0;
    for record in results.iter() {
        let m = |name: &str| record.metric(name).unwrap_or(0.0);
        match StepKind::from_name(&record.name) {
            Some(StepKind::Treeview) if record.metrics.contains("duration") => {
                let _ = writeln!(s, "Treeview Population: {:.0} items in {:.4}s", m("items"), m("duration"));
                let _ = writeln!(s, "  Rate: {:.0} items/second\n", rate(m("items"), m("duration")));
                total += m("duration");
            }
            Some(StepKind::LabelUpdates) if record.metrics.contains("duration") => {
                let _ = writeln!(s, "Label/Progress Updates: {:.0} in {:.4}s", m("updates"), m("duration"));
                let _ = writeln!(s, "  Rate: {:.0} updates/second\n", rate(m("updates"), m("duration")));
                total += m("duration");
            }
            Some(StepKind::Windows) if record.metrics.contains("total_duration") => {
                let _ = writeln!(s, "Window Management: {:.0} windows", m("count"));
                let _ = writeln!(s, "  Creation: {:.4}s", m("creation_duration"));
                let _ = writeln!(s, "  Destruction: {:.4}s", m("destroy_duration"));
                let _ = writeln!(s, "  Total: {:.4}s\n", m("total_duration"));
                total += m("total_duration");
            }
            Some(StepKind::Widgets) if record.metrics.contains("duration") => {
                let _ = writeln!(s, "Widget Creation: {:.0} widgets in {:.4}s", m("widgets"), m("duration"));
                let _ = writeln!(s, "  Rate: {:.0} widgets/second\n", rate(m("widgets"), m("duration")));
                total += m("duration");
            }
            Some(StepKind::Memory) if record.metrics.contains("alloc_time") => {
                let _ = writeln!(s, "Memory Test: {:.0}MB", m("size_mb"));
                let _ = writeln!(s, "  Allocation: {:.4}s", m("alloc_time"));
                let _ = writeln!(s, "  Write: {:.4}s", m("write_time"));
                let _ = writeln!(s, "  Cleanup: {:.4}s\n", m("cleanup_time"));
            }
            _ => {}
        }
    }

    if total > 0.0 {
        let _ = writeln!(s, "Total Test Time: {:.4} seconds", total);
    }
    let _ = write!(s, "\nTest completed at: {}", at.format("%Y-%m-%d %H:%M:%S"));
    s
}

/// Unit shown next to a metric.
pub fn unit_for_metric(metric: &str) -> &'static str {
    let lower = metric.to_lowercase();
    if lower.contains("time") || lower.contains("duration") {
        "seconds"
    } else if ["count", "items", "updates", "widgets"]
        .iter()
        .any(|k| lower.contains(k))
    {
        "count"
    } else if lower.contains("mb") {
        "MB"
    } else {
        ""
    }
}

/// Whole numbers print without a fraction.
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        v.to_string()
    }
}

pub(crate) fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// `Test,Metric,Value,Unit` rows.
pub fn results_csv(results: &ResultSet) -> String {
    let mut out = String::from("Test,Metric,Value,Unit\n");
    for record in results.iter() {
        for (metric, value) in record.metrics.iter() {
            let _ = writeln!(
                out,
                "{},{},{},{}",
                csv_field(&record.name),
                csv_field(metric),
                format_value(value),
                unit_for_metric(metric)
            );
        }
    }
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("_")
}

/// Performance hints for slow results.
pub fn analysis_hints(results: &ResultSet) -> Vec<&'static str> {
    let mut hints = Vec::new();
    for record in results.iter() {
        let Some(r) = record.metric("rate") else {
            continue;
        };
        match record.name.as_str() {
            "treeview" if r < TREEVIEW_RATE_HINT => hints.push(
                "Treeview population rate is below 1000 items/second - consider optimization",
            ),
            "widgets" if r < WIDGET_RATE_HINT => hints
                .push("Widget creation rate is below 100 widgets/second - UI may feel sluggish"),
            _ => {}
        }
    }
    hints
}

/// Self-contained HTML report.
pub fn html_report(results: &ResultSet, system: &SystemInfo, theme: &str, at: DateTime<Local>) -> String {
    let timestamp = at.format("%Y-%m-%d %H:%M:%S").to_string();
    let mut html = String::new();

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Widget Benchmark Report - {ts}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        .header {{ background-color: #f0f0f0; padding: 20px; border-radius: 5px; }}
        .section {{ margin: 20px 0; }}
        .test-result {{ background-color: #f9f9f9; padding: 15px; margin: 10px 0; border-left: 4px solid #007acc; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
        th {{ background-color: #f2f2f2; }}
        .metric {{ font-weight: bold; }}
        .footer {{ margin-top: 40px; text-align: center; color: #666; }}
    </style>
</head>
<body>
    <div class="header">
        <h1>Widget Benchmark Test Report</h1>
        <p>Generated on: {ts}</p>
        <p>Platform: {platform}</p>
    </div>

    <div class="section">
        <h2>System Information</h2>
        <table>
            <tr><th>Property</th><th>Value</th></tr>
            <tr><td>Platform</td><td>{platform}</td></tr>
            <tr><td>CPU Cores</td><td>{cores}</td></tr>
            <tr><td>Memory (Total)</td><td>{mem} GB</td></tr>
            <tr><td>Toolkit</td><td>{toolkit}</td></tr>
            <tr><td>Theme</td><td>{theme}</td></tr>
        </table>
    </div>

    <div class="section">
        <h2>Test Results</h2>"#,
        ts = timestamp,
        platform = escape_html(&system.platform),
        cores = system.cpu_count,
        mem = system.memory_total_gb,
        toolkit = escape_html(&system.toolkit),
        theme = escape_html(theme),
    );

    for record in results.iter() {
        let _ = write!(
            html,
            r#"
        <div class="test-result">
            <h3>{} Test</h3>
            <table>
                <tr><th>Metric</th><th>Value</th><th>Unit</th></tr>"#,
            escape_html(&title_case(&record.name))
        );
        for (metric, value) in record.metrics.iter() {
            let shown = if value.fract() == 0.0 {
                format_value(value)
            } else {
                format!("{:.4}", value)
            };
            let _ = write!(
                html,
                "<tr><td class='metric'>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(metric),
                shown,
                unit_for_metric(metric)
            );
        }
        html.push_str("</table></div>");
    }

    let total: f64 = results.iter().filter_map(|r| r.metric("duration")).sum();
    let _ = write!(
        html,
        r#"
    </div>

    <div class="section">
        <h2>Performance Summary</h2>
        <div class="test-result"><p><strong>Total Test Time:</strong> {:.4} seconds</p>
            <h4>Performance Analysis:</h4>
            <ul>"#,
        total
    );
    for hint in analysis_hints(results) {
        let _ = write!(html, "<li>{}</li>", hint);
    }
    html.push_str(
        r#"
            </ul>
        </div>
    </div>

    <div class="footer">
        <p>Generated by widget-bench</p>
    </div>
</body>
</html>"#,
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Metrics;
    use chrono::TimeZone;

    fn sample() -> ResultSet {
        let mut results = ResultSet::new();
        results.insert(MeasurementRecord::new(
            "treeview",
            Metrics::new()
                .with("items", 100.0)
                .with("duration", 0.5)
                .with("rate", 200.0),
        ));
        results.insert(MeasurementRecord::new(
            "windows",
            Metrics::new()
                .with("count", 5.0)
                .with("creation_duration", 0.25)
                .with("destroy_duration", 0.125)
                .with("total_duration", 0.375),
        ));
        results
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn result_lines_match_labels() {
        let results = sample();
        assert_eq!(
            result_line(results.get("treeview").unwrap()),
            "Treeview: Populated 100 items in 0.5000 seconds."
        );
        let lines = result_lines(&results);
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2].1, "Windows: 5 created in 0.2500s, destroyed in 0.1250s. Total: 0.3750s");
        assert_eq!(lines[4].1, "Memory: Not run");
    }

    #[test]
    fn summary_totals_durations() {
        let text = performance_summary(&sample(), noon());
        assert!(text.starts_with("PERFORMANCE SUMMARY\n"));
        assert!(text.contains("  Rate: 200 items/second"));
        assert!(text.contains("Total Test Time: 0.8750 seconds"));
        assert!(text.ends_with("Test completed at: 2024-03-01 12:00:00"));
        assert_eq!(
            performance_summary(&ResultSet::new(), noon()),
            "No test results available. Run some tests first."
        );
    }

    #[test]
    fn units_follow_metric_names() {
        assert_eq!(unit_for_metric("alloc_time"), "seconds");
        assert_eq!(unit_for_metric("total_duration"), "seconds");
        assert_eq!(unit_for_metric("items"), "count");
        assert_eq!(unit_for_metric("memory_increase_mb"), "MB");
        assert_eq!(unit_for_metric("rate"), "");
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = results_csv(&sample());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Test,Metric,Value,Unit");
        assert_eq!(lines[1], "treeview,items,100,count");
        assert_eq!(lines[2], "treeview,duration,0.5,seconds");
        assert_eq!(lines.len(), 1 + 3 + 4);
        assert_eq!(csv_field("a,b"), "\"a,b\"");
    }

    #[test]
    fn html_contains_tables_and_hints() {
        let system = SystemInfo {
            platform: "Linux <test>".to_string(),
            cpu_count: 8,
            memory_total_gb: 16,
            toolkit: "headless".to_string(),
            ..SystemInfo::default()
        };
        let html = html_report(&sample(), &system, "Light", noon());
        assert!(html.contains("<h3>Treeview Test</h3>"));
        assert!(html.contains("Linux &lt;test&gt;"));
        assert!(html.contains("<td class='metric'>duration</td><td>0.5000</td><td>seconds</td>"));
        assert!(html.contains("Treeview population rate is below 1000 items/second"));
        assert!(html.trim_end().ends_with("</html>"));
    }
}
