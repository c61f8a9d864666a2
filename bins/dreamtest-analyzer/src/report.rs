// Text and JSON renderings of an AnalysisReport

use crate::analyzer::{AnalysisPeriod, AnalysisReport};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};

pub const NO_RESULTS: &str = "No test results found.";

pub fn render_text(report: &AnalysisReport) -> String {
    if report.is_empty() {
        return NO_RESULTS.to_string();
    }

    let mut lines = vec![
        "DREAMCOMPILER TEST ANALYSIS REPORT".to_string(),
        "=".repeat(50),
        String::new(),
        format!("Analysis Period: {}", period_label(report.period.as_ref())),
        format!("Total Test Suites: {}", report.suite_count),
        format!("Platforms: {}", report.platforms.join(", ")),
        String::new(),
    ];

    section(&mut lines, "PLATFORM COMPARISON");
    for s in &report.snapshots {
        lines.push(format!(
            "{:10} {:3}/{:3} tests passed ({:5.1}%)",
            s.platform, s.passed, s.total, s.pass_rate
        ));
    }
    lines.push(String::new());

    if report.suite_count > 1 {
        section(&mut lines, "TREND ANALYSIS");
        for t in &report.trends {
            lines.push(format!("{:10} {} {:+5.1}% change", t.platform, t.direction, t.delta));
        }
        lines.push(String::new());
    }

    section(&mut lines, "CONSISTENTLY FAILING TESTS");
    if report.consistently_failing.is_empty() {
        lines.push("  No consistently failing tests found.".to_string());
    }
    for f in &report.consistently_failing {
        lines.push(format!(
            "  {} (failed {}/{} times)",
            f.path, f.failures, report.suite_count
        ));
    }
    lines.push(String::new());

    section(&mut lines, "PERFORMANCE ANALYSIS");
    for p in &report.performance {
        lines.push(format!("{}:", p.platform));
        lines.push(format!("  Avg compile time: {:.3}s", p.avg_compile_time));
        lines.push(format!("  Avg runtime:      {:.3}s", p.avg_runtime));
        lines.push(format!("  Slowest test:     {}", p.slowest_test));
    }

    lines.join("\n")
}

pub fn render_json(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize analysis report")
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push(title.to_string());
    lines.push("-".repeat(title.len()));
}

/// `YYYY-MM-DD`, or `first to last` when the suites span several local days.
fn period_label(period: Option<&AnalysisPeriod>) -> String {
    let Some(period) = period else {
        return "No data".to_string();
    };
    let first = local_date(period.first);
    let last = local_date(period.last);
    if first == last {
        first.format("%Y-%m-%d").to_string()
    } else {
        format!("{} to {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d"))
    }
}

fn local_date(timestamp: chrono::DateTime<chrono::Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FailingTest, PerformanceStats, PlatformSnapshot, PlatformTrend, Trend};
    use chrono::{TimeZone, Utc};

    fn report() -> AnalysisReport {
        let day = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        AnalysisReport {
            suite_count: 2,
            period: Some(AnalysisPeriod { first: day, last: day }),
            platforms: vec!["Linux".to_string()],
            snapshots: vec![PlatformSnapshot {
                platform: "Linux".to_string(),
                passed: 9,
                failed: 1,
                total: 10,
                pass_rate: 90.0,
            }],
            trends: vec![PlatformTrend {
                platform: "Linux".to_string(),
                first_pass_rate: 80.0,
                last_pass_rate: 90.0,
                delta: 10.0,
                direction: Trend::Up,
            }],
            consistently_failing: vec![FailingTest {
                path: "tests/basics/t9.dr".to_string(),
                failures: 2,
            }],
            performance: vec![PerformanceStats {
                platform: "Linux".to_string(),
                executed: 20,
                avg_compile_time: 0.25,
                avg_runtime: 0.012,
                slowest_test: "t3.dr".to_string(),
            }],
        }
    }

    #[test]
    fn test_empty_report() {
        assert_eq!(render_text(&AnalysisReport::default()), NO_RESULTS);
    }

    #[test]
    fn test_text_layout() {
        let text = render_text(&report());
        let expected = "\
DREAMCOMPILER TEST ANALYSIS REPORT
==================================================

Analysis Period: {period}
Total Test Suites: 2
Platforms: Linux

PLATFORM COMPARISON
-------------------
Linux        9/ 10 tests passed ( 90.0%)

TREND ANALYSIS
--------------
Linux      ↑ +10.0% change

CONSISTENTLY FAILING TESTS
--------------------------
  tests/basics/t9.dr (failed 2/2 times)

PERFORMANCE ANALYSIS
--------------------
Linux:
  Avg compile time: 0.250s
  Avg runtime:      0.012s
  Slowest test:     t3.dr";
        let period = report()
            .period
            .map(|p| local_date(p.first).format("%Y-%m-%d").to_string())
            .unwrap();
        assert_eq!(text, expected.replace("{period}", &period));
    }

    #[test]
    fn test_period_spanning_days() {
        let first = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2026, 3, 8, 12, 0, 0).unwrap();
        let label = period_label(Some(&AnalysisPeriod { first, last }));
        assert!(label.contains(" to "));
        assert_eq!(period_label(None), "No data");
    }

    #[test]
    fn test_single_suite_has_no_trend_section() {
        let mut single = report();
        single.suite_count = 1;
        single.trends.clear();
        single.consistently_failing.clear();
        let text = render_text(&single);
        assert!(!text.contains("TREND ANALYSIS"));
        assert!(text.contains("  No consistently failing tests found."));
    }

    #[test]
    fn test_json_report() {
        let value: serde_json::Value = serde_json::from_str(&render_json(&report()).unwrap()).unwrap();
        assert_eq!(value["suite_count"], 2);
        assert_eq!(value["trends"][0]["direction"], "Up");
        assert_eq!(value["consistently_failing"][0]["failures"], 2);
    }
}
