/// Result Analyzer - Cross-Run Statistics
///
/// **Core Responsibility:**
/// Turn a set of persisted suites into one AnalysisReport. Pure: no I/O,
/// no clock reads (the `--days` cutoff is passed in).
///
/// **Computations:**
/// - Latest snapshot per platform
/// - Pass-rate trend per platform (first vs last suite, needs >= 2 suites)
/// - Consistently failing paths: FAIL in more than half of all suites
/// - Mean compile time and runtime over executed (PASS/FAIL) records
///
/// Suites are ordered by timestamp before anything is computed, so the
/// report does not depend on file order.

use chrono::{DateTime, Duration, Utc};
use dreamtest_common::store::StoredSuite;
use dreamtest_common::types::{pass_rate, TestOutcome, TestSuite};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    fn of(delta: f64) -> Self {
        if delta > 0.0 {
            Trend::Up
        } else if delta < 0.0 {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Flat => "→",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// First and last suite timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisPeriod {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

/// Counts from the most recent suite of one platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformSnapshot {
    pub platform: String,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformTrend {
    pub platform: String,
    pub first_pass_rate: f64,
    pub last_pass_rate: f64,
    pub delta: f64,
    pub direction: Trend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailingTest {
    pub path: String,
    pub failures: usize,
}

/// Timings in seconds, averaged over executed records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub platform: String,
    pub executed: usize,
    pub avg_compile_time: f64,
    pub avg_runtime: f64,
    /// Name of the record with the largest compile + runtime, `N/A` when
    /// nothing was executed.
    pub slowest_test: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub suite_count: usize,
    pub period: Option<AnalysisPeriod>,
    pub platforms: Vec<String>,
    pub snapshots: Vec<PlatformSnapshot>,
    pub trends: Vec<PlatformTrend>,
    pub consistently_failing: Vec<FailingTest>,
    pub performance: Vec<PerformanceStats>,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.suite_count == 0
    }
}

/// Keep suites recorded at or after `now - days`.
pub fn within_days(suites: Vec<StoredSuite>, days: u32, now: DateTime<Utc>) -> Vec<StoredSuite> {
    let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(days))) else {
        return suites;
    };
    suites
        .into_iter()
        .filter(|stored| stored.suite.timestamp >= cutoff)
        .collect()
}

pub fn analyze<'a, I>(suites: I) -> AnalysisReport
where
    I: IntoIterator<Item = &'a TestSuite>,
{
    let mut suites: Vec<&TestSuite> = suites.into_iter().collect();
    if suites.is_empty() {
        return AnalysisReport::default();
    }
    suites.sort_by_key(|suite| suite.timestamp);

    let mut by_platform: BTreeMap<&str, Vec<&TestSuite>> = BTreeMap::new();
    for suite in &suites {
        by_platform.entry(suite.platform.as_str()).or_default().push(suite);
    }

    let period = match (suites.first(), suites.last()) {
        (Some(first), Some(last)) => Some(AnalysisPeriod {
            first: first.timestamp,
            last: last.timestamp,
        }),
        _ => None,
    };

    AnalysisReport {
        suite_count: suites.len(),
        period,
        platforms: by_platform.keys().map(|p| p.to_string()).collect(),
        snapshots: by_platform
            .iter()
            .filter_map(|(platform, runs)| runs.last().map(|latest| snapshot(platform, latest)))
            .collect(),
        trends: by_platform
            .iter()
            .filter_map(|(platform, runs)| trend(platform, runs))
            .collect(),
        consistently_failing: consistently_failing(&suites),
        performance: by_platform
            .iter()
            .map(|(platform, runs)| performance(platform, runs))
            .collect(),
    }
}

fn snapshot(platform: &str, latest: &TestSuite) -> PlatformSnapshot {
    let passed = latest.passed();
    let total = latest.total();
    PlatformSnapshot {
        platform: platform.to_string(),
        passed,
        failed: latest.failed(),
        total,
        pass_rate: pass_rate(passed, total),
    }
}

fn trend(platform: &str, runs: &[&TestSuite]) -> Option<PlatformTrend> {
    if runs.len() < 2 {
        return None;
    }
    let first_pass_rate = runs.first()?.pass_rate();
    let last_pass_rate = runs.last()?.pass_rate();
    let delta = last_pass_rate - first_pass_rate;
    Some(PlatformTrend {
        platform: platform.to_string(),
        first_pass_rate,
        last_pass_rate,
        delta,
        direction: Trend::of(delta),
    })
}

/// Paths with FAIL in strictly more than half of all suites, across every
/// platform. Most failures first, then by path.
fn consistently_failing(suites: &[&TestSuite]) -> Vec<FailingTest> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for suite in suites {
        // A path listed twice in one suite still counts once for that suite.
        let failed: BTreeSet<&str> = suite
            .results
            .iter()
            .filter(|r| r.status == TestOutcome::Fail)
            .map(|r| r.path.as_str())
            .collect();
        for path in failed {
            *counts.entry(path).or_default() += 1;
        }
    }

    let n = suites.len();
    let mut failing: Vec<FailingTest> = counts
        .into_iter()
        .filter(|(_, k)| 2 * k > n)
        .map(|(path, failures)| FailingTest {
            path: path.to_string(),
            failures,
        })
        .collect();
    failing.sort_by(|a, b| b.failures.cmp(&a.failures).then_with(|| a.path.cmp(&b.path)));
    failing
}

fn performance(platform: &str, runs: &[&TestSuite]) -> PerformanceStats {
    let mut executed = 0usize;
    let mut compile_ms = 0u64;
    let mut runtime_ms = 0u64;
    let mut slowest: Option<(u64, &str)> = None;

    for record in runs
        .iter()
        .flat_map(|suite| suite.results.iter())
        .filter(|r| r.status.was_executed())
    {
        executed += 1;
        compile_ms += record.compile_time_ms;
        runtime_ms += record.runtime_ms;

        let total = record.compile_time_ms + record.runtime_ms;
        if slowest.map_or(true, |(max, _)| total > max) {
            slowest = Some((total, record.name.as_str()));
        }
    }

    let mean_seconds = |sum_ms: u64| {
        if executed == 0 {
            0.0
        } else {
            sum_ms as f64 / executed as f64 / 1000.0
        }
    };

    PerformanceStats {
        platform: platform.to_string(),
        executed,
        avg_compile_time: mean_seconds(compile_ms),
        avg_runtime: mean_seconds(runtime_ms),
        slowest_test: slowest
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    }
}
