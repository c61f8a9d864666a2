use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    #[default]
    Unit,
    Integration,
    Regression,
    Performance,
    CrossPlatform,
    Memory,
    Syntax,
    Semantic,
}

impl TestCategory {
    pub const ALL: [TestCategory; 8] = [
        TestCategory::Unit,
        TestCategory::Integration,
        TestCategory::Regression,
        TestCategory::Performance,
        TestCategory::CrossPlatform,
        TestCategory::Memory,
        TestCategory::Syntax,
        TestCategory::Semantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestCategory::Unit => "unit",
            TestCategory::Integration => "integration",
            TestCategory::Regression => "regression",
            TestCategory::Performance => "performance",
            TestCategory::CrossPlatform => "cross_platform",
            TestCategory::Memory => "memory",
            TestCategory::Syntax => "syntax",
            TestCategory::Semantic => "semantic",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        TestCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("Unknown test category: {}", s))
    }
}

/// Final classification of one test file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestOutcome {
    Pass,
    Fail,
    Skip,
    Error,
    Timeout,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Pass => "PASS",
            TestOutcome::Fail => "FAIL",
            TestOutcome::Skip => "SKIP",
            TestOutcome::Error => "ERROR",
            TestOutcome::Timeout => "TIMEOUT",
        }
    }

    /// PASS and FAIL are the only outcomes where every stage ran.
    pub fn was_executed(&self) -> bool {
        matches!(self, TestOutcome::Pass | TestOutcome::Fail)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified outcome for one test file.
///
/// Every field except name, path and status defaults when missing so result
/// files written by older runners still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub name: String,
    pub path: String,
    pub status: TestOutcome,
    #[serde(default)]
    pub category: TestCategory,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub expected_output: String,
    #[serde(default)]
    pub actual_output: String,
    #[serde(default)]
    pub compile_time_ms: u64,
    #[serde(default)]
    pub runtime_ms: u64,
    #[serde(default)]
    pub memory_usage: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub compiler_version: Option<String>,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl TestRecord {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.status,
            TestOutcome::Fail | TestOutcome::Error | TestOutcome::Timeout
        )
    }
}

/// Per-category counters for the suite summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryTally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl CategoryTally {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errors
    }

    pub fn pass_rate(&self) -> f64 {
        pass_rate(self.passed, self.total())
    }
}

/// One discovery-and-run pass over the test tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub name: String,
    #[serde(default)]
    pub results: Vec<TestRecord>,
    #[serde(default)]
    pub total_duration_ms: u64,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub timestamp: DateTime<Utc>,
}

impl TestSuite {
    fn count(&self, status: TestOutcome) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(TestOutcome::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(TestOutcome::Fail)
    }

    pub fn skipped(&self) -> usize {
        self.count(TestOutcome::Skip)
    }

    /// ERROR and TIMEOUT records together.
    pub fn errors(&self) -> usize {
        self.count(TestOutcome::Error) + self.count(TestOutcome::Timeout)
    }

    pub fn timed_out(&self) -> usize {
        self.count(TestOutcome::Timeout)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn pass_rate(&self) -> f64 {
        pass_rate(self.passed(), self.total())
    }

    pub fn category_breakdown(&self) -> BTreeMap<TestCategory, CategoryTally> {
        let mut breakdown: BTreeMap<TestCategory, CategoryTally> = BTreeMap::new();
        for record in &self.results {
            let tally = breakdown.entry(record.category).or_default();
            match record.status {
                TestOutcome::Pass => tally.passed += 1,
                TestOutcome::Fail => tally.failed += 1,
                TestOutcome::Skip => tally.skipped += 1,
                TestOutcome::Error | TestOutcome::Timeout => tally.errors += 1,
            }
        }
        breakdown
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestRecord> {
        self.results.iter().filter(|r| r.is_failure())
    }
}

/// Percentage of `passed` over `total`, 0 for an empty set.
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

/// Host platform name as recorded on suites ("Linux", "Windows", "Darwin").
pub fn host_platform() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "windows" => "Windows".to_string(),
        "macos" => "Darwin".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, status: TestOutcome, category: TestCategory) -> TestRecord {
        TestRecord {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            status,
            category,
            duration_ms: 0,
            expected_output: String::new(),
            actual_output: String::new(),
            compile_time_ms: 0,
            runtime_ms: 0,
            memory_usage: None,
            error_message: None,
            platform: "Linux".to_string(),
            compiler_version: None,
            timestamp: Utc::now(),
        }
    }

    fn suite(results: Vec<TestRecord>) -> TestSuite {
        TestSuite {
            name: "DreamCompiler Tests (**/*.dr)".to_string(),
            results,
            total_duration_ms: 0,
            platform: "Linux".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_counts_partition_total() {
        let s = suite(vec![
            record("tests/a.dr", TestOutcome::Pass, TestCategory::Unit),
            record("tests/b.dr", TestOutcome::Fail, TestCategory::Unit),
            record("tests/c.dr", TestOutcome::Skip, TestCategory::Syntax),
            record("tests/d.dr", TestOutcome::Error, TestCategory::Integration),
            record("tests/e.dr", TestOutcome::Timeout, TestCategory::Integration),
        ]);

        assert_eq!(s.total(), 5);
        assert_eq!(s.passed() + s.failed() + s.skipped() + s.errors(), s.total());
        assert_eq!(s.errors(), 2);
        assert_eq!(s.timed_out(), 1);
        assert!((s.pass_rate() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_suite_pass_rate_is_zero() {
        let s = suite(vec![]);
        assert_eq!(s.total(), 0);
        assert_eq!(s.pass_rate(), 0.0);
    }

    #[test]
    fn test_category_breakdown() {
        let s = suite(vec![
            record("tests/basics/a.dr", TestOutcome::Pass, TestCategory::Unit),
            record("tests/basics/b.dr", TestOutcome::Fail, TestCategory::Unit),
            record("tests/advanced/c.dr", TestOutcome::Timeout, TestCategory::Integration),
        ]);

        let breakdown = s.category_breakdown();
        assert_eq!(breakdown[&TestCategory::Unit].passed, 1);
        assert_eq!(breakdown[&TestCategory::Unit].failed, 1);
        assert_eq!(breakdown[&TestCategory::Integration].errors, 1);
        assert!((breakdown[&TestCategory::Unit].pass_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_failures_lists_fail_error_timeout() {
        let s = suite(vec![
            record("tests/a.dr", TestOutcome::Pass, TestCategory::Unit),
            record("tests/b.dr", TestOutcome::Fail, TestCategory::Unit),
            record("tests/c.dr", TestOutcome::Skip, TestCategory::Unit),
            record("tests/d.dr", TestOutcome::Error, TestCategory::Unit),
            record("tests/e.dr", TestOutcome::Timeout, TestCategory::Unit),
        ]);

        let paths: Vec<&str> = s.failures().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["tests/b.dr", "tests/d.dr", "tests/e.dr"]);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("unit".parse::<TestCategory>().unwrap(), TestCategory::Unit);
        assert_eq!(
            "cross-platform".parse::<TestCategory>().unwrap(),
            TestCategory::CrossPlatform
        );
        assert_eq!(
            "Cross_Platform".parse::<TestCategory>().unwrap(),
            TestCategory::CrossPlatform
        );
        assert!("bogus".parse::<TestCategory>().is_err());
    }

    #[test]
    fn test_serialized_tags() {
        let json = serde_json::to_string(&TestOutcome::Timeout).unwrap();
        assert_eq!(json, "\"TIMEOUT\"");
        let json = serde_json::to_string(&TestCategory::CrossPlatform).unwrap();
        assert_eq!(json, "\"cross_platform\"");
    }

    #[test]
    fn test_record_missing_optional_fields_defaults() {
        let json = r#"{"name": "a.dr", "path": "tests/a.dr", "status": "FAIL"}"#;
        let r: TestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.status, TestOutcome::Fail);
        assert_eq!(r.category, TestCategory::Unit);
        assert_eq!(r.compile_time_ms, 0);
        assert_eq!(r.runtime_ms, 0);
        assert!(r.error_message.is_none());
        assert!(r.compiler_version.is_none());
    }
}
