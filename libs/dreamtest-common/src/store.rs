use crate::types::TestSuite;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use globset::Glob;
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// Result files are append-only: one per suite, written once, never rewritten.
// Names are unique per second and platform, so two runs on the same machine
// in the same second collide; the second write then fails instead of
// replacing the first.

pub const RESULT_PREFIX: &str = "test_results";
pub const RESULT_EXTENSION: &str = "json";
pub const DEFAULT_PATTERN: &str = "*.json";

/// `test_results_<YYYYMMDD_HHMMSS>_<platform>.json`
pub fn result_file_name<Tz: TimeZone>(timestamp: &DateTime<Tz>, platform: &str) -> String
where
    Tz::Offset: Display,
{
    format!(
        "{}_{}_{}.{}",
        RESULT_PREFIX,
        timestamp.format("%Y%m%d_%H%M%S"),
        platform.to_lowercase(),
        RESULT_EXTENSION
    )
}

/// A suite read back from disk together with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSuite {
    pub file_path: PathBuf,
    pub suite: TestSuite,
}

/// Persist a suite under `results_dir`, named after its local start time.
pub fn save_suite(results_dir: &Path, suite: &TestSuite) -> Result<PathBuf> {
    fs::create_dir_all(results_dir).with_context(|| {
        format!("Failed to create results directory {}", results_dir.display())
    })?;

    let local = suite.timestamp.with_timezone(&Local);
    let path = results_dir.join(result_file_name(&local, &suite.platform));

    let json = serde_json::to_string_pretty(suite).context("Failed to serialize test suite")?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create result file {}", path.display()))?;
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write result file {}", path.display()))?;

    info!(path = %path.display(), records = suite.total(), "Results saved");
    Ok(path)
}

pub fn load_suite(path: &Path) -> Result<TestSuite> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read result file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse result file {}", path.display()))
}

/// Load every file in `results_dir` whose name matches `pattern`, oldest
/// suite first.
///
/// Unreadable or malformed files are logged and skipped. A missing results
/// directory yields an empty list. Only an invalid pattern is an error.
pub fn load_suites(results_dir: &Path, pattern: &str) -> Result<Vec<StoredSuite>> {
    let matcher = Glob::new(pattern)
        .with_context(|| format!("Invalid result file pattern: {}", pattern))?
        .compile_matcher();

    let entries = match fs::read_dir(results_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %results_dir.display(), error = %e, "Cannot read results directory");
            return Ok(Vec::new());
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| matcher.is_match(Path::new(name)))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut suites = Vec::with_capacity(paths.len());
    for path in paths {
        match load_suite(&path) {
            Ok(suite) => {
                debug!(path = %path.display(), records = suite.total(), "Loaded suite");
                suites.push(StoredSuite {
                    file_path: path,
                    suite,
                });
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Skipping result file");
            }
        }
    }

    // Stable sort keeps file-name order for identical timestamps.
    suites.sort_by_key(|s| s.suite.timestamp);
    Ok(suites)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TestCategory, TestOutcome, TestRecord};
    use chrono::Utc;
    use tempfile::tempdir;

    fn suite_at(secs: i64, platform: &str) -> TestSuite {
        let timestamp = Utc.timestamp_opt(secs, 0).unwrap();
        TestSuite {
            name: "DreamCompiler Tests (**/*.dr)".to_string(),
            results: vec![TestRecord {
                name: "add.dr".to_string(),
                path: "tests/basics/add.dr".to_string(),
                status: TestOutcome::Pass,
                category: TestCategory::Unit,
                duration_ms: 12,
                expected_output: "8".to_string(),
                actual_output: "8".to_string(),
                compile_time_ms: 10,
                runtime_ms: 2,
                memory_usage: None,
                error_message: None,
                platform: platform.to_string(),
                compiler_version: Some("0.1.0".to_string()),
                timestamp,
            }],
            total_duration_ms: 15,
            platform: platform.to_string(),
            timestamp,
        }
    }

    #[test]
    fn test_result_file_name_format() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(
            result_file_name(&ts, "Linux"),
            "test_results_20250307_090501_linux.json"
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let suite = suite_at(1_700_000_000, "Linux");

        let path = save_suite(dir.path(), &suite).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("test_results_"));
        assert!(name.ends_with("_linux.json"));

        assert_eq!(load_suite(&path).unwrap(), suite);
    }

    #[test]
    fn test_save_never_overwrites() {
        let dir = tempdir().unwrap();
        let suite = suite_at(1_700_000_000, "Linux");

        save_suite(dir.path(), &suite).unwrap();
        assert!(save_suite(dir.path(), &suite).is_err());
    }

    #[test]
    fn test_load_suites_sorted_and_skips_bad_files() {
        let dir = tempdir().unwrap();
        save_suite(dir.path(), &suite_at(1_700_000_500, "Linux")).unwrap();
        save_suite(dir.path(), &suite_at(1_700_000_000, "Windows")).unwrap();
        fs::write(dir.path().join("test_results_broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_suites(dir.path(), DEFAULT_PATTERN).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].suite.platform, "Windows");
        assert_eq!(loaded[1].suite.platform, "Linux");
    }

    #[test]
    fn test_load_suites_pattern_filters() {
        let dir = tempdir().unwrap();
        save_suite(dir.path(), &suite_at(1_700_000_500, "Linux")).unwrap();
        save_suite(dir.path(), &suite_at(1_700_000_000, "Windows")).unwrap();

        let loaded = load_suites(dir.path(), "*_windows.json").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].suite.platform, "Windows");
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let loaded = load_suites(&dir.path().join("nope"), DEFAULT_PATTERN).unwrap();
        assert!(loaded.is_empty());
    }
}
