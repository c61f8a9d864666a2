// Test discovery and categorization

use anyhow::{Context, Result};
use dreamtest_common::config::{Config, TESTS_DIR};
use dreamtest_common::paths::TestPath;
use dreamtest_common::types::TestCategory;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const DEFAULT_PATTERN: &str = "**/*.dr";

/// Finds test files under `<root>/tests` and tags each with a category.
#[derive(Debug, Clone)]
pub struct TestLocator {
    root: PathBuf,
    tests_dir: PathBuf,
    categories: BTreeMap<String, TestCategory>,
}

impl TestLocator {
    pub fn new(root: &Path, config: &Config) -> Self {
        Self {
            root: root.to_path_buf(),
            tests_dir: root.join(TESTS_DIR),
            categories: config.categories.clone(),
        }
    }

    /// Normalize a root-relative or absolute path.
    pub fn resolve(&self, input: &Path) -> TestPath {
        TestPath::new(&self.root, &self.tests_dir, input)
    }

    /// All files under the tests directory whose tests-relative path matches
    /// `pattern`, sorted by path.
    pub fn discover(&self, pattern: &str) -> Result<Vec<TestPath>> {
        let matcher = compile_pattern(pattern)?;

        if !self.tests_dir.is_dir() {
            warn!(dir = %self.tests_dir.display(), "Tests directory does not exist");
            return Ok(Vec::new());
        }

        let mut tests = Vec::new();
        for entry in WalkDir::new(&self.tests_dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable entry during discovery");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = self.resolve(entry.path());
            if matcher.is_match(path.tests_relative()) {
                tests.push(path);
            }
        }

        tests.sort_by(|a, b| a.absolute().cmp(b.absolute()));
        info!(pattern = pattern, count = tests.len(), "Discovered test files");
        Ok(tests)
    }

    pub fn categorize(&self, path: &TestPath) -> TestCategory {
        let category = categorize(path.tests_relative(), &self.categories);
        debug!(path = path.display(), category = %category, "Categorized test");
        category
    }
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid test pattern: {}", pattern))?
        .compile_matcher())
}

/// Category of a tests-relative path: the longest configured prefix that
/// covers it wins, `unit` when none does.
///
/// Prefixes match whole path components: `basics` covers `basics/add.dr`
/// but not `basics_old/add.dr`. Prefixes are unique keys, so the result
/// never depends on table or discovery order.
pub fn categorize(tests_relative: &str, table: &BTreeMap<String, TestCategory>) -> TestCategory {
    table
        .iter()
        .filter(|(prefix, _)| prefix_covers(prefix, tests_relative))
        .max_by_key(|(prefix, _)| prefix.trim_end_matches('/').len())
        .map(|(_, category)| *category)
        .unwrap_or_default()
}

fn prefix_covers(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
