/// Suite Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Coordinate the locator and the pipeline to produce one TestSuite.
///
/// **Architecture:**
/// 1. Discover candidates with TestLocator (locator.rs)
/// 2. Keep the requested categories
/// 3. Run each candidate through the Pipeline, one at a time (pipeline.rs)
/// 4. Aggregate the records into a TestSuite
///
/// Persisting is a separate step so an interrupted run saves nothing.

use crate::engine::CommandRunner;
use crate::locator::TestLocator;
use crate::pipeline::Pipeline;
use anyhow::Result;
use chrono::Utc;
use dreamtest_common::config::{Config, RESULTS_DIR};
use dreamtest_common::paths::TestPath;
use dreamtest_common::store;
use dreamtest_common::types::{TestCategory, TestSuite};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

pub struct SuiteExecutor<R> {
    locator: TestLocator,
    pipeline: Pipeline<R>,
    results_dir: PathBuf,
}

impl<R: CommandRunner> SuiteExecutor<R> {
    pub fn new(runner: R, root: &Path, config: &Config) -> Self {
        if config.parallel_jobs > 1 {
            warn!(
                parallel_jobs = config.parallel_jobs,
                "Tests share one executable path; running sequentially"
            );
        }

        Self {
            locator: TestLocator::new(root, config),
            pipeline: Pipeline::new(runner, root, config),
            results_dir: root.join(RESULTS_DIR),
        }
    }

    /// Discovered tests matching `pattern`, restricted to `categories`
    /// (all categories when empty), each with its category.
    pub fn candidates(
        &self,
        pattern: &str,
        categories: &[TestCategory],
    ) -> Result<Vec<(TestPath, TestCategory)>> {
        let candidates: Vec<_> = self
            .locator
            .discover(pattern)?
            .into_iter()
            .map(|path| {
                let category = self.locator.categorize(&path);
                (path, category)
            })
            .filter(|(_, category)| categories.is_empty() || categories.contains(category))
            .collect();
        Ok(candidates)
    }

    /// Run every candidate sequentially. Exactly one record per candidate.
    pub async fn run_suite(&self, pattern: &str, categories: &[TestCategory]) -> Result<TestSuite> {
        let started = Instant::now();
        let candidates = self.candidates(pattern, categories)?;
        info!(count = candidates.len(), "Running tests...");

        self.pipeline.prepare().await;

        let mut results = Vec::with_capacity(candidates.len());
        for (path, category) in &candidates {
            results.push(self.pipeline.run_test(path, *category).await);
        }

        let suite = TestSuite {
            name: format!("DreamCompiler Tests ({})", pattern),
            results,
            total_duration_ms: started.elapsed().as_millis() as u64,
            platform: self.pipeline.platform().to_string(),
            timestamp: Utc::now(),
        };

        info!(
            total = suite.total(),
            passed = suite.passed(),
            failed = suite.failed(),
            skipped = suite.skipped(),
            errors = suite.errors(),
            duration_ms = suite.total_duration_ms,
            "Suite completed"
        );
        Ok(suite)
    }

    /// Write the suite under the results directory. Failure is logged, not
    /// returned: the summary must still be printed.
    pub fn persist(&self, suite: &TestSuite) -> Option<PathBuf> {
        match store::save_suite(&self.results_dir, suite) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(error = %format!("{:#}", e), "Failed to save results");
                None
            }
        }
    }
}
