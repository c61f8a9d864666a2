/// Test Pipeline - One Test File, Start to Finish
///
/// **State machine (strict order, each stage gates the next):**
///
/// ```text
/// PARSE -> BUILD_TOOLCHAIN -> COMPILE -> LINK -> EXECUTE -> COMPARE
///   |            |              |         |         |          |
///  SKIP        ERROR          ERROR     ERROR     ERROR     PASS/FAIL
///             TIMEOUT        TIMEOUT   TIMEOUT   TIMEOUT
/// ```
///
/// **Guarantees:**
/// - Exactly one TestRecord per call; stage failures are data, never `Err`
/// - Single attempt per stage, no retries
/// - A timed-out stage ends the pipeline with TIMEOUT
/// - Known failures are logged only; they never change the outcome
///
/// **Timing:**
/// - compile time runs from pipeline start through LINK (0 if BUILD fails)
/// - runtime covers EXECUTE alone
///
/// All stages write the same executable path under the project root, so
/// two pipelines must never run concurrently against one root.

use crate::annotations::{self, TestAnnotations};
use crate::engine::{CommandRunner, Invocation, ProcessOutput, StageCommand};
use crate::evaluator;
use chrono::Utc;
use dreamtest_common::config::{Config, ToolchainConfig};
use dreamtest_common::paths::TestPath;
use dreamtest_common::types::{host_platform, TestCategory, TestOutcome, TestRecord};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    BuildToolchain,
    Compile,
    Link,
    Execute,
    Compare,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Parse => "Parse",
            Stage::BuildToolchain => "Build",
            Stage::Compile => "Compile",
            Stage::Link => "Link",
            Stage::Execute => "Execute",
            Stage::Compare => "Compare",
        };
        f.write_str(name)
    }
}

/// Why the pipeline stopped before COMPARE.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Halt {
    status: TestOutcome,
    message: String,
}

impl Halt {
    fn error(message: impl Into<String>) -> Self {
        Self {
            status: TestOutcome::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StageTimings {
    compile: Duration,
    runtime: Duration,
}

pub struct Pipeline<R> {
    runner: R,
    root: PathBuf,
    toolchain: ToolchainConfig,
    timeout: Duration,
    known_failures: Vec<String>,
    platform: String,
    compiler_version: OnceCell<Option<String>>,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(runner: R, root: &Path, config: &Config) -> Self {
        let platform = host_platform();
        Self {
            runner,
            root: root.to_path_buf(),
            toolchain: config.toolchain.clone(),
            timeout: config.timeout(),
            known_failures: config.known_failures(&platform).to_vec(),
            platform,
            compiler_version: OnceCell::new(),
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Version reported by the compiler, once it has been located.
    pub fn compiler_version(&self) -> Option<&str> {
        self.compiler_version.get().and_then(|v| v.as_deref())
    }

    /// First existing compiler among the configured search directories.
    pub fn locate_compiler(&self) -> Option<PathBuf> {
        let name = format!("{}{}", self.toolchain.compiler_name, std::env::consts::EXE_SUFFIX);
        self.toolchain
            .compiler_search_dirs
            .iter()
            .map(|dir| self.root.join(dir).join(&name))
            .find(|candidate| candidate.is_file())
    }

    pub fn executable_path(&self) -> PathBuf {
        self.root.join(format!(
            "{}{}",
            self.toolchain.executable_name,
            std::env::consts::EXE_SUFFIX
        ))
    }

    pub fn is_known_failure(&self, path: &TestPath) -> bool {
        self.known_failures.iter().any(|known| known == path.display())
    }

    /// Query the compiler version up front when a compiler is already built.
    /// Otherwise the query happens on the first COMPILE. No-op unless
    /// `toolchain.version_args` is configured.
    pub async fn prepare(&self) {
        if let Some(compiler) = self.locate_compiler() {
            self.query_version(&compiler).await;
        }
    }

    /// Run every stage for one test file and classify the outcome.
    pub async fn run_test(&self, path: &TestPath, category: TestCategory) -> TestRecord {
        let started = Instant::now();
        info!(path = path.display(), "Running test");

        debug!(stage = %Stage::Parse, path = path.display(), "Entering stage");
        let annotations = match annotations::parse_file(path.absolute()) {
            Ok(annotations) => annotations,
            Err(e) => {
                error!(path = path.display(), error = %format!("{:#}", e), "[ERROR] unreadable test file");
                return self.record(
                    path,
                    category,
                    TestOutcome::Error,
                    String::new(),
                    String::new(),
                    StageTimings::default(),
                    started.elapsed(),
                    Some(format!("Parse error: {:#}", e)),
                );
            }
        };

        debug!(
            path = path.display(),
            expected_lines = annotations.expected.len(),
            options = ?annotations.options(),
            "Parsed annotations"
        );

        if !annotations.has_expectations() {
            info!(path = path.display(), "[SKIP] no Expected annotation");
            return self.record(
                path,
                category,
                TestOutcome::Skip,
                String::new(),
                String::new(),
                StageTimings::default(),
                Duration::ZERO,
                None,
            );
        }

        if self.is_known_failure(path) {
            info!(path = path.display(), platform = %self.platform, "[KNOWN FAILURE]");
        }

        let expected = annotations.expected_output();
        let mut timings = StageTimings::default();

        let (status, actual, error_message) =
            match self.drive(path, &annotations, started, &mut timings).await {
                Ok(stdout) => {
                    debug!(stage = %Stage::Compare, path = path.display(), "Entering stage");
                    let actual = evaluator::normalize_output(&stdout).to_string();
                    (evaluator::compare(&expected, &actual), actual, None)
                }
                Err(halt) => (halt.status, String::new(), Some(halt.message)),
            };

        let duration = started.elapsed();
        match status {
            TestOutcome::Pass => {
                info!(path = path.display(), duration_ms = duration.as_millis() as u64, "[PASS]");
            }
            TestOutcome::Fail => {
                error!(
                    path = path.display(),
                    "[FAIL] Expected: '{}', Got: '{}'", expected, actual
                );
            }
            _ => {
                error!(
                    path = path.display(),
                    status = %status,
                    error = error_message.as_deref().unwrap_or(""),
                    "[{}]", status
                );
            }
        }

        self.record(
            path,
            category,
            status,
            expected,
            actual,
            timings,
            duration,
            error_message,
        )
    }

    /// BUILD_TOOLCHAIN through EXECUTE. Returns the raw stdout of the test
    /// program on success.
    async fn drive(
        &self,
        path: &TestPath,
        annotations: &TestAnnotations,
        started: Instant,
        timings: &mut StageTimings,
    ) -> Result<String, Halt> {
        // BUILD_TOOLCHAIN
        if let Some((program, args)) = self.toolchain.build_command.split_first() {
            let cmd = StageCommand::new(program, args.to_vec(), &self.root);
            match self.invoke(Stage::BuildToolchain, &cmd).await {
                Ok(_) => {}
                Err(StageFailure::Exited(_)) => return Err(Halt::error("Build failed")),
                Err(StageFailure::Failed(e)) => {
                    return Err(Halt::error(format!("Build failed: {}", e)))
                }
                Err(StageFailure::TimedOut) => return Err(self.timed_out(Stage::BuildToolchain)),
            }
        }

        // COMPILE
        let compiler = match self.locate_compiler() {
            Some(compiler) => compiler,
            None => {
                timings.compile = started.elapsed();
                return Err(Halt::error(format!(
                    "Compile error: {} executable not found",
                    self.toolchain.compiler_name
                )));
            }
        };
        self.query_version(&compiler).await;

        let mut args = self.toolchain.compiler_flags.clone();
        args.extend(annotations.compiler_options().iter().cloned());
        args.push(path.absolute().to_string_lossy().into_owned());
        let cmd = StageCommand::new(&compiler, args, &self.root);

        let result = self.invoke(Stage::Compile, &cmd).await;
        timings.compile = started.elapsed();
        match result {
            Ok(_) => {}
            Err(StageFailure::Exited(output)) => {
                return Err(Halt::error(format!(
                    "Compile error: {}",
                    evaluator::failure_detail(&output)
                )))
            }
            Err(StageFailure::Failed(e)) => {
                return Err(Halt::error(format!("Compile error: {}", e)))
            }
            Err(StageFailure::TimedOut) => return Err(self.timed_out(Stage::Compile)),
        }

        // LINK
        let exe = self.executable_path();
        let Some((program, link_args)) = self.toolchain.link_command.split_first() else {
            return Err(Halt::error("Link error: no link command configured"));
        };
        let mut args = link_args.to_vec();
        args.push(self.toolchain.translation_unit.clone());
        args.extend(self.toolchain.runtime_sources.iter().cloned());
        args.push("-o".to_string());
        args.push(exe.to_string_lossy().into_owned());
        let cmd = StageCommand::new(program, args, &self.root);

        let result = self.invoke(Stage::Link, &cmd).await;
        timings.compile = started.elapsed();
        match result {
            Ok(_) => {}
            Err(StageFailure::Exited(output)) => {
                return Err(Halt::error(format!(
                    "Link error: {}",
                    evaluator::failure_detail(&output)
                )))
            }
            Err(StageFailure::Failed(e)) => return Err(Halt::error(format!("Link error: {}", e))),
            Err(StageFailure::TimedOut) => return Err(self.timed_out(Stage::Link)),
        }

        // EXECUTE
        if !exe.is_file() {
            return Err(Halt::error("Runtime error: Executable not found"));
        }
        let cmd = StageCommand::new(&exe, Vec::new(), &self.root);
        let exec_started = Instant::now();
        let result = self.invoke(Stage::Execute, &cmd).await;
        timings.runtime = exec_started.elapsed();
        match result {
            Ok(output) => Ok(output.stdout),
            Err(StageFailure::Exited(output)) => Err(Halt::error(format!(
                "Runtime error: {}",
                evaluator::failure_detail(&output)
            ))),
            Err(StageFailure::Failed(e)) => Err(Halt::error(format!("Runtime error: {}", e))),
            Err(StageFailure::TimedOut) => Err(self.timed_out(Stage::Execute)),
        }
    }

    async fn invoke(&self, stage: Stage, cmd: &StageCommand) -> Result<ProcessOutput, StageFailure> {
        debug!(stage = %stage, command = %cmd, "Entering stage");
        match self.runner.run(cmd, self.timeout).await {
            Invocation::Completed(output) if output.success() => Ok(output),
            Invocation::Completed(output) => {
                debug!(stage = %stage, exit_code = ?output.exit_code, "Stage exited abnormally");
                Err(StageFailure::Exited(output))
            }
            Invocation::TimedOut { .. } => Err(StageFailure::TimedOut),
            Invocation::Failed { error } => Err(StageFailure::Failed(error)),
        }
    }

    async fn query_version(&self, compiler: &Path) {
        if self.toolchain.version_args.is_empty() {
            return;
        }
        self.compiler_version
            .get_or_init(|| async {
                let cmd =
                    StageCommand::new(compiler, self.toolchain.version_args.clone(), &self.root);
                match self.runner.run(&cmd, self.timeout).await {
                    Invocation::Completed(output) if output.success() => {
                        let version = output
                            .stdout
                            .lines()
                            .map(str::trim)
                            .find(|line| !line.is_empty())
                            .map(str::to_string);
                        info!(version = version.as_deref().unwrap_or("unknown"), "Compiler version");
                        version
                    }
                    other => {
                        warn!(result = ?other, "Could not determine compiler version");
                        None
                    }
                }
            })
            .await;
    }

    fn timed_out(&self, stage: Stage) -> Halt {
        Halt {
            status: TestOutcome::Timeout,
            message: format!("{} timed out after {}", stage, format_budget(self.timeout)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        path: &TestPath,
        category: TestCategory,
        status: TestOutcome,
        expected_output: String,
        actual_output: String,
        timings: StageTimings,
        duration: Duration,
        error_message: Option<String>,
    ) -> TestRecord {
        TestRecord {
            name: path.file_name(),
            path: path.display().to_string(),
            status,
            category,
            duration_ms: duration.as_millis() as u64,
            expected_output,
            actual_output,
            compile_time_ms: timings.compile.as_millis() as u64,
            runtime_ms: timings.runtime.as_millis() as u64,
            memory_usage: None,
            error_message,
            platform: self.platform.clone(),
            compiler_version: self.compiler_version().map(str::to_string),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug)]
enum StageFailure {
    Exited(ProcessOutput),
    TimedOut,
    Failed(String),
}

fn format_budget(budget: Duration) -> String {
    if budget.subsec_millis() == 0 {
        format!("{}s", budget.as_secs())
    } else {
        format!("{}ms", budget.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_budget() {
        assert_eq!(format_budget(Duration::from_secs(30)), "30s");
        assert_eq!(format_budget(Duration::from_millis(250)), "250ms");
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::BuildToolchain.to_string(), "Build");
        assert_eq!(Stage::Execute.to_string(), "Execute");
    }
}
