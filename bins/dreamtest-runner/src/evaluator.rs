/// Output Evaluator - Expected vs Actual
///
/// Pure comparison logic, independent of how the program was built or run.
///
/// **Normalization Rules:**
/// - Trailing whitespace of the captured stdout is dropped (final newline)
/// - Leading whitespace: significant
/// - Internal whitespace and blank lines: significant
/// - Case sensitivity: YES (exact match required)

use crate::engine::ProcessOutput;
use dreamtest_common::types::TestOutcome;

pub fn normalize_output(output: &str) -> &str {
    output.trim_end()
}

/// PASS when the normalized stdout equals the joined expected lines exactly.
pub fn compare(expected: &str, actual: &str) -> TestOutcome {
    if normalize_output(actual) == expected {
        TestOutcome::Pass
    } else {
        TestOutcome::Fail
    }
}

/// Diagnostic text of a failed process: stderr, or stdout when stderr is
/// empty (some tools report on stdout).
pub fn failure_detail(output: &ProcessOutput) -> String {
    let stderr = output.stderr.trim_end();
    let detail = if stderr.is_empty() {
        output.stdout.trim_end()
    } else {
        stderr
    };

    match output.exit_code {
        Some(_) => detail.to_string(),
        None if detail.is_empty() => "terminated by signal".to_string(),
        None => format!("{} (terminated by signal)", detail),
    }
}
