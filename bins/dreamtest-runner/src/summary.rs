// Human and machine summaries of a finished suite

use anyhow::{Context, Result};
use dreamtest_common::types::TestSuite;
use serde_json::json;

const RULE_WIDTH: usize = 80;

pub fn render_text(suite: &TestSuite) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        format!("TEST SUITE SUMMARY: {}", suite.name),
        format!("Platform: {}", suite.platform),
        format!("Duration: {:.2}s", suite.total_duration_ms as f64 / 1000.0),
        rule.clone(),
        format!("Total Tests: {}", suite.total()),
        format!("Passed:      {} ({:.1}%)", suite.passed(), suite.pass_rate()),
        format!("Failed:      {}", suite.failed()),
        format!("Skipped:     {}", suite.skipped()),
        format!("Errors:      {}", suite.errors()),
    ];
    if suite.timed_out() > 0 {
        lines.push(format!("  (timeouts: {})", suite.timed_out()));
    }

    let breakdown = suite.category_breakdown();
    if !breakdown.is_empty() {
        lines.push(String::new());
        lines.push("Category Breakdown:".to_string());
        for (category, tally) in &breakdown {
            lines.push(format!(
                "  {:12} {:3}/{:3} ({:5.1}%)",
                category.as_str(),
                tally.passed,
                tally.total(),
                tally.pass_rate()
            ));
        }
    }

    let failures: Vec<_> = suite.failures().collect();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("Failed Tests ({}):", failures.len()));
        for record in failures {
            lines.push(format!("  {} [{}]", record.path, record.status));
            if let Some(message) = &record.error_message {
                lines.push(format!("    Error: {}", message));
            } else if record.status.was_executed() {
                lines.push(format!(
                    "    Expected: '{}', Got: '{}'",
                    record.expected_output, record.actual_output
                ));
            }
        }
    }

    lines.push(rule);
    lines.join("\n")
}

/// The suite as persisted, plus the derived counts.
pub fn render_json(suite: &TestSuite) -> Result<String> {
    let value = json!({
        "suite": suite,
        "summary": {
            "total": suite.total(),
            "passed": suite.passed(),
            "failed": suite.failed(),
            "skipped": suite.skipped(),
            "errors": suite.errors(),
            "timed_out": suite.timed_out(),
            "pass_rate": suite.pass_rate(),
        }
    });
    serde_json::to_string_pretty(&value).context("Failed to serialize suite summary")
}
