/// Test Annotations - Expected Output and Compiler Options
///
/// Test files carry their own oracle as line comments:
///
/// ```text
/// // Expected: 8
/// // Expected: (no output)
/// // Options: --opt-level 2
/// ```
///
/// Every `Expected:` line contributes one output line in file order; the
/// `(no output)` sentinel contributes none but still marks the file as
/// annotated. A file without any `Expected:` annotation is skipped.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs;
use std::path::Path;

pub const NO_OUTPUT_SENTINEL: &str = "(no output)";

lazy_static! {
    static ref EXPECTED_RE: Regex = Regex::new(r"(?m)//[ \t]*Expected:[ \t]*(.*)$")
        .expect("expected-annotation regex is valid");
    static ref OPTIONS_RE: Regex = Regex::new(r"(?m)//[ \t]*Options:[ \t]*(.*)$")
        .expect("options-annotation regex is valid");
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestAnnotations {
    /// Expected output lines, sentinel removed.
    pub expected: Vec<String>,
    /// Number of `Expected:` annotations seen, sentinel included.
    pub expectation_count: usize,
    /// Tokens of each `Options:` annotation, in file order.
    pub option_lines: Vec<Vec<String>>,
}

impl TestAnnotations {
    pub fn has_expectations(&self) -> bool {
        self.expectation_count > 0
    }

    /// Expected stdout, lines joined with `\n`.
    pub fn expected_output(&self) -> String {
        self.expected.join("\n")
    }

    /// Every option token from every `Options:` annotation.
    pub fn options(&self) -> Vec<&str> {
        self.option_lines
            .iter()
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Tokens passed to the compiler: only the first `Options:` line counts.
    pub fn compiler_options(&self) -> &[String] {
        self.option_lines.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn parse(content: &str) -> TestAnnotations {
    let mut annotations = TestAnnotations::default();

    for cap in EXPECTED_RE.captures_iter(content) {
        annotations.expectation_count += 1;
        let line = cap[1].trim_end();
        if line != NO_OUTPUT_SENTINEL {
            annotations.expected.push(line.to_string());
        }
    }

    for cap in OPTIONS_RE.captures_iter(content) {
        annotations
            .option_lines
            .push(cap[1].split_whitespace().map(str::to_string).collect());
    }

    annotations
}

pub fn parse_file(path: &Path) -> Result<TestAnnotations> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    Ok(parse(&content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_annotations() {
        let a = parse("func main() {\n    println(1);\n}\n");
        assert!(!a.has_expectations());
        assert!(a.expected.is_empty());
        assert!(a.options().is_empty());
    }

    #[test]
    fn test_expected_lines_in_order() {
        let a = parse("// Expected: 1\nprintln(1);\n// Expected: two words\n//Expected:3\n");
        assert_eq!(a.expected, vec!["1", "two words", "3"]);
        assert_eq!(a.expected_output(), "1\ntwo words\n3");
    }

    #[test]
    fn test_no_output_sentinel() {
        let a = parse("// Expected: (no output)\nint x = 1;\n");
        assert!(a.has_expectations());
        assert!(a.expected.is_empty());
        assert_eq!(a.expected_output(), "");
    }

    #[test]
    fn test_sentinel_mixed_with_lines() {
        let a = parse("// Expected: (no output)\n// Expected: 5\n");
        assert_eq!(a.expectation_count, 2);
        assert_eq!(a.expected, vec!["5"]);
    }

    #[test]
    fn test_trailing_whitespace_and_crlf_trimmed() {
        let a = parse("// Expected: 42   \r\n// Expected: a  b\r\n");
        assert_eq!(a.expected, vec!["42", "a  b"]);
    }

    #[test]
    fn test_empty_expected_line_is_blank_output_line() {
        let a = parse("// Expected: a\n// Expected:\n// Expected: b\n");
        assert_eq!(a.expected_output(), "a\n\nb");
    }

    #[test]
    fn test_annotation_does_not_span_lines() {
        let a = parse("// Expected:\nprintln(7);\n");
        assert_eq!(a.expected, vec![""]);
    }

    #[test]
    fn test_options() {
        let a = parse("// Options: -O2 --emit-c\n// Options: --extra\n// Expected: 1\n");
        assert_eq!(a.options(), vec!["-O2", "--emit-c", "--extra"]);
        assert_eq!(a.compiler_options(), ["-O2".to_string(), "--emit-c".to_string()]);
    }

    #[test]
    fn test_parse_file_missing_is_error() {
        let err = parse_file(Path::new("/definitely/not/here.dr")).unwrap_err();
        assert!(err.to_string().contains("Failed to read test file"));
    }
}
