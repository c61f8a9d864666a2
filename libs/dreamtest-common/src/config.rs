// Runner configuration
//
// Loaded once at startup and passed down explicitly. A missing file is
// replaced by the defaults, which are written back immediately so the next
// run (and the operator) can see and edit them.

use crate::types::TestCategory;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Test sources, relative to the project root.
pub const TESTS_DIR: &str = "tests";
/// Persisted suites, relative to the project root.
pub const RESULTS_DIR: &str = "test_results";
/// Config file, relative to the project root.
pub const CONFIG_FILE: &str = "codex/test_config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// Root-relative paths expected to fail on this platform. Advisory only.
    pub known_failures: Vec<String>,
}

/// How the external toolchain is invoked. All paths are root-relative and
/// all commands run with the project root as working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub build_command: Vec<String>,
    pub compiler_name: String,
    /// Searched in order; the first directory holding the compiler wins.
    pub compiler_search_dirs: Vec<String>,
    pub compiler_flags: Vec<String>,
    /// Arguments that make the compiler print its version, e.g.
    /// `["--version"]`. Empty disables the version query; the stock DreamCompiler
    /// driver treats any unknown argument as an input file.
    pub version_args: Vec<String>,
    pub link_command: Vec<String>,
    /// Where the compiler leaves its translation unit.
    pub translation_unit: String,
    pub runtime_sources: Vec<String>,
    /// Linked test executable, written to the project root.
    pub executable_name: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            build_command: vec!["zig".to_string(), "build".to_string()],
            compiler_name: "DreamCompiler".to_string(),
            compiler_search_dirs: vec![
                "zig-out/bin".to_string(),
                "build/bin".to_string(),
                ".".to_string(),
            ],
            compiler_flags: vec!["--dev".to_string()],
            version_args: Vec::new(),
            link_command: vec![
                "zig".to_string(),
                "cc".to_string(),
                "-Isrc/runtime".to_string(),
            ],
            translation_unit: "build/bin/dream.c".to_string(),
            runtime_sources: vec![
                "src/runtime/memory/memory.c".to_string(),
                "src/runtime/io/console.c".to_string(),
                "src/runtime/extensions/custom.c".to_string(),
                "src/runtime/exceptions/exception.c".to_string(),
                "src/runtime/system/task.c".to_string(),
            ],
            executable_name: "dream".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-stage wall-clock budget in seconds.
    pub timeout: u64,
    /// Accepted for compatibility; runs are always sequential.
    pub parallel_jobs: u32,
    pub memory_limit_mb: u32,
    /// Tests-relative path prefix to category. Prefixes match whole path
    /// components: `basic` covers `basic/x.dr` but not `basics/x.dr`.
    pub categories: BTreeMap<String, TestCategory>,
    /// Keyed by lowercase platform name.
    pub platform_specific: BTreeMap<String, PlatformSettings>,
    pub toolchain: ToolchainConfig,
}

impl Default for Config {
    fn default() -> Self {
        let categories = [
            ("basics", TestCategory::Unit),
            ("control_flow", TestCategory::Unit),
            ("functions", TestCategory::Unit),
            ("advanced", TestCategory::Integration),
            ("semantics", TestCategory::Semantic),
            ("debug", TestCategory::Regression),
        ]
        .into_iter()
        .map(|(prefix, category)| (prefix.to_string(), category))
        .collect();

        let mut platform_specific = BTreeMap::new();
        platform_specific.insert(
            "windows".to_string(),
            PlatformSettings {
                known_failures: vec![
                    "tests/advanced/data_structures/struct.dr".to_string(),
                    "tests/advanced/data_structures/new_struct.dr".to_string(),
                    "tests/advanced/oop/class.dr".to_string(),
                ],
            },
        );
        platform_specific.insert("linux".to_string(), PlatformSettings::default());

        Self {
            timeout: 30,
            parallel_jobs: 1,
            memory_limit_mb: 512,
            categories,
            platform_specific,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl Config {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path`, or write the defaults there when it does not exist yet.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let config = Config::default();
        config.save(path)?;
        info!(path = %path.display(), "Wrote default configuration");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory {}", parent.display())
                })?;
            }
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn known_failures(&self, platform: &str) -> &[String] {
        self.platform_specific
            .get(&platform.to_lowercase())
            .map(|p| p.known_failures.as_slice())
            .unwrap_or(&[])
    }

    /// `path` is the root-relative display form of a test.
    pub fn is_known_failure(&self, platform: &str, path: &str) -> bool {
        self.known_failures(platform).iter().any(|known| known == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_or_init_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("codex").join("test_config.json");

        let config = Config::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, Config::default());

        let reloaded = Config::load_or_init(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_config.json");
        fs::write(&path, r#"{"timeout": 5, "categories": {"perf": "performance"}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories["perf"], TestCategory::Performance);
        assert_eq!(config.memory_limit_mb, 512);
        assert_eq!(config.toolchain, ToolchainConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Config::load_or_init(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_known_failures_by_platform() {
        let config = Config::default();
        assert!(config.is_known_failure("Windows", "tests/advanced/oop/class.dr"));
        assert!(!config.is_known_failure("Linux", "tests/advanced/oop/class.dr"));
        assert!(config.known_failures("Plan9").is_empty());
    }
}
