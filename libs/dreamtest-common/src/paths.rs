// Path normalization for test files
//
// Test paths reach the runner as absolute paths (from discovery) or as
// root-relative paths (from the command line and config). Everything is
// resolved once into a TestPath; later code only reads its fields.

use std::path::{Component, Path, PathBuf};

/// A test file path resolved against the project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestPath {
    absolute: PathBuf,
    display: String,
    tests_relative: String,
}

impl TestPath {
    /// Resolve `input` against `root`.
    ///
    /// - absolute input is used as-is, relative input is joined onto `root`
    /// - `.` and `..` are removed lexically (no filesystem access)
    /// - `display` is relative to `root`, `tests_relative` to `tests_dir`,
    ///   both `/`-separated; each falls back to the next wider form when the
    ///   path is not under that directory
    pub fn new(root: &Path, tests_dir: &Path, input: &Path) -> Self {
        let root = normalize_lexically(root);
        let tests_dir = normalize_lexically(&root.join(tests_dir));

        let absolute = if input.is_absolute() {
            normalize_lexically(input)
        } else {
            normalize_lexically(&root.join(input))
        };

        let display = relative_slash(&absolute, &root).unwrap_or_else(|| to_slash(&absolute));
        let tests_relative =
            relative_slash(&absolute, &tests_dir).unwrap_or_else(|| display.clone());

        Self {
            absolute,
            display,
            tests_relative,
        }
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// Root-relative form, stable across platforms. This is what records store.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Form matched against the category prefix table.
    pub fn tests_relative(&self) -> &str {
        &self.tests_relative
    }

    pub fn file_name(&self) -> String {
        self.absolute
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.display.clone())
    }
}

/// Remove `.` and resolve `..` components without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn relative_slash(path: &Path, base: &Path) -> Option<String> {
    path.strip_prefix(base).ok().map(to_slash)
}

fn to_slash(path: &Path) -> String {
    let joined = path
        .components()
        .filter_map(|c| match c {
            Component::Prefix(prefix) => Some(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    // Paths that never made it under the root keep their leading slash.
    if path.has_root() && !cfg!(windows) {
        format!("/{}", joined)
    } else {
        joined
    }
}
