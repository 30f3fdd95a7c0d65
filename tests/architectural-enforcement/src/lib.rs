//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - No sleeping in the session core (timers and timeouts only)
//! - No panicking shortcuts (`unwrap`/`expect`) in production code
//! - The core stays headless: no terminal or CLI crates
//!
//! Helpers here locate workspace sources and strip test code so each rule
//! only sees what ships.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace root, from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// A production source line
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Line text with any trailing `//` comment removed
    pub code: String,
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.number, self.code.trim())
    }
}

/// Production lines of every `.rs` file under `dir` (relative to the workspace root)
///
/// See [`production_code`] for what counts as test code. Files named in
/// `skip` (by file name) are ignored entirely.
#[must_use]
pub fn production_lines(dir: &str, skip: &[&str]) -> Vec<SourceLine> {
    let root = workspace_root().join(dir);
    let mut lines = Vec::new();

    for entry in walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        if skip.contains(&name) {
            continue;
        }
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };

        lines.extend(
            production_code(&content)
                .into_iter()
                .map(|(number, code)| SourceLine {
                    path: path.to_path_buf(),
                    number,
                    code: code.to_string(),
                }),
        );
    }

    lines
}

/// Non-empty production lines of one file, as `(line number, code)`
///
/// A `#[cfg(test)]` item declared without a body (`mod test_utils;`) is
/// skipped on its own. A `#[cfg(test)]` block (`mod tests {`) ends the
/// file's production code.
#[must_use]
pub fn production_code(content: &str) -> Vec<(usize, &str)> {
    let lines: Vec<&str> = content.lines().collect();
    let mut code = Vec::new();
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        if let Some(rest) = line.trim_start().strip_prefix("#[cfg(test)]") {
            let (item, item_lines) = if rest.trim().is_empty() {
                (lines.get(idx + 1).copied().unwrap_or_default(), 2)
            } else {
                (rest, 1)
            };
            if strip_comment(item).trim_end().ends_with('{') {
                break;
            }
            idx += item_lines;
            continue;
        }

        let stripped = strip_comment(line);
        if !stripped.trim().is_empty() {
            code.push((idx + 1, stripped));
        }
        idx += 1;
    }

    code
}

/// Drop a trailing `//` comment (doc comments included)
#[must_use]
pub fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("let x = 1; // note"), "let x = 1; ");
        assert_eq!(strip_comment("/// docs"), "");
    }

    #[test]
    fn test_test_only_item_does_not_hide_later_code() {
        let content = "\
mod a;
#[cfg(test)]
pub(crate) mod test_utils;
pub use a::Thing;

#[cfg(test)]
mod tests {
    fn helper() { x.unwrap(); }
}
";
        let code: Vec<&str> = production_code(content)
            .into_iter()
            .map(|(_, line)| line)
            .collect();
        assert_eq!(code, vec!["mod a;", "pub use a::Thing;"]);
    }

    #[test]
    fn test_inline_test_attribute_skips_one_line() {
        let content = "#[cfg(test)] mod test_utils;\nfn real() {}\n#[cfg(test)] mod tests {\n}\n";
        let numbers: Vec<usize> = production_code(content).into_iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![2]);
    }

    #[test]
    fn test_core_lib_reexports_are_scanned() {
        let lines = production_lines("client/core/src", &[]);
        assert!(lines
            .iter()
            .any(|l| l.path.ends_with("lib.rs") && l.code.starts_with("pub use")));
    }

    #[test]
    fn test_core_sources_are_found() {
        assert!(!production_lines("client/core/src", &[]).is_empty());
    }
}
