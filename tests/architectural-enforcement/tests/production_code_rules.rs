//! Integration Test: Production Code Rules
//!
//! **Policy**: The session core reacts to events; it never sleeps and never
//! panics on a recoverable error. The core is headless, so surfaces own the
//! terminal and the command line.

use architectural_enforcement::{production_lines, workspace_root};

const CORE_SRC: &str = "client/core/src";
const TERM_SRC: &str = "term/src";

fn report(rule: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} violation(s). Fix these before merging!", violations.len());
}

#[test]
fn test_no_sleep_in_core() {
    let violations: Vec<String> = production_lines(CORE_SRC, &["test_utils.rs"])
        .into_iter()
        .filter(|l| l.code.contains("sleep(") || l.code.contains("sleep_until("))
        .map(|l| l.to_string())
        .collect();

    report(
        "Sleeping in the session core (use timeouts, intervals or channels)",
        &violations,
    );
}

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let mut violations = Vec::new();
    for dir in [CORE_SRC, TERM_SRC] {
        violations.extend(
            production_lines(dir, &["test_utils.rs"])
                .into_iter()
                .filter(|l| l.code.contains(".unwrap()") || l.code.contains(".expect("))
                .map(|l| l.to_string()),
        );
    }

    report(
        "unwrap()/expect() in production code (propagate the error instead)",
        &violations,
    );
}

#[test]
fn test_core_is_headless() {
    let manifest = std::fs::read_to_string(workspace_root().join("client/core/Cargo.toml"))
        .expect("core manifest");

    let forbidden = ["clap", "textwrap", "tracing-subscriber"];
    let violations: Vec<String> = manifest
        .lines()
        .take_while(|line| !line.starts_with("[dev-dependencies]"))
        .filter(|line| {
            forbidden
                .iter()
                .any(|dep| line.trim_start().starts_with(&format!("{dep} ")))
        })
        .map(|line| format!("client/core/Cargo.toml - {}", line.trim()))
        .collect();

    report(
        "Surface crates in the core (keep them in term or the stub server)",
        &violations,
    );
}
