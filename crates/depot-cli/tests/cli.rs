//! End-to-end tests for the `depot` command-line binary.

use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG: &str = r#"
[model]
current_application_backend = "flatpak"

[[backends]]
name = "apt"
kind = "dummy"
fail_packages = ["broken-pkg"]
security_updates = true

[[backends.packages]]
package_name = "vim"
name = "Vim"
comment = "Vi IMproved text editor"
state = "none"

[[backends.packages]]
package_name = "vim-gtk"
comment = "Vim with a GTK interface"
state = "none"

[[backends.packages]]
package_name = "htop"
comment = "Interactive process viewer"
state = "upgradeable"
installed_version = "0.9"
available_version = "1.0"

[[backends.packages]]
package_name = "broken-pkg"
comment = "Never installs"
state = "none"

[[backends]]
name = "flatpak"
kind = "dummy"
has_applications = true

[[backends.packages]]
package_name = "org.kde.krita"
name = "Krita"
appstream_id = "org.kde.krita"
comment = "Digital painting"
categories = ["Graphics"]
state = "installed"
installed_version = "5.2"
available_version = "5.2"

[[categories]]
name = "Graphics"
filter = { type = "category-name", value = "Graphics" }
"#;

/// Temporary configuration plus a way to run the binary against it
struct TestContext {
    _temp_dir: TempDir,
    config: PathBuf,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(CONFIG)
    }

    fn with_config(content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = temp_dir.path().join("config.toml");
        std::fs::write(&config, content).expect("failed to write config");
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_depot"));
        cmd.env("DEPOT_CONFIG", &self.config);
        cmd.env_remove("DEPOT_BACKENDS");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run depot")
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "depot {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
    }
}

fn packages(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("expected an array")
        .iter()
        .map(|row| row["package"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_help_command() {
    let ctx = TestContext::new();
    let output = ctx.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("search"));
}

#[test]
fn test_version_command() {
    let ctx = TestContext::new();
    assert!(ctx.run(&["--version"]).status.success());
}

#[test]
fn test_backends_lists_configured_backends() {
    let ctx = TestContext::new();
    let value = ctx.json(&["backends", "--json"]);
    let rows = value.as_array().expect("expected an array");
    let names: Vec<_> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["apt", "flatpak"]);
    assert_eq!(rows[0]["resources"], 4);
    assert_eq!(rows[0]["updates"], 1);
    assert_eq!(rows[1]["application_backend"], true);
}

#[test]
fn test_backends_flag_restricts() {
    let ctx = TestContext::new();
    let value = ctx.json(&["--backends", "flatpak", "backends", "--json"]);
    assert_eq!(value.as_array().map(Vec::len), Some(1));

    let output = ctx
        .cmd()
        .env("DEPOT_BACKENDS", "apt")
        .args(["backends", "--json"])
        .output()
        .expect("failed to run depot");
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value[0]["name"], "apt");
    assert_eq!(value.as_array().map(Vec::len), Some(1));
}

#[test]
fn test_missing_config_means_no_backends() {
    let ctx = TestContext::new();
    let output = ctx
        .cmd()
        .env("DEPOT_CONFIG", ctx.config.with_file_name("missing.toml"))
        .arg("backends")
        .output()
        .expect("failed to run depot");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No backends enabled"));
}

#[test]
fn test_invalid_config_is_reported() {
    let ctx = TestContext::with_config("[[backends]");
    let output = ctx.run(&["backends"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load configuration"));
}

#[test]
fn test_search_orders_by_relevance() {
    let ctx = TestContext::new();
    let value = ctx.json(&["search", "vim", "--json"]);
    assert_eq!(packages(&value), vec!["vim", "vim-gtk"]);
}

#[test]
fn test_search_needs_two_characters() {
    let ctx = TestContext::new();
    let output = ctx.run(&["search", "v"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least two characters"));
}

#[test]
fn test_search_without_matches() {
    let ctx = TestContext::new();
    let output = ctx.run(&["search", "emacs"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No packages found matching"));
}

#[test]
fn test_list_installed() {
    let ctx = TestContext::new();
    let value = ctx.json(&["list", "--installed", "--json"]);
    assert_eq!(packages(&value), vec!["htop", "org.kde.krita"]);
}

#[test]
fn test_list_by_category_and_backend() {
    let ctx = TestContext::new();
    let value = ctx.json(&["list", "--category", "Graphics", "--json"]);
    assert_eq!(packages(&value), vec!["org.kde.krita"]);

    let value = ctx.json(&["list", "--backend", "apt", "--sort", "name", "--desc", "--json"]);
    assert_eq!(packages(&value), vec!["vim-gtk", "vim", "htop", "broken-pkg"]);

    let output = ctx.run(&["list", "--category", "Games"]);
    assert!(!output.status.success());
}

#[test]
fn test_info_shows_details() {
    let ctx = TestContext::new();
    let output = ctx.run(&["info", "org.kde.krita"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Krita"));
    assert!(stdout.contains("Digital painting"));

    let value = ctx.json(&["info", "apt/vim", "--json"]);
    assert_eq!(value["backend"], "apt");
    assert_eq!(value["state"], "none");
}

#[test]
fn test_install_reports_success() {
    let ctx = TestContext::new();
    let output = ctx.run(&["install", "vim", "vim-gtk"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("vim"));
    assert!(stdout.contains("vim-gtk"));
}

#[test]
fn test_install_failure_exits_nonzero() {
    let ctx = TestContext::new();
    let output = ctx.run(&["install", "broken-pkg"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Simulated failure"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 1 transactions failed"));
}

#[test]
fn test_install_unknown_package() {
    let ctx = TestContext::new();
    let output = ctx.run(&["install", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Package 'nope' not found"));
}

#[test]
fn test_remove_requires_installed() {
    let ctx = TestContext::new();
    let output = ctx.run(&["remove", "vim"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot remove 'vim'"));

    let output = ctx.run(&["remove", "htop"]);
    assert!(output.status.success());
}

#[test]
fn test_update_check_and_run() {
    let ctx = TestContext::new();
    let value = ctx.json(&["update", "--check", "--json"]);
    assert_eq!(value["updates"], 1);
    assert_eq!(value["security_updates"], true);
    assert_eq!(packages(&value["packages"]), vec!["htop"]);

    let output = ctx.run(&["update"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Update 1 packages (apt)"));
}

#[test]
fn test_completions() {
    let ctx = TestContext::new();
    let output = ctx.run(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("depot"));
}
