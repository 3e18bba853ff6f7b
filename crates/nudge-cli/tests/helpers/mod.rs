use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands against a temporary database
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("nudge").expect("Failed to find nudge binary");

        // Point every path into the temp dir and keep any local nudge.toml out.
        cmd.arg("--config")
            .arg(self.temp_dir.path().join("missing.toml"))
            .env("NUDGE_DATABASE_PATH", &self.db_path)
            .env("NUDGE_LOCK_FILE", self.temp_dir.path().join("nudge.lock"))
            .env("NUDGE_TIMEZONE", "UTC")
            .env_remove("NUDGE_TELEGRAM__BOT_TOKEN")
            .env_remove("RUST_LOG");

        cmd
    }

    /// Writes `contents` into the temp dir and returns its path as a string
    pub fn write_file(&self, name: &str, contents: &str) -> String {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write fixture");
        path.to_string_lossy().into_owned()
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const ALICE: &'static str = "123456789";

    /// One monthly reminder for a known chat id and one for an unknown handle
    pub fn reminders_json() -> &'static str {
        r#"[
            {"text": "Платеж", "fire_times": ["2025-08-06 14:30"], "targets": ["123456789"], "recurrence": "1m"},
            {"text": "Nobody", "fire_times": ["2025-08-06 15:00"], "targets": ["@ghost_user"]}
        ]"#
    }

    /// A single one-time reminder at 2025-08-06 09:00
    pub fn single_reminder_json() -> &'static str {
        r#"[{"message": "Standup", "dates": ["2025-08-06 09:00"], "raw_targets": ["123456789"]}]"#
    }
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    /// Predicate to check for error messages
    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error")
            .or(predicate::str::contains("error"))
    }
}
