//! CLI tests for the calldesk binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SEED: &str = r#"
agents:
  - id: tl1
    role: team_lead
  - id: agent-1
    languages: [Hindi]
    team-lead: tl1
  - id: agent-2
    languages: [Hindi]
    team-lead: tl1
farmers:
  - id: f1
    name: Ravi
    preferred-language: Hindi
  - id: f2
    preferred-language: Hindi
  - id: f3
    preferred-language: Hindi
activities:
  - id: act-1
    kind: Field Day
    date: 2024-05-01
tasks:
  - id: t1
    farmer: f1
    activity: act-1
    scheduled: 2024-05-02
  - id: t2
    farmer: f2
    activity: act-1
    scheduled: 2024-05-03
  - id: t3
    farmer: f3
    activity: act-1
    scheduled: 2024-05-04
"#;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = format!("storage:\n  path: {}\n", dir.path().join("store").display());
        fs::write(dir.path().join("calldesk.yml"), config).unwrap();
        fs::write(dir.path().join("seed.yml"), SEED).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("calldesk").unwrap();
        cmd.current_dir(self.path())
            .env("HOME", self.path())
            .env("XDG_DATA_HOME", self.path().join("data"))
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.path().join("calldesk.yml"));
        cmd
    }

    fn seeded() -> Self {
        let env = Self::new();
        env.cmd()
            .arg("seed")
            .arg(env.path().join("seed.yml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Seeded 3 agents, 3 farmers, 1 activities, 3 tasks"));
        env
    }
}

#[test]
fn test_help() {
    Command::cargo_bin("calldesk")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("allocate"))
        .stdout(predicate::str::contains("bulk-override"));
}

#[test]
fn test_command_without_caller_fails() {
    let env = Env::seeded();
    env.cmd()
        .arg("pending")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--as"));
}

#[test]
fn test_allocate_then_work_queue() {
    let env = Env::seeded();

    env.cmd()
        .args(["--as", "tl1", "allocate", "--language", "Hindi", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allocated\": 3"));

    env.cmd()
        .args(["--as", "agent-1", "next", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"t1\""))
        .stdout(predicate::str::contains("\"status\": \"in_progress\""))
        .stdout(predicate::str::contains("Ravi"));

    env.cmd()
        .args(["--as", "agent-1", "submit", "t1", "--status", "Not Reachable"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not_reachable"));

    env.cmd()
        .args(["--as", "agent-2", "load", "t1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Forbidden"));
}

#[test]
fn test_bulk_override_reports_partial_failure() {
    let env = Env::seeded();
    env.cmd()
        .args(["--as", "tl1", "allocate", "--language", "all"])
        .assert()
        .success();

    env.cmd()
        .args([
            "--as",
            "tl1",
            "bulk-override",
            "completed",
            "t1",
            "t404",
            "t2",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"successful\": 2"))
        .stdout(predicate::str::contains("\"failed\": 1"))
        .stdout(predicate::str::contains("not_found"));
}

#[test]
fn test_unassigned_listing() {
    let env = Env::seeded();
    env.cmd()
        .args(["--as", "tl1", "unassigned", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("t1"))
        .stdout(predicate::str::contains("Page 1/2 (3 tasks, 2 per page)"));
}
