#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// Scratch data directory plus helpers for driving the `tb` binary
pub struct TestBoard {
    dir: TempDir,
}

impl TestBoard {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `tb` with `--data-dir` pointed at the scratch dir and logging off
    pub fn tb(&self) -> Command {
        let mut cmd = Command::cargo_bin("tb").expect("binary");
        cmd.env_remove("RUST_LOG")
            .env_remove("TB_DATA_DIR")
            .arg("--data-dir")
            .arg(self.dir.path());
        cmd
    }

    /// Run with `--json` and return the success envelope's `data`
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self
            .tb()
            .arg("--json")
            .args(args)
            .output()
            .expect("run tb");
        assert!(
            output.status.success(),
            "tb {args:?} failed: {}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("json envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    /// Parsed envelope stored under `key`
    pub fn stored(&self, key: &str) -> Value {
        let raw = fs::read_to_string(self.dir.path().join(format!("{key}.json")))
            .expect("stored key");
        serde_json::from_str(&raw).expect("stored json")
    }
}
