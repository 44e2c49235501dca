use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub struct TestLedger {
    dir: TempDir,
}

impl TestLedger {
    /// Create a temp directory and run `slate init` in it.
    pub fn init() -> Result<Self, Box<dyn std::error::Error>> {
        let ledger = Self::empty()?;
        ledger.cmd().arg("init").assert().success();
        Ok(ledger)
    }

    /// Create a temp directory without initializing a ledger.
    pub fn empty() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A slate command rooted in this ledger.
    pub fn cmd(&self) -> Command {
        let mut cmd = slate_cmd();
        cmd.current_dir(self.path());
        cmd
    }

    #[allow(dead_code)]
    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.path().join(".slate.toml");
        fs::write(&path, contents)?;
        Ok(path)
    }
}

pub fn slate_cmd() -> Command {
    Command::cargo_bin("slate").expect("slate binary")
}

/// Run a slate command with `--json` and return the envelope's `data`.
#[allow(dead_code)]
pub fn json_data(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.arg("--json").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).into_owned();
    let envelope: serde_json::Value =
        serde_json::from_str(&stdout).expect("json envelope");
    envelope["data"].clone()
}
