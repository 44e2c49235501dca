//! slate init command implementation
//!
//! Creates the `.slate/` data directory and a default `.slate.toml`.

use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    data_dir: bool,
}

pub fn run(repo: Option<PathBuf>, json: bool, quiet: bool) -> Result<()> {
    let root = match repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let storage = Storage::new(root.clone());
    let created_data_dir = !storage.is_initialized();
    storage.init()?;

    let config_path = root.join(CONFIG_FILE);
    let created_config = !config_path.exists();
    if created_config {
        Config::default().save(&config_path)?;
    }

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            data_dir: created_data_dir,
        },
    };

    let header = if created_config || created_data_dir {
        "slate init: initialized ledger".to_string()
    } else {
        "slate init: nothing to do".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    if created_data_dir {
        human.push_detail("created .slate/".to_string());
    }
    if created_config {
        human.push_detail(format!("created {CONFIG_FILE}"));
    }
    human.push_next_step("slate add \"My first task\"");

    emit_success(OutputOptions { json, quiet }, "init", &report, Some(&human))
}
