//! tasksync init: create the workspace skeleton.

use std::fs;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};
use crate::error::Result;
use crate::output::{emit_success, OutputOptions};
use crate::store::{TaskStore, TASKS_FILE};

pub struct InitOptions {
    pub workspace: PathBuf,
    pub output: OutputOptions,
}

pub fn run(options: InitOptions) -> Result<()> {
    let workspace = options.workspace;
    fs::create_dir_all(&workspace)?;

    let config_path = workspace.join(CONFIG_FILE);
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        let config = Config::default();
        config.save(&config_path)?;
        config
    };

    fs::create_dir_all(config.docs_root(&workspace))?;
    if let Some(parent) = config.layout_path(&workspace).parent() {
        fs::create_dir_all(parent)?;
    }
    TaskStore::new(workspace.join(TASKS_FILE)).init()?;

    emit_success(
        options.output,
        "init",
        &serde_json::json!({
            "workspace": workspace.display().to_string(),
            "docs": config.docs.dir,
            "config": CONFIG_FILE,
        }),
        &[format!("Initialized workspace at {}", workspace.display())],
    )
}
