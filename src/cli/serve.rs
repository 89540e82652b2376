//! tasksync serve: engine, document watcher, and bus relay.

use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::info;

use crate::bus::{self, EventBus};
use crate::config::Config;
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::watch::{engine_ingestor, DocWatcher};

pub struct ServeOptions {
    pub addr: Option<String>,
    pub workspace: PathBuf,
    pub output: OutputOptions,
}

pub fn run(options: ServeOptions) -> Result<()> {
    if !options.workspace.exists() {
        return Err(Error::WorkspaceNotFound(options.workspace));
    }

    let config = Config::load_from_workspace(&options.workspace);
    let bus = EventBus::new(config.bus.capacity);
    let engine = SyncEngine::open(&options.workspace, &config, bus.clone());
    engine.docs().ensure_root()?;

    let watcher = DocWatcher::spawn(
        engine.docs().root().to_path_buf(),
        engine_ingestor(engine.clone()),
    )?;

    let addr = options
        .addr
        .unwrap_or_else(|| config.bus.addr.clone());

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, workspace = %engine.docs().root().display(), "serving");
        if !options.output.quiet && !options.output.json {
            println!("tasksync serving on {addr}");
        }
        bus::run_relay(listener, bus).await
    });

    watcher.stop();
    result
}
