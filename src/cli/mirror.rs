//! tasksync mirror: the remote sync worker process.

use std::path::PathBuf;

use tracing::warn;

use crate::bus::{self, EventBus};
use crate::config::Config;
use crate::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::mirror::MirrorWorker;
use crate::output::OutputOptions;

pub struct MirrorOptions {
    pub addr: Option<String>,
    pub dir: Option<PathBuf>,
    pub workspace: PathBuf,
    pub output: OutputOptions,
}

pub fn run(options: MirrorOptions) -> Result<()> {
    if !options.workspace.exists() {
        return Err(Error::WorkspaceNotFound(options.workspace));
    }

    let config = Config::load_from_workspace(&options.workspace);
    let mirror_root = options
        .dir
        .unwrap_or_else(|| options.workspace.join(&config.mirror.dir));

    let bus = EventBus::new(config.bus.capacity);
    let engine = SyncEngine::open(&options.workspace, &config, bus.clone());
    let worker = MirrorWorker::new(engine, bus.clone(), &mirror_root, &config);

    let addr = options
        .addr
        .unwrap_or_else(|| config.bus.addr.clone());

    if !options.output.quiet && !options.output.json {
        println!("tasksync mirroring into {}", mirror_root.display());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let bridge_bus = bus.clone();
        let bridge_addr = addr.clone();
        tokio::spawn(async move {
            if let Err(err) = bus::run_bridge(&bridge_addr, bridge_bus).await {
                warn!(addr = %bridge_addr, %err, "bus bridge ended");
            }
        });

        worker.run().await
    })
}
