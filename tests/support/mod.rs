//! Shared helpers for tasksync integration tests.
#![allow(dead_code)]

use std::time::{Duration, Instant};

use tasksync::bus::EventBus;
use tasksync::config::Config;
use tasksync::engine::SyncEngine;
use tempfile::TempDir;

pub struct TestWorkspace {
    pub dir: TempDir,
    pub config: Config,
    pub bus: EventBus,
    pub engine: SyncEngine,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = Config::default();
        let bus = EventBus::new(256);
        let engine = SyncEngine::open(dir.path(), &config, bus.clone());
        engine.docs().ensure_root().expect("docs root");
        Self {
            dir,
            config,
            bus,
            engine,
        }
    }
}

/// Poll `check` until it returns true or the timeout elapses.
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}
