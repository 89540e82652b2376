//! tasksync - Markdown-backed task graph synchronization
//!
//! This library provides the core functionality for the tasksync CLI,
//! keeping a structured task store and one markdown document per task
//! consistent while broadcasting changes to interested processes.
//!
//! # Core Concepts
//!
//! - **Tasks**: nodes in a work hierarchy, on the primary path or a branch
//! - **Documents**: one markdown file per task, bijectively linked
//! - **Change Events**: broadcast notifications for create/update/delete
//! - **Mirroring**: a worker process maintaining a second document tree
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `tasksync.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task model, drafts, and patches
//! - `store`: Task store accessor (JSON snapshot, atomic writes)
//! - `docs`: Document store accessor (one file per task)
//! - `codec`: Markdown encode/decode between tasks and documents
//! - `engine`: Synchronization engine coordinating both stores
//! - `bus`: Notification bus (broadcast channel, TCP relay, bridge)
//! - `watch`: Filesystem change watcher for document trees
//! - `layout`: Graph layout descriptor derivation
//! - `mirror`: Remote sync worker maintaining a mirrored tree

pub mod bus;
pub mod cli;
pub mod codec;
pub mod config;
pub mod docs;
pub mod engine;
pub mod error;
pub mod layout;
pub mod mirror;
pub mod output;
pub mod store;
pub mod task;
pub mod watch;

pub use error::{Error, Result};
