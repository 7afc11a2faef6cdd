//! Runtime execution: the step loop, invocation options, checkpoint
//! storage, and runtime configuration.
//!
//! The loop itself lives in [`runner`]; applications reach it through
//! [`App::invoke`](crate::app::App::invoke) and friends. Checkpoint storage
//! is pluggable via the [`Checkpointer`] trait, with an in-memory store for
//! tests and single-process use and a SQLite store (behind the `sqlite`
//! feature) for durability across restarts.

pub mod checkpointer;
#[cfg(feature = "sqlite")]
pub mod checkpointer_sqlite;
pub mod persistence;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{Checkpoint, Checkpointer, CheckpointerError, InMemoryCheckpointer};
#[cfg(feature = "sqlite")]
pub use checkpointer_sqlite::SqliteCheckpointer;
pub use persistence::{PersistedCheckpoint, PersistedState};
pub use runner::{InvokeError, InvokeOptions, InvokeReport, ThreadInit};
pub use runtime_config::{CheckpointerType, DEFAULT_MAX_STEPS, RuntimeConfig};
