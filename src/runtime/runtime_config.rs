//! Runtime configuration for compiled applications.

/// Default per-invocation step limit. Guards cyclic graphs from spinning
/// forever when no explicit limit is supplied.
pub const DEFAULT_MAX_STEPS: u64 = 256;

/// Which checkpoint backend an app provisions when a thread id is supplied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CheckpointerType {
    /// Process-local store; resume works within one process lifetime.
    #[default]
    InMemory,
    /// Durable SQLite store; resume survives restarts.
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Execution settings attached to a compiled app.
///
/// Supplied to [`GraphBuilder::with_runtime_config`](crate::graph::GraphBuilder::with_runtime_config);
/// defaults are an in-memory checkpointer and a step limit of
/// [`DEFAULT_MAX_STEPS`].
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Backend provisioned lazily on the first invocation that carries a
    /// thread id. Invocations without a thread id never touch it.
    pub checkpointer: CheckpointerType,
    /// SQLite database URL override. When unset, resolution falls back to
    /// the `THREADFLOW_SQLITE_URL` then `SQLITE_DB_NAME` environment
    /// variables, then `threadflow.db`.
    pub sqlite_database_url: Option<String>,
    /// Step limit applied when an invocation does not set its own.
    pub default_max_steps: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            checkpointer: CheckpointerType::default(),
            sqlite_database_url: None,
            default_max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn new(checkpointer: CheckpointerType, sqlite_database_url: Option<String>) -> Self {
        Self {
            checkpointer,
            sqlite_database_url,
            default_max_steps: DEFAULT_MAX_STEPS,
        }
    }

    #[must_use]
    pub fn with_default_max_steps(mut self, limit: u64) -> Self {
        self.default_max_steps = limit;
        self
    }

    /// Resolves the SQLite database URL: explicit config, then environment
    /// (`.env` files honored via dotenvy), then the conventional default.
    #[cfg(feature = "sqlite")]
    #[must_use]
    pub fn resolve_database_url(&self) -> String {
        if let Some(url) = &self.sqlite_database_url {
            return url.clone();
        }
        let _ = dotenvy::dotenv();
        if let Ok(url) = std::env::var("THREADFLOW_SQLITE_URL") {
            return url;
        }
        if let Ok(name) = std::env::var("SQLITE_DB_NAME") {
            return format!("sqlite://{name}");
        }
        "sqlite://threadflow.db".to_string()
    }
}
