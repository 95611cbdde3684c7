//! `EdgeRuntime`: the aggregate owner named in §3 — one engine instance, the
//! config, the route index, and the loaded worker sequence. There is
//! exactly one per process.

use std::path::Path;

use crate::edge_config::{self, EdgeConfig};
use crate::engine::Engine;
use crate::error::EdgeError;
use crate::route_index::RouteIndex;
use crate::worker_loader::{self, Worker};

pub struct EdgeRuntime {
    pub workers: Vec<Worker>,
    pub routes: RouteIndex,
    pub config: EdgeConfig,
    pub engine: Engine,
}

impl EdgeRuntime {
    /// Builds the runtime from a config file path: parses the config,
    /// starts the engine, then loads every worker and registers its routes.
    pub fn from_config_path(path: &Path) -> anyhow::Result<Self> {
        let config = edge_config::load(path)?;
        Self::from_config(config)
    }

    pub fn from_config(config: EdgeConfig) -> anyhow::Result<Self> {
        let engine = Engine::new().map_err(|err| anyhow::anyhow!("failed to start engine: {err}"))?;
        let mut routes = RouteIndex::new();

        let workers = match worker_loader::load_all(&engine, &config.workers, &mut routes) {
            Ok(workers) => workers,
            Err(EdgeError::NoFetchHandler { name }) => {
                anyhow::bail!("worker {name} has no fetch handler (module.exports.fetch or module.exports.default.fetch)")
            }
            Err(err) => return Err(err.into()),
        };

        tracing::info!(worker_count = workers.len(), "workers loaded");

        Ok(Self {
            workers,
            routes,
            config,
            engine,
        })
    }
}

// Teardown order from §3 (workers → RouteIndex → config → engine) falls out
// of Rust's own declaration-order `Drop`: fields are dropped top to bottom,
// so `workers` (holding the engine value handles) is released before
// `engine` itself goes away.
