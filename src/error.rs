//! The error taxonomy from the error-handling design: one variant per kind,
//! so a `match` over it is exhaustive instead of reconstructed from call sites.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum EdgeError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config did not specify a port")]
    ConfigMissingPort,

    #[error("failed to read worker source {path}: {source}")]
    WorkerRead { path: PathBuf, source: String },

    #[error("worker {name} failed to evaluate: {message}")]
    WorkerEval { name: String, message: String },

    #[error("worker {name} has no fetch handler (module.exports.fetch or module.exports.default.fetch)")]
    NoFetchHandler { name: String },

    #[error("malformed HTTP request")]
    BadRequest,

    #[error("no route matches this path")]
    NoRouteMatch,

    #[error("worker {name} threw while handling the request: {message}")]
    WorkerInvocation { name: String, message: String },
}
