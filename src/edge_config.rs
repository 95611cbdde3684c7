//! The config loader (C1): parses the TOML file at §6.1 into an
//! `EdgeConfig`. Unknown keys are ignored (serde's default behavior here);
//! the fatal conditions at this layer are a missing `port` and a `port`
//! outside the documented `1..65535` range.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::EdgeError;

#[derive(Clone, Debug, Deserialize)]
pub struct WorkerConfig {
    pub name: String,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub routes: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawEdgeConfig {
    port: Option<u16>,
    #[serde(default, rename = "workers")]
    workers: Vec<WorkerConfig>,
}

#[derive(Clone, Debug)]
pub struct EdgeConfig {
    pub port: u16,
    pub workers: Vec<WorkerConfig>,
}

/// Reads and parses the config file at `path`. A missing `port` key, a
/// `port` outside the documented `1..65535` range, or any I/O/parse failure
/// is fatal at startup, matching §4.5/§3.
pub fn load(path: &Path) -> Result<EdgeConfig, EdgeError> {
    let text = std::fs::read_to_string(path).map_err(|source| EdgeError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let raw: RawEdgeConfig = toml::from_str(&text).map_err(|source| EdgeError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    let port = raw.port.ok_or(EdgeError::ConfigMissingPort)?;
    if port == 0 {
        return Err(EdgeError::ConfigMissingPort);
    }

    Ok(EdgeConfig {
        port,
        workers: raw.workers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn parses_port_and_workers() {
        let file = write_config(
            r#"
            port = 3000

            [[workers]]
            name = "api"
            path = "workers/api.js"
            routes = ["/api/*", "/healthz"]
            "#,
        );
        let config = load(file.path()).expect("load");
        assert_eq!(config.port, 3000);
        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].name, "api");
        assert_eq!(config.workers[0].routes, vec!["/api/*", "/healthz"]);
    }

    #[test]
    fn missing_port_is_fatal() {
        let file = write_config("[[workers]]\nname = \"api\"\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, EdgeError::ConfigMissingPort));
    }

    #[test]
    fn absent_workers_is_not_fatal() {
        let file = write_config("port = 8080\n");
        let config = load(file.path()).expect("load");
        assert!(config.workers.is_empty());
    }

    #[test]
    fn zero_port_is_fatal() {
        let file = write_config("port = 0\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, EdgeError::ConfigMissingPort));
    }
}
