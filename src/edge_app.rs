//! Command-line entry point. Trimmed hard relative to this codebase's
//! lineage: there is exactly one required input, the config file, so the
//! arg surface is a single `-c/--config` flag rather than the bindle/TLS/
//! hostname surface used for module-map-vs-bindle-vs-remote sourcing.

use clap::{App, Arg, ArgMatches};
use std::path::PathBuf;

const ABOUT: &str = r#"
Run an edge JavaScript runtime

Loads one or more JavaScript workers from disk per a TOML config file, wires
them behind an HTTP listener, and dispatches each incoming request to the
worker whose configured route matches.
"#;

const ARG_CONFIG: &str = "config";

pub fn edge_app_definition() -> App<'static, 'static> {
    App::new("edgerun").version(clap::crate_version!()).about(ABOUT).arg(
        Arg::with_name(ARG_CONFIG)
            .short("c")
            .long("config")
            .value_name("EDGE_TOML")
            .help("the path to the edge config file")
            .takes_value(true)
            .default_value("edge.toml"),
    )
}

pub fn parse_command_line() -> PathBuf {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let matches = edge_app_definition().get_matches();
    config_path_from(&matches)
}

fn config_path_from(matches: &ArgMatches) -> PathBuf {
    PathBuf::from(matches.value_of(ARG_CONFIG).unwrap_or("edge.toml"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_to_edge_toml() {
        let matches = edge_app_definition().get_matches_from(vec!["edgerun"]);
        assert_eq!(config_path_from(&matches), PathBuf::from("edge.toml"));
    }

    #[test]
    fn honors_explicit_config_flag() {
        let matches = edge_app_definition().get_matches_from(vec!["edgerun", "-c", "other.toml"]);
        assert_eq!(config_path_from(&matches), PathBuf::from("other.toml"));
    }
}
