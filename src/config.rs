use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::rpc::DEFAULT_CONNECT_TIMEOUT_MS;
use crate::schema::{Registry, ServiceDescriptor};

/// Environment variable listing schema files or directories, separated like
/// `PATH`. Used when no `--schema` is given.
pub const SCHEMA_PATH_ENV: &str = "DYNCALL_SCHEMA_PATH";

/// Directory under the home directory searched when nothing else is set.
pub const DEFAULT_SCHEMA_DIR: &str = ".dyncall/schemas";

/// Invoke one method of a remote service, entering its arguments
/// interactively or from a script piped on stdin.
#[derive(Parser, Debug, Clone)]
#[command(name = "dyncall", version)]
pub struct Cli {
    /// Host running the service.
    pub host: String,
    /// Port of the service.
    pub port: u16,
    /// Name of the service, as declared in a schema document.
    pub service: String,
    /// Method to call.
    pub method: String,
    /// Schema file or directory of `*.json` schema files. Repeatable.
    #[arg(long = "schema", short = 's')]
    pub schemas: Vec<PathBuf>,
    /// Connect timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

impl Cli {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Schema locations: `--schema` flags, else `DYNCALL_SCHEMA_PATH`, else
    /// `~/.dyncall/schemas`.
    pub fn schema_paths(&self) -> Vec<PathBuf> {
        if !self.schemas.is_empty() {
            return self.schemas.clone();
        }
        if let Some(paths) = std::env::var_os(SCHEMA_PATH_ENV) {
            let paths: Vec<PathBuf> = std::env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            if !paths.is_empty() {
                return paths;
            }
        }
        dirs::home_dir()
            .map(|home| vec![home.join(DEFAULT_SCHEMA_DIR)])
            .unwrap_or_default()
    }

    /// Descriptor of the named service, once the named method is known to
    /// exist on it. Needs no connection.
    pub fn target(&self, registry: &Registry) -> Result<ServiceDescriptor> {
        let service = registry.service(&self.service)?;
        service.resolve(&self.method)?;
        Ok(service.clone())
    }

    pub fn load_registry(&self) -> Result<Registry> {
        let paths = self.schema_paths();
        if paths.is_empty() {
            return Err(Error::Schema(
                "no schema location given and no home directory to look in".into(),
            ));
        }
        let mut registry = Registry::new();
        for path in &paths {
            registry.load_path(path)?;
        }
        registry.validate()?;
        log::debug!("Loaded services: {:?}", registry.service_names());
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positionals_and_flags() {
        let cli = Cli::try_parse_from([
            "dyncall",
            "localhost",
            "9090",
            "Echo",
            "ping",
            "--schema",
            "a.json",
            "-s",
            "more",
            "--timeout-ms",
            "250",
        ])
        .unwrap();

        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 9090);
        assert_eq!(cli.service, "Echo");
        assert_eq!(cli.method, "ping");
        assert_eq!(cli.schema_paths(), vec![PathBuf::from("a.json"), PathBuf::from("more")]);
        assert_eq!(cli.connect_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn timeout_defaults_to_one_second() {
        let cli = Cli::try_parse_from(["dyncall", "h", "1", "S", "m"]).unwrap();
        assert_eq!(cli.connect_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn rejects_missing_method_and_bad_port() {
        assert!(Cli::try_parse_from(["dyncall", "h", "1", "S"]).is_err());
        assert!(Cli::try_parse_from(["dyncall", "h", "http", "S", "m"]).is_err());
    }

    #[test]
    fn loads_registry_from_flagged_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("echo.json");
        std::fs::write(
            &file,
            r#"{ "services": [{ "name": "Echo", "methods": [{ "name": "noop" }] }] }"#,
        )
        .unwrap();
        let file = file.to_str().unwrap();
        let cli =
            Cli::try_parse_from(["dyncall", "h", "1", "Echo", "noop", "--schema", file]).unwrap();

        let registry = cli.load_registry().unwrap();
        assert!(registry.service("Echo").unwrap().resolve("noop").is_ok());
        assert_eq!(cli.target(&registry).unwrap().name, "Echo");
    }

    #[test]
    fn unknown_method_is_found_before_connecting() {
        let registry = Registry::from_json(
            r#"{ "services": [{ "name": "Echo", "methods": [{ "name": "noop" }] }] }"#,
        )
        .unwrap();
        let cli = Cli::try_parse_from(["dyncall", "unreachable.invalid", "0", "Echo", "ping"]).unwrap();
        assert!(matches!(cli.target(&registry), Err(Error::MethodNotFound { .. })));

        let cli = Cli::try_parse_from(["dyncall", "h", "0", "Nope", "noop"]).unwrap();
        assert!(matches!(cli.target(&registry), Err(Error::ServiceNotFound(_))));
    }
}
