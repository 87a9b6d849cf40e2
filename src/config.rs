use clap::Parser;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::console::Console;
use crate::error::ProbeError;

pub const DEFAULT_CONFIG_FILE: &str = "dbcontest.json";

pub fn default_port() -> u16 {
    3306
}

/// Test a MySQL connection. On first run asks for the connection data and saves it.
#[derive(Debug, Parser, Default)]
#[command(name = "mysql-contest", version)]
pub struct Args {
    /// Database server IP/domain
    #[arg(short, long)]
    pub server: Option<String>,

    /// Database user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Database port
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Prompt for config values again, ignoring the saved file
    #[arg(short, long)]
    pub reconfigure: bool,

    /// Path of the saved connection config
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Read DBHOST, DBUSER, DBPASS and DBPORT instead of the config file
    #[arg(long)]
    pub env: bool,

    /// Skip DNS resolution and the TCP reachability check
    #[arg(long)]
    pub skip_probe: bool,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default, alias = "host")]
    pub server: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub pass: String,

    #[serde(default)]
    pub port: u16,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("pass", &mask(&self.pass))
            .field("port", &self.port)
            .finish()
    }
}

/// One `*` per character of `secret`.
pub fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

impl ConnectionConfig {
    pub fn is_complete(&self) -> bool {
        !self.server.is_empty() && !self.user.is_empty() && !self.pass.is_empty() && self.port != 0
    }

    /// Builds a config from `DBHOST`, `DBUSER`, `DBPASS` and `DBPORT` as returned by `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        ConnectionConfig {
            server: lookup("DBHOST").unwrap_or_default(),
            user: lookup("DBUSER").unwrap_or_default(),
            pass: lookup("DBPASS").unwrap_or_default(),
            port: lookup("DBPORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Overlays the non-empty flag values.
    pub fn apply_flags(&mut self, args: &Args) {
        if let Some(server) = args.server.as_deref().filter(|s| !s.is_empty()) {
            self.server = server.to_string();
        }
        if let Some(user) = args.user.as_deref().filter(|s| !s.is_empty()) {
            self.user = user.to_string();
        }
        if let Some(port) = args.port.filter(|p| *p != 0) {
            self.port = port;
        }
    }

    /// Prompts for every field that is still empty.
    pub async fn fill_missing<C: Console>(&mut self, console: &mut C) -> Result<(), ProbeError> {
        if self.server.is_empty() {
            self.server = trimmed(console.read_line("DB Host: ").await)?;
        }
        if self.user.is_empty() {
            self.user = trimmed(console.read_line("DB User: ").await)?;
        }
        if self.pass.is_empty() {
            self.pass = trimmed(console.read_secret("DB Password: ").await)?;
        }
        if self.port == 0 {
            let prompt = format!("DB Port (default {}): ", default_port());
            let input = trimmed(console.read_line(&prompt).await)?;
            self.port = match parse_port(&input) {
                Some(port) => port,
                None => {
                    console.print_line(&format!(
                        "Invalid or empty port, using default {}",
                        default_port()
                    ));
                    default_port()
                }
            };
        }
        Ok(())
    }
}

fn trimmed(input: std::io::Result<String>) -> Result<String, ProbeError> {
    let line = input.map_err(ProbeError::Prompt)?;
    Ok(line.trim().to_string())
}

fn parse_port(input: &str) -> Option<u16> {
    input.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

/// Loads the config at `path`. A missing file is an empty config, not an error.
pub fn load(path: &Path) -> Result<ConnectionConfig, ProbeError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("No config at {}, starting empty", path.display());
            return Ok(ConnectionConfig::default());
        }
        Err(source) => {
            return Err(ProbeError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&content).map_err(|source| ProbeError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `config` to `path` as two-space indented JSON.
pub fn save(path: &Path, config: &ConnectionConfig) -> Result<(), ProbeError> {
    let write_err = |source| ProbeError::ConfigWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut content = serde_json::to_string_pretty(config)
        .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    content.push('\n');
    std::fs::write(path, content).map_err(write_err)
}

/// Merges the saved config (or the environment), the flags and interactive input,
/// then persists the result unless running from the environment.
pub async fn resolve<C: Console>(
    args: &Args,
    console: &mut C,
) -> Result<ConnectionConfig, ProbeError> {
    let mut config = if args.env {
        debug!("Reading connection settings from the environment");
        ConnectionConfig::from_env()
    } else if args.reconfigure {
        info!("Reconfiguring, ignoring {}", args.config.display());
        ConnectionConfig::default()
    } else {
        load(&args.config)?
    };

    config.apply_flags(args);

    if !config.is_complete() {
        config.fill_missing(console).await?;
    }

    if !args.env {
        save(&args.config, &config)?;
        console.print_line(&format!("Config saved to {}", args.config.display()));
    }

    debug!("Resolved config: {config:?}");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::Scripted;
    use tempfile::TempDir;

    fn args_in(dir: &TempDir) -> Args {
        Args {
            config: dir.path().join(DEFAULT_CONFIG_FILE),
            ..Default::default()
        }
    }

    fn complete() -> ConnectionConfig {
        ConnectionConfig {
            server: "db.internal".into(),
            user: "app".into(),
            pass: "s3cret".into(),
            port: 3307,
        }
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = TempDir::new().unwrap();
        let config = load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ConnectionConfig::default());
        assert!(!config.is_complete());
    }

    #[test]
    fn test_invalid_json_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(ProbeError::ConfigParse { .. })));
    }

    #[test]
    fn test_host_alias_and_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{"host": "10.0.0.5", "user": "root"}"#).unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.server, "10.0.0.5");
        assert_eq!(config.user, "root");
        assert!(config.pass.is_empty());
        assert_eq!(config.port, 0);
    }

    #[test]
    fn test_save_writes_indented_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        save(&path, &complete()).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n  \"server\": \"db.internal\","));
        assert!(content.ends_with("}\n"));
        assert_eq!(load(&path).unwrap(), complete());
    }

    #[tokio::test]
    async fn test_flags_without_file_only_prompt_password() {
        let dir = TempDir::new().unwrap();
        let mut args = args_in(&dir);
        args.server = Some("db.internal".into());
        args.user = Some("app".into());
        args.port = Some(3307);
        let mut console = Scripted::new(&["  s3cret \n"]);

        let config = resolve(&args, &mut console).await.unwrap();

        assert_eq!(console.prompts, vec!["DB Password: "]);
        assert_eq!(console.secret_prompts, vec!["DB Password: "]);
        assert_eq!(config, complete());
        assert_eq!(load(&args.config).unwrap(), complete());
    }

    #[tokio::test]
    async fn test_complete_file_is_used_verbatim() {
        let dir = TempDir::new().unwrap();
        let args = args_in(&dir);
        save(&args.config, &complete()).unwrap();
        let mut console = Scripted::new(&[]);

        let config = resolve(&args, &mut console).await.unwrap();

        assert!(console.prompts.is_empty());
        assert_eq!(config, complete());
    }

    #[tokio::test]
    async fn test_flag_overrides_saved_value() {
        let dir = TempDir::new().unwrap();
        let mut args = args_in(&dir);
        save(&args.config, &complete()).unwrap();
        args.server = Some("replica.internal".into());
        args.port = Some(3310);
        let mut console = Scripted::new(&[]);

        let config = resolve(&args, &mut console).await.unwrap();

        assert_eq!(config.server, "replica.internal");
        assert_eq!(config.port, 3310);
        assert_eq!(config.user, "app");
        assert_eq!(load(&args.config).unwrap().server, "replica.internal");
    }

    #[tokio::test]
    async fn test_empty_or_bad_port_defaults() {
        for input in ["", "   ", "abc", "0", "70000"] {
            let mut config = complete();
            config.port = 0;
            let mut console = Scripted::new(&[input]);
            config.fill_missing(&mut console).await.unwrap();
            assert_eq!(config.port, 3306, "input {input:?}");
        }
    }

    #[tokio::test]
    async fn test_reconfigure_prompts_every_field() {
        let dir = TempDir::new().unwrap();
        let mut args = args_in(&dir);
        save(&args.config, &complete()).unwrap();
        args.reconfigure = true;
        let mut console = Scripted::new(&["10.1.1.1", "admin", "hunter2", "3308"]);

        let config = resolve(&args, &mut console).await.unwrap();

        assert_eq!(console.prompts.len(), 4);
        assert_eq!(console.secret_prompts, vec!["DB Password: "]);
        assert_eq!(config.server, "10.1.1.1");
        assert_eq!(config.port, 3308);
        assert_eq!(load(&args.config).unwrap(), config);
    }

    #[tokio::test]
    async fn test_env_mode_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let mut args = args_in(&dir);
        args.env = true;
        args.server = Some("127.0.0.1".into());
        args.user = Some("root".into());
        args.port = Some(3306);
        let mut console = Scripted::new(&["pw"]);

        resolve(&args, &mut console).await.unwrap();

        assert!(!args.config.exists());
    }

    #[test]
    fn test_from_env_with() {
        let config = ConnectionConfig::from_env_with(|key| match key {
            "DBHOST" => Some("mysql.local".into()),
            "DBUSER" => Some("app".into()),
            "DBPASS" => Some("pw".into()),
            "DBPORT" => Some("not-a-port".into()),
            _ => None,
        });
        assert_eq!(config.server, "mysql.local");
        assert_eq!(config.port, 0);
        assert!(!config.is_complete());
    }

    #[test]
    fn test_debug_masks_password() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("******"));
    }

    #[test]
    fn test_port_flag_range() {
        assert!(Args::try_parse_from(["mysql-contest", "-p", "0"]).is_err());
        assert!(Args::try_parse_from(["mysql-contest", "-p", "65536"]).is_err());
        let args =
            Args::try_parse_from(["mysql-contest", "-s", "db", "-u", "app", "-p", "3306", "-r"])
                .unwrap();
        assert_eq!(args.port, Some(3306));
        assert!(args.reconfigure);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
