use sqlx::error::DatabaseError;
use std::fmt;
use std::path::PathBuf;

/// Server-side error detail reported by the driver, detached from the driver's own type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub number: u16,
    pub sql_state: Option<String>,
    pub message: String,
}

impl ServerError {
    pub fn from_sqlx(err: &sqlx::Error) -> Option<Self> {
        let db_err = err.as_database_error()?;
        let number = db_err
            .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
            .map(|e| e.number())
            .unwrap_or_default();
        Some(ServerError {
            number,
            sql_state: db_err.code().map(|c| c.into_owned()),
            message: db_err.message().to_string(),
        })
    }
}

#[derive(Debug)]
pub enum ProbeError {
    ConfigRead { path: PathBuf, source: std::io::Error },
    ConfigParse { path: PathBuf, source: serde_json::Error },
    ConfigWrite { path: PathBuf, source: std::io::Error },
    Prompt(std::io::Error),
    Resolve { host: String, source: std::io::Error },
    NoAddress { host: String },
    Unreachable { addr: String, source: std::io::Error },
    Timeout { addr: String },
    Connect(sqlx::Error),
    Ping { source: sqlx::Error, server: Option<ServerError> },
    Query { query: &'static str, source: sqlx::Error },
}

impl ProbeError {
    /// Errors that stop the tool with a non-zero exit code rather than ending the run quietly.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ProbeError::ConfigRead { .. }
                | ProbeError::ConfigParse { .. }
                | ProbeError::ConfigWrite { .. }
                | ProbeError::Prompt(_)
        )
    }

    /// Sorts a failed connection attempt: a server-side error means the handshake got as far
    /// as authentication, anything else never reached the server.
    pub fn from_connect(err: sqlx::Error) -> Self {
        match ServerError::from_sqlx(&err) {
            Some(server) => ProbeError::Ping {
                source: err,
                server: Some(server),
            },
            None => ProbeError::Connect(err),
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::ConfigRead { path, source } => {
                write!(f, "Failed to read config {}: {source}", path.display())
            }
            ProbeError::ConfigParse { path, source } => {
                write!(f, "Failed to parse config {}: {source}", path.display())
            }
            ProbeError::ConfigWrite { path, source } => {
                write!(f, "Error saving config {}: {source}", path.display())
            }
            ProbeError::Prompt(e) => write!(f, "Failed to read input: {e}"),
            ProbeError::Resolve { host, source } => {
                write!(f, "DNS resolution failed for domain {host}: {source}")
            }
            ProbeError::NoAddress { host } => write!(f, "Domain {host} resolved to no addresses"),
            ProbeError::Unreachable { addr, source } => {
                write!(f, "TCP connection failed to {addr}: {source}")
            }
            ProbeError::Timeout { addr } => write!(f, "TCP connection to {addr} timed out"),
            ProbeError::Connect(e) => write!(f, "Failed to open connection: {e}"),
            ProbeError::Ping { source, .. } => write!(f, "Cannot connect: {source}"),
            ProbeError::Query { query, source } => write!(f, "Query: {query} failed: {source}"),
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::ConfigRead { source, .. }
            | ProbeError::ConfigWrite { source, .. }
            | ProbeError::Resolve { source, .. }
            | ProbeError::Unreachable { source, .. } => Some(source),
            ProbeError::Prompt(e) => Some(e),
            ProbeError::ConfigParse { source, .. } => Some(source),
            ProbeError::Connect(e)
            | ProbeError::Ping { source: e, .. }
            | ProbeError::Query { source: e, .. } => Some(e),
            ProbeError::NoAddress { .. } | ProbeError::Timeout { .. } => None,
        }
    }
}
