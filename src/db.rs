use log::{debug, info};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Connection, Row};
use std::net::Ipv6Addr;

use crate::config::{mask, ConnectionConfig};
use crate::error::{ProbeError, ServerError};

pub const PORT_QUERY: &str = "SELECT @@port";
pub const GRANTS_QUERY: &str = "SHOW GRANTS";
pub const DATABASES_QUERY: &str = "SHOW DATABASES";

fn dsn_with_password(config: &ConnectionConfig, password: &str) -> String {
    let host = if config.server.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]", config.server)
    } else {
        config.server.clone()
    };
    format!("mysql://{}:{}@{}:{}/", config.user, password, host, config.port)
}

/// Connection string safe for display. The session itself is opened from
/// [`connect_options`], so the password never has to be URL-encoded.
pub fn masked_dsn(config: &ConnectionConfig) -> String {
    dsn_with_password(config, &mask(&config.pass))
}

pub fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.server)
        .port(config.port)
        .username(&config.user)
        .password(&config.pass)
}

/// Opens a single session and pings it. No retries.
pub async fn open_session(config: &ConnectionConfig) -> Result<MySqlConnection, ProbeError> {
    debug!("Opening session to {}", masked_dsn(config));
    let mut conn = MySqlConnection::connect_with(&connect_options(config))
        .await
        .map_err(ProbeError::from_connect)?;

    conn.ping().await.map_err(|source| ProbeError::Ping {
        server: ServerError::from_sqlx(&source),
        source,
    })?;

    info!("Session to {}:{} established", config.server, config.port);
    Ok(conn)
}

/// Reads a column as text, accepting binary-typed results from `SHOW` statements.
fn column_text(row: &MySqlRow, index: usize) -> Result<String, sqlx::Error> {
    text_or_bytes(row.try_get::<String, _>(index), || {
        row.try_get::<Vec<u8>, _>(index)
    })
}

fn text_or_bytes<F>(text: Result<String, sqlx::Error>, bytes: F) -> Result<String, sqlx::Error>
where
    F: FnOnce() -> Result<Vec<u8>, sqlx::Error>,
{
    match text {
        Ok(text) => Ok(text),
        Err(_) => bytes().map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn column_display(row: &MySqlRow, index: usize) -> Result<String, sqlx::Error> {
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(v.to_string());
    }
    if let Ok(v) = row.try_get::<u64, _>(index) {
        return Ok(v.to_string());
    }
    column_text(row, index)
}

async fn fetch_text_column(
    conn: &mut MySqlConnection,
    query: &'static str,
) -> Result<Vec<String>, ProbeError> {
    debug!("Executing query: {query}");
    let to_err = |source| ProbeError::Query { query, source };
    let rows = sqlx::query(query).fetch_all(&mut *conn).await.map_err(to_err)?;
    rows.iter().map(|row| column_text(row, 0).map_err(to_err)).collect()
}

pub async fn server_port(conn: &mut MySqlConnection) -> Result<String, ProbeError> {
    debug!("Executing query: {PORT_QUERY}");
    let to_err = |source| ProbeError::Query {
        query: PORT_QUERY,
        source,
    };
    let row = sqlx::query(PORT_QUERY).fetch_one(&mut *conn).await.map_err(to_err)?;
    column_display(&row, 0).map_err(to_err)
}

pub async fn grants(conn: &mut MySqlConnection) -> Result<Vec<String>, ProbeError> {
    fetch_text_column(conn, GRANTS_QUERY).await
}

pub async fn databases(conn: &mut MySqlConnection) -> Result<Vec<String>, ProbeError> {
    fetch_text_column(conn, DATABASES_QUERY).await
}
