use log::{debug, info, warn};
use sqlx::Connection;
use std::net::IpAddr;

use crate::config::{self, mask, Args, ConnectionConfig};
use crate::console::Console;
use crate::db;
use crate::error::ProbeError;
use crate::net::{self, DIAL_TIMEOUT};

/// Runs the whole check. Only configuration failures come back as `Err`; anything that goes
/// wrong once the config is settled is printed and ends the run normally.
pub async fn run<C: Console>(args: &Args, console: &mut C) -> Result<(), ProbeError> {
    match pipeline(args, console).await {
        Err(e) if !e.is_config_error() => {
            report(console, &e);
            Ok(())
        }
        other => other,
    }
}

async fn pipeline<C: Console>(args: &Args, console: &mut C) -> Result<(), ProbeError> {
    let config = config::resolve(args, console).await?;
    print_summary(&config, console);

    if args.skip_probe {
        debug!("Reachability probe skipped");
    } else {
        let reachable = probe_reachability(&config, console).await?;
        debug!("Port {} reachable: {reachable}", config.port);
    }

    run_diagnostics(&config, console).await
}

fn print_summary<C: Console>(config: &ConnectionConfig, console: &mut C) {
    console.print_line(&format!("DBHOST: {}", config.server));
    console.print_line(&format!("DBUSER: {}", config.user));
    console.print_line(&format!("DBPASS: {}", mask(&config.pass)));
    console.print_line(&format!("DBPORT: {}", config.port));
    console.print_line("");
    console.print_line(&format!("Database DSN: {}", db::masked_dsn(config)));
}

/// Resolves the host and dials it once. Returns whether the port accepted the connection;
/// only a failed lookup is an error.
pub async fn probe_reachability<C: Console>(
    config: &ConnectionConfig,
    console: &mut C,
) -> Result<bool, ProbeError> {
    let ips = net::resolve_host(&config.server).await?;
    if config.server.parse::<IpAddr>().is_err() {
        let listed: Vec<String> = ips.iter().map(|ip| ip.to_string()).collect();
        console.print_line(&format!(
            "Domain {} resolved to IP(s): [{}]",
            config.server,
            listed.join(", ")
        ));
    }

    match net::dial(ips[0], config.port, DIAL_TIMEOUT).await {
        Ok(reachable) => {
            console.print_line(&format!("Host reachable: {}", reachable.peer));
            console.print_line(&format!("Client source address: {}", reachable.local));
            Ok(true)
        }
        Err(e) => {
            console.print_line(&e.to_string());
            Ok(false)
        }
    }
}

/// Results of the fixed read-only queries, each independent of the others.
pub struct Diagnostics {
    pub port: Result<String, ProbeError>,
    pub grants: Result<Vec<String>, ProbeError>,
    pub databases: Result<Vec<String>, ProbeError>,
}

/// Opens a session and prints the server port, the grants and the databases.
/// A failing query is reported and the next one still runs.
pub async fn run_diagnostics<C: Console>(
    config: &ConnectionConfig,
    console: &mut C,
) -> Result<(), ProbeError> {
    let mut conn = db::open_session(config).await?;
    console.print_line("Connected successfully!");

    let diagnostics = Diagnostics {
        port: db::server_port(&mut conn).await,
        grants: db::grants(&mut conn).await,
        databases: db::databases(&mut conn).await,
    };

    if let Err(e) = conn.close().await {
        warn!("Failed to close session cleanly: {e}");
    }

    print_diagnostics(&config.user, &diagnostics, console);
    info!("Diagnostics finished for {}:{}", config.server, config.port);
    Ok(())
}

pub fn print_diagnostics<C: Console>(user: &str, diagnostics: &Diagnostics, console: &mut C) {
    console.print_line("");
    console.print_line(&format!("Running {}...", db::PORT_QUERY));
    match &diagnostics.port {
        Ok(port) => console.print_line(&format!("MySQL is running on port: {port}")),
        Err(e) => report(console, e),
    }

    console.print_line("");
    console.print_line(&format!("Grants for {user}:"));
    match &diagnostics.grants {
        Ok(grants) => grants.iter().for_each(|grant| console.print_line(grant)),
        Err(e) => report(console, e),
    }

    console.print_line("");
    console.print_line("Printing available databases:");
    match &diagnostics.databases {
        Ok(names) => {
            for name in names {
                console.print_line(&format!(" - {name}"));
            }
        }
        Err(e) => report(console, e),
    }
}

fn report<C: Console>(console: &mut C, err: &ProbeError) {
    warn!("{err}");
    match err {
        ProbeError::Ping { server, source } => {
            console.print_line("Cannot connect:");
            match server {
                Some(server) => {
                    console.print_line(&format!("MySQL error code: {}", server.number));
                    if let Some(state) = &server.sql_state {
                        console.print_line(&format!("MySQL SQLState: {state}"));
                    }
                    console.print_line(&format!("MySQL message: {}", server.message));
                }
                None => console.print_line(&source.to_string()),
            }
        }
        other => console.print_line(&other.to_string()),
    }
}
