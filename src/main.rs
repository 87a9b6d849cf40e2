//! MySQL connectivity check
//!
//! A small command-line tool that verifies a MySQL-compatible server can be
//! reached and logged into. Connection settings are loaded from a JSON file,
//! the environment or interactive prompts, saved back for the next run, and
//! then used to:
//!
//! - resolve the host and probe the port over TCP
//! - open a session and ping it
//! - print the server port, the current grants and the visible databases

mod config;
mod console;
mod db;
mod error;
mod net;
mod runner;

use clap::Parser;
use config::Args;
use console::{Console, Stdio};
use std::process::ExitCode;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();
    let mut console = Stdio::new();
    match runner::run(&args, &mut console).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            console.print_line(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
