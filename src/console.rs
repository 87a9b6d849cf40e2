//! Terminal input/output used by the probe.
//!
//! Everything the user sees goes through a [`Console`], so a run can be driven
//! from canned input in tests instead of a real terminal.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

pub trait Console {
    /// Writes `prompt` without a newline and reads one line of input.
    /// End of input yields an empty string.
    async fn read_line(&mut self, prompt: &str) -> io::Result<String>;

    /// Like [`Console::read_line`], but the typed text is not echoed.
    async fn read_secret(&mut self, prompt: &str) -> io::Result<String>;

    fn print_line(&mut self, line: &str);
}

/// Process stdin/stdout.
pub struct Stdio {
    lines: Lines<BufReader<Stdin>>,
}

impl Stdio {
    pub fn new() -> Self {
        Stdio {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

async fn write_prompt(prompt: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await
}

impl Console for Stdio {
    async fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        write_prompt(prompt).await?;
        Ok(self.lines.next_line().await?.unwrap_or_default())
    }

    async fn read_secret(&mut self, prompt: &str) -> io::Result<String> {
        write_prompt(prompt).await?;
        // rpassword talks to the tty directly and blocks until enter.
        tokio::task::spawn_blocking(rpassword::read_password)
            .await
            .map_err(io::Error::other)?
    }

    fn print_line(&mut self, line: &str) {
        println!("{line}");
    }
}

#[cfg(test)]
pub use scripted::Scripted;
