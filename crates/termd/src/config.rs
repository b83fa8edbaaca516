// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI flag parsing, with the core's plain [`mux_core::RunConfig`] as its
//! output (§6).

use std::path::PathBuf;

use clap::Parser;

/// Terminal multiplexer daemon: WebSocket viewers, one admin control
/// socket, N PTY-backed panes.
#[derive(Debug, Parser)]
#[command(name = "termd", version, about)]
pub struct Config {
    /// Host address to bind the viewer-facing WebSocket listener to.
    #[arg(long, env = "TERMD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the viewer-facing WebSocket listener.
    #[arg(long, env = "TERMD_PORT", default_value = "7681")]
    pub port: u16,

    /// Unix socket path for the admin control connection (§6). Disabled
    /// when unset.
    #[arg(long, env = "TERMD_CONTROL_SOCKET")]
    pub control_socket: Option<PathBuf>,

    /// Where master/view tokens are written on startup, mode 0600.
    #[arg(long, env = "TERMD_TOKEN_FILE", default_value = "/tmp/termd.token")]
    pub token_file: PathBuf,

    /// Number of panes the initial window starts with.
    #[arg(long, env = "TERMD_PANES", default_value = "1")]
    pub panes: usize,

    /// Terminal columns.
    #[arg(long, env = "TERMD_COLS", default_value = "80")]
    pub cols: u16,

    /// Terminal rows.
    #[arg(long, env = "TERMD_ROWS", default_value = "24")]
    pub rows: u16,

    /// Debug toggle: always send full snapshots, never deltas.
    #[arg(long, env = "TERMD_NO_DELTA")]
    pub no_delta: bool,

    /// Debug toggle: ignore DECSET 2026 and never withhold broadcasts.
    #[arg(long, env = "TERMD_NO_SYNC_OUTPUT")]
    pub no_sync_output: bool,

    /// Mirror raw PTY bytes to the tracing log at debug level.
    #[arg(long, env = "TERMD_PTY_LOG")]
    pub pty_log: bool,

    /// Log format (json or text).
    #[arg(long, env = "TERMD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TERMD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Shell command each pane runs (after --).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl Config {
    /// Validate the configuration after parsing, before it is lowered to
    /// a [`mux_core::RunConfig`].
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("a shell command must be specified (after --)");
        }
        Ok(())
    }

    pub fn into_run_config(self) -> mux_core::RunConfig {
        mux_core::RunConfig {
            shell_command: self.command,
            initial_panes: self.panes,
            cols: self.cols,
            rows: self.rows,
            token_file_path: self.token_file,
            control_socket_path: self.control_socket,
            no_delta: self.no_delta,
            no_sync_output: self.no_sync_output,
            pty_log: self.pty_log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_command() {
        let config = Config {
            host: "127.0.0.1".into(),
            port: 7681,
            control_socket: None,
            token_file: PathBuf::from("/tmp/termd.token"),
            panes: 1,
            cols: 80,
            rows: 24,
            no_delta: false,
            no_sync_output: false,
            pty_log: false,
            log_format: "text".into(),
            log_level: "info".into(),
            command: Vec::new(),
        };
        assert!(config.validate().is_err());
    }
}
