// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `RunConfig`: the plain data record the core accepts at startup. CLI
//! flag parsing and env var consumption are the wrapper's job (§6); this
//! struct is their output.

use std::path::PathBuf;

use crate::error::{CoreError, CoreResult};

/// Pane dimensions must fall in this range (§4.8: "valid bounds, e.g.
/// 1..500").
pub const MIN_DIMENSION: u16 = 1;
pub const MAX_DIMENSION: u16 = 500;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub shell_command: Vec<String>,
    pub initial_panes: usize,
    pub cols: u16,
    pub rows: u16,
    pub token_file_path: PathBuf,
    pub control_socket_path: Option<PathBuf>,
    /// Debug toggle: always send full snapshots, never deltas.
    pub no_delta: bool,
    /// Debug toggle: ignore DECSET 2026 and never withhold broadcasts.
    pub no_sync_output: bool,
    /// Mirrors raw PTY bytes to the tracing log at debug level.
    pub pty_log: bool,
}

impl RunConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.shell_command.is_empty() {
            return Err(CoreError::Config("shell_command must not be empty".into()));
        }
        if self.initial_panes == 0 {
            return Err(CoreError::Config("initial_panes must be at least 1".into()));
        }
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&self.cols)
            || !(MIN_DIMENSION..=MAX_DIMENSION).contains(&self.rows)
        {
            return Err(CoreError::DimensionsOutOfRange {
                cols: self.cols,
                rows: self.rows,
            });
        }
        Ok(())
    }
}
