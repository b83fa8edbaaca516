// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Pty` trait seam.
//!
//! A pane's child process lives behind this trait so the reactor only ever
//! deals with "a readable/writable fd that produces bytes and eventually an
//! exit status." `crate::pty_native` is the one concrete adapter this
//! workspace ships, spawning a real PTY with `nix::pty::forkpty`.

use std::os::fd::RawFd;

/// Exit status of a pane's child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A single PTY-backed child process.
///
/// All I/O is non-blocking: `read`/`write` return
/// `io::ErrorKind::WouldBlock` rather than parking, so the reactor can
/// multiplex many panes behind one `poll(2)` call.
pub trait Pty: Send {
    /// Non-blocking read of PTY output. `WouldBlock` means "nothing to
    /// read right now", not an error.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Non-blocking write to the PTY. Returns the number of bytes
    /// accepted, which may be less than `data.len()`.
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize>;

    /// Apply a `TIOCSWINSZ` resize.
    fn resize(&self, cols: u16, rows: u16) -> std::io::Result<()>;

    fn child_pid(&self) -> Option<i32>;

    /// Raw fd for registration with the reactor's poll set.
    fn as_raw_fd(&self) -> RawFd;

    /// Non-blocking reap: `Ok(None)` means the child is still running.
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;

    /// Ask the child to exit. Best-effort; does not block.
    fn close(&mut self);
}
