// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `FrameChannel` trait seam: a duplex, message-framed channel to one
//! viewer. Any WebSocket-equivalent transport can back it; `crates/termd`
//! ships a `tungstenite`-based adapter.

use std::os::fd::RawFd;

/// A single inbound or outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// A duplex, non-blocking, message-framed channel to one connected viewer.
pub trait FrameChannel: Send {
    /// Raw fd for registration with the reactor's poll set.
    fn as_raw_fd(&self) -> RawFd;

    /// Non-blocking receive; `Ok(None)` means no complete frame is ready.
    fn try_recv(&mut self) -> std::io::Result<Option<Frame>>;

    /// Non-blocking send with a short write timeout (§5: ~100ms). Returns
    /// `Err(WouldBlock)` on a stuck peer rather than parking.
    fn send(&mut self, frame: Frame) -> std::io::Result<()>;

    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
