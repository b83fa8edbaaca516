// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-threaded terminal multiplexing engine.
//!
//! Owns a set of PTY-backed panes, arranges them into windows with
//! user-selectable layouts, and streams their state to one or more remote
//! viewers over a duplex message channel. One viewer at a time holds the
//! "master" role permitted to mutate shared state.
//!
//! The engine itself never touches a socket or a real PTY: it is driven by
//! a [`FrameChannel`] per client, a [`Pty`] per pane, and a [`Terminal`] per
//! pane, all trait seams implemented outside this crate (see `crates/termd`
//! for the concrete adapters this workspace ships).

pub mod auth;
pub mod broadcaster;
pub mod client;
pub mod clipboard;
pub mod codec;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod frame_channel;
pub mod handlers;
pub mod ids;
pub mod layout;
pub mod pane;
pub mod pty;
pub mod registry;
pub mod session;
pub mod terminal;
pub mod window;

pub mod pty_native;
pub mod terminal_avt;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::ClientState;
pub use config::RunConfig;
pub use error::{ClientError, CoreError};
pub use event_loop::EventLoop;
pub use pane::Pane;
pub use registry::PaneRegistry;
pub use session::Session;
pub use window::Window;
