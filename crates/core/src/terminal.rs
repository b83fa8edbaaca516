// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Terminal` trait seam.
//!
//! Everything about cell grids, SGR attributes, and VT parsing is someone
//! else's problem (see spec §1): this crate only needs a narrow surface —
//! feed bytes in, read generation/cursor/modes/dirty-rows/cells out, and a
//! small selection API. `crate::terminal_avt` is the one concrete adapter
//! this workspace ships, wrapping `avt::Vt`.

use serde::{Deserialize, Serialize};

/// Row/column cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CursorPosition {
    pub row: u16,
    pub col: u16,
}

/// Mode flags a `Terminal` tracks that change how the engine behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalModes {
    pub alt_screen: bool,
    pub bracketed_paste: bool,
    pub app_cursor_keys: bool,
    /// DECSET 2026: updates should be withheld from broadcast while set.
    pub sync_output: bool,
    pub mouse: MouseMode,
    pub mouse_motion: bool,
    /// DECSET 2004 companion: cursor visible (not used for gating, kept for
    /// completeness of the mode surface).
    pub cursor_visible: bool,
}

/// Negotiated mouse reporting protocol (DECSET 1000/1002/1003/1006/1015/1016).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    #[default]
    Off,
    X10,
    Utf8,
    Sgr,
    Urxvt,
    SgrPixels,
}

/// One-shot side-channel events produced by a single `feed()` call. The
/// caller (`Pane`) is responsible for latching these until consumed.
#[derive(Debug, Clone, Default)]
pub struct TerminalEvents {
    pub bell: bool,
    pub title_changed: Option<String>,
    pub notification: Option<(String, String)>,
    pub progress: Option<(u8, u8)>,
    /// OSC 52 SET: (register, base64 payload).
    pub clipboard_set: Option<(char, String)>,
    /// OSC 52 GET request for the given register.
    pub clipboard_get: Option<char>,
    /// OSC 133 shell-integration marker.
    pub shell_event: Option<ShellEventKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEventKind {
    PromptStart,
    PromptEnd,
    OutputStart,
    CommandEnd { exit_code: Option<i32> },
}

/// Full serialization of a pane's visible state.
#[derive(Debug, Clone)]
pub struct TerminalSnapshot {
    pub cols: u16,
    pub rows: u16,
    pub cursor: CursorPosition,
    pub modes: TerminalModes,
    pub generation: u64,
    /// Row-major cell data, one `Vec<u8>` per row, `cols * BYTES_PER_CELL`
    /// bytes each.
    pub cell_rows: Vec<Vec<u8>>,
    pub theme_fg: Option<[u8; 3]>,
    pub theme_bg: Option<[u8; 3]>,
}

/// One dirty row's worth of cell data, used to build a delta.
#[derive(Debug, Clone)]
pub struct DirtyRow {
    pub row: u16,
    pub cells: Vec<u8>,
}

/// Bytes encoded per cell in snapshot/delta payloads (§4.7, §9 open
/// question: locked to the `avt`-backed adapter's 4-byte codepoint + 4
/// reserved attribute bytes).
pub const BYTES_PER_CELL: usize = 8;

/// Opaque terminal emulator surface consumed by a [`crate::pane::Pane`].
pub trait Terminal: Send {
    /// Apply raw PTY output. Advances `generation` at least once if any
    /// observable state changed.
    fn feed(&mut self, data: &[u8]) -> TerminalEvents;

    /// Resize the terminal. Returns `true` if dimensions actually changed.
    fn resize(&mut self, cols: u16, rows: u16) -> bool;

    fn size(&self) -> (u16, u16);

    fn generation(&self) -> u64;

    fn cursor(&self) -> CursorPosition;

    fn modes(&self) -> TerminalModes;

    /// Rows touched since the last `clear_dirty` call, deduplicated and
    /// sorted.
    fn dirty_rows(&self) -> Vec<u16>;

    fn clear_dirty(&mut self);

    /// Lowest scrollback row id still retained (for `resync`'s `minRowId`
    /// comparison). Panes without scrollback return 0.
    fn min_visible_row(&self) -> u64;

    fn snapshot(&self) -> TerminalSnapshot;

    /// Serialize one row for delta encoding.
    fn row_cells(&self, row: u16) -> Vec<u8>;

    fn set_theme_colors(&mut self, fg: Option<[u8; 3]>, bg: Option<[u8; 3]>);

    fn scroll(&mut self, delta: i32);

    // -- Selection -----------------------------------------------------

    fn start_selection(&mut self, x: u16, y: u16);
    fn update_selection(&mut self, x: u16, y: u16, rectangular: bool);
    fn end_selection(&mut self);
    fn clear_selection(&mut self);
    fn select_all(&mut self);
    fn selection_text(&self) -> Option<String>;
    fn is_selection_at_start(&self, x: u16, y: u16) -> bool;
}
