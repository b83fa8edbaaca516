// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory stand-ins for the three external-collaborator traits, used by
//! unit and scenario tests so they never touch a real PTY, VT emulator, or
//! socket.

use std::collections::VecDeque;
use std::os::fd::RawFd;

use crate::frame_channel::{Frame, FrameChannel};
use crate::pty::{ExitStatus, Pty};
use crate::terminal::{
    CursorPosition, Terminal, TerminalEvents, TerminalModes, TerminalSnapshot, BYTES_PER_CELL,
};

/// A terminal double whose modes and cell content are driven directly by
/// the test rather than parsed out of fed bytes.
pub struct MockTerminal {
    pub cols: u16,
    pub rows: u16,
    generation: u64,
    dirty_rows: Vec<u16>,
    pub cursor: CursorPosition,
    pub modes: TerminalModes,
    pub fed: Vec<u8>,
    rows_text: Vec<String>,
    selection: Option<((u16, u16), (u16, u16))>,
    pub theme_fg: Option<[u8; 3]>,
    pub theme_bg: Option<[u8; 3]>,
}

impl MockTerminal {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            generation: 0,
            dirty_rows: Vec::new(),
            cursor: CursorPosition::default(),
            modes: TerminalModes::default(),
            fed: Vec::new(),
            rows_text: vec![String::new(); rows as usize],
            selection: None,
            theme_fg: None,
            theme_bg: None,
        }
    }

    pub fn set_row_text(&mut self, row: u16, text: &str) {
        if let Some(slot) = self.rows_text.get_mut(row as usize) {
            *slot = text.to_string();
            self.dirty_rows.push(row);
            self.generation += 1;
        }
    }
}

impl Terminal for MockTerminal {
    fn feed(&mut self, data: &[u8]) -> TerminalEvents {
        self.fed.extend_from_slice(data);
        self.generation += 1;
        self.dirty_rows.push(0);
        TerminalEvents::default()
    }

    fn resize(&mut self, cols: u16, rows: u16) -> bool {
        if cols == self.cols && rows == self.rows {
            return false;
        }
        self.cols = cols;
        self.rows = rows;
        self.rows_text.resize(rows as usize, String::new());
        self.generation += 1;
        true
    }

    fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    fn modes(&self) -> TerminalModes {
        self.modes
    }

    fn dirty_rows(&self) -> Vec<u16> {
        let mut rows = self.dirty_rows.clone();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    fn clear_dirty(&mut self) {
        self.dirty_rows.clear();
    }

    fn min_visible_row(&self) -> u64 {
        0
    }

    fn snapshot(&self) -> TerminalSnapshot {
        TerminalSnapshot {
            cols: self.cols,
            rows: self.rows,
            cursor: self.cursor,
            modes: self.modes,
            generation: self.generation,
            cell_rows: (0..self.rows).map(|r| self.row_cells(r)).collect(),
            theme_fg: self.theme_fg,
            theme_bg: self.theme_bg,
        }
    }

    fn row_cells(&self, row: u16) -> Vec<u8> {
        let text = self.rows_text.get(row as usize).cloned().unwrap_or_default();
        let mut out = Vec::with_capacity(self.cols as usize * BYTES_PER_CELL);
        let mut chars = text.chars();
        for _ in 0..self.cols {
            let ch = chars.next().unwrap_or(' ');
            out.extend_from_slice(&(ch as u32).to_le_bytes());
            out.extend_from_slice(&[0u8; 4]);
        }
        out
    }

    fn set_theme_colors(&mut self, fg: Option<[u8; 3]>, bg: Option<[u8; 3]>) {
        self.theme_fg = fg;
        self.theme_bg = bg;
    }

    fn scroll(&mut self, _delta: i32) {}

    fn start_selection(&mut self, x: u16, y: u16) {
        self.selection = Some(((x, y), (x, y)));
    }

    fn update_selection(&mut self, x: u16, y: u16, _rectangular: bool) {
        if let Some(sel) = self.selection.as_mut() {
            sel.1 = (x, y);
        }
    }

    fn end_selection(&mut self) {}

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn select_all(&mut self) {
        self.selection = Some(((0, 0), (self.cols.saturating_sub(1), self.rows.saturating_sub(1))));
    }

    fn selection_text(&self) -> Option<String> {
        let ((x0, y0), (x1, y1)) = self.selection?;
        if y0 != y1 {
            return Some("<multi-row selection>".to_string());
        }
        let text = self.rows_text.get(y0 as usize)?;
        let chars: Vec<char> = text.chars().collect();
        let lo = x0.min(x1) as usize;
        let hi = (x0.max(x1) as usize).min(chars.len().saturating_sub(1));
        if lo > hi || chars.is_empty() {
            return Some(String::new());
        }
        Some(chars[lo..=hi].iter().collect())
    }

    fn is_selection_at_start(&self, x: u16, y: u16) -> bool {
        self.selection.map(|s| s.0 == (x, y)).unwrap_or(false)
    }
}

/// A PTY double that records writes and replays a pre-seeded output queue.
pub struct MockPty {
    pub written: Vec<u8>,
    pub to_read: VecDeque<u8>,
    pub resized: Vec<(u16, u16)>,
    pub closed: bool,
    pub exit_status: Option<ExitStatus>,
}

impl MockPty {
    pub fn new() -> Self {
        Self {
            written: Vec::new(),
            to_read: VecDeque::new(),
            resized: Vec::new(),
            closed: false,
            exit_status: None,
        }
    }

    pub fn push_output(&mut self, data: &[u8]) {
        self.to_read.extend(data.iter().copied());
    }
}

impl Default for MockPty {
    fn default() -> Self {
        Self::new()
    }
}

impl Pty for MockPty {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.to_read.is_empty() {
            return Err(std::io::ErrorKind::WouldBlock.into());
        }
        let mut n = 0;
        while n < buf.len() {
            match self.to_read.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.written.extend_from_slice(data);
        Ok(data.len())
    }

    fn resize(&self, _cols: u16, _rows: u16) -> std::io::Result<()> {
        Ok(())
    }

    fn child_pid(&self) -> Option<i32> {
        Some(4242)
    }

    fn as_raw_fd(&self) -> RawFd {
        -1
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Ok(self.exit_status.take())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// A frame channel double backed by in-memory queues.
pub struct MockFrameChannel {
    pub sent: Vec<Frame>,
    pub inbound: VecDeque<Frame>,
    pub closed: bool,
}

impl MockFrameChannel {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            inbound: VecDeque::new(),
            closed: false,
        }
    }

    pub fn push_inbound(&mut self, frame: Frame) {
        self.inbound.push_back(frame);
    }
}

impl Default for MockFrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameChannel for MockFrameChannel {
    fn as_raw_fd(&self) -> RawFd {
        -1
    }

    fn try_recv(&mut self) -> std::io::Result<Option<Frame>> {
        Ok(self.inbound.pop_front())
    }

    fn send(&mut self, frame: Frame) -> std::io::Result<()> {
        if self.closed {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        self.sent.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
