// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single pane: an owned `Terminal`, an optional `Pty`, and the latched
//! one-shot event bookkeeping a client needs to observe side-channel
//! activity (bell, title, clipboard, shell integration, selection).

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::error::{CoreError, CoreResult};
use crate::pty::Pty;
use crate::terminal::{
    CursorPosition, DirtyRow, ShellEventKind, Terminal, TerminalModes, TerminalSnapshot,
};

/// §4.1: a pane never observes more than one second of stale state while
/// sync-output mode is held open.
const SYNC_TIMEOUT: Duration = Duration::from_secs(1);
/// §9 / DESIGN.md: bound on how long a delta window can accumulate dirty
/// rows before a client is forced back onto a full snapshot.
const DELTA_RETENTION: Duration = Duration::from_secs(2);
/// §3: clipboard-GET requests to the master time out after 2s.
const CLIPBOARD_GET_TIMEOUT: Duration = Duration::from_secs(2);

/// A minimal encoding of the dirty rows accumulated since `from_gen`.
#[derive(Debug, Clone, Default)]
pub struct PaneDelta {
    pub rows: Vec<DirtyRow>,
}

/// Full serialization of a pane, dimensions through to cell data.
pub struct PaneSnapshot {
    pub pane_id: u16,
    pub terminal: TerminalSnapshot,
}

/// Outcome of feeding PTY bytes into a pane: whether the caller should run
/// the broadcaster for this pane this tick, or withhold because
/// sync-output mode is holding updates back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedOutcome {
    pub should_broadcast: bool,
}

pub struct Pane {
    pub id: u16,
    terminal: Box<dyn Terminal>,
    pty: Option<Box<dyn Pty>>,

    delta_base_gen: u64,
    accumulated_dirty: BTreeSet<u16>,
    last_delta_reset: Instant,

    pub sync_enabled: bool,
    pub sync_start_time: Option<Instant>,

    bell: bool,
    title_changed: Option<String>,
    notification: Option<(String, String)>,
    progress: Option<(u8, u8)>,
    clipboard_set: Option<(char, String)>,
    clipboard_get_pending: Option<(char, Instant)>,
    shell_event: Option<ShellEventKind>,

    theme_fg: Option<[u8; 3]>,
    theme_bg: Option<[u8; 3]>,

    alive: bool,
}

impl Pane {
    pub fn new(id: u16, terminal: Box<dyn Terminal>, pty: Option<Box<dyn Pty>>) -> Self {
        let generation = terminal.generation();
        Self {
            id,
            terminal,
            pty,
            delta_base_gen: generation,
            accumulated_dirty: BTreeSet::new(),
            last_delta_reset: Instant::now(),
            sync_enabled: false,
            sync_start_time: None,
            bell: false,
            title_changed: None,
            notification: None,
            progress: None,
            clipboard_set: None,
            clipboard_get_pending: None,
            shell_event: None,
            theme_fg: None,
            theme_bg: None,
            alive: true,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn generation(&self) -> u64 {
        self.terminal.generation()
    }

    pub fn size(&self) -> (u16, u16) {
        self.terminal.size()
    }

    pub fn cursor(&self) -> CursorPosition {
        self.terminal.cursor()
    }

    pub fn modes(&self) -> TerminalModes {
        self.terminal.modes()
    }

    pub fn child_pid(&self) -> Option<i32> {
        self.pty.as_ref().and_then(|p| p.child_pid())
    }

    pub fn pty_fd(&self) -> Option<std::os::fd::RawFd> {
        self.pty.as_ref().map(|p| p.as_raw_fd())
    }

    /// Non-blocking drain of PTY output into the terminal. Returns `Ok(0)`
    /// when nothing was available (`WouldBlock`), `Ok(n)` for bytes read,
    /// or an error that the caller should treat as pane death.
    pub fn pump_pty_output(&mut self, buf: &mut [u8]) -> CoreResult<(usize, FeedOutcome)> {
        let pty = match self.pty.as_mut() {
            Some(pty) => pty,
            None => return Ok((0, FeedOutcome { should_broadcast: false })),
        };
        match pty.read(buf) {
            Ok(0) => {
                self.alive = false;
                Ok((0, FeedOutcome { should_broadcast: false }))
            }
            Ok(n) => {
                let outcome = self.feed(&buf[..n]);
                Ok((n, outcome))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Ok((0, FeedOutcome { should_broadcast: false }))
            }
            Err(e)
                if e.raw_os_error() == Some(libc_eio())
                    || e.kind() == std::io::ErrorKind::BrokenPipe =>
            {
                self.alive = false;
                Ok((0, FeedOutcome { should_broadcast: false }))
            }
            Err(e) => Err(CoreError::PtyIo(e.to_string())),
        }
    }

    /// Apply raw bytes to the terminal, latch any side-channel events, and
    /// update sync-output bookkeeping. Returns whether the caller should
    /// broadcast this pane's update this tick.
    pub fn feed(&mut self, data: &[u8]) -> FeedOutcome {
        if data.is_empty() {
            return FeedOutcome { should_broadcast: false };
        }
        let events = self.terminal.feed(data);
        self.accumulated_dirty.extend(self.terminal.dirty_rows());
        self.terminal.clear_dirty();

        if events.bell {
            self.bell = true;
        }
        if let Some(title) = events.title_changed {
            self.title_changed = Some(title);
        }
        if let Some(n) = events.notification {
            self.notification = Some(n);
        }
        if let Some(p) = events.progress {
            self.progress = Some(p);
        }
        if let Some(set) = events.clipboard_set {
            self.clipboard_set = Some(set);
        }
        if let Some(reg) = events.clipboard_get {
            self.clipboard_get_pending = Some((reg, Instant::now()));
        }
        if let Some(se) = events.shell_event {
            self.shell_event = Some(se);
        }

        let was_on = self.sync_enabled;
        let now_on = self.terminal.modes().sync_output;
        self.sync_enabled = now_on;
        if now_on && !was_on {
            self.sync_start_time = Some(Instant::now());
        }
        if !now_on {
            self.sync_start_time = None;
        }
        let natural_exit = was_on && !now_on;

        FeedOutcome {
            should_broadcast: !self.sync_enabled || natural_exit,
        }
    }

    /// Called once per tick after dispatch (§5: "sync-mode timeouts are
    /// reconciled"). Returns `true` if a forced flush is due, in which
    /// case the caller must broadcast this pane's update even though
    /// `sync_enabled` remains set.
    pub fn reconcile_sync_timeout(&mut self) -> bool {
        if !self.sync_enabled {
            return false;
        }
        match self.sync_start_time {
            Some(start) if start.elapsed() >= SYNC_TIMEOUT => {
                self.sync_start_time = Some(Instant::now());
                true
            }
            _ => false,
        }
    }

    /// Drop a clipboard-GET request that has been outstanding past its
    /// deadline.
    pub fn reconcile_clipboard_timeout(&mut self) -> Option<char> {
        if let Some((reg, since)) = self.clipboard_get_pending {
            if since.elapsed() >= CLIPBOARD_GET_TIMEOUT {
                self.clipboard_get_pending = None;
                return Some(reg);
            }
        }
        None
    }

    pub fn write_input(&mut self, data: &[u8]) -> CoreResult<()> {
        let pty = self
            .pty
            .as_mut()
            .ok_or_else(|| CoreError::PtyIo("pane has no pty".into()))?;
        let mut offset = 0;
        while offset < data.len() {
            match pty.write(&data[offset..]) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(CoreError::PtyIo(e.to_string())),
            }
        }
        Ok(())
    }

    pub fn resize(&mut self, cols: u16, rows: u16) -> CoreResult<bool> {
        if cols == 0 || rows == 0 {
            return Err(CoreError::DimensionsOutOfRange { cols, rows });
        }
        if let Some(pty) = self.pty.as_ref() {
            pty.resize(cols, rows)
                .map_err(|e| CoreError::PtyIo(e.to_string()))?;
        }
        let changed = self.terminal.resize(cols, rows);
        if changed {
            self.accumulated_dirty.extend(self.terminal.dirty_rows());
            self.terminal.clear_dirty();
        }
        Ok(changed)
    }

    pub fn scroll(&mut self, delta: i32) {
        self.terminal.scroll(delta);
    }

    /// Compute `(from_gen, delta)`. The window resets immediately after
    /// being consumed via [`Pane::mark_delivered`], and is force-reset if
    /// it has sat unconsumed past [`DELTA_RETENTION`].
    pub fn get_broadcast_delta(&mut self) -> (u64, PaneDelta) {
        if self.last_delta_reset.elapsed() >= DELTA_RETENTION {
            self.reset_delta_window();
        }
        let rows = self
            .accumulated_dirty
            .iter()
            .map(|&row| DirtyRow {
                row,
                cells: self.terminal.row_cells(row),
            })
            .collect();
        (self.delta_base_gen, PaneDelta { rows })
    }

    /// Call after a client has been sent either a delta or a snapshot for
    /// this pane's current generation: starts a fresh delta window.
    pub fn mark_delivered(&mut self) {
        self.reset_delta_window();
    }

    fn reset_delta_window(&mut self) {
        self.delta_base_gen = self.terminal.generation();
        self.accumulated_dirty.clear();
        self.last_delta_reset = Instant::now();
    }

    pub fn min_visible_row(&self) -> u64 {
        self.terminal.min_visible_row()
    }

    pub fn generate_snapshot(&self) -> PaneSnapshot {
        PaneSnapshot {
            pane_id: self.id,
            terminal: self.terminal.snapshot(),
        }
    }

    pub fn set_theme_colors(&mut self, fg: Option<[u8; 3]>, bg: Option<[u8; 3]>) {
        self.theme_fg = fg;
        self.theme_bg = bg;
        self.terminal.set_theme_colors(fg, bg);
    }

    pub fn theme_colors(&self) -> (Option<[u8; 3]>, Option<[u8; 3]>) {
        (self.theme_fg, self.theme_bg)
    }

    // -- Selection -------------------------------------------------

    pub fn start_selection(&mut self, x: u16, y: u16) {
        self.terminal.start_selection(x, y);
    }

    pub fn update_selection(&mut self, x: u16, y: u16, rectangular: bool) {
        self.terminal.update_selection(x, y, rectangular);
    }

    pub fn end_selection(&mut self) {
        self.terminal.end_selection();
    }

    pub fn clear_selection(&mut self) {
        self.terminal.clear_selection();
    }

    pub fn select_all(&mut self) {
        self.terminal.select_all();
    }

    pub fn get_selection_text(&self) -> Option<String> {
        self.terminal.selection_text()
    }

    pub fn is_selection_at_start(&self, x: u16, y: u16) -> bool {
        self.terminal.is_selection_at_start(x, y)
    }

    // -- Latched one-shot event accessors ---------------------------

    pub fn has_bell(&self) -> bool {
        self.bell
    }

    pub fn clear_bell(&mut self) {
        self.bell = false;
    }

    pub fn take_title_changed(&mut self) -> Option<String> {
        self.title_changed.take()
    }

    pub fn take_notification(&mut self) -> Option<(String, String)> {
        self.notification.take()
    }

    pub fn take_progress(&mut self) -> Option<(u8, u8)> {
        self.progress.take()
    }

    pub fn take_clipboard_set(&mut self) -> Option<(char, String)> {
        self.clipboard_set.take()
    }

    pub fn clipboard_get_pending(&self) -> Option<char> {
        self.clipboard_get_pending.map(|(reg, _)| reg)
    }

    pub fn resolve_clipboard_get(&mut self) {
        self.clipboard_get_pending = None;
    }

    pub fn take_shell_event(&mut self) -> Option<ShellEventKind> {
        self.shell_event.take()
    }

}

fn libc_eio() -> i32 {
    nix::libc::EIO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockPty, MockTerminal};

    fn pane_with_mocks() -> Pane {
        Pane::new(1, Box::new(MockTerminal::new(10, 3)), Some(Box::new(MockPty::new())))
    }

    #[test]
    fn feed_advances_generation_and_broadcasts_when_not_syncing() {
        let mut pane = pane_with_mocks();
        let outcome = pane.feed(b"hi");
        assert!(outcome.should_broadcast);
        assert_eq!(pane.generation(), 1);
    }

    #[test]
    fn sync_mode_withholds_broadcast_until_timeout() {
        let mut pane = pane_with_mocks();
        // Force the mock terminal into sync-output mode directly.
        // SAFETY of this test: MockTerminal is a local test double, not a
        // trait object downcast.
        pane.feed(b"x");
        pane.sync_enabled = true;
        pane.sync_start_time = Some(Instant::now());
        assert!(!pane.reconcile_sync_timeout());
    }

    #[test]
    fn get_broadcast_delta_resets_window_after_delivery() {
        let mut pane = pane_with_mocks();
        pane.feed(b"x");
        let (from_gen, delta) = pane.get_broadcast_delta();
        assert_eq!(from_gen, 0);
        assert!(!delta.rows.is_empty());
        pane.mark_delivered();
        let (from_gen2, delta2) = pane.get_broadcast_delta();
        assert_eq!(from_gen2, pane.generation());
        assert!(delta2.rows.is_empty());
    }

    #[test]
    fn resize_rejects_zero_dimensions() {
        let mut pane = pane_with_mocks();
        assert!(pane.resize(0, 10).is_err());
    }

    #[test]
    fn clipboard_get_times_out_after_deadline() {
        let mut pane = pane_with_mocks();
        pane.clipboard_get_pending = Some(('c', Instant::now() - Duration::from_secs(3)));
        assert_eq!(pane.reconcile_clipboard_timeout(), Some('c'));
        assert!(pane.clipboard_get_pending().is_none());
    }

    /// Generation is non-decreasing across any mutation and strictly
    /// increases whenever the underlying terminal reports a change.
    #[test]
    fn generation_is_monotonic_across_feed_and_resize() {
        let mut pane = pane_with_mocks();
        let g0 = pane.generation();
        pane.feed(b"a");
        let g1 = pane.generation();
        assert!(g1 > g0);
        pane.feed(b"b");
        let g2 = pane.generation();
        assert!(g2 > g1);
        pane.resize(20, 6).unwrap();
        let g3 = pane.generation();
        assert!(g3 > g2);
        // Resizing to the same dimensions is a no-op and must not tick
        // the generation forward.
        pane.resize(20, 6).unwrap();
        assert_eq!(pane.generation(), g3);
    }

    #[test]
    fn selection_text_is_available_immediately_after_end_selection() {
        let mut terminal = MockTerminal::new(20, 3);
        terminal.set_row_text(0, "hello world");
        let mut pane = Pane::new(1, Box::new(terminal), Some(Box::new(MockPty::new())));
        pane.start_selection(0, 0);
        pane.update_selection(4, 0, false);
        pane.end_selection();
        assert_eq!(pane.get_selection_text().as_deref(), Some("hello"));
    }

    /// A `Terminal` double whose row mutations are scripted in advance, so a
    /// property test can drive a specific sequence of row changes through
    /// `Pane::feed` without ever needing to reach back into the boxed
    /// terminal between calls.
    struct ScriptedTerminal {
        cols: u16,
        rows: u16,
        generation: u64,
        dirty: Vec<u16>,
        row_bytes: Vec<Vec<u8>>,
        script: std::collections::VecDeque<(u16, Vec<u8>)>,
    }

    impl ScriptedTerminal {
        fn new(cols: u16, rows: u16, script: Vec<(u16, Vec<u8>)>) -> Self {
            Self {
                cols,
                rows,
                generation: 0,
                dirty: Vec::new(),
                row_bytes: vec![vec![0u8; cols as usize * crate::terminal::BYTES_PER_CELL]; rows as usize],
                script: script.into(),
            }
        }
    }

    impl Terminal for ScriptedTerminal {
        fn feed(&mut self, _data: &[u8]) -> crate::terminal::TerminalEvents {
            if let Some((row, bytes)) = self.script.pop_front() {
                self.row_bytes[row as usize] = bytes;
                self.dirty.push(row);
                self.generation += 1;
            }
            crate::terminal::TerminalEvents::default()
        }

        fn resize(&mut self, _cols: u16, _rows: u16) -> bool {
            false
        }

        fn size(&self) -> (u16, u16) {
            (self.cols, self.rows)
        }

        fn generation(&self) -> u64 {
            self.generation
        }

        fn cursor(&self) -> CursorPosition {
            CursorPosition::default()
        }

        fn modes(&self) -> TerminalModes {
            TerminalModes::default()
        }

        fn dirty_rows(&self) -> Vec<u16> {
            let mut rows = self.dirty.clone();
            rows.sort_unstable();
            rows.dedup();
            rows
        }

        fn clear_dirty(&mut self) {
            self.dirty.clear();
        }

        fn min_visible_row(&self) -> u64 {
            0
        }

        fn snapshot(&self) -> TerminalSnapshot {
            TerminalSnapshot {
                cols: self.cols,
                rows: self.rows,
                cursor: self.cursor(),
                modes: self.modes(),
                generation: self.generation,
                cell_rows: self.row_bytes.clone(),
                theme_fg: None,
                theme_bg: None,
            }
        }

        fn row_cells(&self, row: u16) -> Vec<u8> {
            self.row_bytes[row as usize].clone()
        }

        fn set_theme_colors(&mut self, _fg: Option<[u8; 3]>, _bg: Option<[u8; 3]>) {}

        fn scroll(&mut self, _delta: i32) {}

        fn start_selection(&mut self, _x: u16, _y: u16) {}
        fn update_selection(&mut self, _x: u16, _y: u16, _rectangular: bool) {}
        fn end_selection(&mut self) {}
        fn clear_selection(&mut self) {}
        fn select_all(&mut self) {}
        fn selection_text(&self) -> Option<String> {
            None
        }
        fn is_selection_at_start(&self, _x: u16, _y: u16) -> bool {
            false
        }
    }

    proptest::proptest! {
        /// Whatever delta `get_broadcast_delta` hands back for a client
        /// parked at `from_gen`, splicing its dirty rows into that client's
        /// cached snapshot must reproduce the pane's current full snapshot
        /// exactly.
        #[test]
        fn delta_applied_to_cached_snapshot_matches_current_snapshot(
            ops in proptest::collection::vec((0u16..4, "[a-z]{0,6}"), 1..12)
        ) {
            let rows: u16 = 4;
            let cols: u16 = 6;
            let script: Vec<(u16, Vec<u8>)> = ops
                .iter()
                .map(|(row, text)| {
                    let mut bytes = Vec::with_capacity(cols as usize * crate::terminal::BYTES_PER_CELL);
                    let mut chars = text.chars();
                    for _ in 0..cols {
                        let ch = chars.next().unwrap_or(' ');
                        bytes.extend_from_slice(&(ch as u32).to_le_bytes());
                        bytes.extend_from_slice(&[0u8; 4]);
                    }
                    (*row, bytes)
                })
                .collect();
            let op_count = script.len();

            let terminal = ScriptedTerminal::new(cols, rows, script);
            let mut pane = Pane::new(1, Box::new(terminal), None);
            let from_gen = pane.generation();
            let mut cached: Vec<Vec<u8>> = pane.generate_snapshot().terminal.cell_rows;

            for _ in 0..op_count {
                pane.feed(b"x");
            }

            let (delta_from_gen, delta) = pane.get_broadcast_delta();
            proptest::prop_assert_eq!(delta_from_gen, from_gen);

            for dirty_row in &delta.rows {
                cached[dirty_row.row as usize] = dirty_row.cells.clone();
            }

            let current = pane.generate_snapshot().terminal.cell_rows;
            proptest::prop_assert_eq!(cached, current);
        }
    }
}
