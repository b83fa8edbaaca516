// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Windows-by-id plus the pane registry they draw from.

use indexmap::IndexMap;

use crate::error::{CoreError, CoreResult};
use crate::ids::IdAllocator;
use crate::registry::PaneRegistry;
use crate::window::Window;

pub struct Session {
    /// Insertion order retained, used to pick a deterministic successor
    /// when the active window closes.
    windows: IndexMap<u16, Window>,
    active_window_id: u16,
    window_ids: IdAllocator,
    pub registry: PaneRegistry,
}

impl Session {
    /// Creates a session with one initial window of `pane_count` shell
    /// panes running `shell_command`.
    pub fn new(shell_command: &[String], pane_count: usize, cols: u16, rows: u16) -> CoreResult<Self> {
        let mut session = Self {
            windows: IndexMap::new(),
            active_window_id: 0,
            window_ids: IdAllocator::new(),
            registry: PaneRegistry::new(),
        };
        let id = session.create_window(shell_command, pane_count.max(1), cols, rows)?;
        session.active_window_id = id;
        Ok(session)
    }

    pub fn create_window(
        &mut self,
        shell_command: &[String],
        pane_count: usize,
        cols: u16,
        rows: u16,
    ) -> CoreResult<u16> {
        let mut pane_ids = Vec::with_capacity(pane_count.max(1));
        for _ in 0..pane_count.max(1) {
            pane_ids.push(self.registry.create_shell_pane(shell_command, cols, rows)?);
        }
        let id = self.window_ids.next();
        self.windows.insert(id, Window::new(id, pane_ids));
        if self.windows.len() == 1 {
            self.active_window_id = id;
        }
        Ok(id)
    }

    /// Rejected when `id` is the only window. Otherwise destroys every
    /// contained pane and removes the window, picking a new active window
    /// (the previous window in insertion order, or any remaining window if
    /// `id` was first).
    pub fn close_window(&mut self, id: u16) -> CoreResult<()> {
        if self.windows.len() <= 1 {
            return Err(CoreError::LayoutInvalid("cannot close the last window".into()));
        }
        let pos = self
            .windows
            .get_index_of(&id)
            .ok_or(CoreError::NotFound("window", id))?;

        let pane_ids: Vec<u16> = self.windows[pos].pane_ids().to_vec();
        for pane_id in pane_ids {
            self.registry.destroy(pane_id);
        }
        self.windows.shift_remove(&id);

        if self.active_window_id == id {
            let new_pos = pos.saturating_sub(1).min(self.windows.len().saturating_sub(1));
            self.active_window_id = *self
                .windows
                .get_index(new_pos)
                .map(|(id, _)| id)
                .expect("at least one window remains");
        }
        Ok(())
    }

    pub fn get_window(&self, id: u16) -> CoreResult<&Window> {
        self.windows.get(&id).ok_or(CoreError::NotFound("window", id))
    }

    pub fn get_window_mut(&mut self, id: u16) -> CoreResult<&mut Window> {
        self.windows.get_mut(&id).ok_or(CoreError::NotFound("window", id))
    }

    pub fn active_window_id(&self) -> u16 {
        self.active_window_id
    }

    pub fn set_active_window(&mut self, id: u16) -> CoreResult<()> {
        if !self.windows.contains_key(&id) {
            return Err(CoreError::NotFound("window", id));
        }
        self.active_window_id = id;
        Ok(())
    }

    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}
