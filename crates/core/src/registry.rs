// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide pane-id → [`Pane`] mapping.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::{CoreError, CoreResult};
use crate::ids::IdAllocator;
use crate::pane::Pane;
use crate::pty::Pty;
use crate::pty_native::NativePty;
use crate::terminal::Terminal;
use crate::terminal_avt::AvtTerminal;

/// Grace period given to a destroyed pane's child after SIGHUP before the
/// registry escalates to SIGKILL on a later tick.
const KILL_GRACE_PERIOD: Duration = Duration::from_millis(50);

struct PendingKill {
    pid: Pid,
    deadline: Instant,
}

/// Owns every live pane. Destruction closes the PTY and drops the
/// Terminal; no iterator returned by [`PaneRegistry::iter`] may outlive a
/// `destroy` call (borrow checker enforced: `iter` borrows `self`).
#[derive(Default)]
pub struct PaneRegistry {
    panes: BTreeMap<u16, Pane>,
    ids: IdAllocator,
    pending_kills: Vec<PendingKill>,
}

impl PaneRegistry {
    pub fn new() -> Self {
        Self {
            panes: BTreeMap::new(),
            ids: IdAllocator::new(),
            pending_kills: Vec::new(),
        }
    }

    /// Spawn a real shell pane: a PTY running `command`, backed by an
    /// `avt`-driven terminal.
    pub fn create_shell_pane(&mut self, command: &[String], cols: u16, rows: u16) -> CoreResult<u16> {
        if cols == 0 || rows == 0 {
            return Err(CoreError::DimensionsOutOfRange { cols, rows });
        }
        let id = self.ids.next();
        let pty: Box<dyn Pty> = Box::new(NativePty::spawn(command, cols, rows)?);
        let terminal: Box<dyn Terminal> = Box::new(AvtTerminal::new(cols, rows));
        self.panes.insert(id, Pane::new(id, terminal, Some(pty)));
        Ok(id)
    }

    /// Create a pane with no backing process (e.g. the internal debug
    /// pane used by the control socket's `dump` verb).
    pub fn create_non_pty_pane(&mut self, cols: u16, rows: u16) -> CoreResult<u16> {
        if cols == 0 || rows == 0 {
            return Err(CoreError::DimensionsOutOfRange { cols, rows });
        }
        let id = self.ids.next();
        let terminal: Box<dyn Terminal> = Box::new(AvtTerminal::new(cols, rows));
        self.panes.insert(id, Pane::new(id, terminal, None));
        Ok(id)
    }

    pub fn get(&self, id: u16) -> CoreResult<&Pane> {
        self.panes.get(&id).ok_or(CoreError::NotFound("pane", id))
    }

    pub fn get_mut(&mut self, id: u16) -> CoreResult<&mut Pane> {
        self.panes.get_mut(&id).ok_or(CoreError::NotFound("pane", id))
    }

    /// Removes the pane and, if it had a live child process, schedules a
    /// SIGKILL escalation for [`Self::reconcile_pending_kills`] rather than
    /// blocking here waiting for it to exit.
    pub fn destroy(&mut self, id: u16) {
        if let Some(pane) = self.panes.remove(&id) {
            if let Some(pid) = pane.child_pid() {
                self.pending_kills.push(PendingKill {
                    pid: Pid::from_raw(pid),
                    deadline: Instant::now() + KILL_GRACE_PERIOD,
                });
            }
        }
    }

    /// Reaps destroyed panes' children, escalating to SIGKILL for any that
    /// outlived their grace period. Never blocks: uses `WNOHANG` throughout.
    pub fn reconcile_pending_kills(&mut self) {
        self.pending_kills.retain_mut(|pending| {
            match waitpid(pending.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {
                    if Instant::now() >= pending.deadline {
                        let _ = kill(pending.pid, Signal::SIGKILL);
                    }
                    true
                }
                _ => false,
            }
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pane> {
        self.panes.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pane> {
        self.panes.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.panes.keys().copied()
    }

    pub fn resize_all(&mut self, cols: u16, rows: u16) -> CoreResult<()> {
        for pane in self.panes.values_mut() {
            pane.resize(cols, rows)?;
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.panes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_non_pty_pane_rejects_zero_dimensions() {
        let mut registry = PaneRegistry::new();
        assert!(registry.create_non_pty_pane(0, 24).is_err());
    }

    #[test]
    fn destroy_removes_pane() {
        let mut registry = PaneRegistry::new();
        let id = registry.create_non_pty_pane(80, 24).unwrap();
        assert_eq!(registry.count(), 1);
        registry.destroy(id);
        assert_eq!(registry.count(), 0);
        assert!(registry.get(id).is_err());
    }

    #[test]
    fn ids_are_never_reused() {
        let mut registry = PaneRegistry::new();
        let first = registry.create_non_pty_pane(80, 24).unwrap();
        registry.destroy(first);
        let second = registry.create_non_pty_pane(80, 24).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn destroying_a_pane_with_no_child_process_schedules_no_kill() {
        let mut registry = PaneRegistry::new();
        let id = registry.create_non_pty_pane(80, 24).unwrap();
        registry.destroy(id);
        assert!(registry.pending_kills.is_empty());
    }

    /// `destroy` on a real shell pane must return immediately (no blocking
    /// sleep); the child is reaped later through repeated, non-blocking
    /// `reconcile_pending_kills` calls instead.
    #[test]
    fn destroying_a_shell_pane_reaps_its_child_without_blocking() {
        let mut registry = PaneRegistry::new();
        let id = registry.create_shell_pane(&["/bin/true".to_string()], 80, 24).unwrap();

        let started = Instant::now();
        registry.destroy(id);
        assert!(started.elapsed() < Duration::from_millis(10));
        assert_eq!(registry.pending_kills.len(), 1);

        for _ in 0..200 {
            registry.reconcile_pending_kills();
            if registry.pending_kills.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(registry.pending_kills.is_empty());
    }
}
