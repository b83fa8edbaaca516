// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One connected viewer.

use std::collections::HashMap;

use crate::frame_channel::FrameChannel;

/// A single connected viewer: its channel, identity, and per-pane
/// delivery cursor.
pub struct ClientState {
    pub channel: Box<dyn FrameChannel>,
    pub authenticated: bool,
    pub client_id: Option<String>,
    /// Retained after the initial hello so a later `request_master` can be
    /// re-validated without asking the client to resend it.
    pub auth_token: Option<String>,
    pane_generations: HashMap<u16, u64>,
}

impl ClientState {
    pub fn new(channel: Box<dyn FrameChannel>) -> Self {
        Self {
            channel,
            authenticated: false,
            client_id: None,
            auth_token: None,
            pane_generations: HashMap::new(),
        }
    }

    /// First 8 characters of the client id, for log fields. Falls back to
    /// `"?"` before a hello has been accepted.
    pub fn short_id(&self) -> &str {
        match &self.client_id {
            Some(id) => &id[..id.len().min(8)],
            None => "?",
        }
    }

    pub fn get_generation(&self, pane_id: u16) -> u64 {
        self.pane_generations.get(&pane_id).copied().unwrap_or(0)
    }

    pub fn set_generation(&mut self, pane_id: u16, generation: u64) {
        self.pane_generations.insert(pane_id, generation);
    }

    /// Drop tracking for a pane that no longer exists; stale entries are
    /// otherwise harmless but this keeps the map from growing unbounded
    /// across a long session's worth of closed panes.
    pub fn forget_pane(&mut self, pane_id: u16) {
        self.pane_generations.remove(&pane_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockFrameChannel;

    #[test]
    fn short_id_truncates_to_eight() {
        let mut client = ClientState::new(Box::new(MockFrameChannel::new()));
        client.client_id = Some("0123456789abcdef".to_string());
        assert_eq!(client.short_id(), "01234567");
    }

    #[test]
    fn unknown_pane_generation_defaults_to_zero() {
        let client = ClientState::new(Box::new(MockFrameChannel::new()));
        assert_eq!(client.get_generation(42), 0);
    }
}
