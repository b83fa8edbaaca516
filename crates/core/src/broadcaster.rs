// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-pane fan-out logic (§4.9): latched one-shot events, delta-vs-snapshot
//! selection, and `sync`/`resync` client requests. Pure message-building —
//! the event loop owns the actual channel writes.

use crate::client::ClientState;
use crate::codec::{ServerMessage, WireDirtyRow, WireModes};
use crate::pane::Pane;

/// Flatten a pane's dirty-row-diffed delta window into cell-major bytes
/// for the wire delta message.
fn wire_rows(rows: &[crate::terminal::DirtyRow]) -> Vec<WireDirtyRow> {
    rows.iter()
        .map(|r| WireDirtyRow {
            row: r.row,
            cells: r.cells.clone(),
        })
        .collect()
}

fn build_snapshot(pane_id: u16, pane: &Pane) -> ServerMessage {
    let snap = pane.generate_snapshot().terminal;
    let cells = snap.cell_rows.into_iter().flatten().collect();
    ServerMessage::Snapshot {
        pane_id,
        cols: snap.cols,
        rows: snap.rows,
        cursor: snap.cursor,
        modes: WireModes::from(snap.modes),
        generation: snap.generation,
        cells,
    }
}

/// One-shot events latched on the pane since the last drain. Bell is only
/// surfaced (and cleared) while the pane is active in its window;
/// otherwise it stays latched until it becomes active.
pub fn drain_latched(pane_id: u16, pane: &mut Pane, is_active: bool) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    if let Some(title) = pane.take_title_changed() {
        out.push(ServerMessage::Title { pane_id, title });
    }
    if pane.has_bell() && is_active {
        out.push(ServerMessage::Bell { pane_id });
        pane.clear_bell();
    }
    if let Some((title, body)) = pane.take_notification() {
        out.push(ServerMessage::Toast { pane_id, title, body });
    }
    if let Some((state, value)) = pane.take_progress() {
        out.push(ServerMessage::Progress { pane_id, state, value });
    }
    out
}

/// The per-client half of `send_pane_update`: if the client's stored
/// generation already matches the pane, nothing is due. Otherwise a delta
/// (when the client's generation lines up with the pane's current delta
/// window) or a full snapshot, and the client's tracked generation is
/// advanced to the pane's current generation.
pub fn pane_update_for_client(
    pane_id: u16,
    pane: &mut Pane,
    client: &mut ClientState,
    no_delta: bool,
) -> Option<ServerMessage> {
    let current_gen = pane.generation();
    if client.get_generation(pane_id) == current_gen {
        return None;
    }
    let msg = if no_delta {
        build_snapshot(pane_id, pane)
    } else {
        let (from_gen, delta) = pane.get_broadcast_delta();
        if client.get_generation(pane_id) == from_gen {
            ServerMessage::Delta {
                pane_id,
                from_gen,
                to_gen: current_gen,
                rows: wire_rows(&delta.rows),
            }
        } else {
            build_snapshot(pane_id, pane)
        }
    };
    client.set_generation(pane_id, current_gen);
    Some(msg)
}

/// `sync{gen, minRowId}` (§4.9). `gen`/`min_row_id` describe the client's
/// cached state, independent of (and possibly stale relative to) the
/// client's tracked generation.
pub fn handle_sync_request(
    pane_id: u16,
    pane: &mut Pane,
    client: &mut ClientState,
    gen: u64,
    min_row_id: u64,
    no_delta: bool,
) -> ServerMessage {
    let current_gen = pane.generation();
    let msg = if no_delta {
        build_snapshot(pane_id, pane)
    } else if min_row_id > pane.min_visible_row() {
        build_snapshot(pane_id, pane)
    } else if gen == current_gen {
        ServerMessage::Delta {
            pane_id,
            from_gen: gen,
            to_gen: gen,
            rows: Vec::new(),
        }
    } else {
        let (from_gen, delta) = pane.get_broadcast_delta();
        if gen == from_gen {
            ServerMessage::Delta {
                pane_id,
                from_gen,
                to_gen: current_gen,
                rows: wire_rows(&delta.rows),
            }
        } else {
            build_snapshot(pane_id, pane)
        }
    };
    client.set_generation(pane_id, current_gen);
    msg
}

/// `resync{paneId, reason}`: unconditionally a fresh snapshot.
pub fn handle_resync_request(pane_id: u16, pane: &Pane, client: &mut ClientState) -> ServerMessage {
    client.set_generation(pane_id, pane.generation());
    build_snapshot(pane_id, pane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockPty, MockTerminal};

    fn pane_with_mocks() -> Pane {
        Pane::new(1, Box::new(MockTerminal::new(4, 2)), Some(Box::new(MockPty::new())))
    }

    #[test]
    fn no_update_when_generations_match() {
        let mut pane = pane_with_mocks();
        let mut client = ClientState::new(Box::new(crate::test_support::MockFrameChannel::new()));
        client.set_generation(1, pane.generation());
        assert!(pane_update_for_client(1, &mut pane, &mut client, false).is_none());
    }

    #[test]
    fn sends_snapshot_when_client_gen_unknown() {
        let mut pane = pane_with_mocks();
        pane.feed(b"x");
        let mut client = ClientState::new(Box::new(crate::test_support::MockFrameChannel::new()));
        let msg = pane_update_for_client(1, &mut pane, &mut client, false).unwrap();
        assert!(matches!(msg, ServerMessage::Snapshot { .. }));
    }

    #[test]
    fn sends_delta_when_client_gen_matches_window_base() {
        let mut pane = pane_with_mocks();
        let base_gen = pane.generation();
        let mut client = ClientState::new(Box::new(crate::test_support::MockFrameChannel::new()));
        client.set_generation(1, base_gen);
        pane.feed(b"x");
        let msg = pane_update_for_client(1, &mut pane, &mut client, false).unwrap();
        assert!(matches!(msg, ServerMessage::Delta { from_gen, .. } if from_gen == base_gen));
    }

    #[test]
    fn resync_always_sends_snapshot() {
        let mut pane = pane_with_mocks();
        let mut client = ClientState::new(Box::new(crate::test_support::MockFrameChannel::new()));
        client.set_generation(1, pane.generation());
        let msg = handle_resync_request(1, &pane, &mut client);
        assert!(matches!(msg, ServerMessage::Snapshot { .. }));
    }

    #[test]
    fn sync_request_falls_back_to_snapshot_when_min_row_exceeds_retained() {
        let mut pane = pane_with_mocks();
        let mut client = ClientState::new(Box::new(crate::test_support::MockFrameChannel::new()));
        let msg = handle_sync_request(1, &mut pane, &mut client, 0, u64::MAX, false);
        assert!(matches!(msg, ServerMessage::Snapshot { .. }));
    }
}
