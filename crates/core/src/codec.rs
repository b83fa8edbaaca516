// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client/server message types and the two accepted client encodings.
//!
//! Both the self-describing text form and the compact binary form decode
//! into the same [`ClientMessage`] tagged union — text via `serde_json`,
//! binary via `rmp-serde` (MessagePack), so the tag set and field names
//! never drift between the two wire forms.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::layout::LayoutNode;
use crate::terminal::{CursorPosition, MouseMode, TerminalModes};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Key {
        pane_id: u16,
        key: String,
        #[serde(default)]
        ctrl: bool,
        #[serde(default)]
        alt: bool,
        #[serde(default)]
        shift: bool,
    },
    Text {
        pane_id: u16,
        data: String,
    },
    Resize {
        pane_id: u16,
        cols: u16,
        rows: u16,
    },
    Scroll {
        pane_id: u16,
        delta: i32,
    },
    Ping {},
    Sync {
        pane_id: u16,
        gen: u64,
        #[serde(rename = "minRowId")]
        min_row_id: u64,
    },
    Resync {
        #[serde(rename = "paneId")]
        pane_id: u16,
        reason: String,
    },
    Focus {
        #[serde(rename = "paneId")]
        pane_id: u16,
    },
    Hello {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(default, rename = "themeFg")]
        theme_fg: Option<[u8; 3]>,
        #[serde(default, rename = "themeBg")]
        theme_bg: Option<[u8; 3]>,
        #[serde(default)]
        token: Option<String>,
    },
    RequestMaster {},
    NewWindow {
        #[serde(default, rename = "templateId")]
        template_id: Option<String>,
    },
    CloseWindow {
        #[serde(rename = "windowId")]
        window_id: u16,
    },
    ClosePane {
        #[serde(rename = "paneId")]
        pane_id: u16,
    },
    SetLayout {
        #[serde(rename = "windowId")]
        window_id: u16,
        #[serde(rename = "templateId")]
        template_id: String,
    },
    SwapPanes {
        #[serde(rename = "windowId")]
        window_id: u16,
        #[serde(rename = "paneId1")]
        pane_id1: u16,
        #[serde(rename = "paneId2")]
        pane_id2: u16,
    },
    ResizeLayout {
        #[serde(rename = "windowId")]
        window_id: u16,
        nodes: LayoutNode,
    },
    Mouse {
        #[serde(rename = "paneId")]
        pane_id: u16,
        button: u8,
        x: u16,
        y: u16,
        #[serde(default, rename = "pxPy")]
        px_py: Option<(u16, u16)>,
        state: String,
        modifiers: u8,
        timestamp: u64,
    },
    SelectAll {
        #[serde(rename = "paneId")]
        pane_id: u16,
    },
    ClearSelection {
        #[serde(rename = "paneId")]
        pane_id: u16,
    },
    ClipboardResponse {
        #[serde(rename = "paneId")]
        pane_id: u16,
        clipboard: char,
        data: String,
    },
    ClipboardSet {
        clipboard: char,
        data: String,
    },
    Copy {
        #[serde(rename = "paneId")]
        pane_id: u16,
    },
    ClipboardPaste {
        #[serde(rename = "paneId")]
        pane_id: u16,
        clipboard: char,
    },
    #[serde(other)]
    Unknown,
}

/// Wire-friendly projection of [`TerminalModes`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireModes {
    pub alt_screen: bool,
    pub bracketed_paste: bool,
    pub app_cursor_keys: bool,
    pub sync_output: bool,
    pub mouse: String,
    pub mouse_motion: bool,
}

impl From<TerminalModes> for WireModes {
    fn from(modes: TerminalModes) -> Self {
        let mouse = match modes.mouse {
            MouseMode::Off => "off",
            MouseMode::X10 => "x10",
            MouseMode::Utf8 => "utf8",
            MouseMode::Sgr => "sgr",
            MouseMode::Urxvt => "urxvt",
            MouseMode::SgrPixels => "sgr_pixels",
        };
        Self {
            alt_screen: modes.alt_screen,
            bracketed_paste: modes.bracketed_paste,
            app_cursor_keys: modes.app_cursor_keys,
            sync_output: modes.sync_output,
            mouse: mouse.to_string(),
            mouse_motion: modes.mouse_motion,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDirtyRow {
    pub row: u16,
    pub cells: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot {
        pane_id: u16,
        cols: u16,
        rows: u16,
        cursor: CursorPosition,
        modes: WireModes,
        generation: u64,
        cells: Vec<u8>,
    },
    Delta {
        pane_id: u16,
        from_gen: u64,
        to_gen: u64,
        rows: Vec<WireDirtyRow>,
    },
    Title {
        pane_id: u16,
        title: String,
    },
    Bell {
        pane_id: u16,
    },
    Toast {
        pane_id: u16,
        title: String,
        body: String,
    },
    Progress {
        pane_id: u16,
        state: u8,
        value: u8,
    },
    Layout {
        window_id: u16,
        template_id: Option<String>,
        nodes: LayoutNode,
    },
    MasterChanged {
        master_id: Option<String>,
    },
    Clipboard {
        op: String,
        kind: char,
        data: String,
    },
    ShellIntegration {
        pane_id: u16,
        event: String,
        exit_code: Option<i32>,
    },
    SelectionCleared {
        pane_id: u16,
    },
    Pong {},
}

/// Payloads over this size are Snappy-compressed before the compression
/// flag byte is set.
const COMPRESSION_THRESHOLD: usize = 512;

pub struct MessageCodec;

impl MessageCodec {
    pub fn decode_client_text(text: &str) -> CoreResult<ClientMessage> {
        serde_json::from_str(text).map_err(|e| CoreError::Decode(format!("text decode: {e}")))
    }

    pub fn decode_client_binary(bytes: &[u8]) -> CoreResult<ClientMessage> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Decode(format!("binary decode: {e}")))
    }

    /// Encode a server message as `[compression_flag][payload]`, where
    /// `payload` is a MessagePack-encoded map with a `type` tag, Snappy
    /// compressed when larger than [`COMPRESSION_THRESHOLD`].
    pub fn encode_server(msg: &ServerMessage) -> CoreResult<Vec<u8>> {
        let payload = rmp_serde::to_vec_named(msg)
            .map_err(|e| CoreError::Decode(format!("binary encode: {e}")))?;
        if payload.len() > COMPRESSION_THRESHOLD {
            let compressed = snap::raw::Encoder::new()
                .compress_vec(&payload)
                .map_err(|e| CoreError::Decode(format!("snappy compress: {e}")))?;
            let mut out = Vec::with_capacity(compressed.len() + 1);
            out.push(1u8);
            out.extend_from_slice(&compressed);
            Ok(out)
        } else {
            let mut out = Vec::with_capacity(payload.len() + 1);
            out.push(0u8);
            out.extend_from_slice(&payload);
            Ok(out)
        }
    }

    /// Decode a server frame produced by [`Self::encode_server`]. Exposed
    /// for round-trip tests and any tooling that needs to read the wire
    /// format back.
    pub fn decode_server(bytes: &[u8]) -> CoreResult<ServerMessage> {
        let (&flag, rest) = bytes
            .split_first()
            .ok_or_else(|| CoreError::Decode("empty server frame".into()))?;
        let raw = match flag {
            0 => rest.to_vec(),
            1 => snap::raw::Decoder::new()
                .decompress_vec(rest)
                .map_err(|e| CoreError::Decode(format!("snappy decompress: {e}")))?,
            other => return Err(CoreError::Decode(format!("unknown compression flag {other}"))),
        };
        rmp_serde::from_slice(&raw).map_err(|e| CoreError::Decode(format!("binary decode: {e}")))
    }
}
