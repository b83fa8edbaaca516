// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `avt`-backed [`Terminal`] adapter.
//!
//! `avt::Vt` gives us a parsed character grid but no notion of dirty rows,
//! mode flags, or OSC/DECSET side-channel events, so this module scans the
//! raw byte stream alongside feeding it to the emulator, covering the mode
//! and side-channel surface the grid alone doesn't expose.

use std::collections::BTreeSet;

use crate::terminal::{
    CursorPosition, MouseMode, ShellEventKind, Terminal, TerminalEvents, TerminalModes,
    TerminalSnapshot, BYTES_PER_CELL,
};

/// DECSET/DECRST pair for a single private mode.
struct DecMode {
    on: &'static [u8],
    off: &'static [u8],
}

const ALT_SCREEN: DecMode = DecMode {
    on: b"\x1b[?1049h",
    off: b"\x1b[?1049l",
};
const SYNC_OUTPUT: DecMode = DecMode {
    on: b"\x1b[?2026h",
    off: b"\x1b[?2026l",
};
const BRACKETED_PASTE: DecMode = DecMode {
    on: b"\x1b[?2004h",
    off: b"\x1b[?2004l",
};
const APP_CURSOR_KEYS: DecMode = DecMode {
    on: b"\x1b[?1h",
    off: b"\x1b[?1l",
};
const CURSOR_VISIBLE: DecMode = DecMode {
    on: b"\x1b[?25h",
    off: b"\x1b[?25l",
};
const MOUSE_X10: DecMode = DecMode {
    on: b"\x1b[?1000h",
    off: b"\x1b[?1000l",
};
const MOUSE_BUTTON_EVENT: DecMode = DecMode {
    on: b"\x1b[?1002h",
    off: b"\x1b[?1002l",
};
const MOUSE_ANY_EVENT: DecMode = DecMode {
    on: b"\x1b[?1003h",
    off: b"\x1b[?1003l",
};
const MOUSE_UTF8: DecMode = DecMode {
    on: b"\x1b[?1005h",
    off: b"\x1b[?1005l",
};
const MOUSE_SGR: DecMode = DecMode {
    on: b"\x1b[?1006h",
    off: b"\x1b[?1006l",
};
const MOUSE_URXVT: DecMode = DecMode {
    on: b"\x1b[?1015h",
    off: b"\x1b[?1015l",
};
const MOUSE_SGR_PIXELS: DecMode = DecMode {
    on: b"\x1b[?1016h",
    off: b"\x1b[?1016l",
};

/// Longest fixed DEC mode pattern in bytes (`\x1b[?1049h`), used to size the
/// cross-call bridging buffer.
const MAX_DEC_PATTERN: usize = 8;

fn scan_dec_mode(data: &[u8], mode: &DecMode, flag: &mut bool) {
    if data.len() >= mode.on.len() && data.windows(mode.on.len()).any(|w| w == mode.on) {
        *flag = true;
    }
    if data.len() >= mode.off.len() && data.windows(mode.off.len()).any(|w| w == mode.off) {
        *flag = false;
    }
}

/// Encoding selected by the last of OSC 1005/1006/1015/1016 to toggle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MouseEncoding {
    #[default]
    X10,
    Utf8,
    Sgr,
    Urxvt,
    SgrPixels,
}

fn incomplete_utf8_tail_len(data: &[u8]) -> usize {
    let len = data.len();
    for i in 1..=len.min(3) {
        let byte = data[len - i];
        if byte < 0x80 {
            return 0;
        }
        if byte >= 0xC0 {
            let expected = if byte < 0xE0 {
                2
            } else if byte < 0xF0 {
                3
            } else {
                4
            };
            return if i < expected { i } else { 0 };
        }
    }
    0
}

/// Parsed OSC escape: `\x1b]{code};{payload}` terminated by BEL or ST.
struct OscSeq {
    code: String,
    payload: String,
}

/// Scan `data` for complete OSC sequences (`\x1b]...BEL` or `\x1b]...ST`).
/// Returns the parsed sequences and the byte offset at which an
/// unterminated trailing OSC sequence begins, if any.
fn scan_osc(data: &[u8]) -> (Vec<OscSeq>, Option<usize>) {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < data.len() {
        if data[i] == 0x1b && data[i + 1] == b']' {
            let body_start = i + 2;
            let mut end = None;
            let mut j = body_start;
            while j < data.len() {
                if data[j] == 0x07 {
                    end = Some((j, j + 1));
                    break;
                }
                if data[j] == 0x1b && j + 1 < data.len() && data[j + 1] == b'\\' {
                    end = Some((j, j + 2));
                    break;
                }
                j += 1;
            }
            match end {
                Some((body_end, next)) => {
                    let body = String::from_utf8_lossy(&data[body_start..body_end]);
                    if let Some((code, payload)) = body.split_once(';') {
                        out.push(OscSeq {
                            code: code.to_string(),
                            payload: payload.to_string(),
                        });
                    } else if !body.is_empty() {
                        out.push(OscSeq {
                            code: body.to_string(),
                            payload: String::new(),
                        });
                    }
                    i = next;
                }
                None => return (out, Some(i)),
            }
        } else {
            i += 1;
        }
    }
    (out, None)
}

fn apply_osc(seq: &OscSeq, events: &mut TerminalEvents) {
    match seq.code.as_str() {
        "0" | "2" => events.title_changed = Some(seq.payload.clone()),
        "9" => events.notification = Some((String::new(), seq.payload.clone())),
        "777" => {
            if let Some(rest) = seq.payload.strip_prefix("notify;") {
                let mut parts = rest.splitn(2, ';');
                let title = parts.next().unwrap_or_default().to_string();
                let body = parts.next().unwrap_or_default().to_string();
                events.notification = Some((title, body));
            }
        }
        "52" => {
            let mut parts = seq.payload.splitn(2, ';');
            let reg = parts
                .next()
                .and_then(|s| s.chars().next())
                .unwrap_or('c');
            if let Some(data) = parts.next() {
                if data == "?" {
                    events.clipboard_get = Some(reg);
                } else {
                    events.clipboard_set = Some((reg, data.to_string()));
                }
            }
        }
        "133" => {
            let mut parts = seq.payload.splitn(2, ';');
            match parts.next() {
                Some("A") => events.shell_event = Some(ShellEventKind::PromptStart),
                Some("B") => events.shell_event = Some(ShellEventKind::PromptEnd),
                Some("C") => events.shell_event = Some(ShellEventKind::OutputStart),
                Some("D") => {
                    let exit_code = parts.next().and_then(|s| s.parse::<i32>().ok());
                    events.shell_event = Some(ShellEventKind::CommandEnd { exit_code });
                }
                _ => {}
            }
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    start: (u16, u16),
    end: (u16, u16),
    rectangular: bool,
}

pub struct AvtTerminal {
    vt: avt::Vt,
    generation: u64,
    dirty_rows: BTreeSet<u16>,
    last_lines: Vec<String>,
    alt_screen: bool,
    sync_output: bool,
    bracketed_paste: bool,
    app_cursor_keys: bool,
    cursor_visible: bool,
    mouse_basic: bool,
    mouse_button_event: bool,
    mouse_any_event: bool,
    mouse_encoding: MouseEncoding,
    theme_fg: Option<[u8; 3]>,
    theme_bg: Option<[u8; 3]>,
    selection: Option<Selection>,
    utf8_buf: [u8; 3],
    utf8_buf_len: u8,
    dec_bridge: [u8; MAX_DEC_PATTERN - 1],
    dec_bridge_len: u8,
    osc_carry: Vec<u8>,
}

/// OSC carry-over is capped; a title longer than this is simply dropped
/// rather than grown without bound.
const OSC_CARRY_CAP: usize = 4096;

impl AvtTerminal {
    pub fn new(cols: u16, rows: u16) -> Self {
        let vt = avt::Vt::new(cols as usize, rows as usize);
        let last_lines = vt.view().map(|line| line.text()).collect();
        Self {
            vt,
            generation: 0,
            dirty_rows: BTreeSet::new(),
            last_lines,
            alt_screen: false,
            sync_output: false,
            bracketed_paste: false,
            app_cursor_keys: false,
            cursor_visible: true,
            mouse_basic: false,
            mouse_button_event: false,
            mouse_any_event: false,
            mouse_encoding: MouseEncoding::X10,
            theme_fg: None,
            theme_bg: None,
            selection: None,
            utf8_buf: [0; 3],
            utf8_buf_len: 0,
            dec_bridge: [0; MAX_DEC_PATTERN - 1],
            dec_bridge_len: 0,
            osc_carry: Vec::new(),
        }
    }

    fn scan_modes(&mut self, region: &[u8]) {
        scan_dec_mode(region, &ALT_SCREEN, &mut self.alt_screen);
        scan_dec_mode(region, &SYNC_OUTPUT, &mut self.sync_output);
        scan_dec_mode(region, &BRACKETED_PASTE, &mut self.bracketed_paste);
        scan_dec_mode(region, &APP_CURSOR_KEYS, &mut self.app_cursor_keys);
        scan_dec_mode(region, &CURSOR_VISIBLE, &mut self.cursor_visible);
        scan_dec_mode(region, &MOUSE_X10, &mut self.mouse_basic);
        scan_dec_mode(region, &MOUSE_BUTTON_EVENT, &mut self.mouse_button_event);
        scan_dec_mode(region, &MOUSE_ANY_EVENT, &mut self.mouse_any_event);

        let mut utf8 = self.mouse_encoding == MouseEncoding::Utf8;
        let mut sgr = self.mouse_encoding == MouseEncoding::Sgr;
        let mut urxvt = self.mouse_encoding == MouseEncoding::Urxvt;
        let mut sgr_pixels = self.mouse_encoding == MouseEncoding::SgrPixels;
        scan_dec_mode(region, &MOUSE_UTF8, &mut utf8);
        scan_dec_mode(region, &MOUSE_SGR, &mut sgr);
        scan_dec_mode(region, &MOUSE_URXVT, &mut urxvt);
        scan_dec_mode(region, &MOUSE_SGR_PIXELS, &mut sgr_pixels);
        self.mouse_encoding = if sgr_pixels {
            MouseEncoding::SgrPixels
        } else if urxvt {
            MouseEncoding::Urxvt
        } else if sgr {
            MouseEncoding::Sgr
        } else if utf8 {
            MouseEncoding::Utf8
        } else {
            MouseEncoding::X10
        };
    }

    fn diff_dirty_rows(&mut self) {
        let lines: Vec<String> = self.vt.view().map(|line| line.text()).collect();
        for (row, (old, new)) in self.last_lines.iter().zip(lines.iter()).enumerate() {
            if old != new {
                self.dirty_rows.insert(row as u16);
            }
        }
        if lines.len() != self.last_lines.len() {
            for row in lines.len().min(self.last_lines.len())..lines.len().max(self.last_lines.len())
            {
                self.dirty_rows.insert(row as u16);
            }
        }
        self.last_lines = lines;
    }
}

impl Terminal for AvtTerminal {
    fn feed(&mut self, data: &[u8]) -> TerminalEvents {
        let mut events = TerminalEvents::default();
        if data.is_empty() {
            return events;
        }

        let buf_len = self.utf8_buf_len as usize;
        let owned: Vec<u8>;
        let input: &[u8] = if buf_len == 0 {
            data
        } else {
            owned = [&self.utf8_buf[..buf_len], data].concat();
            self.utf8_buf_len = 0;
            &owned
        };

        let bridge_len = self.dec_bridge_len as usize;
        if bridge_len > 0 {
            let take = input.len().min(MAX_DEC_PATTERN);
            let mut bridge = [0u8; 2 * MAX_DEC_PATTERN - 1];
            bridge[..bridge_len].copy_from_slice(&self.dec_bridge[..bridge_len]);
            bridge[bridge_len..bridge_len + take].copy_from_slice(&input[..take]);
            self.scan_modes(&bridge[..bridge_len + take]);
        }
        self.scan_modes(input);

        let tail_len = input.len().min(MAX_DEC_PATTERN - 1);
        self.dec_bridge[..tail_len].copy_from_slice(&input[input.len() - tail_len..]);
        self.dec_bridge_len = tail_len as u8;

        let osc_input: Vec<u8>;
        let osc_region: &[u8] = if self.osc_carry.is_empty() {
            input
        } else {
            let mut combined = std::mem::take(&mut self.osc_carry);
            combined.extend_from_slice(input);
            osc_input = combined;
            &osc_input
        };
        let (seqs, carry_start) = scan_osc(osc_region);
        for seq in &seqs {
            apply_osc(seq, &mut events);
        }
        if let Some(start) = carry_start {
            let carry = &osc_region[start..];
            if carry.len() <= OSC_CARRY_CAP {
                self.osc_carry = carry.to_vec();
            }
        }
        if events.title_changed.is_none()
            && events.notification.is_none()
            && events.clipboard_set.is_none()
            && events.clipboard_get.is_none()
            && events.shell_event.is_none()
        {
            // BEL outside any OSC terminator rings the bell.
            events.bell = input.contains(&0x07) && seqs.is_empty() && carry_start.is_none();
        }

        let tail = incomplete_utf8_tail_len(input);
        let (to_feed, to_buffer) = input.split_at(input.len() - tail);
        if !to_buffer.is_empty() {
            self.utf8_buf[..to_buffer.len()].copy_from_slice(to_buffer);
            self.utf8_buf_len = to_buffer.len() as u8;
        }
        if !to_feed.is_empty() {
            let s = String::from_utf8_lossy(to_feed);
            let _ = self.vt.feed_str(&s);
        }

        self.diff_dirty_rows();
        self.generation += 1;
        events
    }

    fn resize(&mut self, cols: u16, rows: u16) -> bool {
        let (old_cols, old_rows) = self.vt.size();
        if old_cols == cols as usize && old_rows == rows as usize {
            return false;
        }
        let _ = self.vt.resize(cols as usize, rows as usize);
        self.last_lines = self.vt.view().map(|line| line.text()).collect();
        for row in 0..rows {
            self.dirty_rows.insert(row);
        }
        self.generation += 1;
        true
    }

    fn size(&self) -> (u16, u16) {
        let (cols, rows) = self.vt.size();
        (cols as u16, rows as u16)
    }

    fn generation(&self) -> u64 {
        self.generation
    }

    fn cursor(&self) -> CursorPosition {
        let cursor = self.vt.cursor();
        CursorPosition {
            row: cursor.row as u16,
            col: cursor.col as u16,
        }
    }

    fn modes(&self) -> TerminalModes {
        let mouse = if !(self.mouse_basic || self.mouse_button_event || self.mouse_any_event) {
            MouseMode::Off
        } else {
            match self.mouse_encoding {
                MouseEncoding::X10 => MouseMode::X10,
                MouseEncoding::Utf8 => MouseMode::Utf8,
                MouseEncoding::Sgr => MouseMode::Sgr,
                MouseEncoding::Urxvt => MouseMode::Urxvt,
                MouseEncoding::SgrPixels => MouseMode::SgrPixels,
            }
        };
        TerminalModes {
            alt_screen: self.alt_screen,
            bracketed_paste: self.bracketed_paste,
            app_cursor_keys: self.app_cursor_keys,
            sync_output: self.sync_output,
            mouse,
            mouse_motion: self.mouse_button_event || self.mouse_any_event,
            cursor_visible: self.cursor_visible,
        }
    }

    fn dirty_rows(&self) -> Vec<u16> {
        self.dirty_rows.iter().copied().collect()
    }

    fn clear_dirty(&mut self) {
        self.dirty_rows.clear();
    }

    fn min_visible_row(&self) -> u64 {
        0
    }

    fn snapshot(&self) -> TerminalSnapshot {
        let (cols, rows) = self.size();
        let cell_rows = (0..rows).map(|r| self.row_cells(r)).collect();
        TerminalSnapshot {
            cols,
            rows,
            cursor: self.cursor(),
            modes: self.modes(),
            generation: self.generation,
            cell_rows,
            theme_fg: self.theme_fg,
            theme_bg: self.theme_bg,
        }
    }

    fn row_cells(&self, row: u16) -> Vec<u8> {
        let (cols, _) = self.size();
        let text = self
            .last_lines
            .get(row as usize)
            .cloned()
            .unwrap_or_default();
        let mut out = Vec::with_capacity(cols as usize * BYTES_PER_CELL);
        let mut chars = text.chars();
        for _ in 0..cols {
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

    fn scroll(&mut self, _delta: i32) {
        // avt has no scrollback buffer today; panes without scrollback are
        // a no-op per the `Terminal` contract.
    }

    fn start_selection(&mut self, x: u16, y: u16) {
        self.selection = Some(Selection {
            start: (x, y),
            end: (x, y),
            rectangular: false,
        });
    }

    fn update_selection(&mut self, x: u16, y: u16, rectangular: bool) {
        if let Some(sel) = self.selection.as_mut() {
            sel.end = (x, y);
            sel.rectangular = rectangular;
        }
    }

    fn end_selection(&mut self) {}

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn select_all(&mut self) {
        let (cols, rows) = self.size();
        self.selection = Some(Selection {
            start: (0, 0),
            end: (cols.saturating_sub(1), rows.saturating_sub(1)),
            rectangular: false,
        });
    }

    fn selection_text(&self) -> Option<String> {
        let sel = self.selection?;
        let ((x0, y0), (x1, y1)) = order_selection(sel);
        let mut out = String::new();
        for row in y0..=y1 {
            let line = self.last_lines.get(row as usize)?;
            let chars: Vec<char> = line.chars().collect();
            let (from, to) = if sel.rectangular {
                (x0 as usize, x1 as usize)
            } else if row == y0 && row == y1 {
                (x0 as usize, x1 as usize)
            } else if row == y0 {
                (x0 as usize, chars.len().saturating_sub(1))
            } else if row == y1 {
                (0, x1 as usize)
            } else {
                (0, chars.len().saturating_sub(1))
            };
            let to = to.min(chars.len().saturating_sub(1));
            if from <= to {
                out.extend(chars[from..=to].iter());
            }
            if row != y1 {
                out.push('\n');
            }
        }
        Some(out)
    }

    fn is_selection_at_start(&self, x: u16, y: u16) -> bool {
        self.selection
            .map(|sel| sel.start == (x, y))
            .unwrap_or(false)
    }
}

fn order_selection(sel: Selection) -> ((u16, u16), (u16, u16)) {
    if sel.start.1 < sel.end.1 || (sel.start.1 == sel.end.1 && sel.start.0 <= sel.end.0) {
        (sel.start, sel.end)
    } else {
        (sel.end, sel.start)
    }
}
