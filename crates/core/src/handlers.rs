// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch for inbound `ClientMessage`s: authorization policy, key/mouse
//! encoding, layout mutation, and clipboard handling.

use crate::auth::{AuthStore, Role};
use crate::clipboard::{decode_base64, encode_base64, ClipboardRegister, ClipboardRegisters};
use crate::client::ClientState;
use crate::codec::ClientMessage;
use crate::config::{MAX_DIMENSION, MIN_DIMENSION};
use crate::error::{ClientError, CoreResult};
use crate::layout::{self, LayoutDatabase};
use crate::session::Session;
use crate::terminal::MouseMode;

/// Messages only the master may issue (§4.8).
fn is_master_only(msg: &ClientMessage) -> bool {
    matches!(
        msg,
        ClientMessage::Resize { .. }
            | ClientMessage::NewWindow { .. }
            | ClientMessage::CloseWindow { .. }
            | ClientMessage::ClosePane { .. }
            | ClientMessage::SetLayout { .. }
            | ClientMessage::SwapPanes { .. }
            | ClientMessage::ResizeLayout { .. }
    )
}

/// Translate a named key, already resolved for the pane's application-cursor-key
/// mode, to its terminal escape sequence. Ctrl/Alt are folded in by the
/// caller via [`encode_key_with_modifiers`]; this table only knows plain keys.
fn encode_named_key(name: &str, app_cursor_keys: bool) -> Option<Vec<u8>> {
    let lower = name.to_lowercase();
    let bytes: Vec<u8> = match lower.as_str() {
        "enter" | "return" => b"\r".to_vec(),
        "tab" => b"\t".to_vec(),
        "escape" | "esc" => b"\x1b".to_vec(),
        "backspace" => b"\x7f".to_vec(),
        "delete" | "del" => b"\x1b[3~".to_vec(),
        "insert" => b"\x1b[2~".to_vec(),
        "pageup" | "page_up" => b"\x1b[5~".to_vec(),
        "pagedown" | "page_down" => b"\x1b[6~".to_vec(),
        "up" => arrow_seq('A', app_cursor_keys),
        "down" => arrow_seq('B', app_cursor_keys),
        "right" => arrow_seq('C', app_cursor_keys),
        "left" => arrow_seq('D', app_cursor_keys),
        "home" => arrow_seq('H', app_cursor_keys),
        "end" => arrow_seq('F', app_cursor_keys),
        "f1" => b"\x1bOP".to_vec(),
        "f2" => b"\x1bOQ".to_vec(),
        "f3" => b"\x1bOR".to_vec(),
        "f4" => b"\x1bOS".to_vec(),
        "f5" => b"\x1b[15~".to_vec(),
        "f6" => b"\x1b[17~".to_vec(),
        "f7" => b"\x1b[18~".to_vec(),
        "f8" => b"\x1b[19~".to_vec(),
        "f9" => b"\x1b[20~".to_vec(),
        "f10" => b"\x1b[21~".to_vec(),
        "f11" => b"\x1b[23~".to_vec(),
        "f12" => b"\x1b[24~".to_vec(),
        "space" => b" ".to_vec(),
        _ => return None,
    };
    Some(bytes)
}

fn arrow_seq(letter: char, app_cursor_keys: bool) -> Vec<u8> {
    let intro = if app_cursor_keys { "\x1bO" } else { "\x1b[" };
    format!("{intro}{letter}").into_bytes()
}

/// Full key encoding: modifier-only keys produce nothing, Ctrl+letter maps
/// to C0, Alt prefixes with ESC, Ctrl/Alt combined with an arrow/Home/End
/// uses the `CSI 1;m <letter>` modifier form (§4.8).
pub fn encode_key_with_modifiers(
    key: &str,
    ctrl: bool,
    alt: bool,
    shift: bool,
    app_cursor_keys: bool,
) -> Option<Vec<u8>> {
    if is_modifier_only(key) {
        return None;
    }

    let arrow_letter = match key.to_lowercase().as_str() {
        "up" => Some('A'),
        "down" => Some('B'),
        "right" => Some('C'),
        "left" => Some('D'),
        "home" => Some('H'),
        "end" => Some('F'),
        _ => None,
    };
    if let Some(letter) = arrow_letter {
        if ctrl || alt || shift {
            let m = 1 + (shift as u8) + 2 * (alt as u8) + 4 * (ctrl as u8);
            return Some(format!("\x1b[1;{m}{letter}").into_bytes());
        }
        return Some(arrow_seq(letter, app_cursor_keys));
    }

    if ctrl && key.chars().count() == 1 {
        let ch = key.chars().next()?;
        if ch.is_ascii_alphabetic() {
            return Some(vec![(ch.to_ascii_uppercase() as u8) & 0x1f]);
        }
    }

    let base = if key.chars().count() == 1 {
        key.as_bytes().to_vec()
    } else {
        encode_named_key(key, app_cursor_keys)?
    };

    if alt {
        let mut out = vec![0x1b];
        out.extend_from_slice(&base);
        Some(out)
    } else {
        Some(base)
    }
}

fn is_modifier_only(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "shift" | "control" | "ctrl" | "alt" | "meta" | "super"
    )
}

/// Wrap pasted/typed text per DECSET 2004 if the pane has bracketed paste
/// enabled.
pub fn wrap_bracketed_paste(data: &[u8], bracketed: bool) -> Vec<u8> {
    if !bracketed {
        return data.to_vec();
    }
    let mut out = Vec::with_capacity(data.len() + 12);
    out.extend_from_slice(b"\x1b[200~");
    out.extend_from_slice(data);
    out.extend_from_slice(b"\x1b[201~");
    out
}

/// Encode a mouse event into the pane's negotiated reporting format.
/// Returns `None` when the event should be filtered (X10 press-only, no
/// motion-enable for drag events).
pub fn encode_mouse_event(
    mode: MouseMode,
    motion_enabled: bool,
    button: u8,
    x: u16,
    y: u16,
    is_motion: bool,
    is_release: bool,
) -> Option<Vec<u8>> {
    if is_motion && !motion_enabled {
        return None;
    }
    match mode {
        MouseMode::Off => None,
        MouseMode::X10 => {
            if is_release {
                return None;
            }
            let cb = 32 + button;
            let cx = (x + 1).min(223) as u8 + 32;
            let cy = (y + 1).min(223) as u8 + 32;
            Some(vec![0x1b, b'[', b'M', cb, cx, cy])
        }
        MouseMode::Utf8 => {
            if is_release {
                return None;
            }
            let cb = 32 + button;
            let mut out = vec![0x1b, b'[', b'M', cb];
            encode_utf8_coord(&mut out, x + 1);
            encode_utf8_coord(&mut out, y + 1);
            Some(out)
        }
        MouseMode::Sgr | MouseMode::SgrPixels => {
            let cb = if is_motion { button + 32 } else { button };
            let suffix = if is_release { 'm' } else { 'M' };
            Some(format!("\x1b[<{cb};{};{}{suffix}", x + 1, y + 1).into_bytes())
        }
        MouseMode::Urxvt => {
            let cb = 32 + button;
            Some(format!("\x1b[{cb};{};{}M", x + 1, y + 1).into_bytes())
        }
    }
}

fn encode_utf8_coord(out: &mut Vec<u8>, coord: u16) {
    let value = (coord + 32).min(0x7ff);
    let mut buf = [0u8; 4];
    let encoded = char::from_u32(value as u32)
        .unwrap_or(' ')
        .encode_utf8(&mut buf);
    out.extend_from_slice(encoded.as_bytes());
}

pub struct MessageHandlers<'a> {
    pub session: &'a mut Session,
    pub layouts: &'a LayoutDatabase,
    pub clipboard: &'a mut ClipboardRegisters,
    pub auth: &'a AuthStore,
}

impl<'a> MessageHandlers<'a> {
    /// Authorization gate: `hello` always passes; everything else requires
    /// an authenticated sender, and master-only messages additionally
    /// require `client.client_id == master_id`.
    pub fn authorize(
        msg: &ClientMessage,
        client: &ClientState,
        master_id: Option<&str>,
    ) -> Result<(), ClientError> {
        if matches!(msg, ClientMessage::Hello { .. }) {
            return Ok(());
        }
        if !client.authenticated {
            return Err(ClientError::Unauthorized);
        }
        if is_master_only(msg) {
            let is_master = client.client_id.as_deref() == master_id && master_id.is_some();
            if !is_master {
                return Err(ClientError::NotMaster);
            }
        }
        Ok(())
    }

    pub fn handle_resize(&mut self, pane_id: u16, cols: u16, rows: u16) -> CoreResult<()> {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&cols)
            || !(MIN_DIMENSION..=MAX_DIMENSION).contains(&rows)
        {
            return Err(crate::error::CoreError::DimensionsOutOfRange { cols, rows });
        }
        self.session.registry.get_mut(pane_id)?.resize(cols, rows)?;
        Ok(())
    }

    /// Grow the window to the template's pane-slot count (creating shell
    /// panes as needed) before adopting the layout; shrinking leaves extra
    /// panes resident but unrendered.
    pub fn handle_set_layout(
        &mut self,
        window_id: u16,
        template_id: &str,
        shell_command: &[String],
    ) -> CoreResult<()> {
        let template = self.layouts.get(template_id)?.clone();
        let wanted = layout::count_panes(&template);
        let (cols, rows) = {
            let window = self.session.get_window(window_id)?;
            let first_pane = window.pane_ids()[0];
            self.session.registry.get(first_pane)?.size()
        };
        while self.session.get_window(window_id)?.pane_ids().len() < wanted {
            let new_pane = self.session.registry.create_shell_pane(shell_command, cols, rows)?;
            self.session.get_window_mut(window_id)?.add_pane(new_pane);
        }
        self.session
            .get_window_mut(window_id)?
            .set_layout_from_template(template_id.to_string(), &template);
        Ok(())
    }

    pub fn handle_resize_layout(
        &mut self,
        window_id: u16,
        nodes: &crate::layout::LayoutNode,
    ) -> CoreResult<()> {
        self.session.get_window_mut(window_id)?.resize_layout(nodes)
    }

    pub fn handle_swap_panes(&mut self, window_id: u16, a: u16, b: u16) -> CoreResult<bool> {
        Ok(self.session.get_window_mut(window_id)?.swap_pane_positions(a, b))
    }

    pub fn handle_close_window(&mut self, window_id: u16) -> CoreResult<()> {
        self.session.close_window(window_id)
    }

    /// Rejects closing the last pane of the last window (§8 boundary
    /// behavior); otherwise destroys the pane and removes it from its
    /// window.
    pub fn handle_close_pane(&mut self, pane_id: u16) -> CoreResult<()> {
        let window_id = self
            .session
            .windows()
            .find(|w| w.pane_ids().contains(&pane_id))
            .map(|w| w.id)
            .ok_or(crate::error::CoreError::NotFound("pane", pane_id))?;
        let window = self.session.get_window_mut(window_id)?;
        if window.pane_ids().len() <= 1 && self.session.window_count() <= 1 {
            return Err(crate::error::CoreError::LayoutInvalid(
                "cannot close the last pane of the last window".into(),
            ));
        }
        if window.pane_ids().len() <= 1 {
            self.session.close_window(window_id)?;
        } else {
            self.session.get_window_mut(window_id)?.remove_pane(pane_id);
            self.session.registry.destroy(pane_id);
        }
        Ok(())
    }

    /// `focus`: change the active window's active pane, writing synthetic
    /// DECSET-1004 focus-out (`ESC [ O`) to the previously active pane's
    /// PTY and focus-in (`ESC [ I`) to the newly active one's.
    pub fn handle_focus(&mut self, window_id: u16, pane_id: u16) -> CoreResult<bool> {
        let previous = self.session.get_window(window_id)?.active_pane_id();
        let changed = self.session.get_window_mut(window_id)?.set_active_pane(pane_id);
        if changed && previous != pane_id {
            if let Ok(old_pane) = self.session.registry.get_mut(previous) {
                let _ = old_pane.write_input(b"\x1b[O");
            }
            if let Ok(new_pane) = self.session.registry.get_mut(pane_id) {
                let _ = new_pane.write_input(b"\x1b[I");
            }
        }
        Ok(changed)
    }

    /// `copy`: read selection text from a pane into the system register.
    pub fn handle_copy(&mut self, pane_id: u16) -> CoreResult<Option<String>> {
        let pane = self.session.registry.get(pane_id)?;
        let Some(text) = pane.get_selection_text() else {
            return Ok(None);
        };
        let encoded = encode_base64(text.as_bytes());
        self.clipboard.set(ClipboardRegister::System, text.into_bytes());
        Ok(Some(encoded))
    }

    pub fn handle_clipboard_set(&mut self, clipboard: char, data: &str) -> CoreResult<()> {
        let reg = ClipboardRegister::from_char(clipboard);
        self.clipboard.set_base64(reg, data)?;
        Ok(())
    }

    /// `clipboard_paste`: write the chosen register's bytes into the PTY,
    /// bracketed if the pane has bracketed-paste enabled.
    pub fn handle_clipboard_paste(&mut self, pane_id: u16, clipboard: char) -> CoreResult<()> {
        let reg = ClipboardRegister::from_char(clipboard);
        let Some(bytes) = self.clipboard.get(reg).map(|b| b.to_vec()) else {
            return Ok(());
        };
        let pane = self.session.registry.get_mut(pane_id)?;
        let bracketed = pane.modes().bracketed_paste;
        pane.write_input(&wrap_bracketed_paste(&bytes, bracketed))
    }

    /// OSC-52 SET observed from PTY output: decode and store, returning the
    /// register/base64 pair to broadcast.
    pub fn handle_pty_clipboard_set(
        &mut self,
        reg: char,
        base64_payload: &str,
    ) -> CoreResult<(ClipboardRegister, String)> {
        let register = ClipboardRegister::from_char(reg);
        let decoded = decode_base64(base64_payload)?;
        self.clipboard.set(register, decoded);
        Ok((register, base64_payload.to_string()))
    }

    /// `request_master`: validate the caller's retained token. The event
    /// loop promotes the caller and broadcasts `master_changed` for both
    /// the outgoing and incoming master when this returns `Role::Master`.
    pub fn handle_request_master(&self, token: Option<&str>) -> Role {
        match token {
            Some(t) => self.auth.validate(t),
            None => Role::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_letter_maps_to_c0() {
        let bytes = encode_key_with_modifiers("c", true, false, false, false).unwrap();
        assert_eq!(bytes, vec![0x03]);
    }

    #[test]
    fn alt_prefixes_with_escape() {
        let bytes = encode_key_with_modifiers("x", false, true, false, false).unwrap();
        assert_eq!(bytes, vec![0x1b, b'x']);
    }

    #[test]
    fn modifier_only_key_produces_nothing() {
        assert!(encode_key_with_modifiers("shift", false, false, true, false).is_none());
    }

    #[test]
    fn arrow_respects_application_cursor_keys() {
        let normal = encode_key_with_modifiers("up", false, false, false, false).unwrap();
        let app = encode_key_with_modifiers("up", false, false, false, true).unwrap();
        assert_eq!(normal, b"\x1b[A");
        assert_eq!(app, b"\x1bOA");
    }

    #[test]
    fn ctrl_arrow_uses_modifier_csi_form() {
        let bytes = encode_key_with_modifiers("up", true, false, false, false).unwrap();
        assert_eq!(bytes, b"\x1b[1;5A");
    }

    #[test]
    fn bracketed_paste_wraps_text() {
        let wrapped = wrap_bracketed_paste(b"abc", true);
        assert_eq!(wrapped, b"\x1b[200~abc\x1b[201~");
        assert_eq!(wrap_bracketed_paste(b"abc", false), b"abc");
    }

    #[test]
    fn x10_mouse_filters_release_events() {
        assert!(encode_mouse_event(MouseMode::X10, false, 0, 1, 1, false, true).is_none());
        assert!(encode_mouse_event(MouseMode::X10, false, 0, 1, 1, false, false).is_some());
    }

    #[test]
    fn sgr_mouse_encodes_press_and_release() {
        let press = encode_mouse_event(MouseMode::Sgr, false, 0, 4, 4, false, false).unwrap();
        let release = encode_mouse_event(MouseMode::Sgr, false, 0, 4, 4, false, true).unwrap();
        assert_eq!(press, b"\x1b[<0;5;5M");
        assert_eq!(release, b"\x1b[<0;5;5m");
    }

    #[test]
    fn motion_filtered_without_motion_enable() {
        assert!(encode_mouse_event(MouseMode::Sgr, false, 0, 1, 1, true, false).is_none());
        assert!(encode_mouse_event(MouseMode::Sgr, true, 0, 1, 1, true, false).is_some());
    }

    fn client(authenticated: bool, client_id: Option<&str>) -> ClientState {
        let mut client = ClientState::new(Box::new(crate::test_support::MockFrameChannel::new()));
        client.authenticated = authenticated;
        client.client_id = client_id.map(str::to_string);
        client
    }

    #[test]
    fn hello_passes_authorization_unconditionally() {
        let msg = ClientMessage::Hello {
            client_id: "u-1".to_string(),
            theme_fg: None,
            theme_bg: None,
            token: None,
        };
        let unauth = client(false, None);
        assert!(MessageHandlers::authorize(&msg, &unauth, None).is_ok());
    }

    #[test]
    fn unauthenticated_client_is_rejected_for_non_hello_messages() {
        let msg = ClientMessage::Text { pane_id: 1, data: "hi".to_string() };
        let unauth = client(false, None);
        assert_eq!(MessageHandlers::authorize(&msg, &unauth, None), Err(ClientError::Unauthorized));
    }

    #[test]
    fn master_only_message_requires_matching_master_id() {
        let msg = ClientMessage::Resize { pane_id: 1, cols: 80, rows: 24 };
        let view = client(true, Some("u-2"));
        assert_eq!(
            MessageHandlers::authorize(&msg, &view, Some("u-1")),
            Err(ClientError::NotMaster)
        );

        let master = client(true, Some("u-1"));
        assert!(MessageHandlers::authorize(&msg, &master, Some("u-1")).is_ok());
    }

    #[test]
    fn non_master_only_message_only_needs_authentication() {
        let msg = ClientMessage::Text { pane_id: 1, data: "hi".to_string() };
        let view = client(true, Some("u-2"));
        assert!(MessageHandlers::authorize(&msg, &view, Some("u-1")).is_ok());
    }

    fn session_with_two_panes() -> Session {
        Session::new(&["/bin/true".to_string()], 2, 80, 24).unwrap()
    }

    #[test]
    fn focus_switches_active_pane_and_writes_focus_events_to_both_panes() {
        let mut session = session_with_two_panes();
        let window_id = session.active_window_id();
        let pane_ids: Vec<u16> = session.get_window(window_id).unwrap().pane_ids().to_vec();
        let (first, second) = (pane_ids[0], pane_ids[1]);
        assert_eq!(session.get_window(window_id).unwrap().active_pane_id(), first);

        let layouts = LayoutDatabase::with_builtin_templates();
        let mut clipboard = ClipboardRegisters::new();
        let auth = AuthStore::generate();
        let mut handlers = MessageHandlers {
            session: &mut session,
            layouts: &layouts,
            clipboard: &mut clipboard,
            auth: &auth,
        };

        let changed = handlers.handle_focus(window_id, second).unwrap();
        assert!(changed);
        assert_eq!(
            handlers.session.get_window(window_id).unwrap().active_pane_id(),
            second
        );
    }

    #[test]
    fn focus_on_the_already_active_pane_is_a_no_op() {
        let mut session = session_with_two_panes();
        let window_id = session.active_window_id();
        let active = session.get_window(window_id).unwrap().active_pane_id();

        let layouts = LayoutDatabase::with_builtin_templates();
        let mut clipboard = ClipboardRegisters::new();
        let auth = AuthStore::generate();
        let mut handlers = MessageHandlers {
            session: &mut session,
            layouts: &layouts,
            clipboard: &mut clipboard,
            auth: &auth,
        };

        assert!(handlers.handle_focus(window_id, active).unwrap());
        assert_eq!(
            handlers.session.get_window(window_id).unwrap().active_pane_id(),
            active
        );
    }
}
