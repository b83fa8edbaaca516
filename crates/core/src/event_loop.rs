// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single-threaded reactor: readiness poll, fixed dispatch order
//! (IPC, accept, clients reverse-index, PTYs), per-tick timeout
//! reconciliation. Never spawns a thread, never blocks except in
//! [`EventLoop::poll_ready`].

use std::collections::HashSet;
use std::os::fd::{BorrowedFd, RawFd};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::auth::{AuthStore, Role};
use crate::broadcaster;
use crate::clipboard::{ClipboardRegister, ClipboardRegisters};
use crate::client::ClientState;
use crate::codec::{MessageCodec, ServerMessage};
use crate::config::RunConfig;
use crate::error::CoreResult;
use crate::frame_channel::{Frame, FrameChannel};
use crate::handlers::{self, MessageHandlers};
use crate::layout::LayoutDatabase;
use crate::session::Session;
use crate::terminal::ShellEventKind;

/// New-connection source. `crates/termd` supplies the concrete adapter
/// (a TCP listener performing the WebSocket upgrade).
pub trait Accept: Send {
    fn as_raw_fd(&self) -> RawFd;
    fn try_accept(&mut self) -> std::io::Result<Option<Box<dyn FrameChannel>>>;
}

/// Admin control-socket source (§6). One request in, one status+payload
/// response out per call; `crates/termd` supplies the concrete
/// Unix-domain-socket adapter.
pub trait IpcChannel: Send {
    fn as_raw_fd(&self) -> RawFd;
    fn try_recv(&mut self) -> std::io::Result<Option<Vec<u8>>>;
    fn respond(&mut self, status: u8, payload: &[u8]) -> std::io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Source {
    Ipc,
    Accept,
    Client(usize),
    Pty(u16),
}

pub struct EventLoop {
    pub session: Session,
    pub clients: Vec<ClientState>,
    pub master_id: Option<String>,
    pub master_theme_fg: Option<[u8; 3]>,
    pub master_theme_bg: Option<[u8; 3]>,
    pub clipboard: ClipboardRegisters,
    pub layouts: LayoutDatabase,
    pub auth: AuthStore,
    pub config: RunConfig,
    pub running: bool,
    accept: Option<Box<dyn Accept>>,
    ipc: Option<Box<dyn IpcChannel>>,
}

impl EventLoop {
    pub fn new(config: RunConfig, auth: AuthStore) -> CoreResult<Self> {
        config.validate()?;
        let session = Session::new(
            &config.shell_command,
            config.initial_panes,
            config.cols,
            config.rows,
        )?;
        Ok(Self {
            session,
            clients: Vec::new(),
            master_id: None,
            master_theme_fg: None,
            master_theme_bg: None,
            clipboard: ClipboardRegisters::new(),
            layouts: LayoutDatabase::with_builtin_templates(),
            auth,
            config,
            running: true,
            accept: None,
            ipc: None,
        })
    }

    pub fn set_accept(&mut self, accept: Box<dyn Accept>) {
        self.accept = Some(accept);
    }

    pub fn set_ipc(&mut self, ipc: Box<dyn IpcChannel>) {
        self.ipc = Some(ipc);
    }

    pub fn request_shutdown(&mut self) {
        self.running = false;
    }

    /// Run one reactor tick. Checked at the top of every call (§5
    /// "shutdown signal checked at the top of every tick").
    pub fn tick(&mut self) -> CoreResult<()> {
        if !self.running {
            return Ok(());
        }
        let ready = self.poll_ready()?;
        self.dispatch_ipc(&ready);
        self.dispatch_accept(&ready);
        self.dispatch_clients(&ready);
        self.dispatch_ptys(&ready);
        self.reconcile_timeouts();
        self.clients.retain(|c| !c.channel.is_closed());
        Ok(())
    }

    #[allow(unsafe_code)]
    fn poll_ready(&mut self) -> CoreResult<HashSet<Source>> {
        let mut poll_fds: Vec<PollFd> = Vec::new();
        let mut sources: Vec<Source> = Vec::new();

        let mk = |fd: RawFd| PollFd::new(unsafe { BorrowedFd::borrow_raw(fd) }, PollFlags::POLLIN);

        if let Some(ipc) = &self.ipc {
            poll_fds.push(mk(ipc.as_raw_fd()));
            sources.push(Source::Ipc);
        }
        if let Some(accept) = &self.accept {
            poll_fds.push(mk(accept.as_raw_fd()));
            sources.push(Source::Accept);
        }
        for (i, client) in self.clients.iter().enumerate() {
            let fd = client.channel.as_raw_fd();
            if fd >= 0 {
                poll_fds.push(mk(fd));
                sources.push(Source::Client(i));
            }
        }
        for pane in self.session.registry.iter() {
            if let Some(fd) = pane.pty_fd() {
                poll_fds.push(mk(fd));
                sources.push(Source::Pty(pane.id));
            }
        }

        match poll(&mut poll_fds, PollTimeout::from(100u16)) {
            Ok(_) => {}
            Err(nix::errno::Errno::EINTR) => return Ok(HashSet::new()),
            Err(e) => return Err(crate::error::CoreError::PtyIo(format!("poll error: {e}"))),
        }

        let mut ready = HashSet::new();
        for (pfd, source) in poll_fds.iter().zip(sources.iter()) {
            if let Some(revents) = pfd.revents() {
                if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR) {
                    ready.insert(*source);
                }
            }
        }
        Ok(ready)
    }

    fn dispatch_ipc(&mut self, ready: &HashSet<Source>) {
        if !ready.contains(&Source::Ipc) {
            return;
        }
        let Some(mut ipc) = self.ipc.take() else { return };
        while let Ok(Some(request)) = ipc.try_recv() {
            let (status, payload) = self.handle_ipc_command(&request);
            let _ = ipc.respond(status, &payload);
        }
        self.ipc = Some(ipc);
    }

    /// §6 control-socket verbs. Status 0 success, 2 argument error, 1
    /// runtime error.
    fn handle_ipc_command(&mut self, request: &[u8]) -> (u8, Vec<u8>) {
        let text = String::from_utf8_lossy(request);
        let mut parts = text.split_whitespace();
        let Some(verb) = parts.next() else {
            return (2, b"missing verb".to_vec());
        };
        match verb {
            "ping" => (0, b"pong".to_vec()),
            "status" => (
                0,
                format!(
                    "panes={} windows={} clients={} master={}",
                    self.session.registry.count(),
                    self.session.window_count(),
                    self.clients.len(),
                    self.master_id.as_deref().unwrap_or("none")
                )
                .into_bytes(),
            ),
            "help" => (
                0,
                b"ping|status|help|quit|dump|panes|windows|layouts|send <pane_id> <bytes>|pty-log on|off"
                    .to_vec(),
            ),
            "quit" => {
                self.running = false;
                (0, b"shutting down".to_vec())
            }
            "dump" => (
                0,
                format!(
                    "session: {} windows, {} panes",
                    self.session.window_count(),
                    self.session.registry.count()
                )
                .into_bytes(),
            ),
            "panes" => {
                let list: Vec<String> = self
                    .session
                    .registry
                    .iter()
                    .map(|p| {
                        let (cols, rows) = p.size();
                        format!("{}:{cols}x{rows}", p.id)
                    })
                    .collect();
                (0, list.join(",").into_bytes())
            }
            "windows" => {
                let list: Vec<String> = self
                    .session
                    .windows()
                    .map(|w| format!("{}:active={}", w.id, w.active_pane_id()))
                    .collect();
                (0, list.join(",").into_bytes())
            }
            "layouts" => (0, self.layouts.names().collect::<Vec<_>>().join(",").into_bytes()),
            "send" => {
                let Some(pane_id) = parts.next().and_then(|s| s.parse::<u16>().ok()) else {
                    return (2, b"usage: send <pane_id> <bytes>".to_vec());
                };
                let rest = parts.collect::<Vec<_>>().join(" ");
                match self.session.registry.get_mut(pane_id) {
                    Ok(pane) => match pane.write_input(rest.as_bytes()) {
                        Ok(()) => (0, Vec::new()),
                        Err(e) => (1, e.to_string().into_bytes()),
                    },
                    Err(e) => (1, e.to_string().into_bytes()),
                }
            }
            "pty-log" => match parts.next() {
                Some("on") => {
                    self.config.pty_log = true;
                    (0, Vec::new())
                }
                Some("off") => {
                    self.config.pty_log = false;
                    (0, Vec::new())
                }
                _ => (2, b"usage: pty-log on|off".to_vec()),
            },
            _ => (2, format!("unknown verb: {verb}").into_bytes()),
        }
    }

    fn dispatch_accept(&mut self, ready: &HashSet<Source>) {
        if !ready.contains(&Source::Accept) {
            return;
        }
        let Some(mut accept) = self.accept.take() else { return };
        while let Ok(Some(channel)) = accept.try_accept() {
            self.accept_client(channel);
        }
        self.accept = Some(accept);
    }

    /// Prime a freshly accepted client (§6 step 1): a snapshot of every
    /// pane in registry order, one `layout` frame, one `master_changed`
    /// frame, and the current clipboard registers.
    fn accept_client(&mut self, channel: Box<dyn FrameChannel>) {
        let mut client = ClientState::new(channel);

        for pane_id in self.session.registry.ids().collect::<Vec<_>>() {
            if let Ok(pane) = self.session.registry.get(pane_id) {
                let msg = broadcaster::handle_resync_request(
                    pane_id,
                    pane,
                    &mut client,
                );
                send_to(&mut client, &msg);
            }
        }
        if let Ok(window) = self.session.get_window(self.session.active_window_id()) {
            if let Some(nodes) = &window.layout_nodes {
                send_to(
                    &mut client,
                    &ServerMessage::Layout {
                        window_id: window.id,
                        template_id: window.template_id.clone(),
                        nodes: nodes.clone(),
                    },
                );
            }
        }
        send_to(
            &mut client,
            &ServerMessage::MasterChanged {
                master_id: self.master_id.clone(),
            },
        );
        for reg in [ClipboardRegister::System, ClipboardRegister::Primary] {
            if let Some(data) = self.clipboard.get_base64(reg) {
                send_to(
                    &mut client,
                    &ServerMessage::Clipboard {
                        op: "set".to_string(),
                        kind: reg.as_char(),
                        data,
                    },
                );
            }
        }
        self.clients.push(client);
    }

    /// Clients in reverse index order (§5 ordering guarantee 1).
    fn dispatch_clients(&mut self, ready: &HashSet<Source>) {
        for idx in (0..self.clients.len()).rev() {
            if !ready.contains(&Source::Client(idx)) {
                continue;
            }
            loop {
                let Some(frame) = self.clients[idx].channel.try_recv().ok().flatten() else {
                    break;
                };
                self.handle_frame(idx, frame);
            }
        }
    }

    fn handle_frame(&mut self, idx: usize, frame: Frame) {
        let decoded = match frame {
            Frame::Text(text) => MessageCodec::decode_client_text(&text).ok(),
            Frame::Binary(bytes) => MessageCodec::decode_client_binary(&bytes).ok(),
            Frame::Ping(payload) => {
                let _ = self.clients[idx].channel.send(Frame::Pong(payload));
                None
            }
            Frame::Pong(_) => None,
            Frame::Close => {
                self.clients[idx].channel.close();
                None
            }
        };
        let Some(msg) = decoded else { return };
        self.dispatch_message(idx, msg);
    }

    fn dispatch_message(&mut self, idx: usize, msg: crate::codec::ClientMessage) {
        use crate::codec::ClientMessage as M;

        if MessageHandlers::authorize(&msg, &self.clients[idx], self.master_id.as_deref()).is_err() {
            return;
        }

        match msg {
            M::Hello { client_id, theme_fg, theme_bg, token } => {
                self.handle_hello(idx, client_id, theme_fg, theme_bg, token);
            }
            M::RequestMaster {} => self.handle_request_master(idx),
            M::Resize { pane_id, cols, rows } => {
                let _ = self.with_handlers(|h| h.handle_resize(pane_id, cols, rows));
            }
            M::NewWindow { template_id } => self.handle_new_window(template_id),
            M::CloseWindow { window_id } => {
                let _ = self.with_handlers(|h| h.handle_close_window(window_id));
            }
            M::ClosePane { pane_id } => {
                let _ = self.with_handlers(|h| h.handle_close_pane(pane_id));
            }
            M::SetLayout { window_id, template_id } => {
                let shell = self.config.shell_command.clone();
                let result = self.with_handlers(|h| h.handle_set_layout(window_id, &template_id, &shell));
                if result.is_ok() {
                    self.broadcast_layout(window_id);
                }
            }
            M::SwapPanes { window_id, pane_id1, pane_id2 } => {
                let swapped = self.with_handlers(|h| h.handle_swap_panes(window_id, pane_id1, pane_id2));
                if matches!(swapped, Ok(true)) {
                    self.broadcast_layout(window_id);
                }
            }
            M::ResizeLayout { window_id, nodes } => {
                let result = self.with_handlers(|h| h.handle_resize_layout(window_id, &nodes));
                if result.is_ok() {
                    self.broadcast_layout(window_id);
                }
            }
            M::Focus { pane_id } => {
                let window_id = self.session.active_window_id();
                let _ = self.with_handlers(|h| h.handle_focus(window_id, pane_id));
            }
            M::Key { pane_id, key, ctrl, alt, shift } => self.handle_key(pane_id, &key, ctrl, alt, shift),
            M::Text { pane_id, data } => self.handle_text(idx, pane_id, data.into_bytes()),
            M::Scroll { pane_id, delta } => {
                if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                    pane.scroll(delta);
                }
            }
            M::Mouse { pane_id, button, x, y, px_py, state, modifiers, .. } => {
                self.handle_mouse(idx, pane_id, button, x, y, px_py, &state, modifiers);
            }
            M::SelectAll { pane_id } => {
                if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                    pane.select_all();
                }
            }
            M::ClearSelection { pane_id } => {
                if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                    pane.clear_selection();
                }
            }
            M::Copy { pane_id } => {
                if let Ok(Some(data)) = self.with_handlers(|h| h.handle_copy(pane_id)) {
                    self.broadcast(&ServerMessage::Clipboard {
                        op: "set".to_string(),
                        kind: ClipboardRegister::System.as_char(),
                        data,
                    });
                }
            }
            M::ClipboardSet { clipboard, data } => {
                let _ = self.with_handlers(|h| h.handle_clipboard_set(clipboard, &data));
                self.broadcast(&ServerMessage::Clipboard { op: "set".to_string(), kind: clipboard, data });
            }
            M::ClipboardPaste { pane_id, clipboard } => {
                let _ = self.with_handlers(|h| h.handle_clipboard_paste(pane_id, clipboard));
            }
            M::ClipboardResponse { pane_id, clipboard, data } => {
                self.handle_clipboard_response(pane_id, clipboard, data);
            }
            M::Ping {} => {
                send_to(&mut self.clients[idx], &ServerMessage::Pong {});
            }
            M::Sync { pane_id, gen, min_row_id } => self.handle_sync(idx, pane_id, gen, min_row_id),
            M::Resync { pane_id, .. } => self.handle_resync(idx, pane_id),
            M::Unknown => {}
        }
    }

    fn with_handlers<T>(&mut self, f: impl FnOnce(&mut MessageHandlers) -> CoreResult<T>) -> CoreResult<T> {
        let mut handlers = MessageHandlers {
            session: &mut self.session,
            layouts: &self.layouts,
            clipboard: &mut self.clipboard,
            auth: &self.auth,
        };
        f(&mut handlers)
    }

    fn handle_hello(
        &mut self,
        idx: usize,
        client_id: String,
        theme_fg: Option<[u8; 3]>,
        theme_bg: Option<[u8; 3]>,
        token: Option<String>,
    ) {
        let role = token.as_deref().map(|t| self.auth.validate(t)).unwrap_or(Role::Invalid);
        self.clients[idx].client_id = Some(client_id.clone());
        self.clients[idx].auth_token = token;
        self.clients[idx].authenticated = !matches!(role, Role::Invalid);

        if matches!(role, Role::Master) && self.master_id.is_none() {
            self.master_theme_fg = theme_fg;
            self.master_theme_bg = theme_bg;
            self.set_master(Some(client_id));
        }
    }

    /// Creates a new window, sized to the requested template's pane count
    /// (one pane if no template is named), and adopts that template's
    /// layout immediately.
    fn handle_new_window(&mut self, template_id: Option<String>) {
        let shell = self.config.shell_command.clone();
        let cols = self.config.cols;
        let rows = self.config.rows;
        let template_id = template_id.unwrap_or_else(|| "single".to_string());
        let Ok(template) = self.layouts.get(&template_id).map(|t| t.clone()) else {
            return;
        };
        let pane_count = crate::layout::count_panes(&template);
        let Ok(window_id) = self.session.create_window(&shell, pane_count, cols, rows) else {
            return;
        };
        if let Ok(window) = self.session.get_window_mut(window_id) {
            window.set_layout_from_template(template_id, &template);
        }
    }

    fn handle_request_master(&mut self, idx: usize) {
        let role = match self.clients[idx].auth_token.as_deref() {
            Some(t) => self.auth.validate(t),
            None => Role::Invalid,
        };
        if matches!(role, Role::Master) {
            let new_master = self.clients[idx].client_id.clone();
            self.set_master(new_master);
        }
    }

    /// Promote/demote the master and broadcast exactly one transition
    /// (§5 ordering guarantee 4: the broadcast happens inside this call,
    /// before any later authorization decision can observe the new master).
    fn set_master(&mut self, new_master: Option<String>) {
        self.master_id = new_master.clone();
        self.broadcast(&ServerMessage::MasterChanged { master_id: new_master });
    }

    fn handle_key(&mut self, pane_id: u16, key: &str, ctrl: bool, alt: bool, shift: bool) {
        let Ok(pane) = self.session.registry.get_mut(pane_id) else { return };
        let modes = pane.modes();
        let Some(bytes) = handlers::encode_key_with_modifiers(key, ctrl, alt, shift, modes.app_cursor_keys)
        else {
            return;
        };
        let _ = pane.write_input(&bytes);
        self.clear_selection_and_broadcast(pane_id);
    }

    fn handle_text(&mut self, _idx: usize, pane_id: u16, data: Vec<u8>) {
        let Ok(pane) = self.session.registry.get_mut(pane_id) else { return };
        let bracketed = pane.modes().bracketed_paste;
        let wrapped = handlers::wrap_bracketed_paste(&data, bracketed);
        let _ = pane.write_input(&wrapped);
        self.clear_selection_and_broadcast(pane_id);
    }

    fn clear_selection_and_broadcast(&mut self, pane_id: u16) {
        if let Ok(pane) = self.session.registry.get_mut(pane_id) {
            pane.clear_selection();
        } else {
            return;
        }
        self.broadcast(&ServerMessage::SelectionCleared { pane_id });
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_mouse(
        &mut self,
        _idx: usize,
        pane_id: u16,
        button: u8,
        x: u16,
        y: u16,
        _px_py: Option<(u16, u16)>,
        state: &str,
        modifiers: u8,
    ) {
        let shift_held = modifiers & 0x1 != 0;
        let Ok(pane) = self.session.registry.get_mut(pane_id) else { return };
        let modes = pane.modes();

        if modes.mouse == crate::terminal::MouseMode::Off || shift_held {
            match state {
                "down" => pane.start_selection(x, y),
                "move" => pane.update_selection(x, y, false),
                "up" => {
                    let was_click = pane.is_selection_at_start(x, y);
                    pane.end_selection();
                    if was_click {
                        pane.clear_selection();
                    } else if let Some(text) = pane.get_selection_text() {
                        let encoded = crate::clipboard::encode_base64(text.as_bytes());
                        self.clipboard
                            .set(ClipboardRegister::Primary, text.into_bytes());
                        self.broadcast(&ServerMessage::Clipboard {
                            op: "set".to_string(),
                            kind: ClipboardRegister::Primary.as_char(),
                            data: encoded,
                        });
                    }
                }
                _ => {}
            }
            return;
        }

        if button == 1 && state == "down" {
            if let Some(data) = self.clipboard.get(ClipboardRegister::Primary).map(|b| b.to_vec()) {
                if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                    let bracketed = pane.modes().bracketed_paste;
                    let _ = pane.write_input(&handlers::wrap_bracketed_paste(&data, bracketed));
                }
            }
            return;
        }

        let is_motion = state == "move";
        let is_release = state == "up";
        if let Some(bytes) =
            handlers::encode_mouse_event(modes.mouse, modes.mouse_motion, button, x, y, is_motion, is_release)
        {
            if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                let _ = pane.write_input(&bytes);
            }
        }
    }

    fn handle_clipboard_response(&mut self, pane_id: u16, clipboard: char, data: String) {
        let Ok(pane) = self.session.registry.get_mut(pane_id) else { return };
        if pane.clipboard_get_pending() != Some(clipboard) {
            return;
        }
        pane.resolve_clipboard_get();
        let reply = format!("\x1b]52;{clipboard};{data}\x07");
        let _ = pane.write_input(reply.as_bytes());
    }

    fn broadcast_layout(&mut self, window_id: u16) {
        let Ok(window) = self.session.get_window(window_id) else { return };
        let Some(nodes) = window.layout_nodes.clone() else { return };
        let msg = ServerMessage::Layout {
            window_id,
            template_id: window.template_id.clone(),
            nodes,
        };
        self.broadcast(&msg);
    }

    fn broadcast(&mut self, msg: &ServerMessage) {
        for client in &mut self.clients {
            if client.authenticated {
                send_to(client, msg);
            }
        }
    }

    fn handle_sync(&mut self, idx: usize, pane_id: u16, gen: u64, min_row_id: u64) {
        let no_delta = self.config.no_delta;
        let Ok(pane) = self.session.registry.get_mut(pane_id) else { return };
        let msg = broadcaster::handle_sync_request(pane_id, pane, &mut self.clients[idx], gen, min_row_id, no_delta);
        send_to(&mut self.clients[idx], &msg);
    }

    fn handle_resync(&mut self, idx: usize, pane_id: u16) {
        let Ok(pane) = self.session.registry.get(pane_id) else { return };
        let msg = broadcaster::handle_resync_request(pane_id, pane, &mut self.clients[idx]);
        send_to(&mut self.clients[idx], &msg);
    }

    /// Drain PTY output into each pane's terminal, broadcasting updates
    /// and shell-integration/clipboard side effects.
    fn dispatch_ptys(&mut self, ready: &HashSet<Source>) {
        let mut buf = [0u8; 8192];
        let pane_ids: Vec<u16> = self.session.registry.ids().collect();
        for pane_id in pane_ids {
            if !ready.contains(&Source::Pty(pane_id)) {
                continue;
            }
            let Ok(pane) = self.session.registry.get_mut(pane_id) else { continue };
            let Ok((n, outcome)) = pane.pump_pty_output(&mut buf) else { continue };
            if n == 0 {
                continue;
            }
            if self.config.pty_log {
                tracing::debug!(pane_id, bytes = n, "pty output");
            }
            self.after_feed(pane_id, outcome.should_broadcast);
        }
    }

    fn after_feed(&mut self, pane_id: u16, should_broadcast: bool) {
        let is_active = self
            .session
            .windows()
            .any(|w| w.active_pane_id() == pane_id && w.pane_ids().contains(&pane_id));

        let (clipboard_set, shell_event) = match self.session.registry.get_mut(pane_id) {
            Ok(pane) => (pane.take_clipboard_set(), pane.take_shell_event()),
            Err(_) => (None, None),
        };
        if let Some((reg, data)) = clipboard_set {
            if let Ok((register, b64)) = self.with_handlers(|h| h.handle_pty_clipboard_set(reg, &data)) {
                self.broadcast(&ServerMessage::Clipboard {
                    op: "set".to_string(),
                    kind: register.as_char(),
                    data: b64,
                });
            }
        }
        if let Some(kind) = shell_event {
            let (event, exit_code) = shell_event_wire(kind);
            self.broadcast(&ServerMessage::ShellIntegration { pane_id, event, exit_code });
        }

        let latched = {
            let Ok(pane) = self.session.registry.get_mut(pane_id) else { return };
            broadcaster::drain_latched(pane_id, pane, is_active)
        };
        for msg in &latched {
            self.broadcast(msg);
        }

        if !should_broadcast {
            return;
        }
        let no_delta = self.config.no_delta;
        let mut delivered = false;
        for client in &mut self.clients {
            if !client.authenticated {
                continue;
            }
            let Ok(pane) = self.session.registry.get_mut(pane_id) else { continue };
            if let Some(msg) = broadcaster::pane_update_for_client(pane_id, pane, client, no_delta) {
                send_to(client, &msg);
                delivered = true;
            }
        }
        if delivered {
            if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                pane.mark_delivered();
            }
        }
    }

    /// Sync-output and clipboard-GET timeouts, plus escalation of any
    /// destroyed pane's child process that hasn't exited yet.
    fn reconcile_timeouts(&mut self) {
        let pane_ids: Vec<u16> = self.session.registry.ids().collect();
        for pane_id in pane_ids {
            let forced = self
                .session
                .registry
                .get_mut(pane_id)
                .map(|p| p.reconcile_sync_timeout())
                .unwrap_or(false);
            if forced {
                self.after_feed(pane_id, true);
            }
            if let Ok(pane) = self.session.registry.get_mut(pane_id) {
                let _ = pane.reconcile_clipboard_timeout();
            }
        }
        self.session.registry.reconcile_pending_kills();
    }
}

fn shell_event_wire(kind: ShellEventKind) -> (String, Option<i32>) {
    match kind {
        ShellEventKind::PromptStart => ("prompt_start".to_string(), None),
        ShellEventKind::PromptEnd => ("prompt_end".to_string(), None),
        ShellEventKind::OutputStart => ("output_start".to_string(), None),
        ShellEventKind::CommandEnd { exit_code } => ("command_end".to_string(), exit_code),
    }
}

fn send_to(client: &mut ClientState, msg: &ServerMessage) {
    if let Ok(bytes) = MessageCodec::encode_server(msg) {
        let _ = client.channel.send(Frame::Binary(bytes));
    }
}
