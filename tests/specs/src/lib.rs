// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `termd` binary as a subprocess and drives it over a
//! plain synchronous WebSocket connection, the same transport the
//! binary itself speaks to real viewers.

use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use mux_core::codec::{ClientMessage, MessageCodec, ServerMessage};
use tungstenite::{Message, WebSocket};

/// Resolve the path to the compiled `termd` binary.
pub fn termd_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("termd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Issued master/view tokens, parsed out of the daemon's token file.
pub struct Tokens {
    pub master: String,
    pub view: String,
}

fn parse_token_file(contents: &str) -> anyhow::Result<Tokens> {
    let mut master = None;
    let mut view = None;
    for line in contents.lines() {
        if let Some(v) = line.strip_prefix("master=") {
            master = Some(v.to_string());
        } else if let Some(v) = line.strip_prefix("view=") {
            view = Some(v.to_string());
        }
    }
    Ok(Tokens {
        master: master.ok_or_else(|| anyhow::anyhow!("token file missing master= line"))?,
        view: view.ok_or_else(|| anyhow::anyhow!("token file missing view= line"))?,
    })
}

/// A running `termd` process, killed on drop.
pub struct TermdProcess {
    child: Child,
    port: u16,
    token_file: PathBuf,
    _token_dir: tempfile::TempDir,
}

/// Builder for configuring a [`TermdProcess`] before it is spawned.
pub struct TermdBuilder {
    panes: usize,
    cols: u16,
    rows: u16,
}

impl Default for TermdBuilder {
    fn default() -> Self {
        Self { panes: 1, cols: 80, rows: 24 }
    }
}

impl TermdBuilder {
    pub fn panes(mut self, panes: usize) -> Self {
        self.panes = panes;
        self
    }

    pub fn dimensions(mut self, cols: u16, rows: u16) -> Self {
        self.cols = cols;
        self.rows = rows;
        self
    }

    /// Spawn `termd` with the configured options, running `cmd` in
    /// every pane.
    pub fn spawn(self, cmd: &[&str]) -> anyhow::Result<TermdProcess> {
        let binary = termd_binary();
        anyhow::ensure!(binary.exists(), "termd binary not found at {}", binary.display());

        let port = free_port()?;
        let token_dir = tempfile::tempdir()?;
        let token_file = token_dir.path().join("termd.token");

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--token-file".into(),
            token_file.to_string_lossy().into_owned(),
            "--panes".into(),
            self.panes.to_string(),
            "--cols".into(),
            self.cols.to_string(),
            "--rows".into(),
            self.rows.to_string(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
            "--".into(),
        ];
        args.extend(cmd.iter().map(|s| s.to_string()));

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(TermdProcess { child, port, token_file, _token_dir: token_dir })
    }
}

impl TermdProcess {
    pub fn build() -> TermdBuilder {
        TermdBuilder::default()
    }

    /// Spawn `termd` with a single default-sized pane.
    pub fn start(cmd: &[&str]) -> anyhow::Result<Self> {
        Self::build().spawn(cmd)
    }

    /// `host:port` pair for the viewer-facing WebSocket listener.
    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Poll until the listener accepts TCP connections, then read and
    /// parse the token file it writes on startup.
    pub fn wait_ready(&self, timeout: Duration) -> anyhow::Result<Tokens> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                anyhow::bail!("termd did not become ready within {timeout:?}");
            }
            if TcpStream::connect(("127.0.0.1", self.port)).is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        loop {
            if Instant::now() > deadline {
                anyhow::bail!("termd did not write a token file within {timeout:?}");
            }
            if let Ok(contents) = std::fs::read_to_string(&self.token_file) {
                if !contents.is_empty() {
                    return parse_token_file(&contents);
                }
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                anyhow::bail!("termd did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for TermdProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A synchronous WebSocket client wrapping the real wire codec, so
/// scenario tests exercise the exact bytes `termd` produces.
pub struct TestClient {
    ws: WebSocket<TcpStream>,
}

impl TestClient {
    pub fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let (ws, _response) =
            tungstenite::client(format!("ws://{addr}/"), stream).map_err(|e| anyhow::anyhow!("websocket handshake failed: {e}"))?;
        Ok(Self { ws })
    }

    pub fn send(&mut self, msg: &ClientMessage) -> anyhow::Result<()> {
        let text = serde_json::to_string(msg)?;
        self.ws.send(Message::Text(text.into()))?;
        Ok(())
    }

    /// Read the next decoded server message, skipping ping/pong frames.
    pub fn recv(&mut self, timeout: Duration) -> anyhow::Result<ServerMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                anyhow::bail!("no server message within {timeout:?}");
            }
            match self.ws.read()? {
                Message::Binary(bytes) => return Ok(MessageCodec::decode_server(&bytes)?),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => anyhow::bail!("connection closed"),
                Message::Text(_) | Message::Frame(_) => continue,
            }
        }
    }

    /// Drain and discard server messages until `pred` matches one, or
    /// the timeout elapses.
    pub fn recv_until(
        &mut self,
        timeout: Duration,
        mut pred: impl FnMut(&ServerMessage) -> bool,
    ) -> anyhow::Result<ServerMessage> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                anyhow::bail!("expected message not seen within {timeout:?}");
            }
            let msg = self.recv(deadline.saturating_duration_since(Instant::now()).max(Duration::from_millis(1)))?;
            if pred(&msg) {
                return Ok(msg);
            }
        }
    }

    /// Send a raw protocol-level ping, bypassing the application codec
    /// entirely — useful for proving liveness of a connection that has
    /// not (or cannot) authenticate at the application layer.
    pub fn ws_ping(&mut self, payload: Vec<u8>) -> anyhow::Result<()> {
        self.ws.send(Message::Ping(payload.into()))?;
        Ok(())
    }

    /// Read the next raw WebSocket frame without decoding it as an
    /// application message. `timeout` is honored by the socket's own
    /// read timeout set at connect time; this just forwards the read.
    pub fn recv_raw(&mut self, _timeout: Duration) -> anyhow::Result<Message> {
        Ok(self.ws.read()?)
    }
}
