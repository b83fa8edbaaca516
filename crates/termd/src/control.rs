// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`IpcChannel`] adapter: a Unix-domain admin socket, one
//! newline-delimited request per connection (§6). The listener and the
//! in-flight connection share a single raw fd registration, since only
//! one admin client talks to the daemon at a time.

use std::io::{self, ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;

use mux_core::event_loop::IpcChannel;

pub struct ControlSocket {
    listener: UnixListener,
    current: Option<UnixStream>,
    buf: Vec<u8>,
}

impl ControlSocket {
    pub fn bind(path: &Path) -> io::Result<Self> {
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            current: None,
            buf: Vec::new(),
        })
    }
}

impl IpcChannel for ControlSocket {
    fn as_raw_fd(&self) -> RawFd {
        match &self.current {
            Some(stream) => stream.as_raw_fd(),
            None => self.listener.as_raw_fd(),
        }
    }

    fn try_recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.current.is_none() {
            match self.listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(true)?;
                    self.current = Some(stream);
                    self.buf.clear();
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        let Some(stream) = self.current.as_mut() else {
            return Ok(None);
        };
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    self.current = None;
                    self.buf.clear();
                    return Ok(None);
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                        let line = self.buf[..pos].to_vec();
                        self.buf.drain(..=pos);
                        return Ok(Some(line));
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) => {
                    self.current = None;
                    return Err(e);
                }
            }
        }
    }

    fn respond(&mut self, status: u8, payload: &[u8]) -> io::Result<()> {
        let Some(stream) = self.current.as_mut() else {
            return Ok(());
        };
        let mut out = Vec::with_capacity(payload.len() + 2);
        out.push(status);
        out.extend_from_slice(payload);
        out.push(b'\n');
        stream.write_all(&out)?;
        stream.flush()?;
        self.current = None;
        self.buf.clear();
        Ok(())
    }
}
