// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`Accept`]/[`FrameChannel`] adapters over a plain TCP listener
//! and `tungstenite`'s synchronous WebSocket implementation.
//!
//! The listener stays non-blocking; each freshly accepted stream is
//! handshaken while still in its default blocking mode (a WebSocket
//! upgrade is one small HTTP exchange, not a long-lived read) and only
//! switched to non-blocking once the reactor takes it over.

use std::io::{self, ErrorKind};
use std::net::{TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

use tungstenite::{Message, WebSocket};

use mux_core::event_loop::Accept;
use mux_core::frame_channel::{Frame, FrameChannel};

pub struct WsAcceptor {
    listener: TcpListener,
}

impl WsAcceptor {
    pub fn bind(host: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }
}

impl Accept for WsAcceptor {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }

    fn try_accept(&mut self) -> io::Result<Option<Box<dyn FrameChannel>>> {
        match self.listener.accept() {
            Ok((stream, _addr)) => match tungstenite::accept(stream) {
                Ok(ws) => {
                    ws.get_ref().set_nonblocking(true)?;
                    Ok(Some(Box::new(WsChannel::new(ws))))
                }
                Err(e) => {
                    tracing::debug!("websocket handshake rejected: {e}");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub struct WsChannel {
    ws: WebSocket<TcpStream>,
    closed: bool,
}

impl WsChannel {
    fn new(ws: WebSocket<TcpStream>) -> Self {
        Self { ws, closed: false }
    }
}

impl FrameChannel for WsChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.ws.get_ref().as_raw_fd()
    }

    fn try_recv(&mut self) -> io::Result<Option<Frame>> {
        if self.closed {
            return Ok(Some(Frame::Close));
        }
        match self.ws.read() {
            Ok(Message::Text(text)) => Ok(Some(Frame::Text(text.to_string()))),
            Ok(Message::Binary(bytes)) => Ok(Some(Frame::Binary(bytes.into()))),
            Ok(Message::Ping(bytes)) => Ok(Some(Frame::Ping(bytes.into()))),
            Ok(Message::Pong(bytes)) => Ok(Some(Frame::Pong(bytes.into()))),
            Ok(Message::Close(_)) => {
                self.closed = true;
                Ok(Some(Frame::Close))
            }
            Ok(Message::Frame(_)) => Ok(None),
            Err(tungstenite::Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                self.closed = true;
                Ok(Some(Frame::Close))
            }
            Err(e) => {
                self.closed = true;
                Err(io::Error::new(ErrorKind::Other, e.to_string()))
            }
        }
    }

    fn send(&mut self, frame: Frame) -> io::Result<()> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
            Frame::Ping(bytes) => Message::Ping(bytes.into()),
            Frame::Pong(bytes) => Message::Pong(bytes.into()),
            Frame::Close => Message::Close(None),
        };
        let result = self.ws.send(msg).and_then(|()| self.ws.flush());
        result.map_err(|e| match e {
            tungstenite::Error::Io(io_err) => io_err,
            other => io::Error::new(ErrorKind::Other, other.to_string()),
        })
    }

    fn close(&mut self) {
        let _ = self.ws.close(None);
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
