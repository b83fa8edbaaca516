// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared across the engine.
//!
//! Splits error handling between an internal, `Display`-only error enum
//! for fallible core operations and a small wire-facing code enum for
//! rejections that must be observable by a client.

use std::fmt;

/// Internal error for fallible core operations. Never unwinds the reactor;
/// every call site that can produce one logs and continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A layout tree failed percentage or shape validation.
    LayoutInvalid(String),
    /// `copy_dimensions` was given trees of different shape.
    LayoutMismatch,
    /// A named layout template does not exist.
    UnknownTemplate(String),
    /// Pane or window id not present in the registry/session.
    NotFound(&'static str, u16),
    /// Requested pane/window dimensions are out of bounds.
    DimensionsOutOfRange { cols: u16, rows: u16 },
    /// The PTY for a pane reported a fatal I/O error.
    PtyIo(String),
    /// A decode of an inbound client message failed.
    Decode(String),
    /// `RunConfig` failed validation.
    Config(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LayoutInvalid(reason) => write!(f, "layout invalid: {reason}"),
            Self::LayoutMismatch => write!(f, "layout shape mismatch"),
            Self::UnknownTemplate(name) => write!(f, "unknown layout template: {name}"),
            Self::NotFound(kind, id) => write!(f, "{kind} {id} not found"),
            Self::DimensionsOutOfRange { cols, rows } => {
                write!(f, "dimensions out of range: {cols}x{rows}")
            }
            Self::PtyIo(msg) => write!(f, "pty io error: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Wire-visible rejection reasons sent back to a client as a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    Unauthorized,
    NotMaster,
    BadRequest,
    NotFound,
    Internal,
}

impl ClientError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotMaster => "NOT_MASTER",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
