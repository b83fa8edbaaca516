// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The two clipboard registers shared across clients, and the base64
//! codec OSC-52 traffic is carried in.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CoreError, CoreResult};

/// OSC-52 names several registers; this engine collapses them onto the
/// system and primary selection, per the `c`/`p` convention xterm uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardRegister {
    System,
    Primary,
}

impl ClipboardRegister {
    pub fn from_char(c: char) -> Self {
        match c {
            'p' => Self::Primary,
            _ => Self::System,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::System => 'c',
            Self::Primary => 'p',
        }
    }
}

#[derive(Debug, Default)]
pub struct ClipboardRegisters {
    system: Option<Vec<u8>>,
    primary: Option<Vec<u8>>,
}

impl ClipboardRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reg: ClipboardRegister) -> Option<&[u8]> {
        match reg {
            ClipboardRegister::System => self.system.as_deref(),
            ClipboardRegister::Primary => self.primary.as_deref(),
        }
    }

    pub fn set(&mut self, reg: ClipboardRegister, data: Vec<u8>) {
        match reg {
            ClipboardRegister::System => self.system = Some(data),
            ClipboardRegister::Primary => self.primary = Some(data),
        }
    }

    /// Decode a base64 OSC-52 payload and store it in `reg`. Returns the
    /// decoded bytes on success.
    pub fn set_base64(&mut self, reg: ClipboardRegister, encoded: &str) -> CoreResult<Vec<u8>> {
        let bytes = decode_base64(encoded)?;
        self.set(reg, bytes.clone());
        Ok(bytes)
    }

    pub fn get_base64(&self, reg: ClipboardRegister) -> Option<String> {
        self.get(reg).map(encode_base64)
    }
}

pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

pub fn decode_base64(data: &str) -> CoreResult<Vec<u8>> {
    STANDARD
        .decode(data)
        .map_err(|e| CoreError::Decode(format!("invalid base64 clipboard payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_from_char_defaults_to_system() {
        assert_eq!(ClipboardRegister::from_char('x'), ClipboardRegister::System);
        assert_eq!(ClipboardRegister::from_char('p'), ClipboardRegister::Primary);
    }

    #[test]
    fn base64_round_trip() {
        let mut registers = ClipboardRegisters::new();
        let decoded = registers
            .set_base64(ClipboardRegister::System, &encode_base64(b"hello"))
            .unwrap();
        assert_eq!(decoded, b"hello");
        assert_eq!(registers.get(ClipboardRegister::System), Some(&b"hello"[..]));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let mut registers = ClipboardRegisters::new();
        assert!(registers.set_base64(ClipboardRegister::System, "not base64!!").is_err());
    }

    /// A payload set by one client's `clipboard_set` must replay to a
    /// later reader byte-for-byte, not just through an intermediate
    /// re-encoding.
    #[test]
    fn set_base64_replays_verbatim_through_get_base64() {
        let mut registers = ClipboardRegisters::new();
        let payload = encode_base64(b"\x00binary\xffpayload");
        registers.set_base64(ClipboardRegister::Primary, &payload).unwrap();
        assert_eq!(registers.get_base64(ClipboardRegister::Primary), Some(payload));
        assert_eq!(registers.get_base64(ClipboardRegister::System), None);
    }
}
