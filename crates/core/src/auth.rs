// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master/view token issuance and constant-time validation.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use rand::RngCore;

use crate::error::{CoreError, CoreResult};

/// Role a validated token grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    View,
    Invalid,
}

/// Constant-time string comparison: length and byte-content mismatches
/// take the same number of operations, so wall-clock time doesn't leak
/// which byte first differed.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

fn random_hex_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct AuthStore {
    master_token: String,
    view_token: String,
}

impl AuthStore {
    pub fn generate() -> Self {
        Self {
            master_token: random_hex_token(),
            view_token: random_hex_token(),
        }
    }

    pub fn master_token(&self) -> &str {
        &self.master_token
    }

    pub fn view_token(&self) -> &str {
        &self.view_token
    }

    /// Write `master=<hex64>\nview=<hex64>\n` to `path` with mode 0600.
    pub fn write_token_file(&self, path: &Path) -> CoreResult<()> {
        let contents = format!("master={}\nview={}\n", self.master_token, self.view_token);
        let mut file = std::fs::File::create(path)
            .map_err(|e| CoreError::Config(format!("cannot create token file: {e}")))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| CoreError::Config(format!("cannot write token file: {e}")))?;
        let mut perms = file
            .metadata()
            .map_err(|e| CoreError::Config(e.to_string()))?
            .permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms)
            .map_err(|e| CoreError::Config(format!("cannot chmod token file: {e}")))?;
        Ok(())
    }

    pub fn validate(&self, token: &str) -> Role {
        if constant_time_eq(token, &self.master_token) {
            Role::Master
        } else if constant_time_eq(token, &self.view_token) {
            Role::View
        } else {
            Role::Invalid
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_distinguishes_roles() {
        let store = AuthStore::generate();
        assert_eq!(store.validate(store.master_token()), Role::Master);
        assert_eq!(store.validate(store.view_token()), Role::View);
        assert_eq!(store.validate("not-a-real-token"), Role::Invalid);
    }

    #[test]
    fn tokens_are_distinct_and_well_formed() {
        let store = AuthStore::generate();
        assert_ne!(store.master_token(), store.view_token());
        assert_eq!(store.master_token().len(), 64);
        assert!(store.master_token().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn write_token_file_sets_0600() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        let store = AuthStore::generate();
        store.write_token_file(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains(store.master_token()));
        assert!(contents.contains(store.view_token()));
    }
}
