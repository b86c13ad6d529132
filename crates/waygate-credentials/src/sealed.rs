// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM sealing of credential blobs.
//!
//! The sealed form is `nonce (12 bytes) || ciphertext || tag (16 bytes)` in
//! one buffer, so storage only ever handles a single opaque value. Every
//! seal draws a fresh random nonce from the system CSPRNG; nonce reuse
//! would be catastrophic for GCM.

use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use waygate_core::WaygateError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Encrypt `plaintext`, returning the self-contained sealed buffer.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, WaygateError> {
    let aead = gcm_key(key)?;

    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| WaygateError::Internal("failed to draw a random nonce".to_string()))?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut out = Vec::with_capacity(NONCE_LEN + plaintext.len() + TAG_LEN);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(plaintext);
    let mut tail = out.split_off(NONCE_LEN);
    aead.seal_in_place_append_tag(nonce, Aad::empty(), &mut tail)
        .map_err(|_| WaygateError::Internal("AES-256-GCM seal failed".to_string()))?;
    out.extend_from_slice(&tail);
    Ok(out)
}

/// Decrypt a buffer produced by [`seal`].
///
/// Fails when the buffer is truncated, the key is wrong, or the data was
/// tampered with.
pub fn open(key: &[u8; 32], sealed: &[u8]) -> Result<Vec<u8>, WaygateError> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(WaygateError::Internal(
            "sealed credential blob is truncated".to_string(),
        ));
    }
    let aead = gcm_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = sealed[NONCE_LEN..].to_vec();
    let plaintext = aead
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| {
            WaygateError::Internal("AES-256-GCM open failed: wrong key or tampered data".to_string())
        })?;
    Ok(plaintext.to_vec())
}

/// Generate a random 32-byte master key.
pub fn generate_key() -> Result<[u8; 32], WaygateError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; 32];
    rng.fill(&mut key)
        .map_err(|_| WaygateError::Internal("failed to generate a random key".to_string()))?;
    Ok(key)
}

fn gcm_key(key: &[u8; 32]) -> Result<LessSafeKey, WaygateError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| WaygateError::Internal("failed to build AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let key = generate_key().unwrap();
        let plaintext = b"handshake state with \x00 binary \xff bytes";

        let sealed = seal(&key, plaintext).unwrap();
        assert_eq!(sealed.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
        assert_eq!(open(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn sealing_twice_differs() {
        let key = generate_key().unwrap();
        let sealed_a = seal(&key, b"same input").unwrap();
        let sealed_b = seal(&key, b"same input").unwrap();
        assert_ne!(sealed_a, sealed_b);
    }

    #[test]
    fn wrong_key_fails_open() {
        let sealed = seal(&generate_key().unwrap(), b"secret").unwrap();
        assert!(open(&generate_key().unwrap(), &sealed).is_err());
    }

    #[test]
    fn bit_flip_fails_open() {
        let key = generate_key().unwrap();
        let mut sealed = seal(&key, b"integrity matters").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x40;
        assert!(open(&key, &sealed).is_err());
    }

    #[test]
    fn truncated_blob_fails_open() {
        let key = generate_key().unwrap();
        assert!(open(&key, &[0u8; 8]).is_err());
    }
}
