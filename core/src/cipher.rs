//! Per-call symmetric payload obfuscation.
//!
//! # Design
//! Encrypted calls generate one [`CipherKey`] at construction and reuse it
//! for every attempt the instance makes: the request body and the response
//! `data` field are both processed with the same key. The key material is
//! embedded in the ciphertext header under a fixed mask, which is how the
//! server side derives the key for its reply; the caller never transmits it
//! out of band. `decode(k, encode(k, x)) == x` holds for every input.
//!
//! The ciphertext is base64 text, safe to place in a urlencoded form field.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

use crate::call::ParamList;

const KEY_LEN: usize = 16;

const HEADER_PAD: [u8; KEY_LEN] = [
    0x3a, 0x91, 0x5c, 0xe7, 0x08, 0xd4, 0x6f, 0xb2, 0x29, 0x83, 0xfa, 0x45, 0xd1, 0x0e, 0x77,
    0xcc,
];

/// Opaque per-call symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherKey([u8; KEY_LEN]);

impl fmt::Debug for CipherKey {
    // Key material stays out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CipherKey(..)")
    }
}

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext shorter than key header")]
    Truncated,
}

/// Generate a fresh random key.
pub fn generate_key() -> CipherKey {
    CipherKey(rand::random())
}

/// Encrypt `plain` under `key`, producing transport-safe base64 text.
pub fn encode(key: &CipherKey, plain: &str) -> String {
    let mut out = Vec::with_capacity(KEY_LEN + plain.len());
    for (byte, pad) in key.0.iter().zip(HEADER_PAD) {
        out.push(byte ^ pad);
    }
    let mut stream = KeyStream::new(key);
    out.extend(plain.bytes().map(|b| b ^ stream.next_byte()));
    STANDARD.encode(out)
}

/// Decrypt base64 `text` produced by [`encode`] under the same key.
pub fn decode(key: &CipherKey, text: &str) -> Result<Vec<u8>, CipherError> {
    let raw = STANDARD.decode(text)?;
    if raw.len() < KEY_LEN {
        return Err(CipherError::Truncated);
    }
    let mut stream = KeyStream::new(key);
    Ok(raw[KEY_LEN..].iter().map(|b| b ^ stream.next_byte()).collect())
}

/// Recover the embedded key from a ciphertext header.
///
/// Used by the responding side to encrypt its reply with the caller's key.
pub fn recover_key(text: &str) -> Result<CipherKey, CipherError> {
    let raw = STANDARD.decode(text)?;
    if raw.len() < KEY_LEN {
        return Err(CipherError::Truncated);
    }
    let mut key = [0u8; KEY_LEN];
    for (slot, (byte, pad)) in key.iter_mut().zip(raw.iter().zip(HEADER_PAD)) {
        *slot = byte ^ pad;
    }
    Ok(CipherKey(key))
}

/// Serialize `form` to a JSON object and encrypt it under `key`.
pub fn seal_form(key: &CipherKey, form: &ParamList) -> String {
    let obj: serde_json::Map<String, serde_json::Value> = form
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    encode(key, &serde_json::Value::Object(obj).to_string())
}

// XOR keystream: xorshift32 seeded from the key bytes. Deterministic per
// key, which is what makes the XOR pass its own inverse.
struct KeyStream {
    state: u32,
}

impl KeyStream {
    fn new(key: &CipherKey) -> Self {
        let mut seed = 0u32;
        for chunk in key.0.chunks_exact(4) {
            seed ^= u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            seed = seed.rotate_left(9);
        }
        Self { state: seed | 1 }
    }

    fn next_byte(&mut self) -> u8 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x >> 16) as u8
    }
}
