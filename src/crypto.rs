//! Passphrase encryption of note text on top of any other backend.
//!
//! Ids and timestamps stay readable so the file still sorts and diffs; titles
//! and contents are sealed field by field.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;
use zeroize::Zeroize;

use crate::backend::{Backend, BackendError};
use crate::models::Note;

const FIELD_PREFIX: &str = "enc:v1:";
const NONCE_LEN: usize = 12;
// Fixed so the notes file needs no header; every key still depends on the passphrase.
const KDF_SALT: &[u8] = b"termnotes/field-encryption/v1";

#[derive(Debug, Clone, Copy)]
pub struct KdfParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

pub fn derive_key_with_params(
    passphrase: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<[u8; 32], BackendError> {
    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| BackendError::Crypto(format!("Invalid Argon2 params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; 32];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| BackendError::Crypto(format!("Key derivation failed: {e}")))?;
    Ok(key)
}

pub fn encrypt_field(key: &[u8; 32], plaintext: &str) -> Result<String, BackendError> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| BackendError::Crypto(format!("Encryption failed: {e}")))?;

    let mut sealed = nonce_bytes.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(format!(
        "{FIELD_PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(sealed)
    ))
}

/// Opens a sealed field. Text without the prefix is returned as is.
pub fn decrypt_field(key: &[u8; 32], stored: &str) -> Result<String, BackendError> {
    let Some(encoded) = stored.strip_prefix(FIELD_PREFIX) else {
        return Ok(stored.to_string());
    };
    let sealed = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| BackendError::Crypto(format!("Invalid encrypted field encoding: {e}")))?;
    if sealed.len() < NONCE_LEN {
        return Err(BackendError::Crypto("Encrypted field is truncated".into()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| BackendError::Crypto("Decryption failed. Wrong passphrase?".into()))?;
    String::from_utf8(plaintext)
        .map_err(|_| BackendError::Crypto("Decrypted field is not valid UTF-8".into()))
}

pub struct EncryptedBackend<B> {
    inner: B,
    key: [u8; 32],
}

impl<B: Backend> EncryptedBackend<B> {
    /// Derives the key from `passphrase` and wipes the passphrase.
    pub fn new(inner: B, passphrase: String) -> Result<Self, BackendError> {
        Self::with_params(inner, passphrase, KdfParams::default())
    }

    pub fn with_params(
        inner: B,
        mut passphrase: String,
        params: KdfParams,
    ) -> Result<Self, BackendError> {
        let key = derive_key_with_params(&passphrase, KDF_SALT, params);
        passphrase.zeroize();
        Ok(Self { inner, key: key? })
    }
}

impl<B> Drop for EncryptedBackend<B> {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl<B: Backend> Backend for EncryptedBackend<B> {
    fn save_all(&mut self, notes: &[Note]) -> Result<(), BackendError> {
        let sealed = notes
            .iter()
            .map(|note| {
                Ok(Note {
                    title: encrypt_field(&self.key, &note.title)?,
                    content: encrypt_field(&self.key, &note.content)?,
                    ..note.clone()
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;
        self.inner.save_all(&sealed)
    }

    fn load_all(&mut self) -> Result<Vec<Note>, BackendError> {
        let sealed = self.inner.load_all()?;
        let plaintext_fields = sealed
            .iter()
            .filter(|n| !n.content.starts_with(FIELD_PREFIX) && !n.content.is_empty())
            .count();
        if plaintext_fields > 0 {
            debug!(plaintext_fields, "unencrypted notes found, sealing on next save");
        }
        sealed
            .into_iter()
            .map(|note| {
                Ok(Note {
                    title: decrypt_field(&self.key, &note.title)?,
                    content: decrypt_field(&self.key, &note.content)?,
                    ..note
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::backend::MemoryBackend;

    fn fast() -> KdfParams {
        KdfParams {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn note(id: i64, title: &str, content: &str) -> Note {
        let now = Utc::now();
        Note {
            id,
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fields_are_sealed_at_rest() {
        let raw = MemoryBackend::new();
        let mut backend =
            EncryptedBackend::with_params(raw.clone(), "hunter2 horse".into(), fast()).unwrap();
        let notes = vec![note(1, "Secret plans", "step one\nstep two")];
        backend.save_all(&notes).unwrap();

        let stored = raw.snapshot();
        assert!(stored[0].title.starts_with(FIELD_PREFIX));
        assert!(!stored[0].content.contains("step one"));
        assert_eq!(stored[0].id, 1);
        assert_eq!(stored[0].created_at, notes[0].created_at);

        assert_eq!(backend.load_all().unwrap(), notes);
    }

    #[test]
    fn wrong_passphrase_fails_to_load() {
        let raw = MemoryBackend::new();
        EncryptedBackend::with_params(raw.clone(), "right".into(), fast())
            .unwrap()
            .save_all(&[note(1, "t", "c")])
            .unwrap();

        let mut other = EncryptedBackend::with_params(raw, "wrong".into(), fast()).unwrap();
        let err = other.load_all().unwrap_err();
        assert!(matches!(err, BackendError::Crypto(msg) if msg.contains("Wrong passphrase")));
    }

    #[test]
    fn plaintext_notes_pass_through_and_get_sealed() {
        let raw = MemoryBackend::with_notes(vec![note(3, "plain", "old text")]);
        let mut backend = EncryptedBackend::with_params(raw.clone(), "pw".into(), fast()).unwrap();

        let loaded = backend.load_all().unwrap();
        assert_eq!(loaded[0].content, "old text");

        backend.save_all(&loaded).unwrap();
        assert!(raw.snapshot()[0].content.starts_with(FIELD_PREFIX));
    }

    #[test]
    fn empty_fields_stay_empty() {
        let key = [7u8; 32];
        assert_eq!(encrypt_field(&key, "").unwrap(), "");
        assert_eq!(decrypt_field(&key, "").unwrap(), "");
    }

    #[test]
    fn same_text_seals_differently_each_time() {
        let key = [1u8; 32];
        let a = encrypt_field(&key, "same").unwrap();
        let b = encrypt_field(&key, "same").unwrap();
        assert_ne!(a, b);
        assert_eq!(decrypt_field(&key, &a).unwrap(), "same");
    }

    #[test]
    fn truncated_field_is_rejected() {
        let key = [1u8; 32];
        assert!(decrypt_field(&key, "enc:v1:AAAA").is_err());
    }
}
