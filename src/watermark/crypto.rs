// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Key derivation and payload encryption.
//!
//! Three values are derived from the caller's secret, each through its own
//! one-way transform so no derived value reveals another:
//!
//! - **Seed**: Argon2id with a fixed salt. Drives unit traversal for every
//!   pixel-domain method. Decoder and encoder derive it identically.
//! - **Verification tag**: SHA-256 over the secret and a separate constant,
//!   truncated to 16 bits. Stored in clear inside the frame so extraction can
//!   tell "watermark present, wrong key" apart from "nothing here".
//! - **AEAD key**: Argon2id with a second fixed salt, keying AES-256-GCM-SIV.
//!
//! AES-256-GCM-SIV is used for its nonce-misuse resistance; the nonce is
//! random per embed and travels in the frame.

use core::fmt;

use aes_gcm_siv::aead::{Aead, Payload};
use aes_gcm_siv::{Aes256GcmSiv, KeyInit, Nonce};
use argon2::Argon2;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::watermark::error::WatermarkError;

/// Fixed salt for the traversal seed.
const SEED_SALT: &[u8; 16] = b"sealmark-seed-v1";

/// Fixed salt for the AEAD key. Differs from the seed salt so the two keys
/// are independent.
const AEAD_SALT: &[u8; 16] = b"sealmark-aead-v1";

/// Domain constant appended to the secret for the verification tag.
const TAG_DOMAIN: &[u8] = b"sealmark-tag-v1";

/// Verification tag length in bytes.
pub const TAG_LEN: usize = 2;
/// AES-GCM-SIV nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// AES-GCM-SIV authentication tag length in bytes.
pub const AUTH_TAG_LEN: usize = 16;

/// 256-bit PRNG seed derived from the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedSeed(Zeroizing<[u8; 32]>);

impl DerivedSeed {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Sub-seed for one consumer, so different methods walk unrelated orders.
    pub fn for_domain(&self, domain: &[u8]) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update(&self.0[..]);
        h.update(domain);
        h.finalize().into()
    }
}

impl fmt::Debug for DerivedSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedSeed(..)")
    }
}

/// Short fingerprint of the secret stored alongside the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyVerificationTag(pub [u8; TAG_LEN]);

impl fmt::Display for KeyVerificationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Everything one engine call needs from the secret.
pub struct KeyMaterial {
    pub seed: DerivedSeed,
    pub tag: KeyVerificationTag,
    aead_key: Zeroizing<[u8; 32]>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial").field("tag", &self.tag).finish_non_exhaustive()
    }
}

/// Derive the traversal seed and verification tag from a secret.
///
/// # Errors
/// [`WatermarkError::InvalidKey`] if `secret` is empty.
pub fn derive(secret: &str) -> Result<(DerivedSeed, KeyVerificationTag), WatermarkError> {
    ensure_non_empty(secret)?;
    let mut seed = Zeroizing::new([0u8; 32]);
    argon2_into(secret, SEED_SALT, &mut seed)?;
    Ok((DerivedSeed(seed), verification_tag(secret)))
}

/// Derive seed, tag and AEAD key in one go.
///
/// # Errors
/// [`WatermarkError::InvalidKey`] if `secret` is empty.
pub fn derive_key_material(secret: &str) -> Result<KeyMaterial, WatermarkError> {
    let (seed, tag) = derive(secret)?;
    let mut aead_key = Zeroizing::new([0u8; 32]);
    argon2_into(secret, AEAD_SALT, &mut aead_key)?;
    Ok(KeyMaterial { seed, tag, aead_key })
}

/// Compute only the verification tag. Cheap; no Argon2.
///
/// # Errors
/// [`WatermarkError::InvalidKey`] if `secret` is empty.
pub fn derive_tag(secret: &str) -> Result<KeyVerificationTag, WatermarkError> {
    ensure_non_empty(secret)?;
    Ok(verification_tag(secret))
}

fn ensure_non_empty(secret: &str) -> Result<(), WatermarkError> {
    if secret.is_empty() {
        Err(WatermarkError::InvalidKey)
    } else {
        Ok(())
    }
}

fn verification_tag(secret: &str) -> KeyVerificationTag {
    let mut h = Sha256::new();
    h.update(secret.as_bytes());
    h.update(TAG_DOMAIN);
    let digest = h.finalize();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&digest[..TAG_LEN]);
    KeyVerificationTag(tag)
}

fn argon2_into(secret: &str, salt: &[u8], out: &mut [u8; 32]) -> Result<(), WatermarkError> {
    Argon2::default()
        .hash_password_into(secret.as_bytes(), salt, out)
        .map_err(|_| WatermarkError::InvalidKey)
}

/// Encrypt with AES-256-GCM-SIV under a fresh random nonce.
///
/// Returns `(ciphertext_with_tag, nonce)`. The last [`AUTH_TAG_LEN`] bytes of
/// the ciphertext are the authentication tag. `aad` is authenticated but not
/// encrypted.
pub fn encrypt(
    plaintext: &[u8],
    keys: &KeyMaterial,
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; NONCE_LEN]), WatermarkError> {
    use rand::RngCore;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = cipher(keys)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: plaintext, aad })
        .map_err(|_| WatermarkError::MessageTooLarge)?;
    Ok((ciphertext, nonce_bytes))
}

/// Decrypt and authenticate.
///
/// # Errors
/// [`WatermarkError::AuthenticationFailed`] on a wrong key, corrupted data or
/// mismatching `aad`.
pub fn decrypt(
    ciphertext: &[u8],
    keys: &KeyMaterial,
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
) -> Result<Vec<u8>, WatermarkError> {
    cipher(keys)?
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| WatermarkError::AuthenticationFailed)
}

fn cipher(keys: &KeyMaterial) -> Result<Aes256GcmSiv, WatermarkError> {
    Aes256GcmSiv::new_from_slice(&keys.aead_key[..]).map_err(|_| WatermarkError::InvalidKey)
}
