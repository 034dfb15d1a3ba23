//! # Admin Payload Encryption
//!
//! The MinIO admin API expects sensitive request bodies (such as a new user's
//! secret key) to be encrypted with a key derived from the caller's secret key.
//!
//! Layout: `salt (32) | algorithm id (1) | nonce (8) | sealed fragments`.
//! The key is PBKDF2-HMAC-SHA256 over the admin secret key. The plaintext is
//! sealed in 16 KiB fragments with AES-256-GCM; each fragment nonce is the
//! 8-byte nonce followed by a little-endian sequence number, and the final
//! fragment is marked through its associated data.

use anyhow::{anyhow, Result};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use zeroize::Zeroizing;

const SALT_LEN: usize = 32;
const NONCE_PREFIX_LEN: usize = 8;
const TAG_LEN: usize = 16;
const FRAGMENT_SIZE: usize = 16 * 1024;

/// Algorithm id for PBKDF2 + AES-256-GCM
const PBKDF2_AES_GCM: u8 = 0x02;

const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(8192) {
    Some(iterations) => iterations,
    None => unreachable!(),
};

const FINAL_FRAGMENT: u8 = 0x80;

/// Encrypt `data` for the admin API using `password` (the admin secret key)
pub fn encrypt_data(password: &str, data: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|e| anyhow!("failed to generate encryption salt: {e}"))?;
    let mut nonce = [0u8; NONCE_PREFIX_LEN];
    rng.fill(&mut nonce)
        .map_err(|e| anyhow!("failed to generate encryption nonce: {e}"))?;

    seal(password, &salt, &nonce, data)
}

fn seal(
    password: &str,
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_PREFIX_LEN],
    data: &[u8],
) -> Result<Vec<u8>> {
    let key = derive_key(password, salt)?;

    let fragments = data.len().div_ceil(FRAGMENT_SIZE).max(1);
    let mut out =
        Vec::with_capacity(SALT_LEN + 1 + NONCE_PREFIX_LEN + data.len() + fragments * TAG_LEN);
    out.extend_from_slice(salt);
    out.push(PBKDF2_AES_GCM);
    out.extend_from_slice(nonce);

    // Sequence number 0 authenticates the (empty) caller associated data;
    // its tag becomes the associated data of every fragment.
    let mut header_tag = Vec::with_capacity(TAG_LEN);
    key.seal_in_place_append_tag(fragment_nonce(nonce, 0), Aad::empty(), &mut header_tag)
        .map_err(|e| anyhow!("failed to seal payload header: {e}"))?;
    let mut associated_data = [0u8; 1 + TAG_LEN];
    associated_data[1..].copy_from_slice(&header_tag);

    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![&[]]
    } else {
        data.chunks(FRAGMENT_SIZE).collect()
    };
    let last = chunks.len() - 1;

    for (index, chunk) in chunks.into_iter().enumerate() {
        let seq = u32::try_from(index + 1)
            .map_err(|e| anyhow!("payload has too many fragments: {e}"))?;
        associated_data[0] = if index == last { FINAL_FRAGMENT } else { 0x00 };

        let mut fragment = chunk.to_vec();
        key.seal_in_place_append_tag(
            fragment_nonce(nonce, seq),
            Aad::from(associated_data),
            &mut fragment,
        )
        .map_err(|e| anyhow!("failed to seal payload fragment {seq}: {e}"))?;
        out.extend_from_slice(&fragment);
    }

    Ok(out)
}

fn derive_key(password: &str, salt: &[u8]) -> Result<LessSafeKey> {
    let mut key_bytes = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        PBKDF2_ITERATIONS,
        salt,
        password.as_bytes(),
        key_bytes.as_mut(),
    );
    let unbound = UnboundKey::new(&AES_256_GCM, key_bytes.as_ref())
        .map_err(|e| anyhow!("failed to build payload key: {e}"))?;
    Ok(LessSafeKey::new(unbound))
}

fn fragment_nonce(prefix: &[u8; NONCE_PREFIX_LEN], seq: u32) -> Nonce {
    let mut nonce = [0u8; 12];
    nonce[..NONCE_PREFIX_LEN].copy_from_slice(prefix);
    nonce[NONCE_PREFIX_LEN..].copy_from_slice(&seq.to_le_bytes());
    Nonce::assume_unique_for_key(nonce)
}
