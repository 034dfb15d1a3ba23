//! # Credential Generation
//!
//! Secret keys for MinIO users: uniformly random strings over the 52 ASCII
//! letters. `rand::thread_rng` is a CSPRNG seeded from the OS.

use crate::constants::CREDENTIALS_SECRET_SUFFIX;
use rand::Rng;
use std::fmt;
use zeroize::Zeroizing;

const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random string of `length` letters
pub fn generate(length: usize) -> Zeroizing<String> {
    let mut rng = rand::thread_rng();
    let secret: String = (0..length)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect();
    Zeroizing::new(secret)
}

/// Name of the Secret a user's credentials are published to
pub fn credentials_secret_name(user: &str) -> String {
    format!("{user}{CREDENTIALS_SECRET_SUFFIX}")
}

/// Access key and secret key of a MinIO user
///
/// Lives for one reconciliation; the secret key is wiped on drop.
#[derive(Clone)]
pub struct GeneratedCredential {
    pub access_key: String,
    pub secret_key: Zeroizing<String>,
}

impl GeneratedCredential {
    pub fn new(access_key: impl Into<String>, secret_key: Zeroizing<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key,
        }
    }
}

impl fmt::Debug for GeneratedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedCredential")
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}
