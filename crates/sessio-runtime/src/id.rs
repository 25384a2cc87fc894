//! Session id generation and validation
//!
//! Ids are a hash of OS randomness rendered at 4, 5 or 6 bits per character.
//! More bits per character packs the same entropy into a shorter id.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::RuntimeError;
use crate::Result;

const ALPHABET: &[u8; 64] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ-,";
const ENTROPY_BYTES: usize = 32;
const MAX_ID_LENGTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdHash {
    Sha256,
    Sha512,
}

/// How a client presented its session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdTransport {
    Cookie,
    Url,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdPolicy {
    /// Refuse ids carried in URLs (session fixation)
    pub use_only_cookies: bool,
    pub hash: IdHash,
    /// 4, 5 or 6
    pub bits_per_character: u8,
}

impl IdPolicy {
    /// Cookie-only transport, SHA-512, 6 bits per character.
    pub fn hardened() -> Self {
        Self {
            use_only_cookies: true,
            hash: IdHash::Sha512,
            bits_per_character: 6,
        }
    }

    /// Characters an id may contain under this policy.
    pub fn alphabet(&self) -> &'static [u8] {
        &ALPHABET[..1usize << self.bits()]
    }

    fn bits(&self) -> u8 {
        self.bits_per_character.clamp(4, 6)
    }
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self::hardened()
    }
}

pub fn generate_id(policy: &IdPolicy) -> String {
    let mut entropy = [0u8; ENTROPY_BYTES];
    OsRng.fill_bytes(&mut entropy);

    let digest = match policy.hash {
        IdHash::Sha256 => Sha256::digest(entropy).to_vec(),
        IdHash::Sha512 => Sha512::digest(entropy).to_vec(),
    };

    to_readable(&digest, policy.bits())
}

/// Reject ids that this policy could never have produced.
pub fn validate_id(id: &str, policy: &IdPolicy) -> Result<()> {
    let alphabet = policy.alphabet();

    if id.is_empty()
        || id.len() > MAX_ID_LENGTH
        || !id.bytes().all(|b| alphabet.contains(&b))
    {
        return Err(RuntimeError::InvalidId(id.to_string()));
    }

    Ok(())
}

fn to_readable(bytes: &[u8], bits: u8) -> String {
    let mask = (1u16 << bits) - 1;
    let mut out = String::with_capacity(bytes.len() * 8 / bits as usize + 1);
    let mut acc: u16 = 0;
    let mut pending: u8 = 0;

    for &byte in bytes {
        acc |= (byte as u16) << pending;
        pending += 8;

        while pending >= bits {
            out.push(ALPHABET[(acc & mask) as usize] as char);
            acc >>= bits;
            pending -= bits;
        }
    }

    if pending > 0 {
        out.push(ALPHABET[(acc & mask) as usize] as char);
    }

    out
}
