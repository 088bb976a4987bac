use rand::{seq::SliceRandom, thread_rng, Rng};
use sha2::{Digest, Sha256};

const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijkmnpqrstuvwxyz";
const DIGITS: &[u8] = b"23456789";
const SYMBOLS: &[u8] = b"!@#$%^&*-_=+?";

pub const TEMP_PASSWORD_LENGTH: usize = 12;

/// Random throwaway password for a freshly provisioned account. Contains at
/// least one character from every class; the caller never returns it.
pub fn generate_temp_password() -> String {
    let mut rng = thread_rng();
    let classes = [UPPER, LOWER, DIGITS, SYMBOLS];
    let all: Vec<u8> = classes.concat();

    let mut chars: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while chars.len() < TEMP_PASSWORD_LENGTH {
        chars.push(all[rng.gen_range(0..all.len())]);
    }
    chars.shuffle(&mut rng);

    String::from_utf8(chars).unwrap_or_default()
}

/// 256-bit url-safe invitation token.
pub fn generate_invitation_token() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Tokens are stored only as their SHA-256 digest.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
