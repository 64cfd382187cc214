//! PBKDF2-HMAC-SHA256 password hashes, stored as
//! `pbkdf2_sha256$<rounds>$<salt hex>$<hash hex>`.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const ALGORITHM: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const ROUNDS: u32 = 100_000;

fn derive(password: &str, salt: &[u8], rounds: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, rounds, &mut out);
    out
}

fn hash_with_rounds(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    format!(
        "{ALGORITHM}${rounds}${}${}",
        hex::encode(salt),
        hex::encode(derive(password, &salt, rounds))
    )
}

pub fn hash_password(password: &str) -> String {
    hash_with_rounds(password, ROUNDS)
}

/// Checks `password` against a stored hash. The round count comes from the
/// stored value so older hashes keep verifying after `ROUNDS` changes.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(ALGORITHM), Some(rounds), Some(salt_hex), Some(hash_hex), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    let Ok(rounds) = rounds.parse::<u32>() else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    if rounds == 0 {
        return false;
    }

    derive(password, &salt, rounds)[..].ct_eq(&expected[..]).into()
}
