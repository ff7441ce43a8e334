use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Salt length in bytes for newly derived credentials.
const SALT_LEN: usize = 64;

/// Key used to verify rows created before per-user salts existed. Those rows
/// never had key material persisted, so the MAC is re-keyed with this fixed
/// value on every check.
const LEGACY_HMAC_KEY: &[u8] = b"edusync-legacy-credential-key";

/// Freshly derived salted credential, both parts base64 text ready for
/// storage. Hash and salt must always be written together.
#[derive(Debug, Clone)]
pub struct DerivedCredential {
    pub hash: String,
    pub salt: String,
}

/// Generate a random salt and compute the salted HMAC-SHA512 of the password.
pub fn derive_credential(password: &str) -> DerivedCredential {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let hash = keyed_hash(&salt, password);
    DerivedCredential {
        hash: BASE64.encode(hash),
        salt: BASE64.encode(salt),
    }
}

/// Unsalted hash as produced for pre-salt rows. Used to verify legacy logins
/// and to seed legacy fixtures.
pub fn legacy_hash(password: &str) -> Vec<u8> {
    keyed_hash(LEGACY_HMAC_KEY, password)
}

fn keyed_hash(key: &[u8], password: &str) -> Vec<u8> {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can accept any key length");
    mac.update(password.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn verify_with_key(key: &[u8], password: &str, stored: &[u8]) -> bool {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can accept any key length");
    mac.update(password.as_bytes());
    // constant-time comparison
    mac.verify_slice(stored).is_ok()
}

/// Credential as persisted on a user row. The variant is decided by whether
/// the row carries a salt; legacy rows have none.
#[derive(Debug)]
pub enum StoredCredential {
    Legacy { hash: Vec<u8> },
    Salted { hash: Vec<u8>, salt: Vec<u8> },
}

impl StoredCredential {
    /// Decode the base64 columns of a row. The caller has already rejected
    /// rows with an empty hash; an empty salt marks a legacy row.
    pub fn decode(hash_b64: &str, salt_b64: &str) -> anyhow::Result<Self> {
        let hash = BASE64
            .decode(hash_b64)
            .context("malformed stored password hash")?;
        if salt_b64.is_empty() {
            Ok(StoredCredential::Legacy { hash })
        } else {
            let salt = BASE64
                .decode(salt_b64)
                .context("malformed stored password salt")?;
            Ok(StoredCredential::Salted { hash, salt })
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredCredential::Legacy { .. })
    }

    pub fn verify(&self, password: &str) -> bool {
        match self {
            StoredCredential::Legacy { hash } => {
                verify_with_key(LEGACY_HMAC_KEY, password, hash)
            }
            StoredCredential::Salted { hash, salt } => verify_with_key(salt, password, hash),
        }
    }
}
