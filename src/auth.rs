//! Bearer token issuance and password hashing.
//!
//! Tokens are HS256 JWTs carrying the username in the `sub` claim with a
//! bounded lifetime. Passwords are stored as salted `blake3` hashes; the
//! clear text never leaves the registration/login path.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a token cannot be issued or verified.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is missing, malformed, forged, or expired.
    #[error("invalid or expired token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// JWT claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Subject: the username the token was issued to.
    sub: String,
    /// Issued-at (Unix timestamp).
    iat: i64,
    /// Expiration (Unix timestamp).
    exp: i64,
}

/// Issues and verifies bearer tokens for the protected API surface.
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl Authenticator {
    /// Creates an authenticator from an HMAC secret and a token lifetime
    /// in minutes.
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Issues a token for `username`.
    pub fn issue_token(&self, username: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verifies a token and returns the username it was issued to.
    pub fn verify_token(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims.sub)
    }
}

/// Hashes `password` with a fresh random salt.
///
/// Returns `(salt_hex, hash_hex)`, both suitable for storage.
pub fn hash_password(password: &str) -> (String, String) {
    let salt: [u8; 16] = rand::random();
    let salt_hex = to_hex(&salt);
    let hash = salted_hash(&salt_hex, password);
    (salt_hex, hash.to_hex().to_string())
}

/// Checks `password` against a stored salt and hash.
///
/// Comparison goes through [`blake3::Hash`] equality, which is
/// constant-time. A stored hash that fails to parse never verifies.
pub fn verify_password(password: &str, salt_hex: &str, hash_hex: &str) -> bool {
    let Ok(stored) = blake3::Hash::from_hex(hash_hex) else {
        return false;
    };
    salted_hash(salt_hex, password) == stored
}

fn salted_hash(salt_hex: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt_hex.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
