//! Bearer-token verification for the session gateway.
//!
//! Credential issuance lives outside this service: a login service that
//! shares `AUTH_SECRET` mints tokens of the form
//! `<username>.<hex(blake3::keyed_hash(secret, username))>`.  The gateway
//! only verifies; a transport that presents no token or a bad one is
//! closed silently.

use subtle::ConstantTimeEq;

/// Verifies (and, for tests and tooling, mints) session tokens.
pub struct AuthService {
    secret: [u8; 32],
}

impl AuthService {
    pub fn new(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Mint a token for a username.  Exposed for tests and local tooling;
    /// production tokens come from the external login service.
    pub fn mint(&self, username: &str) -> String {
        let mac = blake3::keyed_hash(&self.secret, username.as_bytes());
        format!("{}.{}", username, mac.to_hex())
    }

    /// Verify a token and return the authenticated username.
    ///
    /// The signature comparison is constant-time so a token cannot be
    /// forged byte-by-byte via timing.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (username, sig_hex) = token.rsplit_once('.')?;
        if username.is_empty() {
            return None;
        }

        let expected = blake3::keyed_hash(&self.secret, username.as_bytes());
        let expected_hex = expected.to_hex();

        let presented = sig_hex.as_bytes();
        let expected_bytes = expected_hex.as_bytes();
        if presented.len() != expected_bytes.len()
            || presented.ct_eq(expected_bytes).unwrap_u8() != 1
        {
            return None;
        }

        Some(username.to_string())
    }
}
