//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP / WebSocket server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit SQLite database path.  When unset the store picks the
    /// platform data directory.
    /// Env: `DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Filesystem path where processed media (thumbnails, message images)
    /// is stored.
    /// Env: `MEDIA_STORAGE_PATH`
    /// Default: `./media`
    pub media_storage_path: PathBuf,

    /// Public base URL prefixed onto stored media paths.
    /// Env: `PUBLIC_BASE_URL`
    /// Default: `http://localhost:8080`
    pub public_base_url: String,

    /// Keyed-hash secret shared with the (external) login service that
    /// mints session tokens (hex-encoded, 64 chars).
    /// Env: `AUTH_SECRET`
    /// Default: all-zeros (development only).
    pub auth_secret: [u8; 32],
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            db_path: None,
            media_storage_path: PathBuf::from("./media"),
            public_base_url: "http://localhost:8080".to_string(),
            auth_secret: [0u8; 32],
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("MEDIA_STORAGE_PATH") {
            config.media_storage_path = PathBuf::from(path);
        }

        if let Ok(url) = std::env::var("PUBLIC_BASE_URL") {
            config.public_base_url = url.trim_end_matches('/').to_string();
        }

        match std::env::var("AUTH_SECRET") {
            Ok(hex_secret) => match parse_hex_secret(&hex_secret) {
                Ok(secret) => config.auth_secret = secret,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid AUTH_SECRET, using default (dev-only)");
                }
            },
            Err(_) => {
                tracing::warn!("AUTH_SECRET not set, using all-zeros dev secret");
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte array.
fn parse_hex_secret(hex: &str) -> Result<[u8; 32], String> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex.len()));
    }

    let mut bytes = [0u8; 32];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let hi = hex_digit(chunk[0])?;
        let lo = hex_digit(chunk[1])?;
        bytes[i] = (hi << 4) | lo;
    }
    Ok(bytes)
}

fn hex_digit(c: u8) -> Result<u8, String> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(format!("invalid hex digit: {}", c as char)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.auth_secret, [0u8; 32]);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn parse_hex_secret_round_trip() {
        let hex = "ab".repeat(32);
        let secret = parse_hex_secret(&hex).unwrap();
        assert_eq!(secret, [0xab; 32]);
    }

    #[test]
    fn parse_hex_secret_wrong_length() {
        assert!(parse_hex_secret("abcd").is_err());
    }
}
