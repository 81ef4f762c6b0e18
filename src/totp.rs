//! Time-based one-time passwords for the second factor.
//!
//! Generation is behind the `totp` cargo feature. Without it,
//! [`SecretTotp`] yields no code and configuration validation rejects a
//! configured secret up front.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Produces the code for the current 30-second window.
pub trait TotpProvider: Send + Sync {
    /// Current six-digit code for `secret`, or an empty string if none can be
    /// produced.
    fn current_code(&self, secret: &str) -> String;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TotpError {
    #[error("TOTP secret is not valid base32")]
    InvalidSecret,
    #[error("system clock is set before the unix epoch")]
    Clock,
    #[error("TOTP generation is not compiled in")]
    Unavailable,
}

/// Strip whitespace and upper-case a base32 secret. Blank input means "no secret".
pub fn normalize_secret(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

pub const fn generation_available() -> bool {
    cfg!(feature = "totp")
}

/// RFC 6238 code (SHA-1, six digits, 30 s step) for `secret` at `unix_time`.
#[cfg(feature = "totp")]
pub fn code_at(secret: &str, unix_time: u64) -> Result<String, TotpError> {
    use totp_rs::{Algorithm, Secret, TOTP};

    let bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|_| TotpError::InvalidSecret)?;
    let totp = TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes);
    Ok(totp.generate(unix_time))
}

#[cfg(not(feature = "totp"))]
pub fn code_at(_secret: &str, _unix_time: u64) -> Result<String, TotpError> {
    Err(TotpError::Unavailable)
}

/// Generates codes from the configured secret using the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecretTotp;

impl TotpProvider for SecretTotp {
    fn current_code(&self, secret: &str) -> String {
        let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => elapsed.as_secs(),
            Err(_) => {
                log::warn!("{}", TotpError::Clock);
                return String::new();
            }
        };
        match code_at(secret, now) {
            Ok(code) => code,
            Err(err) => {
                log::warn!("could not generate TOTP code: {err}");
                String::new()
            }
        }
    }
}
