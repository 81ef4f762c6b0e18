//! Strongly-typed configuration for a sign-in run.
//!
//! Values are read from the process environment (after loading a `.env` file
//! if present) or from a JSON file, and can then be merged with explicit
//! overrides coming from the command line. The resulting [`LoginConfig`] is
//! built once at startup and only ever handed out by reference.

use std::env;
use std::fmt;
use std::fs;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::totp;

/// Sign-in page used when `SLACK_SIGNIN_URL` is not set.
pub const DEFAULT_SIGNIN_URL: &str = "https://slack.com/signin";
pub const DEFAULT_MANUAL_2FA_WAIT_SECS: u64 = 120;
pub const DEFAULT_HANDOFF_ATTEMPTS: u32 = 6;
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ELEMENT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_TWO_FACTOR_TIMEOUT_SECS: u64 = 15;

/// Account credentials for one run.
///
/// The password and TOTP secret are never serialized and are redacted from
/// `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
}

impl Credentials {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        totp_secret: Option<&str>,
    ) -> Self {
        let mut credentials = Credentials {
            email: email.into(),
            password: password.into(),
            totp_secret: totp_secret.map(str::to_string),
        };
        credentials.normalize();
        credentials
    }

    /// Normalized TOTP secret, if one is configured.
    pub fn totp_secret(&self) -> Option<&str> {
        self.totp_secret.as_deref()
    }

    fn normalize(&mut self) {
        self.email = self.email.trim().to_string();
        self.password = self.password.trim().to_string();
        self.totp_secret = self
            .totp_secret
            .as_deref()
            .and_then(totp::normalize_secret);
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password_present", &!self.password.is_empty())
            .field("totp_secret_present", &self.totp_secret.is_some())
            .finish()
    }
}

/// Configuration values for a sign-in run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(alias = "signinUrl")]
    pub signin_url: String,
    pub headless: bool,
    #[serde(alias = "manual2faWaitSeconds")]
    pub manual_2fa_wait_seconds: u64,
    #[serde(alias = "handoffAttempts")]
    pub handoff_attempts: u32,
    #[serde(alias = "chromeExecutable")]
    pub chrome_executable: Option<PathBuf>,
    #[serde(alias = "pageLoadTimeoutSecs")]
    pub page_load_timeout_secs: u64,
    #[serde(alias = "elementTimeoutSecs")]
    pub element_timeout_secs: u64,
    #[serde(alias = "twoFactorTimeoutSecs")]
    pub two_factor_timeout_secs: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        LoginConfig {
            credentials: Credentials::default(),
            signin_url: DEFAULT_SIGNIN_URL.to_string(),
            headless: false,
            manual_2fa_wait_seconds: DEFAULT_MANUAL_2FA_WAIT_SECS,
            handoff_attempts: DEFAULT_HANDOFF_ATTEMPTS,
            chrome_executable: None,
            page_load_timeout_secs: DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
            element_timeout_secs: DEFAULT_ELEMENT_TIMEOUT_SECS,
            two_factor_timeout_secs: DEFAULT_TWO_FACTOR_TIMEOUT_SECS,
        }
    }
}

impl LoginConfig {
    /// Construct a configuration from environment variables, after loading a
    /// `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();
        let mut config = LoginConfig::default();

        if let Some(value) = env_var("SLACK_EMAIL") {
            config.credentials.email = value;
        }

        if let Some(value) = env_var("SLACK_PASSWORD") {
            config.credentials.password = value;
        }

        if let Some(value) = env_var("SLACK_TOTP_SECRET") {
            config.credentials.totp_secret = Some(value);
        }

        if let Some(value) = env_var("SLACK_SIGNIN_URL") {
            config.signin_url = value;
        }

        if let Some(value) = env_var("HEADLESS") {
            config.headless = parse_bool("HEADLESS", &value)?;
        }

        if let Some(value) = env_var("TWOFA_WAIT_SECONDS") {
            config.manual_2fa_wait_seconds = parse_u64("TWOFA_WAIT_SECONDS", &value)?;
        }

        if let Some(value) = env_var("SLACK_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("SLACK_HANDOFF_ATTEMPTS") {
            config.handoff_attempts = parse_u32("SLACK_HANDOFF_ATTEMPTS", &value)?;
        }

        if let Some(value) = env_var("SLACK_PAGE_LOAD_TIMEOUT_SECS") {
            config.page_load_timeout_secs = parse_u64("SLACK_PAGE_LOAD_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = env_var("SLACK_ELEMENT_TIMEOUT_SECS") {
            config.element_timeout_secs = parse_u64("SLACK_ELEMENT_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = env_var("SLACK_TWOFA_TIMEOUT_SECS") {
            config.two_factor_timeout_secs = parse_u64("SLACK_TWOFA_TIMEOUT_SECS", &value)?;
        }

        config.credentials.normalize();
        Ok(config)
    }

    /// Load a configuration from a JSON document on disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: LoginConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.credentials.normalize();
        Ok(config)
    }

    /// Create a new configuration with explicit field overrides applied.
    pub fn with_overrides(&self, overrides: ConfigOverrides) -> LoginConfig {
        let mut next = self.clone();

        if let Some(value) = overrides.signin_url {
            next.signin_url = value;
        }
        if let Some(value) = overrides.headless {
            next.headless = value;
        }
        if let Some(value) = overrides.manual_2fa_wait_seconds {
            next.manual_2fa_wait_seconds = value;
        }
        if let Some(value) = overrides.handoff_attempts {
            next.handoff_attempts = value;
        }
        if let Some(value) = overrides.chrome_executable {
            next.chrome_executable = Some(value);
        }

        next.credentials.normalize();
        next
    }

    /// Pre-flight checks performed before any browser is launched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with(totp::generation_available())
    }

    pub(crate) fn validate_with(&self, totp_available: bool) -> Result<(), ConfigError> {
        if self.credentials.email.is_empty() {
            return Err(ConfigError::MissingCredential("SLACK_EMAIL"));
        }
        if self.credentials.password.is_empty() {
            return Err(ConfigError::MissingCredential("SLACK_PASSWORD"));
        }
        if self.credentials.totp_secret.is_some() && !totp_available {
            return Err(ConfigError::TotpUnavailable);
        }
        Ok(())
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn two_factor_timeout(&self) -> Duration {
        Duration::from_secs(self.two_factor_timeout_secs)
    }

    pub fn manual_2fa_wait(&self) -> Duration {
        Duration::from_secs(self.manual_2fa_wait_seconds)
    }
}

/// Field-level overrides for [`LoginConfig::with_overrides`].
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub signin_url: Option<String>,
    pub headless: Option<bool>,
    pub manual_2fa_wait_seconds: Option<u64>,
    pub handoff_attempts: Option<u32>,
    pub chrome_executable: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Builder-style helper to set the `headless` override.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Builder-style helper to set the manual 2FA wait budget.
    pub fn manual_2fa_wait_seconds(mut self, seconds: u64) -> Self {
        self.manual_2fa_wait_seconds = Some(seconds);
        self
    }
}

/// Errors that can arise while constructing or validating a [`LoginConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}; set it in the environment or in .env")]
    MissingCredential(&'static str),
    #[error("SLACK_TOTP_SECRET is set but TOTP generation is unavailable (enable the `totp` feature)")]
    TotpUnavailable,
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}
