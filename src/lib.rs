//! Unattended Slack sign-in with desktop-app handoff.
//!
//! The crate drives a Chromium session through the email/password form, the
//! TOTP second factor, and finally the "Open Slack?" handoff dialog. The
//! stages only talk to the browser through [`session::SessionDriver`], so the
//! orchestration can be exercised against in-memory sessions as well as the
//! chromiumoxide-backed [`runtime::ChromiumSession`].

pub mod config;
pub mod credentials;
pub mod desktop;
pub mod flow;
pub mod handoff;
pub mod locator;
pub mod logging;
pub mod resolver;
pub mod runtime;
pub mod session;
pub mod totp;
pub mod two_factor;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ConfigOverrides, Credentials, LoginConfig};
pub use flow::{LoginContext, LoginError, LoginFlow, RunReport, Stage};
pub use locator::{Locator, LocatorSet};
pub use logging::{FlowLogger, Verbosity};
pub use session::{ElementHandle, SessionDriver, SessionError};
pub use two_factor::TwoFactorOutcome;
