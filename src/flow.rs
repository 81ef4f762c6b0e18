//! End-to-end orchestration of a sign-in run.
//!
//! [`LoginFlow::run`] validates the configuration, launches a session, drives
//! the credential, second-factor and handoff stages in order, and always
//! closes the session afterwards regardless of how the stages ended.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

use crate::config::{ConfigError, LoginConfig};
use crate::credentials::{self, CredentialError};
use crate::desktop::DesktopInput;
use crate::handoff;
use crate::logging::{CATEGORY_FLOW, FlowLogger};
use crate::session::{SessionDriver, SessionError};
use crate::totp::TotpProvider;
use crate::two_factor::{Acknowledger, SecondFactor, TwoFactorOutcome};

pub const PRE_HANDOFF_SETTLE: Duration = Duration::from_millis(200);
pub const POST_HANDOFF_SETTLE: Duration = Duration::from_millis(300);

/// Where a run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Credentials,
    SecondFactor,
    Handoff,
    Finished,
}

/// Mutable state threaded through the stages of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginContext {
    pub stage: Stage,
    pub code_sent: bool,
    pub handoff_attempts: u32,
}

/// Fatal outcomes of a run. Everything else is narrated and absorbed.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("could not find {0} field")]
    FieldNotFound(&'static str),
    #[error("{field} field rejected input: {source}")]
    FieldRejected {
        field: &'static str,
        #[source]
        source: SessionError,
    },
    #[error("failed to launch browser: {0}")]
    Launch(#[source] SessionError),
    #[error("could not open sign-in page: {0}")]
    Navigation(#[source] SessionError),
}

impl LoginError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

impl From<CredentialError> for LoginError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::FieldNotFound(missing) => LoginError::FieldNotFound(missing.field),
            CredentialError::FieldRejected { field, source } => {
                LoginError::FieldRejected { field, source }
            }
            CredentialError::Navigation(source) => LoginError::Navigation(source),
        }
    }
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub two_factor: TwoFactorOutcome,
    pub handoff_attempts: u32,
    pub final_url: String,
}

/// Exit status for the result of [`LoginFlow::run`].
pub fn exit_code(result: &Result<RunReport, LoginError>) -> u8 {
    match result {
        Ok(_) => 0,
        Err(err) => err.exit_code(),
    }
}

/// Borrowed collaborators for one run.
pub struct LoginFlow<'a> {
    config: &'a LoginConfig,
    logger: &'a FlowLogger,
    totp: &'a dyn TotpProvider,
    desktop: &'a dyn DesktopInput,
    acknowledger: &'a dyn Acknowledger,
}

impl<'a> LoginFlow<'a> {
    pub fn new(
        config: &'a LoginConfig,
        logger: &'a FlowLogger,
        totp: &'a dyn TotpProvider,
        desktop: &'a dyn DesktopInput,
        acknowledger: &'a dyn Acknowledger,
    ) -> Self {
        LoginFlow {
            config,
            logger,
            totp,
            desktop,
            acknowledger,
        }
    }

    /// Validate, launch a session through `launch`, drive it, then close it.
    ///
    /// `launch` is not called when validation fails.
    pub async fn run<S, L, Fut>(&self, launch: L) -> Result<RunReport, LoginError>
    where
        S: SessionDriver,
        L: FnOnce() -> Fut,
        Fut: Future<Output = Result<S, SessionError>>,
    {
        self.config.validate()?;

        if let Some(secret) = self.config.credentials.totp_secret() {
            self.logger
                .info("TOTP secret loaded; 2FA codes will be generated.", CATEGORY_FLOW);
            let code = self.totp.current_code(secret);
            if !code.is_empty() {
                self.logger
                    .info(format!("Current 2FA code: {code}"), CATEGORY_FLOW);
            }
        } else {
            self.logger.info(
                "No TOTP secret configured; 2FA must be completed by hand.",
                CATEGORY_FLOW,
            );
        }

        self.logger.info("Launching browser...", CATEGORY_FLOW);
        let session = launch().await.map_err(LoginError::Launch)?;

        let result = self.drive(&session).await;
        if let Err(err) = session.close().await {
            self.logger
                .error(format!("Failed to close browser: {err}"), CATEGORY_FLOW);
        }
        result
    }

    /// Drive the stages against an already launched session.
    pub async fn drive<S: SessionDriver>(&self, session: &S) -> Result<RunReport, LoginError> {
        let mut context = LoginContext {
            stage: Stage::Credentials,
            ..LoginContext::default()
        };
        credentials::submit_credentials(session, self.config, self.logger).await?;

        context.stage = Stage::SecondFactor;
        let two_factor = SecondFactor {
            config: self.config,
            logger: self.logger,
            totp: self.totp,
            acknowledger: self.acknowledger,
        }
        .resolve(session)
        .await;
        context.code_sent = two_factor == TwoFactorOutcome::Submitted;

        sleep(PRE_HANDOFF_SETTLE).await;
        context.stage = Stage::Handoff;
        let handoff = handoff::run_handoff(
            session,
            self.desktop,
            self.config.handoff_attempts,
            self.logger,
        )
        .await;
        context.handoff_attempts = handoff.attempts;

        sleep(POST_HANDOFF_SETTLE).await;
        let final_url = session.current_url().await.unwrap_or_default();
        self.logger
            .info(format!("Current URL: {final_url}"), CATEGORY_FLOW);
        context.stage = Stage::Finished;
        log::debug!("run finished: {context:?}");

        Ok(RunReport {
            two_factor,
            handoff_attempts: context.handoff_attempts,
            final_url,
        })
    }
}
