//! Second-factor stage.
//!
//! When a TOTP secret is configured the current code is printed, typed into
//! the challenge input and confirmed. When there is no code, or the input
//! cannot be found, the stage falls back to waiting for the operator to
//! finish the challenge in a visible browser.

use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use tokio::time::sleep;

use crate::config::LoginConfig;
use crate::locator::{CONFIRM_LABELS, LocatorSet, buttons};
use crate::logging::{CATEGORY_TWO_FACTOR, FlowLogger};
use crate::resolver::{self, NotFound, PollOutcome, poll_until};
use crate::session::{ElementHandle, SessionDriver, SessionError};
use crate::totp::TotpProvider;

pub const SUBMIT_SETTLE: Duration = Duration::from_millis(600);
pub const CODE_FOCUS_SETTLE: Duration = Duration::from_millis(150);
pub const CODE_TYPED_SETTLE: Duration = Duration::from_millis(300);
pub const POST_SUBMIT_SETTLE: Duration = Duration::from_millis(500);
pub const URL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The manual wait ends once the current URL no longer contains this.
pub const SIGNIN_PATH_MARKER: &str = "signin";
pub const MANUAL_ACK_PROMPT: &str = "Press Enter when you have finished 2FA...";

/// How the second factor was dealt with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoFactorOutcome {
    /// A generated code was typed and confirmed.
    Submitted,
    /// The run waited for the operator. `user_completed` is true when the
    /// browser left the sign-in page before the wait budget ran out.
    ManualWaitExpired { user_completed: bool },
    /// Nothing was submitted and no wait was possible (headless or zero budget).
    NotPresent,
}

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("no TOTP code available")]
    NoCode,
    #[error(transparent)]
    InputNotFound(NotFound),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Blocks until the operator confirms they are done.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn acknowledge(&self, prompt: &str);
}

/// Prompts on stdout and waits for a line on stdin.
///
/// End of input and Ctrl-C both count as confirmation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalAcknowledger;

#[async_trait]
impl Acknowledger for TerminalAcknowledger {
    async fn acknowledge(&self, prompt: &str) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(format!("{prompt}\n").as_bytes()).await;
        let _ = stdout.flush().await;

        let line = match read_line_detached(io::BufReader::new(io::stdin())) {
            Ok(line) => line,
            Err(err) => {
                log::debug!("could not start stdin reader: {err}");
                return;
            }
        };
        tokio::select! {
            read = line => match read {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => log::debug!("stdin closed while waiting for acknowledgement: {err}"),
                Err(_) => log::debug!("stdin reader went away"),
            },
            _ = tokio::signal::ctrl_c() => {
                log::debug!("interrupted while waiting for acknowledgement");
            }
        }
    }
}

/// Read one line from `reader` on a plain thread.
///
/// The thread is detached, so an abandoned read never holds up runtime
/// shutdown.
fn read_line_detached<R>(mut reader: R) -> io::Result<oneshot::Receiver<io::Result<String>>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name("ack-stdin".into())
        .spawn(move || {
            let mut line = String::new();
            let read = reader.read_line(&mut line).map(|_| line);
            let _ = tx.send(read);
        })?;
    Ok(rx)
}

/// Dependencies of the second-factor stage.
pub struct SecondFactor<'a> {
    pub config: &'a LoginConfig,
    pub logger: &'a FlowLogger,
    pub totp: &'a dyn TotpProvider,
    pub acknowledger: &'a dyn Acknowledger,
}

impl<'a> SecondFactor<'a> {
    /// Deal with the second factor. This never fails: every problem ends in
    /// the manual-wait fallback.
    pub async fn resolve<S: SessionDriver>(&self, session: &S) -> TwoFactorOutcome {
        sleep(SUBMIT_SETTLE).await;

        let code = self.current_code();
        if code.is_empty() {
            self.logger
                .info(">>> No TOTP code (enter 2FA manually).", CATEGORY_TWO_FACTOR);
        } else {
            self.logger
                .info(format!(">>> 2FA code: {code} <<<"), CATEGORY_TWO_FACTOR);
        }

        let attempt = if code.is_empty() {
            Err(ChallengeError::NoCode)
        } else {
            self.submit_code(session, &code).await
        };

        match attempt {
            Ok(()) => {
                self.logger
                    .info("2FA code entered and submitted.", CATEGORY_TWO_FACTOR);
                sleep(POST_SUBMIT_SETTLE).await;
                TwoFactorOutcome::Submitted
            }
            Err(ChallengeError::NoCode) => {
                self.logger.info(
                    "No SLACK_TOTP_SECRET set. Complete 2FA in the browser.",
                    CATEGORY_TWO_FACTOR,
                );
                self.manual_wait(session).await
            }
            Err(ChallengeError::InputNotFound(_)) => {
                self.logger.info(
                    format!(">>> Could not find 2FA input. Type this code in the browser: {code}"),
                    CATEGORY_TWO_FACTOR,
                );
                self.manual_wait(session).await
            }
            Err(ChallengeError::Session(err)) => {
                self.logger
                    .error(format!(">>> 2FA step error: {err}"), CATEGORY_TWO_FACTOR);
                // The first code may have rolled over while the step failed.
                let fresh = self.current_code();
                if !fresh.is_empty() && !self.config.headless {
                    self.logger.info(
                        format!(">>> Type this code manually: {fresh}"),
                        CATEGORY_TWO_FACTOR,
                    );
                }
                self.manual_wait(session).await
            }
        }
    }

    fn current_code(&self) -> String {
        self.config
            .credentials
            .totp_secret()
            .map(|secret| self.totp.current_code(secret))
            .unwrap_or_default()
    }

    async fn submit_code<S: SessionDriver>(
        &self,
        session: &S,
        code: &str,
    ) -> Result<(), ChallengeError> {
        let resolved = resolver::resolve(
            session,
            &LocatorSet::two_factor_code_field(),
            self.config.two_factor_timeout(),
        )
        .await
        .map_err(ChallengeError::InputNotFound)?;
        let input = resolved.element;

        if let Err(err) = input.click().await {
            log::debug!("could not focus 2FA input: {err}");
        }
        sleep(CODE_FOCUS_SETTLE).await;
        input.clear().await?;
        input.type_text(code).await?;
        sleep(CODE_TYPED_SETTLE).await;

        if resolver::click_first(session, &buttons(&CONFIRM_LABELS), true)
            .await
            .is_none()
        {
            if let Err(err) = input.submit().await {
                log::debug!("form submit from 2FA input failed: {err}");
            }
        }
        Ok(())
    }

    async fn manual_wait<S: SessionDriver>(&self, session: &S) -> TwoFactorOutcome {
        if self.config.headless || self.config.manual_2fa_wait_seconds == 0 {
            return TwoFactorOutcome::NotPresent;
        }

        self.logger.info(
            format!(
                "Waiting up to {}s for 2FA to be completed in the browser...",
                self.config.manual_2fa_wait_seconds
            ),
            CATEGORY_TWO_FACTOR,
        );
        let outcome = poll_until(
            move || async move {
                session
                    .current_url()
                    .await
                    .map(|url| !url.to_lowercase().contains(SIGNIN_PATH_MARKER))
                    .unwrap_or(false)
            },
            URL_POLL_INTERVAL,
            self.config.manual_2fa_wait(),
        )
        .await;

        match outcome {
            PollOutcome::Satisfied => TwoFactorOutcome::ManualWaitExpired {
                user_completed: true,
            },
            PollOutcome::Exhausted => {
                self.acknowledger.acknowledge(MANUAL_ACK_PROMPT).await;
                TwoFactorOutcome::ManualWaitExpired {
                    user_completed: false,
                }
            }
        }
    }
}
