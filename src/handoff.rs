//! Desktop handoff stage.
//!
//! After sign-in Slack asks the browser to open the desktop app, and the
//! browser shows an "Open Slack?" confirmation that the page itself cannot
//! answer. Each attempt focuses the browser window, moves the dialog focus to
//! the confirm button with Right, presses Enter, then reloads the page so the
//! dialog is raised again for the next attempt. Failures inside an attempt are
//! logged and never stop the loop.

use std::time::Duration;

use tokio::time::sleep;

use crate::desktop::{DesktopInput, HandoffInjectionError, Key};
use crate::logging::{CATEGORY_HANDOFF, FlowLogger};
use crate::session::SessionDriver;

pub const FIRST_ATTEMPT_SETTLE: Duration = Duration::from_millis(400);
pub const ATTEMPT_SETTLE: Duration = Duration::from_millis(300);
pub const DIALOG_APPEAR: Duration = Duration::from_millis(100);
pub const FOCUS_SETTLE: Duration = Duration::from_millis(80);
pub const KEY_GAP: Duration = Duration::from_millis(80);
pub const AFTER_KEYS_SETTLE: Duration = Duration::from_millis(300);
pub const AFTER_REFRESH_SETTLE: Duration = Duration::from_millis(250);

/// Forced reload issued after the native refresh.
pub const RELOAD_SCRIPT: &str = "window.location.reload(true);";

/// Counters collected across the handoff loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffReport {
    pub attempts: u32,
    pub keys_delivered: u32,
    pub injection_failures: u32,
    pub refresh_failures: u32,
}

/// Run `attempts` handoff iterations. Never fails.
pub async fn run_handoff<S: SessionDriver>(
    session: &S,
    input: &dyn DesktopInput,
    attempts: u32,
    logger: &FlowLogger,
) -> HandoffReport {
    let mut report = HandoffReport::default();

    for attempt in 1..=attempts {
        sleep(if attempt == 1 {
            FIRST_ATTEMPT_SETTLE
        } else {
            ATTEMPT_SETTLE
        })
        .await;
        logger.info(
            format!("Open Slack attempt {attempt}/{attempts}..."),
            CATEGORY_HANDOFF,
        );

        match confirm_dialog(session, input, &mut report).await {
            Ok(()) => {}
            Err(err) => {
                report.injection_failures += 1;
                logger.info(format!("Key injection failed: {err}"), CATEGORY_HANDOFF);
            }
        }
        sleep(AFTER_KEYS_SETTLE).await;

        report.refresh_failures += refresh(session, logger).await;
        sleep(AFTER_REFRESH_SETTLE).await;
        report.attempts = attempt;
    }

    report
}

/// Focus the browser and send Right then Enter to the confirmation dialog.
async fn confirm_dialog<S: SessionDriver>(
    session: &S,
    input: &dyn DesktopInput,
    report: &mut HandoffReport,
) -> Result<(), HandoffInjectionError> {
    sleep(DIALOG_APPEAR).await;
    let title = session.title().await.unwrap_or_default();
    if !input.focus_window(&title).await {
        log::debug!("no browser window could be focused");
    }
    sleep(FOCUS_SETTLE).await;

    input.press_key(Key::Right).await?;
    report.keys_delivered += 1;
    sleep(KEY_GAP).await;
    input.press_key(Key::Enter).await?;
    report.keys_delivered += 1;
    Ok(())
}

/// Native refresh followed by a scripted forced reload. Returns the number of
/// the two that failed.
async fn refresh<S: SessionDriver>(session: &S, logger: &FlowLogger) -> u32 {
    let mut failures = 0;
    if let Err(err) = session.refresh().await {
        failures += 1;
        logger.info(format!("Refresh failed: {err}"), CATEGORY_HANDOFF);
    }
    if let Err(err) = session.execute_script(RELOAD_SCRIPT).await {
        failures += 1;
        logger.info(format!("Scripted reload failed: {err}"), CATEGORY_HANDOFF);
    }
    failures
}
