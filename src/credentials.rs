//! Email/password stage.
//!
//! Navigates to the sign-in page, takes the optional "sign in with a
//! password" affordance, fills the email field, steps past "Continue", fills
//! the password and submits. Only a missing or unusable field is fatal: every
//! affordance click is best effort.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;

use crate::config::LoginConfig;
use crate::locator::{
    CONTINUE_LABELS, Locator, LocatorSet, SIGN_IN_LABELS, buttons, password_login_links,
};
use crate::logging::{CATEGORY_CREDENTIALS, FlowLogger};
use crate::resolver::{self, NotFound};
use crate::session::{ElementHandle, SessionDriver, SessionError, replace_text};

pub const NAVIGATION_SETTLE: Duration = Duration::from_millis(700);
pub const PASSWORD_LINK_SETTLE: Duration = Duration::from_millis(800);
pub const CONTINUE_SETTLE: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("could not find {}", .0.field)]
    FieldNotFound(NotFound),
    #[error("{field} field rejected input: {source}")]
    FieldRejected {
        field: &'static str,
        #[source]
        source: SessionError,
    },
    #[error("could not open sign-in page: {0}")]
    Navigation(#[source] SessionError),
}

impl CredentialError {
    /// Name of the form field this error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CredentialError::FieldNotFound(missing) => Some(missing.field),
            CredentialError::FieldRejected { field, .. } => Some(field),
            CredentialError::Navigation(_) => None,
        }
    }
}

/// How the credentials were finally submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitVia {
    /// A sign-in button with this label was clicked.
    Button(&'static str),
    /// No button matched; the password field's form was submitted.
    FieldSubmit,
}

/// Summary of the credential stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialSubmission {
    pub used_password_link: bool,
    pub continued: bool,
    pub submitted_via: SubmitVia,
}

/// Run the credential stage against `session`.
pub async fn submit_credentials<S: SessionDriver>(
    session: &S,
    config: &LoginConfig,
    logger: &FlowLogger,
) -> Result<CredentialSubmission, CredentialError> {
    logger.info(
        format!("Opening Slack sign-in: {}", config.signin_url),
        CATEGORY_CREDENTIALS,
    );
    session
        .navigate(&config.signin_url)
        .await
        .map_err(CredentialError::Navigation)?;
    sleep(NAVIGATION_SETTLE).await;

    let used_password_link =
        resolver::click_first(session, &password_login_links(), false)
            .await
            .is_some();
    if used_password_link {
        logger.info("Switched to password sign-in.", CATEGORY_CREDENTIALS);
        sleep(PASSWORD_LINK_SETTLE).await;
    }

    logger.info("Entering email...", CATEGORY_CREDENTIALS);
    fill_field(
        session,
        &LocatorSet::email_field(),
        &config.credentials.email,
        config.element_timeout(),
    )
    .await?;

    let continue_buttons = buttons(&CONTINUE_LABELS);
    let continued = match resolver::click_first(session, &continue_buttons, false).await {
        Some(index) => {
            logger.debug(
                format!("Clicked '{}'.", CONTINUE_LABELS[index]),
                CATEGORY_CREDENTIALS,
            );
            sleep(CONTINUE_SETTLE).await;
            true
        }
        None => false,
    };

    logger.info("Entering password...", CATEGORY_CREDENTIALS);
    let password = fill_field(
        session,
        &LocatorSet::password_field(),
        &config.credentials.password,
        config.element_timeout(),
    )
    .await?;

    let submitted_via = submit(session, &password, logger).await;
    logger.info("Credentials submitted.", CATEGORY_CREDENTIALS);

    Ok(CredentialSubmission {
        used_password_link,
        continued,
        submitted_via,
    })
}

/// Resolve `set` and replace the field's contents with `value`.
async fn fill_field<S: SessionDriver>(
    session: &S,
    set: &LocatorSet,
    value: &str,
    timeout: Duration,
) -> Result<S::Element, CredentialError> {
    let resolved = resolver::resolve(session, set, timeout)
        .await
        .map_err(CredentialError::FieldNotFound)?;
    replace_text(&resolved.element, value)
        .await
        .map_err(|source| CredentialError::FieldRejected {
            field: set.field(),
            source,
        })?;
    Ok(resolved.element)
}

async fn submit<S: SessionDriver>(
    session: &S,
    password: &S::Element,
    logger: &FlowLogger,
) -> SubmitVia {
    let sign_in_buttons: Vec<Locator> = buttons(&SIGN_IN_LABELS);
    if let Some(index) = resolver::click_first(session, &sign_in_buttons, false).await {
        return SubmitVia::Button(SIGN_IN_LABELS[index]);
    }
    if let Err(err) = password.submit().await {
        logger.debug(
            format!("Form submit from password field failed: {err}"),
            CATEGORY_CREDENTIALS,
        );
    }
    SubmitVia::FieldSubmit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::logging::Verbosity;
    use crate::testing::ScriptedSession;

    fn config() -> LoginConfig {
        LoginConfig {
            credentials: Credentials::new("me@example.com", "hunter2", None),
            element_timeout_secs: 2,
            ..LoginConfig::default()
        }
    }

    fn logger() -> FlowLogger {
        FlowLogger::new(Verbosity::Quiet)
    }

    #[tokio::test(start_paused = true)]
    async fn fills_both_fields_and_clicks_sign_in() {
        let session = ScriptedSession::new("about:blank");
        let email = session.with_element("email", &Locator::css(r#"input[type="email"]"#));
        let password =
            session.with_element("password", &Locator::css(r#"input[type="password"]"#));
        let sign_in = session.with_element("sign_in", &Locator::button_containing("Sign in"));

        let result = submit_credentials(&session, &config(), &logger())
            .await
            .expect("credentials submitted");

        assert_eq!(session.navigations(), vec!["https://slack.com/signin"]);
        assert_eq!(email.value(), "me@example.com");
        assert_eq!(password.value(), "hunter2");
        assert_eq!(sign_in.clicks(), 1);
        assert_eq!(result.submitted_via, SubmitVia::Button("Sign in"));
        assert!(!result.used_password_link);
        assert!(!result.continued);
    }

    #[tokio::test(start_paused = true)]
    async fn clears_fields_before_typing() {
        let session = ScriptedSession::new("about:blank");
        session.with_element("email", &Locator::css("#email"));
        session.with_element("password", &Locator::css("#password"));

        submit_credentials(&session, &config(), &logger())
            .await
            .expect("credentials submitted");

        let events = session.events();
        let email_clear = events.iter().position(|e| e == "email:clear").unwrap();
        let email_type = events
            .iter()
            .position(|e| e == "email:type:me@example.com")
            .unwrap();
        assert!(email_clear < email_type);
        let password_clear = events.iter().position(|e| e == "password:clear").unwrap();
        let password_type = events
            .iter()
            .position(|e| e == "password:type:hunter2")
            .unwrap();
        assert!(password_clear < password_type);
    }

    #[tokio::test(start_paused = true)]
    async fn walks_password_link_and_continue_affordances() {
        let session = ScriptedSession::new("about:blank");
        session.with_element("email", &Locator::css(r#"input[name="email"]"#));
        let link = session.with_element("link", &Locator::text_link("password"));
        let next = session.with_element("next", &Locator::button_containing("Next"));
        let password = session.with_element("password", &Locator::css("#password"));

        let result = submit_credentials(&session, &config(), &logger())
            .await
            .expect("credentials submitted");

        assert!(result.used_password_link);
        assert!(result.continued);
        assert_eq!(link.clicks(), 1);
        assert_eq!(next.clicks(), 1);
        let events = session.events();
        assert_eq!(events.first().map(String::as_str), Some("link:click"));
        assert_eq!(events.get(1).map(String::as_str), Some("email:clear"));
        assert_eq!(result.submitted_via, SubmitVia::FieldSubmit);
        assert_eq!(password.submits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_email_field_is_fatal() {
        let session = ScriptedSession::new("about:blank");

        let err = submit_credentials(&session, &config(), &logger())
            .await
            .expect_err("no email field");

        assert_eq!(err.field(), Some("email"));
        assert_eq!(err.to_string(), "could not find email");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_password_field_is_fatal() {
        let session = ScriptedSession::new("about:blank");
        session.with_element("email", &Locator::css(r#"input[type="email"]"#));

        let err = submit_credentials(&session, &config(), &logger())
            .await
            .expect_err("no password field");
        assert!(matches!(err, CredentialError::FieldNotFound(ref nf) if nf.field == "password"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_input_is_reported() {
        let session = ScriptedSession::new("about:blank");
        let email = session.with_element("email", &Locator::css(r#"input[type="email"]"#));
        session.reject_typing(&email);

        let err = submit_credentials(&session, &config(), &logger())
            .await
            .expect_err("email rejected");
        assert!(matches!(
            err,
            CredentialError::FieldRejected { field: "email", .. }
        ));
    }
}
