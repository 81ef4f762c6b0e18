//! Browser session seam consumed by the sign-in stages.
//!
//! [`SessionDriver`] is deliberately small: navigation, a single non-waiting
//! element query, URL/title reads, script execution, refresh and close. All
//! waiting and retry policy lives above it in [`crate::resolver`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::locator::Locator;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser session error: {0}")]
    Message(String),
    #[error("navigation to {url} did not finish within {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },
    #[error("browser session already closed")]
    Closed,
}

pub(crate) fn map_session_error(err: impl std::fmt::Display) -> SessionError {
    SessionError::Message(err.to_string())
}

/// A live handle to an element returned by [`SessionDriver::find`].
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn click(&self) -> Result<(), SessionError>;
    /// Remove any existing value from an input.
    async fn clear(&self) -> Result<(), SessionError>;
    async fn type_text(&self, text: &str) -> Result<(), SessionError>;
    /// Submit the form owning this element.
    async fn submit(&self) -> Result<(), SessionError>;
    async fn is_displayed(&self) -> Result<bool, SessionError>;
}

#[async_trait]
pub trait SessionDriver: Send + Sync {
    type Element: ElementHandle + 'static;

    async fn navigate(&self, url: &str) -> Result<(), SessionError>;

    /// Immediate query for `locator`. `Ok(None)` means nothing matched right now.
    async fn find(&self, locator: &Locator) -> Result<Option<Self::Element>, SessionError>;

    async fn current_url(&self) -> Result<String, SessionError>;

    async fn title(&self) -> Result<String, SessionError>;

    async fn execute_script(&self, source: &str) -> Result<(), SessionError>;

    async fn refresh(&self) -> Result<(), SessionError>;

    /// Release the browser and its profile. Calling it twice is harmless.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Clear `element` and type `text` into it.
pub(crate) async fn replace_text<E: ElementHandle + ?Sized>(
    element: &E,
    text: &str,
) -> Result<(), SessionError> {
    element.clear().await?;
    element.type_text(text).await
}
