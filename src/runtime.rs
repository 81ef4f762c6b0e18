//! Chromiumoxide-backed browser session.
//!
//! Launches a local Chrome/Chromium with a throwaway profile and exposes the
//! first page through [`SessionDriver`]. The profile is seeded with
//! preferences that keep Chrome from swallowing the `slack://` handoff, and it
//! is removed when the session is dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::{fs, sync::Mutex, task::JoinHandle};

use crate::config::LoginConfig;
use crate::locator::Locator;
use crate::session::{ElementHandle, SessionDriver, SessionError, map_session_error};

pub const WINDOW_WIDTH: u32 = 1280;
pub const WINDOW_HEIGHT: u32 = 900;

/// URL schemes the profile marks in `protocol_handler.excluded_schemes`.
pub const EXCLUDED_SCHEMES: [&str; 4] = ["slack", "slack-workspace", "mailto", "file"];

const CLEAR_FN: &str = r#"function() {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
}"#;

const SUBMIT_FN: &str = r#"function() {
    const form = this.form || this.closest('form');
    if (!form) { return false; }
    if (typeof form.requestSubmit === 'function') { form.requestSubmit(); } else { form.submit(); }
    return true;
}"#;

const VISIBLE_FN: &str = r#"function() {
    const style = window.getComputedStyle(this);
    if (style.visibility === 'hidden' || style.display === 'none') { return false; }
    const rect = this.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
}"#;

/// How to launch the browser for a run.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    pub page_load_timeout: Duration,
    pub extra_args: Vec<String>,
}

impl LaunchOptions {
    pub fn from_config(config: &LoginConfig) -> Self {
        LaunchOptions {
            headless: config.headless,
            chrome_executable: config.chrome_executable.clone(),
            page_load_timeout: config.page_load_timeout(),
            extra_args: Vec::new(),
        }
    }

    /// Command-line switches passed to Chrome on top of chromiumoxide's defaults.
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={WINDOW_WIDTH},{WINDOW_HEIGHT}"),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Preferences written into the fresh profile before launch.
pub fn profile_preferences() -> Value {
    let excluded: serde_json::Map<String, Value> = EXCLUDED_SCHEMES
        .iter()
        .map(|scheme| (scheme.to_string(), Value::Bool(true)))
        .collect();
    json!({
        "protocol_handler": {
            "excluded_schemes": excluded
        }
    })
}

async fn seed_profile() -> Result<TempDir, SessionError> {
    let profile = tempfile::Builder::new()
        .prefix("slack-autologin-")
        .tempdir()
        .map_err(map_session_error)?;
    let default_dir = profile.path().join("Default");
    fs::create_dir_all(&default_dir)
        .await
        .map_err(map_session_error)?;
    let preferences = serde_json::to_vec_pretty(&profile_preferences()).map_err(map_session_error)?;
    fs::write(default_dir.join("Preferences"), preferences)
        .await
        .map_err(map_session_error)?;
    Ok(profile)
}

fn build_config(options: &LaunchOptions, profile: &Path) -> Result<BrowserConfig, SessionError> {
    let mut builder = BrowserConfig::builder();

    if let Some(path) = &options.chrome_executable {
        builder = builder.chrome_executable(path);
    }

    let viewport = chromiumoxide::handler::viewport::Viewport {
        width: WINDOW_WIDTH,
        height: WINDOW_HEIGHT,
        device_scale_factor: None,
        emulating_mobile: false,
        is_landscape: true,
        has_touch: false,
    };

    let builder = builder
        .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
        .viewport(viewport)
        .user_data_dir(profile)
        .args(options.chrome_args());

    let builder = if options.headless {
        builder
    } else {
        builder.with_head()
    };

    builder.build().map_err(SessionError::Message)
}

fn spawn_handler(mut handler: chromiumoxide::handler::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                log::debug!("chromiumoxide handler error: {err}");
            }
        }
    })
}

/// A launched browser with one page under automation.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler: JoinHandle<()>,
    page_load_timeout: Duration,
    _profile: TempDir,
}

impl ChromiumSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, SessionError> {
        let profile = seed_profile().await?;
        let config = build_config(options, profile.path())?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(map_session_error)?;
        let handler = spawn_handler(handler);

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                handler.abort();
                return Err(map_session_error(err));
            }
        };

        Ok(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            page,
            handler,
            page_load_timeout: options.page_load_timeout,
            _profile: profile,
        })
    }

    async fn ensure_open(&self) -> Result<(), SessionError> {
        if self.browser.lock().await.is_some() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }
}

#[async_trait]
impl SessionDriver for ChromiumSession {
    type Element = ChromiumElement;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        self.ensure_open().await?;
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url)).await {
            Ok(result) => result.map(|_| ()).map_err(map_session_error),
            Err(_) => Err(SessionError::NavigationTimeout {
                url: url.to_string(),
                timeout: self.page_load_timeout,
            }),
        }
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ChromiumElement>, SessionError> {
        self.ensure_open().await?;
        let found = match locator {
            Locator::Css(selector) => self.page.find_element(selector.as_str()).await,
            Locator::XPath(expression) => self.page.find_xpath(expression.as_str()).await,
        };
        match found {
            Ok(inner) => Ok(Some(ChromiumElement { inner })),
            Err(err) => {
                log::trace!("{locator} not found: {err}");
                Ok(None)
            }
        }
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        self.ensure_open().await?;
        let url = self.page.url().await.map_err(map_session_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&self) -> Result<String, SessionError> {
        self.ensure_open().await?;
        let title = self.page.get_title().await.map_err(map_session_error)?;
        Ok(title.unwrap_or_default())
    }

    async fn execute_script(&self, source: &str) -> Result<(), SessionError> {
        self.ensure_open().await?;
        self.page
            .evaluate(source)
            .await
            .map(|_| ())
            .map_err(map_session_error)
    }

    async fn refresh(&self) -> Result<(), SessionError> {
        self.ensure_open().await?;
        self.page.reload().await.map(|_| ()).map_err(map_session_error)
    }

    async fn close(&self) -> Result<(), SessionError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        let closed = browser.close().await.map(|_| ()).map_err(map_session_error);
        if let Err(err) = browser.wait().await {
            log::debug!("browser process did not exit cleanly: {err}");
        }
        self.handler.abort();
        closed
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Element handle backed by a CDP remote object.
pub struct ChromiumElement {
    inner: Element,
}

impl ChromiumElement {
    async fn call_bool(&self, declaration: &str) -> Result<bool, SessionError> {
        let returns = self
            .inner
            .call_js_fn(declaration, false)
            .await
            .map_err(map_session_error)?;
        Ok(returns
            .result
            .value
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn click(&self) -> Result<(), SessionError> {
        self.inner.click().await.map(|_| ()).map_err(map_session_error)
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.inner
            .call_js_fn(CLEAR_FN, false)
            .await
            .map(|_| ())
            .map_err(map_session_error)
    }

    async fn type_text(&self, text: &str) -> Result<(), SessionError> {
        self.inner.focus().await.map_err(map_session_error)?;
        self.inner
            .type_str(text)
            .await
            .map(|_| ())
            .map_err(map_session_error)
    }

    async fn submit(&self) -> Result<(), SessionError> {
        if self.call_bool(SUBMIT_FN).await? {
            return Ok(());
        }
        self.inner
            .press_key("Enter")
            .await
            .map(|_| ())
            .map_err(map_session_error)
    }

    async fn is_displayed(&self) -> Result<bool, SessionError> {
        self.call_bool(VISIBLE_FN).await
    }
}
