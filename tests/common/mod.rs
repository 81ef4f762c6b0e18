//! Shared doubles for the end-to-end login scenarios.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use slack_autologin::desktop::{DesktopInput, HandoffInjectionError, Key};
use slack_autologin::locator::Locator;
use slack_autologin::logging::{FlowLogRecord, FlowLogger, LogCallback, Verbosity};
use slack_autologin::session::{ElementHandle, SessionDriver, SessionError};
use slack_autologin::totp::TotpProvider;
use slack_autologin::two_factor::Acknowledger;

#[derive(Clone, Default)]
pub struct FakeInput {
    value: Arc<Mutex<String>>,
    clicks: Arc<Mutex<usize>>,
}

impl FakeInput {
    pub fn value(&self) -> String {
        self.value.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> usize {
        *self.clicks.lock().unwrap()
    }
}

#[async_trait]
impl ElementHandle for FakeInput {
    async fn click(&self) -> Result<(), SessionError> {
        *self.clicks.lock().unwrap() += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.value.lock().unwrap().clear();
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SessionError> {
        self.value.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn submit(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn is_displayed(&self) -> Result<bool, SessionError> {
        Ok(true)
    }
}

/// A page made of fixed elements keyed by locator expression.
#[derive(Default)]
pub struct FakePage {
    elements: Mutex<HashMap<String, FakeInput>>,
    url: Mutex<String>,
    refreshes: Mutex<usize>,
    scripts: Mutex<Vec<String>>,
    closed: Mutex<bool>,
}

impl FakePage {
    pub fn with(&self, locator: Locator) -> FakeInput {
        let input = FakeInput::default();
        self.elements
            .lock()
            .unwrap()
            .insert(locator.expression().to_string(), input.clone());
        input
    }

    pub fn refreshes(&self) -> usize {
        *self.refreshes.lock().unwrap()
    }

    pub fn scripts(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    pub fn closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

/// Cheap handle so the test can keep observing the page after `run` has
/// consumed the session.
#[derive(Clone, Default)]
pub struct FakeSession(pub Arc<FakePage>);

#[async_trait]
impl SessionDriver for FakeSession {
    type Element = FakeInput;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        *self.0.url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<FakeInput>, SessionError> {
        if *self.0.closed.lock().unwrap() {
            return Err(SessionError::Closed);
        }
        Ok(self
            .0
            .elements
            .lock()
            .unwrap()
            .get(locator.expression())
            .cloned())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        Ok(self.0.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok("Slack".to_string())
    }

    async fn execute_script(&self, source: &str) -> Result<(), SessionError> {
        self.0.scripts.lock().unwrap().push(source.to_string());
        Ok(())
    }

    async fn refresh(&self) -> Result<(), SessionError> {
        *self.0.refreshes.lock().unwrap() += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        *self.0.closed.lock().unwrap() = true;
        Ok(())
    }
}

pub struct StaticTotp(pub &'static str);

impl TotpProvider for StaticTotp {
    fn current_code(&self, _secret: &str) -> String {
        self.0.to_string()
    }
}

#[derive(Default)]
pub struct KeyLog {
    pub keys: Mutex<Vec<Key>>,
}

#[async_trait]
impl DesktopInput for KeyLog {
    async fn focus_window(&self, _title_hint: &str) -> bool {
        true
    }

    async fn press_key(&self, key: Key) -> Result<(), HandoffInjectionError> {
        self.keys.lock().unwrap().push(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct NeverPrompted {
    pub prompts: Mutex<usize>,
}

#[async_trait]
impl Acknowledger for NeverPrompted {
    async fn acknowledge(&self, _prompt: &str) {
        *self.prompts.lock().unwrap() += 1;
    }
}

/// Logger whose records are collected for assertions.
pub fn recording_logger() -> (FlowLogger, Arc<Mutex<Vec<FlowLogRecord>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let capture = Arc::clone(&records);
    let callback: LogCallback = Arc::new(move |record| {
        capture.lock().unwrap().push(record.clone());
    });
    let mut logger = FlowLogger::new(Verbosity::Detailed);
    logger.set_external_logger(Some(callback));
    (logger, records)
}
