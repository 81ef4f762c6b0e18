//! In-memory session used by the unit tests of the stage modules.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::desktop::{DesktopInput, HandoffInjectionError, Key};
use crate::locator::Locator;
use crate::session::{ElementHandle, SessionDriver, SessionError};
use crate::two_factor::Acknowledger;

#[derive(Debug, Default)]
struct ElementState {
    name: String,
    value: String,
    displayed: bool,
    clicks: usize,
    submits: usize,
    reject_typing: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct MockElement {
    state: Arc<Mutex<ElementState>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl MockElement {
    pub(crate) fn value(&self) -> String {
        self.state.lock().unwrap().value.clone()
    }

    pub(crate) fn clicks(&self) -> usize {
        self.state.lock().unwrap().clicks
    }

    pub(crate) fn submits(&self) -> usize {
        self.state.lock().unwrap().submits
    }

    fn record(&self, event: &str) {
        let name = self.state.lock().unwrap().name.clone();
        self.events.lock().unwrap().push(format!("{name}:{event}"));
    }
}

#[async_trait]
impl ElementHandle for MockElement {
    async fn click(&self) -> Result<(), SessionError> {
        self.state.lock().unwrap().clicks += 1;
        self.record("click");
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.state.lock().unwrap().value.clear();
        self.record("clear");
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), SessionError> {
        if self.state.lock().unwrap().reject_typing {
            return Err(SessionError::Message("element is not interactable".into()));
        }
        self.state.lock().unwrap().value.push_str(text);
        self.record(&format!("type:{text}"));
        Ok(())
    }

    async fn submit(&self) -> Result<(), SessionError> {
        self.state.lock().unwrap().submits += 1;
        self.record("submit");
        Ok(())
    }

    async fn is_displayed(&self) -> Result<bool, SessionError> {
        Ok(self.state.lock().unwrap().displayed)
    }
}

#[derive(Default)]
struct SessionState {
    elements: HashMap<String, MockElement>,
    urls: VecDeque<String>,
    title: String,
    queries: Vec<String>,
    navigations: Vec<String>,
    scripts: Vec<String>,
    refreshes: usize,
    fail_refresh_on: Option<usize>,
    closed: bool,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedSession {
    state: Arc<Mutex<SessionState>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSession {
    pub(crate) fn new(url: &str) -> Self {
        let session = ScriptedSession::default();
        session.state.lock().unwrap().urls.push_back(url.to_string());
        session
    }

    /// Register a visible element answering to `locator`.
    pub(crate) fn with_element(&self, name: &str, locator: &Locator) -> MockElement {
        self.insert(name, locator, true)
    }

    pub(crate) fn with_hidden_element(&self, name: &str, locator: &Locator) -> MockElement {
        self.insert(name, locator, false)
    }

    pub(crate) fn reject_typing(&self, element: &MockElement) {
        element.state.lock().unwrap().reject_typing = true;
    }

    fn insert(&self, name: &str, locator: &Locator, displayed: bool) -> MockElement {
        let element = MockElement {
            state: Arc::new(Mutex::new(ElementState {
                name: name.to_string(),
                displayed,
                ..ElementState::default()
            })),
            events: Arc::clone(&self.events),
        };
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(locator.expression().to_string(), element.clone());
        element
    }

    /// Subsequent `current_url` calls walk through `urls`, repeating the last.
    pub(crate) fn with_url_sequence(&self, urls: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.urls = urls.iter().map(|url| url.to_string()).collect();
    }

    pub(crate) fn with_title(&self, title: &str) {
        self.state.lock().unwrap().title = title.to_string();
    }

    pub(crate) fn fail_refresh_on(&self, call: usize) {
        self.state.lock().unwrap().fail_refresh_on = Some(call);
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub(crate) fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.state.lock().unwrap().refreshes
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionDriver for ScriptedSession {
    type Element = MockElement;

    async fn navigate(&self, url: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        state.urls = VecDeque::from([url.to_string()]);
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<MockElement>, SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(SessionError::Closed);
        }
        state.queries.push(locator.expression().to_string());
        Ok(state.elements.get(locator.expression()).cloned())
    }

    async fn current_url(&self) -> Result<String, SessionError> {
        let mut state = self.state.lock().unwrap();
        if state.urls.len() > 1 {
            Ok(state.urls.pop_front().unwrap_or_default())
        } else {
            Ok(state.urls.front().cloned().unwrap_or_default())
        }
    }

    async fn title(&self) -> Result<String, SessionError> {
        Ok(self.state.lock().unwrap().title.clone())
    }

    async fn execute_script(&self, source: &str) -> Result<(), SessionError> {
        self.state.lock().unwrap().scripts.push(source.to_string());
        Ok(())
    }

    async fn refresh(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        state.refreshes += 1;
        if state.fail_refresh_on == Some(state.refreshes) {
            return Err(SessionError::Message("refresh failed".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

/// Desktop input that records every call.
#[derive(Default)]
pub(crate) struct RecordingInput {
    pub(crate) focus_hints: Mutex<Vec<String>>,
    pub(crate) keys: Mutex<Vec<Key>>,
    pub(crate) fail_keys: bool,
}

#[async_trait]
impl DesktopInput for RecordingInput {
    async fn focus_window(&self, title_hint: &str) -> bool {
        self.focus_hints.lock().unwrap().push(title_hint.to_string());
        true
    }

    async fn press_key(&self, key: Key) -> Result<(), HandoffInjectionError> {
        if self.fail_keys {
            return Err(HandoffInjectionError::Unsupported);
        }
        self.keys.lock().unwrap().push(key);
        Ok(())
    }
}

/// Acknowledger that returns immediately and counts prompts.
#[derive(Default)]
pub(crate) struct CountingAcknowledger {
    pub(crate) prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Acknowledger for CountingAcknowledger {
    async fn acknowledge(&self, prompt: &str) {
        self.prompts.lock().unwrap().push(prompt.to_string());
    }
}
