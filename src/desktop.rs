//! OS-level window focus and keystroke injection.
//!
//! The "Open Slack?" dialog belongs to the browser chrome, not the page, so
//! it can only be answered from outside the browser. Focus uses the platform
//! scripting tool (`osascript`, `wmctrl`, PowerShell) and keystrokes are
//! synthesized with `rdev` when the `desktop-input` feature is enabled.

use std::sync::Once;

use async_trait::async_trait;
use log::{debug, warn};
use thiserror::Error;
use tokio::process::Command;

/// Keys the handoff sequence needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Right,
    Enter,
}

impl Key {
    pub fn name(self) -> &'static str {
        match self {
            Key::Right => "right",
            Key::Enter => "enter",
        }
    }
}

#[derive(Debug, Error)]
pub enum HandoffInjectionError {
    #[error("keystroke injection is not available on this host")]
    Unsupported,
    #[error("failed to inject '{key}': {message}")]
    Inject { key: &'static str, message: String },
}

#[async_trait]
pub trait DesktopInput: Send + Sync {
    /// Bring a browser window to the foreground, preferring one whose title
    /// contains `title_hint`. Returns whether any window was focused.
    async fn focus_window(&self, title_hint: &str) -> bool;

    async fn press_key(&self, key: Key) -> Result<(), HandoffInjectionError>;
}

/// Input backend for hosts without a usable desktop (headless runs included).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInput;

#[async_trait]
impl DesktopInput for NoopInput {
    async fn focus_window(&self, _title_hint: &str) -> bool {
        false
    }

    async fn press_key(&self, _key: Key) -> Result<(), HandoffInjectionError> {
        Err(HandoffInjectionError::Unsupported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusBackend {
    AppleScript,
    Wmctrl,
    PowerShell,
}

/// Focus through the platform's scripting tool, keys through `rdev`.
#[derive(Debug, Clone, Copy)]
pub struct SystemInput {
    backend: FocusBackend,
}

impl SystemInput {
    fn for_current_platform() -> Option<Self> {
        let backend = if cfg!(target_os = "macos") {
            FocusBackend::AppleScript
        } else if cfg!(target_os = "windows") {
            FocusBackend::PowerShell
        } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
            FocusBackend::Wmctrl
        } else {
            return None;
        };
        Some(SystemInput { backend })
    }

    async fn run(program: &str, args: &[String]) -> Option<String> {
        match Command::new(program).args(args).output().await {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Ok(output) => {
                debug!(
                    "{program} exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(err) => {
                debug!("failed to spawn {program}: {err}");
                None
            }
        }
    }
}

fn apple_script(title_hint: &str) -> String {
    let hint = title_hint.replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"tell application "Google Chrome"
activate
repeat with w in windows
if title of w contains "{hint}" then
set index of w to 1
exit repeat
end if
end repeat
return (count of windows) > 0
end tell"#
    )
}

fn powershell_activate(title: &str) -> String {
    format!(
        "(New-Object -ComObject WScript.Shell).AppActivate('{}')",
        title.replace('\'', "''")
    )
}

#[async_trait]
impl DesktopInput for SystemInput {
    async fn focus_window(&self, title_hint: &str) -> bool {
        match self.backend {
            FocusBackend::AppleScript => {
                let args = ["-e".to_string(), apple_script(title_hint)];
                Self::run("osascript", &args).await.as_deref() == Some("true")
            }
            FocusBackend::Wmctrl => {
                for target in [title_hint, "Chrome"] {
                    if target.is_empty() {
                        continue;
                    }
                    let args = ["-a".to_string(), target.to_string()];
                    if Self::run("wmctrl", &args).await.is_some() {
                        return true;
                    }
                }
                false
            }
            FocusBackend::PowerShell => {
                for target in [title_hint, "Chrome"] {
                    if target.is_empty() {
                        continue;
                    }
                    let args = [
                        "-NoProfile".to_string(),
                        "-Command".to_string(),
                        powershell_activate(target),
                    ];
                    if Self::run("powershell", &args).await.as_deref() == Some("True") {
                        return true;
                    }
                }
                false
            }
        }
    }

    #[cfg(feature = "desktop-input")]
    async fn press_key(&self, key: Key) -> Result<(), HandoffInjectionError> {
        use rdev::{EventType, simulate};

        let code = match key {
            Key::Right => rdev::Key::RightArrow,
            Key::Enter => rdev::Key::Return,
        };
        let inject = |event: EventType| {
            simulate(&event).map_err(|err| HandoffInjectionError::Inject {
                key: key.name(),
                message: format!("{err:?}"),
            })
        };
        inject(EventType::KeyPress(code))?;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        inject(EventType::KeyRelease(code))
    }

    #[cfg(not(feature = "desktop-input"))]
    async fn press_key(&self, _key: Key) -> Result<(), HandoffInjectionError> {
        Err(HandoffInjectionError::Unsupported)
    }
}

/// Whether this build can synthesize keystrokes.
pub fn key_injection_available() -> bool {
    cfg!(feature = "desktop-input")
}

static MISSING_INJECTION_WARNING: Once = Once::new();

/// Pick the input backend once at startup.
pub fn detect(headless: bool) -> Box<dyn DesktopInput> {
    if headless {
        return Box::new(NoopInput);
    }
    if !key_injection_available() {
        MISSING_INJECTION_WARNING.call_once(|| {
            warn!(
                "built without the `desktop-input` feature; the Open Slack dialog \
                 must be confirmed by hand"
            );
        });
    }
    match SystemInput::for_current_platform() {
        Some(input) => Box::new(input),
        None => Box::new(NoopInput),
    }
}
