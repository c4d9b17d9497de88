//! Desktop notifications via the platform's command-line notifier.

use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::types::RentwatchError;

/// Upper bound on a single backend invocation.
const BACKEND_TIMEOUT: Duration = Duration::from_secs(5);

/// A command-line notification tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// macOS `osascript -e 'display notification …'`
    Osascript,
    /// freedesktop `notify-send`
    NotifySend,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Osascript => "osascript",
            Self::NotifySend => "notify-send",
        }
    }

    fn command(&self, title: &str, body: &str) -> Command {
        let mut cmd = Command::new(self.name());
        match self {
            Self::Osascript => {
                cmd.arg("-e").arg(format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(body),
                    escape_applescript(title),
                ));
            }
            Self::NotifySend => {
                cmd.arg(title).arg(body);
            }
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Tries each backend in order until one exits successfully.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    backends: Vec<Backend>,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::with_backends(vec![Backend::Osascript, Backend::NotifySend])
    }

    pub fn with_backends(backends: Vec<Backend>) -> Self {
        Self { backends }
    }

    /// Show a notification. Returns the name of the backend that delivered it.
    pub async fn send(&self, title: &str, body: &str) -> Result<&'static str, RentwatchError> {
        for backend in &self.backends {
            let mut cmd = backend.command(title, body);
            match timeout(BACKEND_TIMEOUT, cmd.output()).await {
                Ok(Ok(output)) if output.status.success() => return Ok(backend.name()),
                Ok(Ok(output)) => {
                    debug!(backend = backend.name(), status = %output.status, "Backend exited with failure")
                }
                Ok(Err(e)) => debug!(backend = backend.name(), error = %e, "Backend unavailable"),
                Err(_) => debug!(backend = backend.name(), "Backend timed out"),
            }
        }
        Err(RentwatchError::Notify(
            "no desktop notification backend available".into(),
        ))
    }
}
