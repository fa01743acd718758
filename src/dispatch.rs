//! Action dispatch - carry out a resolved (kind, command) pair
//!
//! Every side effect goes through [`Host`] so that the strategies can be
//! exercised without tmux or a shell. Failures never escape [`dispatch`];
//! they are reported through the host's status line instead.

use crate::config::{NOTIFY_LONG_MS, NOTIFY_SHORT_MS};
use crate::error::ActionError;
use std::fmt;
use std::str::FromStr;

/// The closed set of things a rule can do with its match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Put the command text on the clipboard
    Copy,
    /// Run the command in a shell, discarding output
    Exec,
    /// Run the command, put its trimmed output on the clipboard
    Exco,
    /// Type the command text into the pane
    Type,
    /// Run the command, type its trimmed output into the pane
    Exty,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Copy => "copy",
            ActionKind::Exec => "exec",
            ActionKind::Exco => "exco",
            ActionKind::Type => "type",
            ActionKind::Exty => "exty",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl FromStr for ActionKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "copy" => Ok(ActionKind::Copy),
            "exec" => Ok(ActionKind::Exec),
            "exco" => Ok(ActionKind::Exco),
            "type" => Ok(ActionKind::Type),
            "exty" => Ok(ActionKind::Exty),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// External services an action may touch
pub trait Host {
    /// Run a shell command and wait for it to succeed
    fn run(&mut self, command: &str) -> Result<(), ActionError>;

    /// Run a shell command and return its stdout
    fn output(&mut self, command: &str) -> Result<String, ActionError>;

    /// Make `text` the clipboard content
    fn copy(&mut self, text: &str) -> Result<(), ActionError>;

    /// Type `text` into the target pane without pressing enter
    fn send_keys(&mut self, text: &str) -> Result<(), ActionError>;

    /// Show a transient status message for `duration_ms`
    fn notify(&mut self, duration_ms: u32, message: &str);
}

/// Notification shown after a successful action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub duration_ms: u32,
    pub message: String,
}

fn perform<H: Host + ?Sized>(
    host: &mut H,
    kind: ActionKind,
    command: &str,
) -> Result<Notice, ActionError> {
    let notice = |duration_ms, message: String| Notice {
        duration_ms,
        message,
    };

    match kind {
        ActionKind::Copy => {
            host.copy(command)?;
            Ok(notice(NOTIFY_SHORT_MS, format!("Copied: {command}")))
        }
        ActionKind::Exec => {
            host.run(command)?;
            Ok(notice(NOTIFY_SHORT_MS, format!("Executed: {command}")))
        }
        ActionKind::Exco => {
            let output = host.output(command)?;
            let output = output.trim();
            host.copy(output)?;
            Ok(notice(NOTIFY_LONG_MS, format!("Copied: {output}")))
        }
        ActionKind::Type => {
            host.send_keys(command)?;
            Ok(notice(NOTIFY_SHORT_MS, format!("Typed: {command}")))
        }
        ActionKind::Exty => {
            let output = host.output(command)?;
            let output = output.trim();
            host.send_keys(output)?;
            Ok(notice(NOTIFY_LONG_MS, format!("Sent: {output}")))
        }
    }
}

/// Carry out one action and report the outcome on the status line.
///
/// Returns whether the action succeeded; the error itself is only shown.
pub fn dispatch<H: Host + ?Sized>(host: &mut H, kind: ActionKind, command: &str) -> bool {
    log::info!("Dispatching {} action: {}", kind, command);
    match perform(host, kind, command) {
        Ok(notice) => {
            host.notify(notice.duration_ms, &notice.message);
            true
        }
        Err(e) => {
            log::error!("{} action failed: {}", kind, e);
            host.notify(NOTIFY_LONG_MS, &format!("Action failed: {e}"));
            false
        }
    }
}
