//! tmux and shell plumbing - capture, popup, keys, clipboard, status line

use crate::dispatch::Host;
use crate::error::ActionError;
use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Position and size of a pane in its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneGeometry {
    pub width: u16,
    pub height: u16,
    pub left: u16,
    pub top: u16,
}

impl PaneGeometry {
    const FORMAT: &'static str = "#{pane_width} #{pane_height} #{pane_left} #{pane_top}";

    fn parse(s: &str) -> Option<Self> {
        let mut fields = s.split_whitespace().map(|f| f.parse::<u16>().ok());
        let geometry = Self {
            width: fields.next()??,
            height: fields.next()??,
            left: fields.next()??,
            top: fields.next()??,
        };
        Some(geometry)
    }
}

/// Talks to the tmux server the process runs under
#[derive(Debug, Clone, Default)]
pub struct Tmux {
    /// Pane to act on; tmux picks the current pane when None
    target: Option<String>,
}

impl Tmux {
    pub fn new(target: Option<String>) -> Self {
        Self { target }
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new("tmux");
        cmd.arg(subcommand);
        if let Some(target) = &self.target {
            cmd.arg("-t").arg(target);
        }
        cmd
    }

    /// Visible text of the pane, including style escapes
    pub fn capture_pane(&self) -> Result<String> {
        let output = self.command("capture-pane").args(["-p", "-e"]).output();
        stdout_of("capture-pane", output)
    }

    pub fn pane_geometry(&self) -> Result<PaneGeometry> {
        let output = self
            .command("display-message")
            .args(["-p", PaneGeometry::FORMAT])
            .output();
        let text = stdout_of("display-message", output)?;
        PaneGeometry::parse(&text)
            .with_context(|| format!("Unexpected pane geometry: '{}'", text.trim()))
    }

    /// Open a borderless popup over the pane running `argv`
    pub fn display_popup(&self, geometry: PaneGeometry, cwd: &str, argv: &[OsString]) -> Result<()> {
        let status = self
            .command("display-popup")
            .arg("-B")
            .arg("-E")
            .arg("-d")
            .arg(cwd)
            .arg("-w")
            .arg(geometry.width.to_string())
            .arg("-h")
            .arg(geometry.height.to_string())
            .arg("-x")
            .arg(geometry.left.to_string())
            .arg("-y")
            .arg(geometry.top.to_string())
            .arg("--")
            .args(argv)
            .status()
            .context("Failed to run tmux display-popup")?;
        if !status.success() {
            bail!("tmux display-popup exited with {}", status);
        }
        Ok(())
    }
}

/// Stdout of a tmux query, or its stderr as the error when it failed
fn stdout_of(subcommand: &str, output: std::io::Result<Output>) -> Result<String> {
    let output = output.with_context(|| format!("Failed to run tmux {subcommand}"))?;
    if !output.status.success() {
        bail!(
            "tmux {} failed: {}",
            subcommand,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}

fn checked(command: &str, output: std::io::Result<Output>) -> Result<Output, ActionError> {
    let output = output.map_err(|source| ActionError::Spawn {
        command: command.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(ActionError::Status {
            command: command.to_string(),
            status: output.status,
        });
    }
    Ok(output)
}

/// Double every `#` so tmux shows the message as written instead of
/// expanding format codes such as `#S` or `#{pane_id}`
fn escape_format(message: &str) -> String {
    message.replace('#', "##")
}

/// Pipe text to the first OS clipboard tool that starts
fn copy_to_system_clipboard(text: &str) {
    const TOOLS: &[(&str, &[&str])] = &[
        ("pbcopy", &[]),
        ("wl-copy", &[]),
        ("xclip", &["-selection", "clipboard"]),
        ("xsel", &["--clipboard", "--input"]),
    ];

    for (tool, args) in TOOLS {
        if let Ok(mut child) = Command::new(tool)
            .args(*args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }
            let _ = child.wait();
            log::debug!("Copied to clipboard with {}", tool);
            return;
        }
    }
    log::debug!("No clipboard tool found, relying on tmux set-buffer -w");
}

impl Host for Tmux {
    fn run(&mut self, command: &str) -> Result<(), ActionError> {
        // No pipes: only the shell is waited for, not jobs it backgrounds
        let status = shell(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| ActionError::Spawn {
                command: command.to_string(),
                source,
            })?;
        if !status.success() {
            return Err(ActionError::Status {
                command: command.to_string(),
                status,
            });
        }
        Ok(())
    }

    fn output(&mut self, command: &str) -> Result<String, ActionError> {
        let output = checked(command, shell(command).stdin(Stdio::null()).output())?;
        String::from_utf8(output.stdout).map_err(|_| ActionError::Output {
            command: command.to_string(),
        })
    }

    fn copy(&mut self, text: &str) -> Result<(), ActionError> {
        // -w also forwards to the outer terminal's clipboard
        let mut cmd = Command::new("tmux");
        cmd.args(["set-buffer", "-w", "--"]).arg(text);
        checked("tmux set-buffer", cmd.output())?;
        copy_to_system_clipboard(text);
        Ok(())
    }

    fn send_keys(&mut self, text: &str) -> Result<(), ActionError> {
        let output = self
            .command("send-keys")
            .args(["-l", "--"])
            .arg(text)
            .output();
        checked("tmux send-keys", output)?;
        Ok(())
    }

    fn notify(&mut self, duration_ms: u32, message: &str) {
        let result = Command::new("tmux")
            .args(["display-message", "-d"])
            .arg(duration_ms.to_string())
            .arg(escape_format(message))
            .status();
        if let Err(e) = result {
            log::warn!("Failed to show status message: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_parse_geometry() {
        assert_eq!(
            PaneGeometry::parse("120 40 0 1\n"),
            Some(PaneGeometry {
                width: 120,
                height: 40,
                left: 0,
                top: 1
            })
        );
        assert_eq!(PaneGeometry::parse("120 40 0"), None);
        assert_eq!(PaneGeometry::parse("wide 40 0 1"), None);
        assert_eq!(PaneGeometry::parse(""), None);
    }

    #[test]
    fn test_shell_run_and_output() {
        let mut tmux = Tmux::default();
        assert!(tmux.run("true").is_ok());
        assert_eq!(tmux.output("echo hello").unwrap(), "hello\n");
    }

    #[test]
    fn test_shell_failure_reports_status() {
        let mut tmux = Tmux::default();
        let err = tmux.run("exit 3").unwrap_err();
        assert!(matches!(err, ActionError::Status { .. }));
        assert!(err.to_string().contains("exit 3"));
    }

    #[test]
    fn test_run_does_not_wait_for_background_jobs() {
        let mut tmux = Tmux::default();
        let started = Instant::now();
        assert!(tmux.run("sleep 3 &").is_ok());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_run_discards_output() {
        let mut tmux = Tmux::default();
        assert!(tmux.run("echo noise; echo more >&2").is_ok());
    }

    #[test]
    fn test_failed_query_reports_stderr() {
        let output = shell("echo 'no server running' >&2; echo '120 40 0 1'; exit 1").output();
        let err = stdout_of("display-message", output).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tmux display-message failed: no server running"
        );

        let output = shell("echo '120 40 0 1'").output();
        assert_eq!(stdout_of("display-message", output).unwrap(), "120 40 0 1\n");
    }

    #[test]
    fn test_escape_format() {
        assert_eq!(
            escape_format("Copied: https://example.com/#S"),
            "Copied: https://example.com/##S"
        );
        assert_eq!(escape_format("#{pane_id} ##"), "##{pane_id} ####");
        assert_eq!(escape_format("plain"), "plain");
    }
}
