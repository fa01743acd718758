//! tmux-uhm - label regex matches in a tmux pane and act on them
//!
//! `parse` runs in the pane's context: it captures the pane, labels the
//! matches and opens a popup running `display`, which draws the labels,
//! reads one key and performs the chosen rule's action.

mod annotate;
mod ansi;
mod artifacts;
mod config;
mod dispatch;
mod error;
mod render;
mod rules;
mod tmux;

use anyhow::{Context, Result};
use artifacts::Artifacts;
use clap::{Parser, Subcommand};
use dispatch::Host;
use rules::RuleSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tmux::Tmux;

#[derive(Debug, Parser)]
#[command(name = "tmux-uhm", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture the pane, label matches and open the hint popup
    Parse {
        /// Rules file (default: <config_dir>/tmux-uhm/rules.toml)
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Pane to capture (default: current pane)
        #[arg(short, long)]
        target: Option<String>,
        /// Working directory of the pane, handed to actions as {path}
        pane_path: String,
    },
    /// Show labeled pane text, read one key and run its action
    Display {
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Pane that receives typed text (default: current pane)
        #[arg(short, long)]
        target: Option<String>,
        pane_path: String,
        /// Label table written by `parse`
        label_file: PathBuf,
        /// Annotated text written by `parse`
        content_file: PathBuf,
    },
    /// Validate a rules file and list its rules
    Check {
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Parse {
            rules,
            target,
            pane_path,
        } => parse_mode(&rules_path(rules)?, target, &pane_path),
        Command::Display {
            rules,
            target,
            pane_path,
            label_file,
            content_file,
        } => display_mode(
            &rules_path(rules)?,
            target,
            &pane_path,
            label_file,
            content_file,
        ),
        Command::Check { rules } => check_mode(&rules_path(rules)?),
    }
}

fn rules_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit
        .or_else(config::default_rules_path)
        .context("No --rules given and no config directory to look in")
}

/// Capture, annotate, hand off to the popup
fn parse_mode(rules_path: &Path, target: Option<String>, pane_path: &str) -> Result<()> {
    let mut tmux = Tmux::new(target.clone());

    let rules = match RuleSet::load(rules_path) {
        Ok(rules) => rules,
        Err(e) => {
            tmux.notify(config::NOTIFY_LONG_MS, &format!("Error loading rules: {e}"));
            return Err(e).context("Error loading rules");
        }
    };
    if rules.is_empty() {
        log::warn!("{} defines no rules", rules_path.display());
    }

    let content = tmux.capture_pane()?;
    let annotation = annotate::annotate(&content, &rules);
    log::info!(
        "{} lines captured, {} labeled",
        annotation.lines.len(),
        annotation.labels.len()
    );

    let artifacts = Artifacts::create(&annotation).context("Failed to write artifacts")?;
    let geometry = tmux.pane_geometry()?;
    let exe = std::env::current_exe().context("Cannot locate own executable")?;

    // The popup starts in the pane's directory
    let rules_path = std::path::absolute(rules_path)
        .with_context(|| format!("Cannot resolve {}", rules_path.display()))?;
    let argv = display_argv(
        &exe,
        &rules_path,
        target.as_deref(),
        pane_path,
        artifacts.labels_path(),
        artifacts.content_path(),
    );

    // On failure the artifacts are dropped and removed here
    tmux.display_popup(geometry, pane_path, &argv)?;

    // The display process owns the files from now on
    artifacts.release();
    Ok(())
}

/// Command line that runs `display` inside the popup
fn display_argv(
    exe: &Path,
    rules_path: &Path,
    target: Option<&str>,
    pane_path: &str,
    label_file: &Path,
    content_file: &Path,
) -> Vec<OsString> {
    let mut argv: Vec<OsString> = vec![
        exe.into(),
        "display".into(),
        "--rules".into(),
        rules_path.into(),
    ];
    if let Some(target) = target {
        argv.push("--target".into());
        argv.push(target.into());
    }
    argv.extend([pane_path.into(), label_file.into(), content_file.into()]);
    argv
}

/// Render, read one key, dispatch; the artifacts go away on every path
fn display_mode(
    rules_path: &Path,
    target: Option<String>,
    pane_path: &str,
    label_file: PathBuf,
    content_file: PathBuf,
) -> Result<()> {
    let artifacts = Artifacts::open(label_file, content_file);

    let rules = RuleSet::load(rules_path).context("Error loading rules")?;
    let annotation = artifacts.read().context("Failed to read artifacts")?;

    let mut tmux = Tmux::new(target);
    let mut stdout = io::stdout();
    let outcome = render::interact(
        &mut stdout,
        &annotation,
        &rules,
        pane_path,
        &mut tmux,
        render::read_key,
    )?;
    log::debug!("Interaction finished: {:?}", outcome);

    Ok(())
}

/// Load a rules file and print what it defines
fn check_mode(rules_path: &Path) -> Result<()> {
    let rules = RuleSet::load(rules_path)
        .with_context(|| format!("Error loading rules from {}", rules_path.display()))?;

    println!("{}: {} rule(s)", rules_path.display(), rules.len());
    for (i, rule) in rules.iter().enumerate() {
        let style = match rule.style {
            Some(_) => rule.style_name.clone(),
            None => format!("{} (unknown)", rule.style_name),
        };
        println!(
            "{:>3}  {:<4}  {:<20}  {}",
            i,
            rule.action.kind(),
            style,
            rule.regex.as_str()
        );
    }
    Ok(())
}
