//! Display side - draw labeled pane text, read one key, run its action

use crate::annotate::{placeholder, segments, Annotation, Segment};
use crate::config::{self, LABEL_LEFT_DELIM, LABEL_RIGHT_DELIM};
use crate::dispatch::{self, ActionKind, Host};
use crate::rules::RuleSet;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Print, PrintStyledContent, ResetColor, SetAttribute, SetStyle},
    terminal,
};
use std::io::{self, Write};

/// Write the annotated text with labels and highlighted matches.
///
/// Every line starts in the baseline style; each highlighted match is
/// followed by the baseline style again so the rest of the line stays dim.
pub fn render<W: Write>(writer: &mut W, annotation: &Annotation, rules: &RuleSet) -> io::Result<()> {
    let baseline = config::baseline_style();
    let label_style = config::label_style();

    for (i, line) in annotation.lines.iter().enumerate() {
        if i > 0 {
            queue!(writer, Print("\n"))?;
        }
        queue!(writer, SetStyle(baseline))?;

        for segment in segments(line) {
            match segment {
                Segment::Text(text) => queue!(writer, Print(text))?,
                Segment::Label(key) => {
                    let Some(entry) = annotation.labels.get(key) else {
                        log::warn!("Placeholder for unknown label '{}'", key);
                        queue!(writer, Print(placeholder(key)))?;
                        continue;
                    };
                    let glyph = format!("{LABEL_LEFT_DELIM}{key}{LABEL_RIGHT_DELIM}");
                    queue!(writer, PrintStyledContent(label_style.apply(glyph)), Print(" "))?;

                    match rules.get(entry.rule).and_then(|r| r.style) {
                        Some(style) => {
                            queue!(writer, PrintStyledContent(style.apply(entry.text.as_str())))?
                        }
                        None => queue!(writer, SetAttribute(Attribute::Reset), Print(&entry.text))?,
                    }
                    queue!(writer, SetStyle(baseline))?;
                }
            }
        }
    }

    queue!(writer, SetAttribute(Attribute::Reset), ResetColor)?;
    writer.flush()
}

/// Raw mode for as long as the guard lives
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            log::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

/// Block for one keypress. Returns the character typed, or None for
/// anything that is not a plain character (Esc, arrows, Ctrl-C, ...).
pub fn read_key() -> io::Result<Option<char>> {
    let _raw = RawModeGuard::enable()?;
    loop {
        if let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        {
            let plain = !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
            return Ok(match code {
                KeyCode::Char(c) if plain => Some(c),
                _ => None,
            });
        }
    }
}

/// Look up the action behind a pressed key
pub fn resolve(
    key: char,
    annotation: &Annotation,
    rules: &RuleSet,
    pane_path: &str,
) -> Option<(ActionKind, String)> {
    let entry = annotation.labels.get(key)?;
    let Some(rule) = rules.get(entry.rule) else {
        log::warn!(
            "Label '{}' refers to rule {} but only {} rules are loaded",
            key,
            entry.rule,
            rules.len()
        );
        return None;
    };
    Some(rule.action.resolve(&entry.text, pane_path))
}

/// How an interaction cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was labeled, no key was read
    NoMatches,
    /// The key did not select a label
    NoAction,
    /// An action ran; false when it failed
    Dispatched(bool),
}

/// Render, wait for a key if anything is labeled, and dispatch its action
pub fn interact<W, H, K>(
    writer: &mut W,
    annotation: &Annotation,
    rules: &RuleSet,
    pane_path: &str,
    host: &mut H,
    read_key: K,
) -> io::Result<Outcome>
where
    W: Write,
    H: Host + ?Sized,
    K: FnOnce() -> io::Result<Option<char>>,
{
    render(writer, annotation, rules)?;

    if annotation.labels.is_empty() {
        return Ok(Outcome::NoMatches);
    }

    let Some(key) = read_key()? else {
        return Ok(Outcome::NoAction);
    };
    let Some((kind, command)) = resolve(key, annotation, rules, pane_path) else {
        log::debug!("Key '{}' selects nothing", key);
        return Ok(Outcome::NoAction);
    };

    Ok(Outcome::Dispatched(dispatch::dispatch(host, kind, &command)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{annotate, LabelEntry, LabelTable};
    use crate::config::{PLACEHOLDER_CLOSE, PLACEHOLDER_OPEN};
    use crate::dispatch::tests::{Effect, FakeHost};
    use crate::rules::tests::sample;
    use crossterm::style::{Color, SetBackgroundColor, SetForegroundColor};

    fn ansi(command: impl crossterm::Command) -> String {
        let mut s = String::new();
        command.write_ansi(&mut s).unwrap();
        s
    }

    fn rendered(annotation: &Annotation, rules: &RuleSet) -> String {
        let mut out = Vec::new();
        render(&mut out, annotation, rules).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn visible(s: &str) -> String {
        crate::ansi::strip(s).into_owned()
    }

    #[test]
    fn test_render_labels_and_baseline() {
        let rules = sample();
        let a = annotate("mail a@b.co now\nplain line", &rules);
        let out = rendered(&a, &rules);

        let dull = ansi(SetForegroundColor(Color::AnsiValue(240)));
        assert!(out.starts_with(&dull));
        // Baseline at the start of the second line too
        assert!(out.contains(&format!("\n{dull}plain line")));
        assert_eq!(visible(&out), "mail ⠐a⠂ a@b.co now\nplain line");
        assert!(out.ends_with(&format!(
            "{}{}",
            ansi(SetAttribute(Attribute::Reset)),
            ansi(ResetColor)
        )));
    }

    #[test]
    fn test_baseline_restored_after_match() {
        let rules = sample();
        let a = annotate("a@b.co tail", &rules);
        let out = rendered(&a, &rules);
        let dull = ansi(SetForegroundColor(Color::AnsiValue(240)));
        let after_match = out.split("a@b.co").nth(1).unwrap();
        assert!(after_match.contains(&format!("{dull} tail")));
    }

    #[test]
    fn test_label_and_match_styles() {
        let rules = sample();
        let a = annotate("mail a@b.co now", &rules);
        let out = rendered(&a, &rules);
        let dull = ansi(SetForegroundColor(Color::AnsiValue(240)));

        // Between the last baseline and the glyph: the label style
        let (before_glyph, after_glyph) = out.split_once("⠐a⠂").unwrap();
        let label_prefix = before_glyph.rsplit_once(dull.as_str()).unwrap().1;
        assert!(label_prefix.contains(&ansi(SetForegroundColor(Color::AnsiValue(46)))));
        assert!(label_prefix.contains(&ansi(SetAttribute(Attribute::Bold))));

        // Between the glyph and the match: the rule's highlight_blue
        let (match_prefix, _) = after_glyph.split_once("a@b.co").unwrap();
        assert!(match_prefix.contains(&ansi(SetBackgroundColor(Color::AnsiValue(235)))));
        assert!(match_prefix.contains(&ansi(SetForegroundColor(Color::AnsiValue(33)))));
        assert!(!match_prefix.contains(&ansi(SetForegroundColor(Color::AnsiValue(46)))));
    }

    #[test]
    fn test_overflow_matches_render_plain() {
        let words: Vec<String> = (0..30).map(|i| format!("w{i:02}")).collect();
        let rules = RuleSet::parse(
            "[[rule]]\nregex = 'w\\d\\d'\ncolor = 'red'\naction = 'type PLACEHOLDER'\n",
        )
        .unwrap();
        let a = annotate(&words.join(" "), &rules);
        let raw = rendered(&a, &rules);
        let out = visible(&raw);
        assert!(out.starts_with("⠐a⠂ w00 ⠐b⠂ w01"));
        assert!(out.contains("⠐z⠂ w25 w26 w27 w28 w29"));

        let red = ansi(SetForegroundColor(Color::DarkRed));
        let dull = ansi(SetForegroundColor(Color::AnsiValue(240)));
        assert_eq!(raw.matches(red.as_str()).count(), 26);

        // The unlabeled tail only carries the baseline
        let tail = raw.rsplit_once("w25").unwrap().1;
        assert!(!tail.contains(&red));
        assert!(tail.ends_with(&format!(
            "{dull} w26 w27 w28 w29{}{}",
            ansi(SetAttribute(Attribute::Reset)),
            ansi(ResetColor)
        )));
    }

    #[test]
    fn test_empty_annotation_renders_reset_only() {
        let out = rendered(&Annotation::default(), &sample());
        assert_eq!(visible(&out), "");
    }

    #[test]
    fn test_email_copy_scenario() {
        let rules = sample();
        let a = annotate("contact a@b.co", &rules);
        let mut host = FakeHost::default();
        let mut out = Vec::new();

        let outcome = interact(&mut out, &a, &rules, "/repo", &mut host, || Ok(Some('a'))).unwrap();

        assert_eq!(outcome, Outcome::Dispatched(true));
        assert_eq!(
            host.effects,
            vec![
                Effect::Copy("mailto:a@b.co".to_string()),
                Effect::Notify(1000, "Copied: mailto:a@b.co".to_string()),
            ]
        );
    }

    #[test]
    fn test_unlabeled_key_does_nothing() {
        let rules = sample();
        let a = annotate("contact a@b.co", &rules);
        let mut host = FakeHost::default();
        let mut out = Vec::new();

        let outcome = interact(&mut out, &a, &rules, "/repo", &mut host, || Ok(Some('q'))).unwrap();
        assert_eq!(outcome, Outcome::NoAction);
        assert!(host.effects.is_empty());

        let outcome = interact(&mut out, &a, &rules, "/repo", &mut host, || Ok(None)).unwrap();
        assert_eq!(outcome, Outcome::NoAction);
        assert!(host.effects.is_empty());
    }

    #[test]
    fn test_no_matches_reads_no_key() {
        let rules = sample();
        let a = annotate("nothing here", &rules);
        let mut host = FakeHost::default();
        let mut out = Vec::new();

        let outcome = interact(&mut out, &a, &rules, "/", &mut host, || {
            panic!("must not read a key")
        })
        .unwrap();
        assert_eq!(outcome, Outcome::NoMatches);
    }

    #[test]
    fn test_failed_action_is_reported() {
        let rules = sample();
        let a = annotate("/home/me/file.txt", &rules);
        let mut host = FakeHost {
            failing: vec!["open '/home/me/file.txt'".to_string()],
            ..FakeHost::default()
        };
        let mut out = Vec::new();

        let outcome = interact(&mut out, &a, &rules, "/", &mut host, || Ok(Some('a'))).unwrap();
        assert_eq!(outcome, Outcome::Dispatched(false));
        assert!(host.notifications()[0].starts_with("Action failed:"));
    }

    #[test]
    fn test_resolve_exco_embeds_directory() {
        let rules = sample();
        let hash = "0123456789abcdef0123456789abcdef01234567";
        let a = annotate(&format!("commit {hash} done"), &rules);
        let (kind, cmd) = resolve('a', &a, &rules, "/repo").unwrap();
        assert_eq!(kind, ActionKind::Exco);
        assert!(cmd.starts_with("cd '/repo' && "));
        assert!(cmd.ends_with(hash));
    }

    #[test]
    fn test_resolve_with_mismatched_rules() {
        let a = Annotation {
            labels: LabelTable::from_entries(vec![LabelEntry {
                key: 'a',
                rule: 9,
                text: "x".to_string(),
            }]),
            lines: vec![placeholder('a')],
        };
        assert_eq!(resolve('a', &a, &sample(), "/"), None);
        // Still renders the text, unstyled
        assert_eq!(visible(&rendered(&a, &sample())), "⠐a⠂ x");
    }

    #[test]
    fn test_unknown_placeholder_renders_literally() {
        let a = Annotation {
            labels: LabelTable::default(),
            lines: vec![format!("{} prompt", placeholder('x'))],
        };
        assert_eq!(
            visible(&rendered(&a, &sample())),
            format!("{PLACEHOLDER_OPEN}x{PLACEHOLDER_CLOSE} prompt")
        );
    }

    #[test]
    fn test_marker_glyphs_in_pane_survive_render() {
        let rules = sample();
        let content = format!("{PLACEHOLDER_OPEN}a{PLACEHOLDER_CLOSE} a@b.co");
        let a = annotate(&content, &rules);
        assert_eq!(
            visible(&rendered(&a, &rules)),
            format!("{PLACEHOLDER_OPEN}a{PLACEHOLDER_CLOSE} ⠐a⠂ a@b.co")
        );
    }
}
