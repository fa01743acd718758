//! Capture side - find rule matches in pane text and hand out labels
//!
//! Matching runs on the style-stripped view of each line. Matches from all
//! rules on a line are pooled, ordered by start offset (earlier rule wins a
//! tie) and accepted left to right unless they overlap an accepted one.
//! Accepted matches are replaced by a placeholder carrying their label;
//! a placeholder opener already present in the pane text is doubled.

use crate::ansi;
use crate::config::{LABEL_ALPHABET, PLACEHOLDER_CLOSE, PLACEHOLDER_OPEN};
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};

/// A labeled match: what was matched and by which rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub key: char,
    pub rule: usize,
    pub text: String,
}

/// Labels in allocation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

impl LabelTable {
    pub fn from_entries(entries: Vec<LabelEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: char) -> Option<&LabelEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, entry: LabelEntry) {
        self.entries.push(entry);
    }
}

/// Hands out labels from a fixed alphabet, once each, in order
#[derive(Debug, Clone)]
pub struct LabelAllocator {
    alphabet: Vec<char>,
    next: usize,
}

impl LabelAllocator {
    pub fn new(alphabet: &str) -> Self {
        Self {
            alphabet: alphabet.chars().collect(),
            next: 0,
        }
    }

    /// Next unused label, or None once the alphabet is exhausted
    pub fn next_label(&mut self) -> Option<char> {
        let label = self.alphabet.get(self.next).copied()?;
        self.next += 1;
        Some(label)
    }
}

impl Default for LabelAllocator {
    fn default() -> Self {
        Self::new(LABEL_ALPHABET)
    }
}

/// Result of the capture phase: label table plus annotated lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub labels: LabelTable,
    pub lines: Vec<String>,
}

impl Annotation {
    /// Annotated text as a single buffer, lines joined with '\n'
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// A match candidate in plain-text byte offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    start: usize,
    end: usize,
    rule: usize,
}

/// Annotate captured pane content with the default alphabet
pub fn annotate(content: &str, rules: &RuleSet) -> Annotation {
    annotate_with(content, rules, &mut LabelAllocator::default())
}

/// Annotate captured pane content, drawing labels from `labels`
pub fn annotate_with(content: &str, rules: &RuleSet, labels: &mut LabelAllocator) -> Annotation {
    let mut annotation = Annotation::default();
    let mut starved_lines = 0;

    for line in content.lines() {
        let plain = ansi::strip(line);
        let annotated = annotate_line(
            &plain,
            rules,
            labels,
            &mut annotation.labels,
            &mut starved_lines,
        );
        annotation.lines.push(annotated);
    }

    if starved_lines > 0 {
        log::warn!(
            "Label alphabet exhausted, matches on {} line(s) left unlabeled",
            starved_lines
        );
    }
    log::debug!(
        "Annotated {} lines, {} labels",
        annotation.lines.len(),
        annotation.labels.len()
    );

    annotation
}

fn candidates(plain: &str, rules: &RuleSet) -> Vec<Candidate> {
    let mut found: Vec<Candidate> = rules
        .iter()
        .enumerate()
        .flat_map(|(rule, r)| {
            r.regex.find_iter(plain).map(move |m| Candidate {
                start: m.start(),
                end: m.end(),
                rule,
            })
        })
        // An empty match has nothing to show or act on
        .filter(|c| c.end > c.start)
        .collect();

    found.sort_by_key(|c| (c.start, c.rule));
    found
}

fn annotate_line(
    plain: &str,
    rules: &RuleSet,
    labels: &mut LabelAllocator,
    table: &mut LabelTable,
    starved_lines: &mut usize,
) -> String {
    let mut out = String::with_capacity(plain.len());
    let mut cursor = 0;

    for candidate in candidates(plain, rules) {
        if candidate.start < cursor {
            continue;
        }

        let Some(key) = labels.next_label() else {
            *starved_lines += 1;
            break;
        };

        let text = &plain[candidate.start..candidate.end];
        log::debug!("Label '{}' -> rule {}: {}", key, candidate.rule, text);
        table.push(LabelEntry {
            key,
            rule: candidate.rule,
            text: text.to_string(),
        });

        push_text(&mut out, &plain[cursor..candidate.start]);
        out.push_str(&placeholder(key));
        cursor = candidate.end;
    }

    push_text(&mut out, &plain[cursor..]);
    out
}

/// Append pane text, doubling every placeholder opener in it
fn push_text(out: &mut String, text: &str) {
    for c in text.chars() {
        out.push(c);
        if c == PLACEHOLDER_OPEN {
            out.push(c);
        }
    }
}

/// Token standing in for the match labeled `key`
pub fn placeholder(key: char) -> String {
    format!("{PLACEHOLDER_OPEN}{key}{PLACEHOLDER_CLOSE}")
}

/// Piece of an annotated line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Label(char),
}

/// Split an annotated line into plain text and placeholders
pub fn segments(line: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut text_start = 0;
    let mut rest = line;
    let mut offset = 0;

    while let Some(pos) = rest.find(PLACEHOLDER_OPEN) {
        let open = offset + pos;
        let after_open = &line[open + PLACEHOLDER_OPEN.len_utf8()..];
        let mut chars = after_open.chars();

        match (chars.next(), chars.next()) {
            // Doubled opener stands for one literal marker
            (Some(PLACEHOLDER_OPEN), _) => {
                let literal_end = open + PLACEHOLDER_OPEN.len_utf8();
                out.push(Segment::Text(&line[text_start..literal_end]));
                text_start = literal_end + PLACEHOLDER_OPEN.len_utf8();
                offset = text_start;
            }
            (Some(key), Some(PLACEHOLDER_CLOSE)) => {
                if open > text_start {
                    out.push(Segment::Text(&line[text_start..open]));
                }
                out.push(Segment::Label(key));
                let end = open
                    + PLACEHOLDER_OPEN.len_utf8()
                    + key.len_utf8()
                    + PLACEHOLDER_CLOSE.len_utf8();
                text_start = end;
                offset = end;
            }
            // Not a placeholder; keep the marker as text
            _ => offset = open + PLACEHOLDER_OPEN.len_utf8(),
        }
        rest = &line[offset..];
    }

    if text_start < line.len() {
        out.push(Segment::Text(&line[text_start..]));
    }
    out
}
