//! Rule source - patterns, styles and actions loaded from a TOML file
//!
//! Both action spellings collapse into one [`Action`] at load time:
//!
//! ```toml
//! [[rule]]
//! regex = '[a-f0-9]{40}'
//! color = "highlight_orange"
//! action = { kind = "exco", command = "cd '{path}' && echo {text}" }
//!
//! [[rule]]
//! regex = '[\w.+-]+@[\w-]+\.[\w.-]+'
//! color = "highlight_blue"
//! action = "copy mailto:PLACEHOLDER"
//! ```

use crate::config;
use crate::dispatch::ActionKind;
use crate::error::RuleError;
use crossterm::style::{Attribute, Color, ContentStyle};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Placeholder replaced by the matched text in legacy action strings
const LEGACY_PLACEHOLDER: &str = "PLACEHOLDER";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(default)]
    styles: HashMap<String, StyleSpec>,
    #[serde(default, rename = "rule")]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    regex: String,
    #[serde(default = "default_color", alias = "style")]
    color: String,
    action: ActionSpec,
}

fn default_color() -> String {
    "reset".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActionSpec {
    /// "<kind> <template>" with PLACEHOLDER standing for the match
    Legacy(String),
    /// Template with {text} and {path}
    Template { kind: String, command: String },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StyleSpec {
    fg: Option<u8>,
    bg: Option<u8>,
    #[serde(default)]
    bold: bool,
    #[serde(default)]
    dim: bool,
    #[serde(default)]
    italic: bool,
    #[serde(default)]
    underline: bool,
    #[serde(default)]
    reverse: bool,
}

impl StyleSpec {
    fn to_style(&self) -> ContentStyle {
        let mut style = ContentStyle {
            foreground_color: self.fg.map(Color::AnsiValue),
            background_color: self.bg.map(Color::AnsiValue),
            ..ContentStyle::default()
        };
        let flags = [
            (self.bold, Attribute::Bold),
            (self.dim, Attribute::Dim),
            (self.italic, Attribute::Italic),
            (self.underline, Attribute::Underlined),
            (self.reverse, Attribute::Reverse),
        ];
        for (on, attribute) in flags {
            if on {
                style.attributes.set(attribute);
            }
        }
        style
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Template {
    Legacy(String),
    Expand(String),
}

/// What to do with a selected match: a kind plus a command template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    kind: ActionKind,
    template: Template,
}

impl Action {
    /// Build an action from a `{text}`/`{path}` template
    pub fn template(kind: ActionKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            template: Template::Expand(command.into()),
        }
    }

    /// Parse the legacy "<kind> <template>" spelling
    fn legacy(index: usize, action: &str) -> Result<Self, RuleError> {
        let (kind, template) = action
            .trim_start()
            .split_once(' ')
            .ok_or_else(|| RuleError::MalformedAction {
                index,
                action: action.to_string(),
            })?;
        let kind = parse_kind(index, kind)?;
        Ok(Self {
            kind,
            template: Template::Legacy(template.to_string()),
        })
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Produce the (kind, command) pair for a matched text and pane directory
    pub fn resolve(&self, text: &str, path: &str) -> (ActionKind, String) {
        let command = match &self.template {
            Template::Legacy(template) => template.replace(LEGACY_PLACEHOLDER, text),
            Template::Expand(template) => expand(template, text, path),
        };
        (self.kind, command)
    }
}

/// Substitute {text} and {path} in one pass so substituted values are never rescanned
fn expand(template: &str, text: &str, path: &str) -> String {
    let mut out = String::with_capacity(template.len() + text.len());
    let mut rest = template;
    while let Some(pos) = rest.find('{') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{text}") {
            out.push_str(text);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{path}") {
            out.push_str(path);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn parse_kind(index: usize, kind: &str) -> Result<ActionKind, RuleError> {
    kind.parse().map_err(|_| RuleError::UnknownKind {
        index,
        kind: kind.to_string(),
    })
}

/// One matchable category: pattern, display style and action
#[derive(Debug, Clone)]
pub struct Rule {
    pub regex: Regex,
    pub style_name: String,
    /// None when the style name is unknown; the match is then drawn unstyled
    pub style: Option<ContentStyle>,
    pub action: Action,
}

/// Ordered rules; index order is tie-break priority
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    #[cfg(test)]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load and validate the rules file at `path`
    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let source = std::fs::read_to_string(path).map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::parse(&source).map_err(|err| match err {
            RuleError::Parse { source, .. } => RuleError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::info!("Loaded {} rules from {}", rules.len(), path.display());
        Ok(rules)
    }

    /// Parse rules from TOML text
    pub fn parse(source: &str) -> Result<Self, RuleError> {
        let file: RulesFile = toml::from_str(source).map_err(|source| RuleError::Parse {
            path: Default::default(),
            source,
        })?;

        let mut rules = Vec::with_capacity(file.rules.len());
        for (index, raw) in file.rules.into_iter().enumerate() {
            let regex =
                Regex::new(&raw.regex).map_err(|source| RuleError::Regex { index, source })?;

            let action = match raw.action {
                ActionSpec::Legacy(action) => Action::legacy(index, &action)?,
                ActionSpec::Template { kind, command } => {
                    Action::template(parse_kind(index, &kind)?, command)
                }
            };

            let style = match file.styles.get(&raw.color) {
                Some(custom) => Some(custom.to_style()),
                None => config::builtin_style(&raw.color),
            };
            if style.is_none() {
                log::warn!(
                    "Rule {}: unknown style '{}', match will be unstyled",
                    index,
                    raw.color
                );
            }

            rules.push(Rule {
                regex,
                style_name: raw.color,
                style,
                action,
            });
        }

        Ok(Self { rules })
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
