//! Error types for rule loading, artifact handoff and action dispatch

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Failure to load or validate the rule source
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid rules file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("rule {index}: invalid regex: {source}")]
    Regex {
        index: usize,
        #[source]
        source: regex::Error,
    },

    #[error("rule {index}: unknown action kind '{kind}'")]
    UnknownKind { index: usize, kind: String },

    #[error("rule {index}: action '{action}' must be '<kind> <template>'")]
    MalformedAction { index: usize, action: String },
}

/// Failure to write or read the intermediate state between phases
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create temporary artifact: {0}")]
    Create(#[source] std::io::Error),

    #[error("corrupt label table {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode label table: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("unsupported label table version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

/// Failure while carrying out a resolved action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    Status { command: String, status: ExitStatus },

    #[error("'{command}' produced non-UTF-8 output")]
    Output { command: String },
}
