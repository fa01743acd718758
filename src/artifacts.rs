//! Handoff of the capture result to the display process
//!
//! Two files carry the state across the popup boundary:
//! - the label table, a versioned TOML document (`[[label]]` key/rule/text)
//! - the annotated text, raw UTF-8 with placeholders in place of matches
//!
//! [`Artifacts`] owns both paths and deletes the files when dropped.

use crate::annotate::{Annotation, LabelEntry, LabelTable};
use crate::error::ArtifactError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Version written into every label table
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Header {
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct LabelFile {
    version: u32,
    #[serde(default, rename = "label")]
    labels: Vec<LabelEntry>,
}

/// Serialize a label table
pub fn encode_labels(table: &LabelTable) -> Result<String, ArtifactError> {
    let file = LabelFile {
        version: FORMAT_VERSION,
        labels: table.entries().to_vec(),
    };
    Ok(toml::to_string(&file)?)
}

/// Parse a label table written by [`encode_labels`]
pub fn decode_labels(source: &str, path: &Path) -> Result<LabelTable, ArtifactError> {
    let decode_err = |source| ArtifactError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let header: Header = toml::from_str(source).map_err(decode_err)?;
    if header.version != FORMAT_VERSION {
        return Err(ArtifactError::Version {
            found: header.version,
            expected: FORMAT_VERSION,
        });
    }

    let file: LabelFile = toml::from_str(source).map_err(decode_err)?;
    Ok(LabelTable::from_entries(file.labels))
}

fn write_temp(prefix: &str, suffix: &str, data: &[u8]) -> Result<NamedTempFile, ArtifactError> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile()
        .map_err(ArtifactError::Create)?;
    file.write_all(data).map_err(|source| ArtifactError::Io {
        path: file.path().to_path_buf(),
        source,
    })?;
    file.flush().map_err(|source| ArtifactError::Io {
        path: file.path().to_path_buf(),
        source,
    })?;
    Ok(file)
}

/// The pair of files handed from capture to display
#[derive(Debug)]
pub struct Artifacts {
    labels: PathBuf,
    content: PathBuf,
    armed: bool,
}

impl Artifacts {
    /// Write an annotation to fresh temporary files
    pub fn create(annotation: &Annotation) -> Result<Self, ArtifactError> {
        let encoded = encode_labels(&annotation.labels)?;
        let labels = write_temp("uhm-labels-", ".toml", encoded.as_bytes())?.into_temp_path();
        let content = write_temp("uhm-content-", ".txt", annotation.text().as_bytes())?
            .into_temp_path();

        // The content TempPath still cleans up after itself if this fails
        let labels = labels.keep().map_err(|e| ArtifactError::Create(e.error))?;
        let content = match content.keep() {
            Ok(path) => path,
            Err(e) => {
                let _ = std::fs::remove_file(&labels);
                return Err(ArtifactError::Create(e.error));
            }
        };

        log::debug!(
            "Wrote artifacts {} and {}",
            labels.display(),
            content.display()
        );
        Ok(Self {
            labels,
            content,
            armed: true,
        })
    }

    /// Take ownership of existing artifact files; they are deleted on drop
    pub fn open(labels: PathBuf, content: PathBuf) -> Self {
        Self {
            labels,
            content,
            armed: true,
        }
    }

    pub fn labels_path(&self) -> &Path {
        &self.labels
    }

    pub fn content_path(&self) -> &Path {
        &self.content
    }

    /// Load the annotation back
    pub fn read(&self) -> Result<Annotation, ArtifactError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
        };

        let labels = decode_labels(&read(&self.labels)?, &self.labels)?;
        let lines = read(&self.content)?.lines().map(str::to_string).collect();
        Ok(Annotation { labels, lines })
    }

    /// Stop owning the files; another process is responsible for them now
    pub fn release(mut self) {
        self.armed = false;
    }
}

impl Drop for Artifacts {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in [&self.labels, &self.content] {
            match std::fs::remove_file(path) {
                Ok(()) => log::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::placeholder;

    fn entry(key: char, rule: usize, text: &str) -> LabelEntry {
        LabelEntry {
            key,
            rule,
            text: text.to_string(),
        }
    }

    fn sample() -> Annotation {
        Annotation {
            labels: LabelTable::from_entries(vec![
                entry('a', 0, "http://host:8080/a:b"),
                entry('b', 2, "quote\" back\\slash 'single' \ttab"),
                entry('c', 1, "ünïcødé ⠐x⠂ = [x]"),
            ]),
            lines: vec![
                format!("see {} and {}", placeholder('a'), placeholder('b')),
                String::new(),
                format!("{}: trailing", placeholder('c')),
            ],
        }
    }

    #[test]
    fn test_labels_round_trip_structural_characters() {
        let annotation = sample();
        let encoded = encode_labels(&annotation.labels).unwrap();
        let decoded = decode_labels(&encoded, Path::new("t")).unwrap();
        assert_eq!(decoded, annotation.labels);
    }

    #[test]
    fn test_empty_table_round_trips() {
        let encoded = encode_labels(&LabelTable::default()).unwrap();
        let decoded = decode_labels(&encoded, Path::new("t")).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let source = "version = 7\n[[label]]\nkey = 'a'\nrule = 0\ntext = 'x'\n";
        let err = decode_labels(source, Path::new("t")).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Version {
                found: 7,
                expected: FORMAT_VERSION
            }
        ));
    }

    #[test]
    fn test_corrupt_table_rejected() {
        let err = decode_labels("a:0:text", Path::new("labels")).unwrap_err();
        assert!(matches!(err, ArtifactError::Decode { .. }));
    }

    #[test]
    fn test_create_read_and_cleanup() {
        let annotation = sample();
        let artifacts = Artifacts::create(&annotation).unwrap();
        let labels = artifacts.labels_path().to_path_buf();
        let content = artifacts.content_path().to_path_buf();
        assert!(labels.exists());
        assert!(content.exists());

        // A second owner, as in the display process
        let reader = Artifacts::open(labels.clone(), content.clone());
        assert_eq!(reader.read().unwrap(), annotation);
        artifacts.release();
        assert!(labels.exists());

        drop(reader);
        assert!(!labels.exists());
        assert!(!content.exists());
    }

    #[test]
    fn test_drop_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = Artifacts::open(dir.path().join("l.toml"), dir.path().join("c.txt"));
        assert!(artifacts.read().is_err());
        drop(artifacts);
    }
}
