//! Config Resolver: hierarchical per-folder / per-file configuration merge.
//!
//! For each PDF, walks every `config.json` found between the corpus root and
//! the file's directory (root first, leaf last), plus an optional
//! `<filename>_config.json` sitting beside the PDF itself, and merges them
//! key-by-key: the deepest-defined value always wins, and lists/maps are
//! replaced wholesale rather than merged element-by-element. Unrecognized
//! keys fail the whole file rather than being silently ignored.

use catalogue_common::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    #[error("malformed config at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerseDetection {
    #[serde(default = "default_center_threshold")]
    pub center_threshold: f32,
    #[serde(default = "default_min_right_indent")]
    pub min_right_indent: f32,
}

fn default_center_threshold() -> f32 {
    40.0
}
fn default_min_right_indent() -> f32 {
    20.0
}

impl Default for VerseDetection {
    fn default() -> Self {
        Self {
            center_threshold: default_center_threshold(),
            min_right_indent: default_min_right_indent(),
        }
    }
}

/// Deserialization target for a single config file on disk. Every field is
/// optional and `deny_unknown_fields` rejects anything outside the closed
/// key set named in the spec — that rejection is how `ConfigError::UnknownKey`
/// gets raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    language: Option<String>,
    ocr_engine: Option<String>,
    #[serde(default)]
    header_regex: Option<Vec<String>>,
    #[serde(default)]
    footer_regex: Option<Vec<String>>,
    verse_detection: Option<VerseDetection>,
    #[serde(default)]
    qa_markers: Option<Vec<String>>,
    chunk_strategy: Option<String>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    #[serde(default)]
    categories: Option<BTreeMap<String, Vec<String>>>,
    file_url_template: Option<String>,
    min_left_indent: Option<f32>,
    min_right_indent: Option<f32>,
    short_line_chars: Option<usize>,
    min_confidence: Option<i32>,
    margin_crop_percent: Option<f32>,
}

impl RawConfig {
    fn merge_onto(self, base: &mut RawConfig) {
        if self.language.is_some() {
            base.language = self.language;
        }
        if self.ocr_engine.is_some() {
            base.ocr_engine = self.ocr_engine;
        }
        if self.header_regex.is_some() {
            base.header_regex = self.header_regex;
        }
        if self.footer_regex.is_some() {
            base.footer_regex = self.footer_regex;
        }
        if self.verse_detection.is_some() {
            base.verse_detection = self.verse_detection;
        }
        if self.qa_markers.is_some() {
            base.qa_markers = self.qa_markers;
        }
        if self.chunk_strategy.is_some() {
            base.chunk_strategy = self.chunk_strategy;
        }
        if self.chunk_size.is_some() {
            base.chunk_size = self.chunk_size;
        }
        if self.chunk_overlap.is_some() {
            base.chunk_overlap = self.chunk_overlap;
        }
        if self.categories.is_some() {
            base.categories = self.categories;
        }
        if self.file_url_template.is_some() {
            base.file_url_template = self.file_url_template;
        }
        if self.min_left_indent.is_some() {
            base.min_left_indent = self.min_left_indent;
        }
        if self.min_right_indent.is_some() {
            base.min_right_indent = self.min_right_indent;
        }
        if self.short_line_chars.is_some() {
            base.short_line_chars = self.short_line_chars;
        }
        if self.min_confidence.is_some() {
            base.min_confidence = self.min_confidence;
        }
        if self.margin_crop_percent.is_some() {
            base.margin_crop_percent = self.margin_crop_percent;
        }
    }
}

/// Fully-resolved configuration for one document, with every recognized key
/// defaulted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedConfig {
    pub language: String,
    pub ocr_engine: String,
    pub header_regex: Vec<String>,
    pub footer_regex: Vec<String>,
    pub verse_detection: VerseDetection,
    pub qa_markers: Vec<String>,
    pub chunk_strategy: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub categories: BTreeMap<String, Vec<String>>,
    pub file_url_template: Option<String>,
    pub min_left_indent: f32,
    pub min_right_indent: f32,
    pub short_line_chars: usize,
    pub min_confidence: i32,
    pub margin_crop_percent: f32,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            language: "hi".to_string(),
            ocr_engine: "tesseract".to_string(),
            header_regex: Vec::new(),
            footer_regex: Vec::new(),
            verse_detection: VerseDetection::default(),
            qa_markers: vec!["प्रश्न".to_string(), "उत्तर".to_string()],
            chunk_strategy: "default".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            categories: BTreeMap::new(),
            file_url_template: None,
            min_left_indent: 15.0,
            min_right_indent: 20.0,
            short_line_chars: 50,
            min_confidence: 60,
            margin_crop_percent: 0.0,
        }
    }
}

impl From<RawConfig> for ResolvedConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = ResolvedConfig::default();
        Self {
            language: raw.language.unwrap_or(defaults.language),
            ocr_engine: raw.ocr_engine.unwrap_or(defaults.ocr_engine),
            header_regex: raw.header_regex.unwrap_or(defaults.header_regex),
            footer_regex: raw.footer_regex.unwrap_or(defaults.footer_regex),
            verse_detection: raw.verse_detection.unwrap_or(defaults.verse_detection),
            qa_markers: raw.qa_markers.unwrap_or(defaults.qa_markers),
            chunk_strategy: raw.chunk_strategy.unwrap_or(defaults.chunk_strategy),
            chunk_size: raw.chunk_size.unwrap_or(defaults.chunk_size),
            chunk_overlap: raw.chunk_overlap.unwrap_or(defaults.chunk_overlap),
            categories: raw.categories.unwrap_or(defaults.categories),
            file_url_template: raw.file_url_template,
            min_left_indent: raw.min_left_indent.unwrap_or(defaults.min_left_indent),
            min_right_indent: raw.min_right_indent.unwrap_or(defaults.min_right_indent),
            short_line_chars: raw.short_line_chars.unwrap_or(defaults.short_line_chars),
            min_confidence: raw.min_confidence.unwrap_or(defaults.min_confidence),
            margin_crop_percent: raw
                .margin_crop_percent
                .unwrap_or(defaults.margin_crop_percent),
        }
    }
}

/// Parse one `config.json`-equivalent file, rejecting unrecognized keys.
fn parse_config_file(path: &Path) -> ConfigResult<RawConfig> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| {
        if source.is_data() {
            ConfigError::UnknownKey(format!("{path:?}: {source}"))
        } else {
            ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Resolve the configuration for `pdf_path`, walking every directory between
/// `corpus_root` and the PDF's parent (root to leaf), plus an optional
/// `<filename>_config.json` beside the PDF.
pub fn resolve_config(corpus_root: &Path, pdf_path: &Path) -> ConfigResult<ResolvedConfig> {
    let mut merged = RawConfig::default();

    let rel = pdf_path
        .strip_prefix(corpus_root)
        .unwrap_or(pdf_path)
        .parent()
        .unwrap_or_else(|| Path::new(""));

    let mut dir = corpus_root.to_path_buf();
    apply_dir_config(&dir, &mut merged)?;
    for component in rel.components() {
        dir.push(component);
        apply_dir_config(&dir, &mut merged)?;
    }

    if let Some(stem) = pdf_path.file_stem().and_then(|s| s.to_str()) {
        if let Some(parent) = pdf_path.parent() {
            let per_file = parent.join(format!("{stem}_config.json"));
            if per_file.is_file() {
                parse_config_file(&per_file)?.merge_onto(&mut merged);
            }
        }
    }

    Ok(merged.into())
}

fn apply_dir_config(dir: &Path, merged: &mut RawConfig) -> ConfigResult<()> {
    let candidate = dir.join("config.json");
    if candidate.is_file() {
        parse_config_file(&candidate)?.merge_onto(merged);
    }
    Ok(())
}

/// Canonical-JSON hash of a resolved config: stable key order (serde_json's
/// default `Map` is `BTreeMap`-backed) hashed with the same SHA-256 used for
/// the PDF content fingerprint.
#[must_use]
pub fn config_hash(config: &ResolvedConfig) -> String {
    let value: Value = serde_json::to_value(config).expect("ResolvedConfig always serializes");
    let canonical = serde_json::to_vec(&value).expect("Value always serializes");
    sha256_hex(&canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn root_only_config_applies() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"language": "gu", "chunk_size": 500}"#,
        )
        .unwrap();
        let pdf = dir.path().join("book.pdf");
        fs::write(&pdf, b"pdf").unwrap();

        let resolved = resolve_config(dir.path(), &pdf).unwrap();
        assert_eq!(resolved.language, "gu");
        assert_eq!(resolved.chunk_size, 500);
        assert_eq!(resolved.chunk_overlap, 200); // untouched default
    }

    #[test]
    fn deeper_override_wins() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"language": "hi"}"#).unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("config.json"), r#"{"language": "en"}"#).unwrap();
        let pdf = sub.join("book.pdf");
        fs::write(&pdf, b"pdf").unwrap();

        let resolved = resolve_config(dir.path(), &pdf).unwrap();
        assert_eq!(resolved.language, "en");
    }

    #[test]
    fn per_file_config_overrides_folder() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.json"), r#"{"language": "hi"}"#).unwrap();
        let pdf = dir.path().join("book.pdf");
        fs::write(&pdf, b"pdf").unwrap();
        fs::write(
            dir.path().join("book_config.json"),
            r#"{"language": "gu"}"#,
        )
        .unwrap();

        let resolved = resolve_config(dir.path(), &pdf).unwrap();
        assert_eq!(resolved.language, "gu");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"not_a_real_key": true}"#,
        )
        .unwrap();
        let pdf = dir.path().join("book.pdf");
        fs::write(&pdf, b"pdf").unwrap();

        let err = resolve_config(dir.path(), &pdf).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(_)));
    }

    #[test]
    fn lists_are_replaced_not_merged() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"header_regex": ["^CHAPTER"]}"#,
        )
        .unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(
            sub.join("config.json"),
            r#"{"header_regex": ["^SECTION"]}"#,
        )
        .unwrap();
        let pdf = sub.join("book.pdf");
        fs::write(&pdf, b"pdf").unwrap();

        let resolved = resolve_config(dir.path(), &pdf).unwrap();
        assert_eq!(resolved.header_regex, vec!["^SECTION".to_string()]);
    }

    #[test]
    fn hash_is_stable_and_order_independent() {
        let a = ResolvedConfig {
            categories: BTreeMap::from([("author".to_string(), vec!["X".to_string()])]),
            ..ResolvedConfig::default()
        };
        let b = a.clone();
        assert_eq!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn hash_changes_when_config_changes() {
        let a = ResolvedConfig::default();
        let mut b = ResolvedConfig::default();
        b.chunk_size = 999;
        assert_ne!(config_hash(&a), config_hash(&b));
    }
}
