//! Line Classifier: tags each OCR line with the closed set of geometric and
//! lexical predicates the Paragraph Generator's state machine switches on.
//!
//! Classification itself is a pure function of `(line, page_geometry,
//! config)`; `LineClassifier` only exists to hold the header-regex patterns
//! precompiled once per document rather than recompiling them per line.

use catalogue_common::{Line, PageGeometry, Tag};
use catalogue_config::ResolvedConfig;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("invalid header_regex pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

const TERMINATORS: [char; 4] = ['।', '?', '!', '.'];
const INTRODUCTORY_SUFFIXES: [&str; 3] = ["--", ":-", ":"];

pub struct LineClassifier {
    header_patterns: Vec<Regex>,
    qa_markers: Vec<String>,
    min_left_indent: f32,
    min_right_indent: f32,
    center_threshold: f32,
    short_line_chars: usize,
}

impl LineClassifier {
    pub fn new(config: &ResolvedConfig) -> Result<Self, ClassifyError> {
        let header_patterns = config
            .header_regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ClassifyError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header_patterns,
            qa_markers: config.qa_markers.clone(),
            min_left_indent: config.min_left_indent,
            min_right_indent: config.min_right_indent,
            center_threshold: config.verse_detection.center_threshold,
            short_line_chars: config.short_line_chars,
        })
    }

    /// Tag `line` according to the spec's ordered predicate list. Order only
    /// matters for documentation; every predicate is evaluated independently
    /// of the others except `IS_CENTERED` (depends on `IS_INDENTED`) and
    /// `IS_HEADING` (depends on `IS_CENTERED`/`IS_SHORT`/`ENDS_WITH_TERMINATOR`).
    #[must_use]
    pub fn classify(&self, line: &Line, geometry: &PageGeometry) -> HashSet<Tag> {
        let mut tags = HashSet::new();
        let stripped = line.text.trim();

        // 1. IS_HEADER_REGEX
        let is_header_regex = self.header_patterns.iter().any(|re| re.is_match(stripped));
        if is_header_regex {
            tags.insert(Tag::IsHeaderRegex);
        }

        // 2. IS_QA_MARKER
        let is_qa_marker = self
            .qa_markers
            .iter()
            .any(|marker| stripped.starts_with(marker.as_str()));
        if is_qa_marker {
            tags.insert(Tag::IsQaMarker);
        }

        // 3. indent-derived predicates
        let left_indent = line.x_start - geometry.page_left_margin;
        let right_indent = geometry.page_right_margin - line.x_end;
        let is_indented = left_indent > self.min_left_indent;
        if is_indented {
            tags.insert(Tag::IsIndented);
        }
        let is_not_right_justified = right_indent > self.min_right_indent;
        if is_not_right_justified {
            tags.insert(Tag::IsNotRightJustified);
        }
        let is_centered = is_indented && right_indent > self.center_threshold;
        if is_centered {
            tags.insert(Tag::IsCentered);
        }

        // 4. ENDS_WITH_TERMINATOR
        let ends_with_terminator = stripped.ends_with(TERMINATORS.as_slice());
        if ends_with_terminator {
            tags.insert(Tag::EndsWithTerminator);
        }

        // 5. IS_SHORT
        let is_short = stripped.chars().count() < self.short_line_chars;
        if is_short {
            tags.insert(Tag::IsShort);
        }

        // 6. IS_HEADING
        if is_centered && is_short && !ends_with_terminator {
            tags.insert(Tag::IsHeading);
        }

        // 7. IS_INTRODUCTORY
        if INTRODUCTORY_SUFFIXES.iter().any(|suf| stripped.ends_with(suf)) {
            tags.insert(Tag::IsIntroductory);
        }

        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PageGeometry {
        PageGeometry {
            page_left_margin: 0.0,
            page_right_margin: 600.0,
        }
    }

    fn line(text: &str, x_start: f32, x_end: f32) -> Line {
        Line {
            text: text.to_string(),
            x_start,
            x_end,
            y_start: 0.0,
            y_end: 10.0,
            page_num: 1,
            original_line_index: 0,
            tags: Vec::new(),
        }
    }

    fn classifier(config: &ResolvedConfig) -> LineClassifier {
        LineClassifier::new(config).unwrap()
    }

    #[test]
    fn header_regex_tag() {
        let mut config = ResolvedConfig::default();
        config.header_regex = vec!["^CHAPTER".to_string()];
        let c = classifier(&config);
        let tags = c.classify(&line("CHAPTER ONE", 0.0, 100.0), &geometry());
        assert!(tags.contains(&Tag::IsHeaderRegex));
    }

    #[test]
    fn qa_marker_tag() {
        let config = ResolvedConfig::default();
        let c = classifier(&config);
        let tags = c.classify(&line("प्रश्न: आत्मा क्या है?", 0.0, 100.0), &geometry());
        assert!(tags.contains(&Tag::IsQaMarker));
    }

    #[test]
    fn centered_verse_line_is_indented_and_centered() {
        let config = ResolvedConfig::default();
        let c = classifier(&config);
        // left_indent = 100 - 0 = 100 > 15; right_indent = 600 - 450 = 150 > 40
        let tags = c.classify(&line("सम्यग्दर्शन", 100.0, 450.0), &geometry());
        assert!(tags.contains(&Tag::IsIndented));
        assert!(tags.contains(&Tag::IsCentered));
    }

    #[test]
    fn left_aligned_line_is_not_indented() {
        let config = ResolvedConfig::default();
        let c = classifier(&config);
        let tags = c.classify(&line("प्रोज़ लाइन", 0.0, 590.0), &geometry());
        assert!(!tags.contains(&Tag::IsIndented));
        assert!(!tags.contains(&Tag::IsCentered));
    }

    #[test]
    fn ends_with_terminator_tag() {
        let config = ResolvedConfig::default();
        let c = classifier(&config);
        let tags = c.classify(&line("यह समाप्त।", 0.0, 100.0), &geometry());
        assert!(tags.contains(&Tag::EndsWithTerminator));
    }

    #[test]
    fn short_and_heading_composition() {
        let mut config = ResolvedConfig::default();
        config.short_line_chars = 50;
        let c = classifier(&config);
        // centered, short, no terminator -> heading
        let tags = c.classify(&line("शीर्षक", 100.0, 450.0), &geometry());
        assert!(tags.contains(&Tag::IsShort));
        assert!(tags.contains(&Tag::IsHeading));
    }

    #[test]
    fn heading_requires_no_terminator() {
        let config = ResolvedConfig::default();
        let c = classifier(&config);
        let tags = c.classify(&line("समाप्त।", 100.0, 450.0), &geometry());
        assert!(tags.contains(&Tag::EndsWithTerminator));
        assert!(!tags.contains(&Tag::IsHeading));
    }

    #[test]
    fn introductory_suffix_tag() {
        let config = ResolvedConfig::default();
        let c = classifier(&config);
        for suffix in ["--", ":-", ":"] {
            let text = format!("प्रस्तावना{suffix}");
            let tags = c.classify(&line(&text, 0.0, 100.0), &geometry());
            assert!(tags.contains(&Tag::IsIntroductory), "suffix {suffix} should tag introductory");
        }
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let mut config = ResolvedConfig::default();
        config.header_regex = vec!["(unterminated".to_string()];
        assert!(LineClassifier::new(&config).is_err());
    }
}
