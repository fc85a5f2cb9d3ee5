//! Shared data model for the catalogue ingest pipeline and hybrid search engine.
//!
//! Every crate in the workspace depends on this one for the core document
//! model (`Document`, `Line`, `Paragraph`, `Chunk`, `IndexedRecord`,
//! `FileState`) so that the pipeline stages agree on shapes without forming
//! a dependency cycle between stage crates.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// SHA-256 of arbitrary bytes, lowercase hex. Used both for the PDF content
/// fingerprint and for the resolved-config hash, so every hash in the system
/// goes through this one function.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A PDF identified by its filesystem path and a content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub doc_id: String,
    pub path: PathBuf,
    pub pdf_sha256: String,
    pub original_filename: String,
}

/// One bitmap per PDF page. Transient: produced by page rasterization,
/// consumed by the OCR adapter, never persisted.
#[derive(Clone)]
pub struct PageImage {
    pub page_num: u32,
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// The closed set of tags the Line Classifier may attach to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    IsCentered,
    IsIndented,
    IsNotRightJustified,
    IsHeaderRegex,
    IsQaMarker,
    EndsWithTerminator,
    IsShort,
    IsHeading,
    IsIntroductory,
}

/// OCR output for one logical line, in page-pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub text: String,
    pub x_start: f32,
    pub x_end: f32,
    pub y_start: f32,
    pub y_end: f32,
    pub page_num: u32,
    /// Position of this line within the document's overall line stream;
    /// used to total-order paragraphs by `(page_num_start, original_line_index)`.
    pub original_line_index: usize,
    pub tags: Vec<Tag>,
}

impl Line {
    #[must_use]
    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Per-page geometry the Line Classifier needs to compute indent predicates.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub page_left_margin: f32,
    pub page_right_margin: f32,
}

/// The four paragraph types the Paragraph Generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParagraphType {
    StandardProse,
    VerseBlock,
    QaBlock,
    HeaderBlock,
}

/// A semantically grouped paragraph, possibly spanning a page break.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub seq_num: u64,
    pub page_num_start: u32,
    pub page_num_end: u32,
    pub text: String,
    pub paragraph_type: ParagraphType,
    /// Line index of the first line, used for total ordering before
    /// `seq_num` is assigned.
    pub original_line_index: usize,
}

/// An embeddable unit of text, one or more per paragraph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub paragraph_seq_num: u64,
    pub page_num: u32,
    pub text: String,
    pub vector: Vec<f32>,
}

/// The language a document's text is recorded under, each mapped to its own
/// analyzed field in the search cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Hindi,
    Gujarati,
    English,
}

impl Language {
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Language::Hindi => "text_content_hi",
            Language::Gujarati => "text_content_gu",
            Language::English => "text_content_en",
        }
    }
}

/// One record per chunk, as stored in the search cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedRecord {
    pub chunk_id: String,
    pub doc_id: String,
    pub page_num: u32,
    pub text_content_hi: String,
    pub text_content_gu: String,
    pub text_content_en: String,
    pub vector_embedding: Vec<f32>,
    pub categories: BTreeMap<String, Vec<String>>,
    pub bookmarks: Vec<String>,
    pub original_filename: String,
    pub seq_num: u64,
}

impl IndexedRecord {
    /// Populate only the text field matching `language`; the other two stay
    /// empty so each language's analyzer only ever sees its own text.
    pub fn set_text(&mut self, language: Language, text: String) {
        self.text_content_hi.clear();
        self.text_content_gu.clear();
        self.text_content_en.clear();
        match language {
            Language::Hindi => self.text_content_hi = text,
            Language::Gujarati => self.text_content_gu = text,
            Language::English => self.text_content_en = text,
        }
    }
}

/// Discovery's per-path classification outcome, mirrored into the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Unseen,
    Indexed,
    ContentChanged,
    ConfigChanged,
    Failed,
}

/// Persistent per-path bookkeeping row in the state store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileState {
    pub path: String,
    pub pdf_sha256: String,
    pub config_hash: String,
    pub bookmarks_hash: String,
    pub last_indexed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: FileStatus,
    /// Last recorded mtime/size, used to decide whether the (expensive)
    /// content hash needs recomputing on the next scan.
    pub last_mtime_secs: i64,
    pub last_size_bytes: u64,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable() {
        let a = sha256_hex(b"hello world");
        let b = sha256_hex(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn sha256_hex_differs_on_different_input() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }

    #[test]
    fn indexed_record_set_text_clears_other_languages() {
        let mut rec = IndexedRecord {
            chunk_id: "c1".into(),
            doc_id: "d1".into(),
            page_num: 1,
            text_content_hi: "stale".into(),
            text_content_gu: String::new(),
            text_content_en: String::new(),
            vector_embedding: vec![0.0; 4],
            categories: BTreeMap::new(),
            bookmarks: vec![],
            original_filename: "f.pdf".into(),
            seq_num: 0,
        };
        rec.set_text(Language::English, "hello".into());
        assert_eq!(rec.text_content_en, "hello");
        assert!(rec.text_content_hi.is_empty());
        assert!(rec.text_content_gu.is_empty());
    }
}
