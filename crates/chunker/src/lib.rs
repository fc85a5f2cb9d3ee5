//! Chunker: splits long paragraphs into overlapping chunks for embedding.
//!
//! Two strategies, selected by `config.chunk_strategy`, express the spec's
//! "dynamic dispatch over chunking strategies" design note as a small
//! capability-set trait rather than a hand-rolled enum match:
//!
//! - `default`: a fixed-size sliding window over each paragraph's text.
//!   Chunks never span a paragraph boundary.
//! - `dynamic`: adjacent paragraphs are merged first while a caller-supplied
//!   sentence-embedding cosine similarity exceeds a threshold, then the
//!   fixed window runs within each merged group.
//!
//! Chunks are produced with an empty `vector` — the Embedding Adapter fills
//! it in afterwards. Chunk ids are deterministic (`doc_id` + paragraph
//! `seq_num` + window index) so that deleting and re-indexing a document
//! reproduces the same set of chunk records.

use catalogue_common::{Chunk, Paragraph};
use catalogue_config::ResolvedConfig;

pub trait ChunkStrategy: Send + Sync {
    fn chunk(&self, doc_id: &str, paragraphs: &[Paragraph], config: &ResolvedConfig) -> Vec<Chunk>;
}

/// Fixed-size sliding window, operating on `char`s rather than bytes so
/// Devanagari/Gujarati multi-byte sequences are never split mid-codepoint.
pub struct DefaultChunker;

impl DefaultChunker {
    fn window_paragraph(paragraph: &Paragraph, doc_id: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
        let chars: Vec<char> = paragraph.text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }
        let chunk_size = chunk_size.max(1);
        let overlap = overlap.min(chunk_size.saturating_sub(1));

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut window_idx = 0usize;
        loop {
            let end = (start + chunk_size).min(chars.len());
            let text: String = chars[start..end].iter().collect();
            chunks.push(Chunk {
                doc_id: doc_id.to_string(),
                chunk_id: format!("{doc_id}-{}-{window_idx}", paragraph.seq_num),
                paragraph_seq_num: paragraph.seq_num,
                page_num: paragraph.page_num_start,
                text,
                vector: Vec::new(),
            });
            if end == chars.len() {
                break;
            }
            start = end - overlap;
            window_idx += 1;
        }
        chunks
    }
}

impl ChunkStrategy for DefaultChunker {
    fn chunk(&self, doc_id: &str, paragraphs: &[Paragraph], config: &ResolvedConfig) -> Vec<Chunk> {
        paragraphs
            .iter()
            .flat_map(|p| Self::window_paragraph(p, doc_id, config.chunk_size, config.chunk_overlap))
            .collect()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Merges adjacent paragraphs whose sentence embeddings are similar enough
/// before fixed-windowing within each merged group.
pub struct DynamicChunker {
    similarity_threshold: f32,
    embed_batch: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync>,
}

impl DynamicChunker {
    #[must_use]
    pub fn new(
        similarity_threshold: f32,
        embed_batch: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync>,
    ) -> Self {
        Self {
            similarity_threshold,
            embed_batch,
        }
    }

    fn merge_groups<'a>(&self, paragraphs: &'a [Paragraph]) -> Vec<Vec<&'a Paragraph>> {
        if paragraphs.is_empty() {
            return Vec::new();
        }
        let texts: Vec<String> = paragraphs.iter().map(|p| p.text.clone()).collect();
        let embeddings = (self.embed_batch)(&texts);

        let mut groups: Vec<Vec<&Paragraph>> = vec![vec![&paragraphs[0]]];
        for (idx, paragraph) in paragraphs.iter().enumerate().skip(1) {
            let similar_enough = match (embeddings.get(idx - 1), embeddings.get(idx)) {
                (Some(prev), Some(cur)) => {
                    cosine_similarity(prev, cur) >= self.similarity_threshold
                }
                _ => false,
            };
            if similar_enough {
                groups.last_mut().unwrap().push(paragraph);
            } else {
                groups.push(vec![paragraph]);
            }
        }
        groups
    }
}

impl ChunkStrategy for DynamicChunker {
    fn chunk(&self, doc_id: &str, paragraphs: &[Paragraph], config: &ResolvedConfig) -> Vec<Chunk> {
        let groups = self.merge_groups(paragraphs);
        let mut chunks = Vec::new();
        // Renumbered by group position, not by the first member's original
        // seq_num, so merging keeps the document's chunk seq_num set
        // contiguous from 0 instead of leaving holes where paragraphs were
        // folded into a predecessor's group.
        for (group_idx, group) in groups.into_iter().enumerate() {
            let merged_text = group
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let synthetic = Paragraph {
                seq_num: group_idx as u64,
                page_num_start: group[0].page_num_start,
                page_num_end: group.last().unwrap().page_num_end,
                text: merged_text,
                paragraph_type: group[0].paragraph_type,
                original_line_index: group[0].original_line_index,
            };
            chunks.extend(DefaultChunker::window_paragraph(
                &synthetic,
                doc_id,
                config.chunk_size,
                config.chunk_overlap,
            ));
        }
        chunks
    }
}

/// Select a chunking strategy by the config's `chunk_strategy` string.
#[must_use]
pub fn strategy_for(
    config: &ResolvedConfig,
    embed_batch: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync>,
) -> Box<dyn ChunkStrategy> {
    match config.chunk_strategy.as_str() {
        "dynamic" => Box::new(DynamicChunker::new(0.75, embed_batch)),
        _ => Box::new(DefaultChunker),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogue_common::ParagraphType;

    fn paragraph(seq: u64, text: &str) -> Paragraph {
        Paragraph {
            seq_num: seq,
            page_num_start: 1,
            page_num_end: 1,
            text: text.to_string(),
            paragraph_type: ParagraphType::StandardProse,
            original_line_index: 0,
        }
    }

    #[test]
    fn default_chunker_respects_size_and_overlap() {
        let config = ResolvedConfig {
            chunk_size: 10,
            chunk_overlap: 3,
            ..ResolvedConfig::default()
        };
        let p = paragraph(0, &"a".repeat(25));
        let chunks = DefaultChunker.chunk("doc1", &[p], &config);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 10);
        }
    }

    #[test]
    fn default_chunker_never_spans_paragraphs() {
        let config = ResolvedConfig {
            chunk_size: 1000,
            chunk_overlap: 0,
            ..ResolvedConfig::default()
        };
        let paragraphs = vec![paragraph(0, "first paragraph"), paragraph(1, "second paragraph")];
        let chunks = DefaultChunker.chunk("doc1", &paragraphs, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "first paragraph");
        assert_eq!(chunks[1].text, "second paragraph");
    }

    #[test]
    fn chunk_ids_are_deterministic_across_runs() {
        let config = ResolvedConfig::default();
        let p = paragraph(3, "hello world");
        let a = DefaultChunker.chunk("doc1", &[p.clone()], &config);
        let b = DefaultChunker.chunk("doc1", &[p], &config);
        assert_eq!(a[0].chunk_id, b[0].chunk_id);
    }

    #[test]
    fn dynamic_chunker_merges_similar_paragraphs() {
        let embed_batch: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync> =
            Box::new(|texts: &[String]| texts.iter().map(|_| vec![1.0, 0.0]).collect());
        let chunker = DynamicChunker::new(0.9, embed_batch);
        let config = ResolvedConfig {
            chunk_size: 1000,
            chunk_overlap: 0,
            ..ResolvedConfig::default()
        };
        let paragraphs = vec![paragraph(0, "alpha"), paragraph(1, "beta")];
        let chunks = chunker.chunk("doc1", &paragraphs, &config);
        // identical embeddings => single merged group => one chunk
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha beta");
    }

    #[test]
    fn dynamic_chunker_keeps_dissimilar_paragraphs_separate() {
        let embed_batch: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync> = Box::new(|texts| {
            texts
                .iter()
                .enumerate()
                .map(|(i, _)| if i % 2 == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect()
        });
        let chunker = DynamicChunker::new(0.9, embed_batch);
        let config = ResolvedConfig::default();
        let paragraphs = vec![paragraph(0, "alpha"), paragraph(1, "beta")];
        let chunks = chunker.chunk("doc1", &paragraphs, &config);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn dynamic_chunker_renumbers_merged_groups_contiguously() {
        // Three paragraphs, only the first two merge: groups are
        // [{0,1}, {2}], and must renumber to seq_num {0, 1}, not {0, 2}.
        let embed_batch: Box<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync> = Box::new(|texts| {
            texts
                .iter()
                .enumerate()
                .map(|(i, _)| if i < 2 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
                .collect()
        });
        let chunker = DynamicChunker::new(0.9, embed_batch);
        let config = ResolvedConfig {
            chunk_size: 1000,
            chunk_overlap: 0,
            ..ResolvedConfig::default()
        };
        let paragraphs = vec![
            paragraph(0, "alpha"),
            paragraph(1, "beta"),
            paragraph(2, "gamma"),
        ];
        let chunks = chunker.chunk("doc1", &paragraphs, &config);
        let mut seq_nums: Vec<u64> = chunks.iter().map(|c| c.paragraph_seq_num).collect();
        seq_nums.sort_unstable();
        assert_eq!(seq_nums, vec![0, 1]);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_identical_is_one() {
        let sim = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }
}
