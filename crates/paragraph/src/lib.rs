//! Paragraph Generator: the three-phase state machine that reconstructs
//! paragraph boundaries across page breaks from OCR line-level geometry.
//!
//! Phase 1 turns the tagged line stream into typed fragments via an explicit
//! state machine (`STANDARD_PROSE` / `VERSE_BLOCK` / `QA_BLOCK` /
//! `HEADER_BLOCK`). Phase 2 combines consecutive same-type fragments and
//! discards `HEADER_BLOCK` (structural only — it never appears in the
//! output). Phase 3 merges prose fragments that were split by a page break
//! mid-sentence.

use catalogue_common::{Paragraph, ParagraphType, Tag};
use tracing::warn;

/// One line as seen by the generator: the subset of `catalogue_common::Line`
/// the state machine actually switches on, plus enough geometry to detect a
/// missing-geometry degrade case.
#[derive(Debug, Clone)]
pub struct TaggedLine {
    pub text: String,
    pub page_num: u32,
    pub original_line_index: usize,
    pub tags: Vec<Tag>,
    pub geometry_present: bool,
}

impl TaggedLine {
    fn has(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StandardProse,
    VerseBlock,
    QaBlock,
    HeaderBlock,
}

#[derive(Debug, Clone)]
struct Fragment {
    paragraph_type: ParagraphType,
    lines: Vec<TaggedLine>,
    /// Set when this fragment must never merge with a following
    /// `STANDARD_PROSE` fragment in Phase 3: either its last line was
    /// `IS_INTRODUCTORY`, or it immediately follows a (since-discarded)
    /// `HEADER_BLOCK`.
    no_combine: bool,
}

impl Fragment {
    fn new(paragraph_type: ParagraphType, line: TaggedLine) -> Self {
        Self {
            paragraph_type,
            lines: vec![line],
            no_combine: false,
        }
    }

    fn push(&mut self, line: TaggedLine) {
        self.lines.push(line);
    }

    fn separator(&self) -> &'static str {
        match self.paragraph_type {
            ParagraphType::StandardProse => " ",
            ParagraphType::VerseBlock | ParagraphType::QaBlock | ParagraphType::HeaderBlock => "\n",
        }
    }

    fn ends_with_terminator(&self) -> bool {
        self.lines
            .last()
            .is_some_and(|l| l.has(Tag::EndsWithTerminator))
    }

    fn page_start(&self) -> u32 {
        self.lines.first().map(|l| l.page_num).unwrap_or(0)
    }

    fn page_end(&self) -> u32 {
        self.lines.last().map(|l| l.page_num).unwrap_or(0)
    }

    fn original_line_index(&self) -> usize {
        self.lines
            .first()
            .map(|l| l.original_line_index)
            .unwrap_or(0)
    }

    fn text(&self) -> String {
        let sep = self.separator();
        self.lines
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

/// Output of paragraph generation: the finished paragraphs plus a count of
/// lines that degraded due to missing geometry (a `ClassificationWarning`
/// equivalent — non-fatal, logged and counted).
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub paragraphs: Vec<Paragraph>,
    pub warnings: usize,
}

/// Run the full three-phase pipeline over one document's ordered line
/// stream. Deterministic: the same lines in the same order with the same
/// tags always produce the same paragraph stream.
#[must_use]
pub fn generate_paragraphs(lines: Vec<TaggedLine>) -> GenerationResult {
    let mut warnings = 0;
    let fragments = phase1(lines, &mut warnings);
    let fragments = phase2(fragments);
    let paragraphs = phase3(fragments);
    GenerationResult {
        paragraphs,
        warnings,
    }
}

fn phase1(lines: Vec<TaggedLine>, warnings: &mut usize) -> Vec<Fragment> {
    let mut state = State::StandardProse;
    let mut current: Option<Fragment> = None;
    let mut output: Vec<Fragment> = Vec::new();

    let finalize = |current: &mut Option<Fragment>, output: &mut Vec<Fragment>| {
        if let Some(fragment) = current.take() {
            if !fragment.lines.is_empty() {
                output.push(fragment);
            }
        }
    };

    for mut line in lines {
        if !line.geometry_present {
            warn!(
                page = line.page_num,
                line = line.original_line_index,
                "line classified without geometry, degrading to STANDARD_PROSE"
            );
            *warnings += 1;
            line.tags.retain(|t| {
                !matches!(
                    t,
                    Tag::IsCentered
                        | Tag::IsIndented
                        | Tag::IsNotRightJustified
                        | Tag::IsHeading
                )
            });
        }

        let mut pending = Some(line);
        // "Reprocess current line after state change": an inner loop that
        // re-runs the same line through the (now-updated) state once a
        // transition consumes no input.
        while let Some(line) = pending.take() {
            match state {
                State::HeaderBlock => {
                    if line.has(Tag::IsHeaderRegex) {
                        current
                            .as_mut()
                            .expect("HEADER_BLOCK state always has an open fragment")
                            .push(line);
                    } else {
                        finalize(&mut current, &mut output);
                        state = State::StandardProse;
                        pending = Some(line); // reprocess as STANDARD_PROSE
                    }
                }
                _ if line.has(Tag::IsHeaderRegex) => {
                    finalize(&mut current, &mut output);
                    let mut fragment = Fragment::new(ParagraphType::HeaderBlock, line);
                    fragment.no_combine = true;
                    current = Some(fragment);
                    state = State::HeaderBlock;
                }
                State::StandardProse => {
                    if line.has(Tag::IsQaMarker) {
                        finalize(&mut current, &mut output);
                        current = Some(Fragment::new(ParagraphType::QaBlock, line));
                        state = State::QaBlock;
                    } else if line.has(Tag::IsCentered) && !line.has(Tag::IsHeading) {
                        finalize(&mut current, &mut output);
                        current = Some(Fragment::new(ParagraphType::VerseBlock, line));
                        state = State::VerseBlock;
                    } else if line.has(Tag::IsHeading) {
                        finalize(&mut current, &mut output);
                        let mut heading = Fragment::new(ParagraphType::HeaderBlock, line);
                        heading.no_combine = true;
                        output.push(heading);
                        // state stays STANDARD_PROSE; current remains None
                    } else if line.has(Tag::IsIntroductory) {
                        match &mut current {
                            Some(fragment) => fragment.push(line),
                            None => current = Some(Fragment::new(ParagraphType::StandardProse, line)),
                        }
                        current.as_mut().unwrap().no_combine = true;
                        finalize(&mut current, &mut output);
                    } else {
                        match &mut current {
                            Some(fragment) => fragment.push(line),
                            None => current = Some(Fragment::new(ParagraphType::StandardProse, line)),
                        }
                    }
                }
                State::VerseBlock => {
                    if line.has(Tag::IsCentered) {
                        current
                            .as_mut()
                            .expect("VERSE_BLOCK state always has an open fragment")
                            .push(line);
                    } else {
                        finalize(&mut current, &mut output);
                        state = State::StandardProse;
                        pending = Some(line);
                    }
                }
                State::QaBlock => {
                    if line.has(Tag::IsQaMarker) {
                        current
                            .as_mut()
                            .expect("QA_BLOCK state always has an open fragment")
                            .push(line);
                    } else if line.has(Tag::IsCentered) {
                        finalize(&mut current, &mut output);
                        current = Some(Fragment::new(ParagraphType::VerseBlock, line));
                        state = State::VerseBlock;
                    } else if line.has(Tag::IsIndented) {
                        // continuing Q/A indent: same turn wraps onto another line
                        current
                            .as_mut()
                            .expect("QA_BLOCK state always has an open fragment")
                            .push(line);
                    } else {
                        finalize(&mut current, &mut output);
                        state = State::StandardProse;
                        pending = Some(line);
                    }
                }
            }
        }
    }
    finalize(&mut current, &mut output);
    output
}

/// Combine consecutive same-type fragments (`VERSE_BLOCK`+`VERSE_BLOCK`,
/// `QA_BLOCK`+`QA_BLOCK`), then discard `HEADER_BLOCK` fragments, marking the
/// fragment immediately after each discarded header as `no_combine` so
/// Phase 3 still honours the barrier even though the header itself is gone.
fn phase2(fragments: Vec<Fragment>) -> Vec<Fragment> {
    let mut combined: Vec<Fragment> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let merges = matches!(
            fragment.paragraph_type,
            ParagraphType::VerseBlock | ParagraphType::QaBlock
        ) && combined
            .last()
            .is_some_and(|prev| prev.paragraph_type == fragment.paragraph_type);

        if merges {
            let prev = combined.last_mut().unwrap();
            prev.lines.extend(fragment.lines);
        } else {
            combined.push(fragment);
        }
    }

    let mut output = Vec::with_capacity(combined.len());
    let mut next_no_combine = false;
    for mut fragment in combined {
        if fragment.paragraph_type == ParagraphType::HeaderBlock {
            next_no_combine = true;
            continue;
        }
        if next_no_combine {
            fragment.no_combine = true;
            next_no_combine = false;
        }
        output.push(fragment);
    }
    output
}

/// Merge consecutive `STANDARD_PROSE` fragments that were split by a page
/// break mid-sentence: the earlier fragment must not end with a sentence
/// terminator, must not be `no_combine`, and the two fragments' pages must
/// be the same or consecutive integers.
fn phase3(fragments: Vec<Fragment>) -> Vec<Paragraph> {
    let mut merged: Vec<Fragment> = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let should_merge = merged.last().is_some_and(|prev| {
            prev.paragraph_type == ParagraphType::StandardProse
                && fragment.paragraph_type == ParagraphType::StandardProse
                && !prev.ends_with_terminator()
                && !prev.no_combine
                && fragment.page_start().saturating_sub(prev.page_end()) <= 1
        });

        if should_merge {
            let prev = merged.last_mut().unwrap();
            prev.lines.extend(fragment.lines);
        } else {
            merged.push(fragment);
        }
    }

    merged
        .into_iter()
        .enumerate()
        .map(|(seq_num, fragment)| Paragraph {
            seq_num: seq_num as u64,
            page_num_start: fragment.page_start(),
            page_num_end: fragment.page_end(),
            text: fragment.text(),
            paragraph_type: fragment.paragraph_type,
            original_line_index: fragment.original_line_index(),
        })
        .filter(|p| !p.text.is_empty())
        .collect()
}
