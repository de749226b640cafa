// WHY: per-chapter state machine that finds reported-speech spans in unmarked verse text
// Block boundaries come straight from corpus position, so no resolution step follows

use anyhow::Result;
#[cfg(feature = "debug-states")]
use tracing::debug;

use crate::citation::{Citation, Provenance, VerseRange};
use crate::corpus::Chapter;

pub mod cues;

pub use cues::{CueMatch, CueSet, DEFAULT_OPENER_PATTERNS, DEFAULT_TERMINATOR_PATTERNS};

/// State of one chapter's scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockState {
    NotInBlock,
    InBlock { start: u32, evidence: String },
}

/// A closed span of reported speech inside one chapter
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechBlock {
    pub range: VerseRange,
    /// Literal text of the verse whose cue opened the block, trimmed
    pub text: String,
    pub provenance: Provenance,
}

impl SpeechBlock {
    /// Convert to an output record with the given id
    pub fn into_citation(self, id: u64) -> Citation {
        Citation {
            id,
            word_count: self.text.split_whitespace().count(),
            location: Some(self.range),
            text: self.text,
            context: None,
            provenance: Some(self.provenance),
        }
    }
}

/// Cue-based block extractor over two disjoint ordered cue sets
#[derive(Debug)]
pub struct BlockExtractor {
    openers: CueSet,
    terminators: CueSet,
}

impl BlockExtractor {
    pub fn new(openers: CueSet, terminators: CueSet) -> Self {
        Self {
            openers,
            terminators,
        }
    }

    pub fn with_default_cues() -> Result<Self> {
        Ok(Self::new(
            CueSet::default_openers()?,
            CueSet::default_terminators()?,
        ))
    }

    pub fn openers(&self) -> &CueSet {
        &self.openers
    }

    pub fn terminators(&self) -> &CueSet {
        &self.terminators
    }

    /// Scan one chapter, verses in ascending order, and return its closed blocks.
    ///
    /// A terminator closes the open block at the previous verse; the same verse is then
    /// re-tested against the openers. A block still open at the end of the chapter closes
    /// at the chapter's last verse.
    pub fn extract_chapter(&self, chapter: &Chapter) -> Vec<SpeechBlock> {
        let mut blocks = Vec::new();
        let mut state = BlockState::NotInBlock;
        let mut previous: Option<u32> = None;

        for verse in chapter.verses() {
            let number = verse.number;

            state = match state {
                BlockState::NotInBlock => self.try_open(number, &verse.text),
                BlockState::InBlock { start, evidence } => {
                    if self.terminators.is_match(&verse.text) {
                        // previous is always set here: the opening verse was visited
                        let end = previous.unwrap_or(start);
                        self.close(chapter, start, end, evidence, &mut blocks);
                        self.try_open(number, &verse.text)
                    } else {
                        BlockState::InBlock { start, evidence }
                    }
                }
            };

            previous = Some(number);
        }

        if let (BlockState::InBlock { start, evidence }, Some(last)) = (state, chapter.last_verse()) {
            self.close(chapter, start, last, evidence, &mut blocks);
        }

        blocks
    }

    fn try_open(&self, number: u32, text: &str) -> BlockState {
        match self.openers.first_match(text) {
            Some(cue) => {
                #[cfg(feature = "debug-states")]
                debug!(
                    "NotInBlock -> InBlock at verse {} via cue {} ({:?})",
                    number,
                    cue.index,
                    self.openers.pattern(cue.index)
                );
                BlockState::InBlock {
                    start: number,
                    evidence: cue.phrase.to_string(),
                }
            }
            None => BlockState::NotInBlock,
        }
    }

    fn close(
        &self,
        chapter: &Chapter,
        start: u32,
        end: u32,
        evidence: String,
        blocks: &mut Vec<SpeechBlock>,
    ) {
        #[cfg(feature = "debug-states")]
        debug!("InBlock -> NotInBlock closing {}-{}", start, end);

        let Some(range) = VerseRange::span(chapter.book(), chapter.number(), start, end) else {
            return;
        };
        let text = chapter
            .verse(start)
            .map(|v| v.text.trim().to_string())
            .unwrap_or_default();

        blocks.push(SpeechBlock {
            range,
            text,
            provenance: Provenance {
                evidence: vec![evidence],
                ..Provenance::default()
            },
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::citation::Via;
    use crate::corpus::Corpus;

    fn synthetic_extractor() -> BlockExtractor {
        BlockExtractor::new(
            CueSet::new([r"\bspeaks\b"]).unwrap(),
            CueSet::new([r"^Narration\b"]).unwrap(),
        )
    }

    fn chapter_of(verses: &[&str]) -> Corpus {
        let mut builder = Corpus::builder();
        for (i, text) in verses.iter().enumerate() {
            builder.verse("Test", "1", i as u32 + 1, text);
        }
        builder.build()
    }

    fn ranges(blocks: &[SpeechBlock]) -> Vec<(u32, u32)> {
        blocks
            .iter()
            .map(|b| (b.range.start_verse(), b.range.end_verse()))
            .collect()
    }

    fn run(extractor: &BlockExtractor, corpus: &Corpus) -> Vec<SpeechBlock> {
        let chapter = &corpus.book("Test").unwrap().chapters()[0];
        extractor.extract_chapter(chapter)
    }

    #[test]
    fn test_no_openers_no_blocks() {
        let corpus = chapter_of(&["plain", "Narration resumes", "more plain"]);
        assert!(run(&synthetic_extractor(), &corpus).is_empty());
    }

    #[test]
    fn test_terminator_closes_at_previous_verse() {
        let corpus = chapter_of(&["he speaks", "continues", "Narration again", "after"]);
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(1, 2)]);
        assert_eq!(blocks[0].text, "he speaks");
    }

    #[test]
    fn test_chapter_end_closes_open_block() {
        let corpus = chapter_of(&["intro", "he speaks", "continues", "still going"]);
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(2, 4)]);
    }

    #[test]
    fn test_terminator_verse_can_reopen() {
        let corpus = chapter_of(&["he speaks", "more", "Narration: now she speaks", "end"]);
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_terminator_right_after_start_yields_single_verse() {
        let corpus = chapter_of(&["he speaks", "Narration", "plain"]);
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(1, 1)]);
    }

    #[test]
    fn test_terminator_ignored_outside_block() {
        let corpus = chapter_of(&["Narration first", "he speaks", "Narration"]);
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(2, 2)]);
    }

    #[test]
    fn test_opener_inside_block_extends() {
        let corpus = chapter_of(&["he speaks", "she speaks too", "Narration"]);
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(1, 2)]);
    }

    #[test]
    fn test_gapped_numbering_closes_at_visited_verse() {
        let mut builder = Corpus::builder();
        builder
            .verse("Test", "1", 1, "he speaks")
            .verse("Test", "1", 4, "continues")
            .verse("Test", "1", 9, "Narration");
        let corpus = builder.build();
        let blocks = run(&synthetic_extractor(), &corpus);
        assert_eq!(ranges(&blocks), vec![(1, 4)]);
    }

    #[test]
    fn test_default_cues_genesis_scenario() {
        let corpus = chapter_of(&[
            "The LORD said, Let there be light",
            "And it was so",
            "And Moses spoke unto the people",
        ]);
        let extractor = BlockExtractor::with_default_cues().unwrap();
        let blocks = run(&extractor, &corpus);
        assert_eq!(ranges(&blocks), vec![(1, 2)]);

        let block = &blocks[0];
        assert_eq!(block.range.to_string(), "Test 1:1-2");
        assert_eq!(block.provenance.via, Via::Direct);
        assert!((block.provenance.confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(block.provenance.evidence, vec!["The LORD said".to_string()]);
    }

    #[test]
    fn test_into_citation_counts_words() {
        let corpus = chapter_of(&["  he speaks loudly  "]);
        let blocks = run(&synthetic_extractor(), &corpus);
        let citation = blocks.into_iter().next().unwrap().into_citation(7);
        assert_eq!(citation.id, 7);
        assert_eq!(citation.text, "he speaks loudly");
        assert_eq!(citation.word_count, 3);
        assert_eq!(citation.reference(), "Test 1:1");
        assert!(citation.provenance.is_some());
    }
}
