//! Run orchestration for both extraction modes.
//!
//! Chapters are independent units scanned in book order. When an oracle is attached, the
//! blocks of one chapter are refined through a bounded pool that yields results in
//! submission order, so ids are always assigned in sequential scan order.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::blocks::{BlockExtractor, SpeechBlock};
use crate::citation::{Citation, IdSequence};
use crate::config::RunConfig;
use crate::corpus::{Chapter, Corpus};
use crate::oracle::{validate, OracleConfig, OracleError, RefinementOracle, RefinementRequest};
use crate::output::{CitationReport, RunMode, RunStats};
use crate::resolver::ReferenceResolver;
use crate::tagged::TagGroupingExtractor;

const TAGGED_DESCRIPTION: &str = "Quotes marked with inline speech delimiters, resolved to verse references";
const TAGGED_NOTE: &str = "Adjacent marked tokens are grouped into one quote before resolution";
const CUE_DESCRIPTION: &str = "Blocks of reported speech detected by opener and terminator cues";
const CUE_NOTE: &str = "Identified by cue patterns and optionally refined by an oracle";

/// Shared flag checked between chapters
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Citations of one run plus its summary
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub citations: Vec<Citation>,
    pub stats: RunStats,
}

impl RunOutput {
    pub fn into_report(self) -> CitationReport {
        let (description, note) = match self.stats.mode {
            RunMode::Cues => (CUE_DESCRIPTION, CUE_NOTE),
            RunMode::Tagged => (TAGGED_DESCRIPTION, TAGGED_NOTE),
        };
        CitationReport::new(description, note, self.citations)
    }
}

/// Tag-grouping run over an already decoded document
pub fn extract_tagged_citations(
    document: &str,
    corpus: &Corpus,
    config: &RunConfig,
) -> Result<RunOutput> {
    let start_time = Instant::now();
    let extractor = TagGroupingExtractor::new(config.grouping.clone())?;
    let resolver = ReferenceResolver::new(corpus, &config.tagged_books, config.resolver.clone());

    let citations = extractor.extract(document, &resolver);
    let resolved = citations.iter().filter(|c| c.is_resolved()).count() as u64;

    let stats = RunStats {
        mode: RunMode::Tagged,
        citations: citations.len() as u64,
        resolved,
        unresolved: citations.len() as u64 - resolved,
        processing_time_ms: start_time.elapsed().as_millis() as u64,
        ..RunStats::default()
    };
    Ok(RunOutput { citations, stats })
}

enum Refined {
    Applied(SpeechBlock),
    Kept(SpeechBlock),
}

/// Cue-based run over a set of candidate books
pub struct CuePipeline<'c> {
    corpus: &'c Corpus,
    extractor: BlockExtractor,
    oracle: Option<Arc<dyn RefinementOracle>>,
    oracle_config: OracleConfig,
    cancellation: CancellationFlag,
    show_progress: bool,
}

impl<'c> CuePipeline<'c> {
    pub fn new(corpus: &'c Corpus, extractor: BlockExtractor) -> Self {
        Self {
            corpus,
            extractor,
            oracle: None,
            oracle_config: OracleConfig::default(),
            cancellation: CancellationFlag::new(),
            show_progress: false,
        }
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn RefinementOracle>, config: OracleConfig) -> Self {
        self.oracle = Some(oracle);
        self.oracle_config = config;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Scan `books` in the given order. Books absent from the corpus are skipped.
    /// A cancelled run returns the citations of the chapters completed so far.
    pub async fn run<S: AsRef<str>>(&self, books: &[S]) -> Result<RunOutput> {
        let start_time = Instant::now();
        let chapters: Vec<&Chapter> = books
            .iter()
            .filter_map(|name| {
                let book = self.corpus.book(name.as_ref());
                if book.is_none() {
                    debug!("Book {} not in corpus, skipping", name.as_ref());
                }
                book
            })
            .flat_map(|book| book.chapters())
            .collect();

        let progress = chapter_progress(chapters.len() as u64, self.show_progress)?;
        let mut ids = IdSequence::new();
        let mut citations = Vec::new();
        let mut stats = RunStats {
            mode: RunMode::Cues,
            ..RunStats::default()
        };

        for chapter in chapters {
            if self.cancellation.is_cancelled() {
                warn!(
                    "Run cancelled after {} chapters, emitting partial results",
                    stats.chapters_scanned
                );
                stats.cancelled = true;
                break;
            }
            progress.set_message(format!("{} {}", chapter.book(), chapter.number()));

            let blocks = self.extractor.extract_chapter(chapter);
            let blocks = match &self.oracle {
                Some(oracle) if !blocks.is_empty() => {
                    self.refine_chapter(oracle.as_ref(), chapter, blocks, &mut stats)
                        .await
                }
                _ => blocks,
            };

            citations.extend(blocks.into_iter().map(|b| b.into_citation(ids.next_id())));
            stats.chapters_scanned += 1;
            progress.inc(1);
        }
        progress.finish_and_clear();

        stats.citations = ids.issued();
        stats.resolved = stats.citations;
        stats.processing_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Cue run finished: {} blocks in {} chapters ({} refined, {} oracle failures)",
            stats.citations, stats.chapters_scanned, stats.oracle_refined, stats.oracle_failed
        );

        Ok(RunOutput { citations, stats })
    }

    async fn refine_chapter(
        &self,
        oracle: &dyn RefinementOracle,
        chapter: &Chapter,
        blocks: Vec<SpeechBlock>,
        stats: &mut RunStats,
    ) -> Vec<SpeechBlock> {
        let width = self.oracle_config.concurrency.max(1);
        let outcomes: Vec<Refined> = stream::iter(blocks)
            .map(|block| self.refine_block(oracle, chapter, block))
            .buffered(width)
            .collect()
            .await;

        outcomes
            .into_iter()
            .map(|outcome| match outcome {
                Refined::Applied(block) => {
                    stats.oracle_refined += 1;
                    block
                }
                Refined::Kept(block) => {
                    stats.oracle_failed += 1;
                    block
                }
            })
            .collect()
    }

    async fn refine_block(
        &self,
        oracle: &dyn RefinementOracle,
        chapter: &Chapter,
        block: SpeechBlock,
    ) -> Refined {
        let Some(request) = RefinementRequest::for_block(
            chapter,
            block.range.start_verse(),
            self.oracle_config.window_before,
            self.oracle_config.window_after,
        ) else {
            return Refined::Kept(block);
        };

        let timeout_secs = self.oracle_config.timeout_secs;
        let response = match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            oracle.refine(&request),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => Err(OracleError::Timeout(timeout_secs)),
        };

        let refinement = match response.and_then(|r| validate(&request, r)) {
            Ok(refinement) => refinement,
            Err(e) => {
                warn!("Oracle refinement failed for {}: {}; keeping cue block", block.range, e);
                return Refined::Kept(block);
            }
        };

        let Some(range) = block
            .range
            .with_verses(refinement.start_verse, refinement.end_verse)
        else {
            return Refined::Kept(block);
        };
        // only the range and provenance are the oracle's to change
        debug!("Refined {} to {}", block.range, range);
        Refined::Applied(SpeechBlock {
            range,
            text: block.text,
            provenance: refinement.provenance(),
        })
    }
}

fn chapter_progress(total: u64, show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} chapters {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_tagged_run_stats() {
        let mut builder = Corpus::builder();
        builder.verse("John", "14", 27, "Peace I leave with you, my peace I give unto you");
        let corpus = builder.build();

        let document = format!(
            "Jesus said <FR>Peace I leave with you, my peace I give unto you<Fr>.{}<FR>qqqq zzzz<Fr>.",
            " filler".repeat(30)
        );
        let output = extract_tagged_citations(&document, &corpus, &RunConfig::default()).unwrap();
        assert_eq!(output.stats.mode, RunMode::Tagged);
        assert_eq!(output.stats.citations, 2);
        assert_eq!(output.stats.resolved, 1);
        assert_eq!(output.stats.unresolved, 1);
        assert_eq!(output.citations[0].reference(), "John 14:27");
        assert_eq!(output.citations[1].reference(), "Reference not found");

        let report = output.into_report();
        assert_eq!(report.total_citations, 2);
        assert_eq!(report.description, TAGGED_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_cue_run_without_oracle() {
        let mut builder = Corpus::builder();
        builder
            .verse("Genesis", "1", 1, "And God said, Let there be light")
            .verse("Genesis", "1", 2, "and there was light")
            .verse("Genesis", "2", 1, "And it came to pass")
            .verse("Exodus", "3", 4, "the LORD called unto him out of the bush");
        let corpus = builder.build();

        let pipeline = CuePipeline::new(&corpus, BlockExtractor::with_default_cues().unwrap());
        let output = pipeline.run(&["Genesis", "Leviticus"]).await.unwrap();
        assert_eq!(output.stats.mode, RunMode::Cues);
        assert_eq!(output.stats.chapters_scanned, 2);
        assert_eq!(output.stats.citations, 1);
        assert_eq!(output.citations.len(), 1);
        assert_eq!(output.citations[0].reference(), "Genesis 1:1-2");
        assert_eq!(output.citations[0].id, 1);
        assert_eq!(output.into_report().description, CUE_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_emits_nothing() {
        let mut builder = Corpus::builder();
        builder.verse("Genesis", "1", 1, "And God said, Let there be light");
        let corpus = builder.build();

        let flag = CancellationFlag::new();
        flag.cancel();
        let output = CuePipeline::new(&corpus, BlockExtractor::with_default_cues().unwrap())
            .with_cancellation(flag)
            .run(&["Genesis"])
            .await
            .unwrap();
        assert!(output.stats.cancelled);
        assert!(output.citations.is_empty());
        assert_eq!(output.stats.chapters_scanned, 0);
    }
}
