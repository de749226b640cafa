//! Reference resolution: map free quote text back to a verse or contiguous verse run.
//!
//! Matching is a two-stage policy. A containment gate admits a candidate verse only when one
//! normalized string contains the other; admitted candidates are then scored by a
//! [`SimilarityScorer`]. Long quotes additionally probe for a start verse and walk forward
//! with [`accumulate::accumulate_end_verse`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::citation::VerseRange;
use crate::corpus::{Chapter, Corpus};
use crate::normalize::{normalize, normalize_into};

pub mod accumulate;
pub mod similarity;

pub use accumulate::{accumulate_end_verse, Accumulation};
pub use similarity::{LevenshteinRatio, SequenceRatio, SimilarityScorer};

/// Tuning for reference resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// A match is accepted only when its ratio is strictly above this
    pub similarity_threshold: f64,
    /// Quotes longer than this (in chars) also probe for a multi-verse start
    pub probe_len: usize,
    /// Fixed ratio assigned to a multi-verse accumulation match
    pub accumulation_ratio: f64,
    /// Maximum verses walked past the start verse during accumulation
    pub max_accumulation: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            probe_len: 50,
            accumulation_ratio: 0.9,
            max_accumulation: 50,
        }
    }
}

/// Two-stage comparison of a normalized quote against one normalized verse
pub trait MatchPolicy: Send + Sync {
    /// Similarity score, or None when the candidate fails the gate
    fn score(&self, quote: &str, candidate: &str) -> Option<f64>;
}

/// Containment gate followed by a similarity score
#[derive(Debug, Clone, Default)]
pub struct ContainmentPolicy<S = SequenceRatio> {
    scorer: S,
}

impl<S: SimilarityScorer> ContainmentPolicy<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }
}

impl<S: SimilarityScorer> MatchPolicy for ContainmentPolicy<S> {
    fn score(&self, quote: &str, candidate: &str) -> Option<f64> {
        if quote.contains(candidate) || candidate.contains(quote) {
            Some(self.scorer.ratio(quote, candidate))
        } else {
            None
        }
    }
}

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    SingleVerse,
    MultiVerse(Accumulation),
}

/// Accepted match for a quote
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub range: VerseRange,
    pub ratio: f64,
    pub kind: MatchKind,
}

struct IndexedChapter<'c> {
    chapter: &'c Chapter,
    normalized: BTreeMap<u32, String>,
}

/// Resolver scoped to a caller-supplied list of candidate books.
///
/// Candidate verses are normalized once at construction; the scan order is the book list
/// order, then chapter and verse order.
pub struct ReferenceResolver<'c> {
    chapters: Vec<IndexedChapter<'c>>,
    policy: Box<dyn MatchPolicy + 'c>,
    config: ResolverConfig,
}

impl<'c> ReferenceResolver<'c> {
    /// Resolver with the default containment + sequence-ratio policy
    pub fn new<S: AsRef<str>>(corpus: &'c Corpus, books: &[S], config: ResolverConfig) -> Self {
        Self::with_policy(corpus, books, config, ContainmentPolicy::<SequenceRatio>::default())
    }

    pub fn with_policy<S: AsRef<str>, P: MatchPolicy + 'c>(
        corpus: &'c Corpus,
        books: &[S],
        config: ResolverConfig,
        policy: P,
    ) -> Self {
        let mut chapters = Vec::new();
        let mut buffer = String::new();

        for name in books {
            let Some(book) = corpus.book(name.as_ref()) else {
                debug!("Candidate book {} not present in corpus", name.as_ref());
                continue;
            };
            for chapter in book.chapters() {
                let normalized = chapter
                    .verses()
                    .map(|verse| {
                        normalize_into(&verse.text, &mut buffer);
                        (verse.number, buffer.clone())
                    })
                    .collect();
                chapters.push(IndexedChapter { chapter, normalized });
            }
        }

        debug!("Resolver indexed {} candidate chapters", chapters.len());

        Self {
            chapters,
            policy: Box::new(policy),
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Find the best verse or verse run for `quote`.
    ///
    /// `context` is advisory and only logged. Returns None when no candidate beats the
    /// similarity threshold.
    pub fn resolve(&self, quote: &str, context: Option<&str>) -> Option<Resolution> {
        let normalized_quote = normalize(quote);
        if normalized_quote.is_empty() {
            return None;
        }

        let probe = start_probe(&normalized_quote, self.config.probe_len);
        let mut best: Option<Resolution> = None;
        let mut best_ratio = 0.0;

        for indexed in &self.chapters {
            let chapter = indexed.chapter;
            for (&number, normalized_verse) in &indexed.normalized {
                if let Some(ratio) = self.policy.score(&normalized_quote, normalized_verse) {
                    if ratio > best_ratio {
                        best_ratio = ratio;
                        best = Some(Resolution {
                            range: VerseRange::single(chapter.book(), chapter.number(), number),
                            ratio,
                            kind: MatchKind::SingleVerse,
                        });
                    }
                }

                let Some(probe) = probe else { continue };
                if !normalized_verse.contains(probe) {
                    continue;
                }
                let accumulation = accumulate_end_verse(
                    &normalized_quote,
                    &indexed.normalized,
                    number,
                    self.config.max_accumulation,
                );
                if !accumulation.is_found() {
                    debug!(
                        "No verse run from {} {}:{} covers the quote, falling back to the start verse",
                        chapter.book(),
                        chapter.number(),
                        number
                    );
                }
                let ratio = self.config.accumulation_ratio;
                if ratio > best_ratio {
                    if let Some(range) = VerseRange::span(
                        chapter.book(),
                        chapter.number(),
                        number,
                        accumulation.end_verse(),
                    ) {
                        best_ratio = ratio;
                        best = Some(Resolution {
                            range,
                            ratio,
                            kind: MatchKind::MultiVerse(accumulation),
                        });
                    }
                }
            }
        }

        match best {
            Some(resolution) if resolution.ratio > self.config.similarity_threshold => {
                debug!(
                    reference = %resolution.range,
                    ratio = resolution.ratio,
                    context = context.unwrap_or(""),
                    "Resolved quote"
                );
                Some(resolution)
            }
            _ => {
                debug!(
                    best_ratio,
                    context = context.unwrap_or(""),
                    "No reference above threshold"
                );
                None
            }
        }
    }
}

/// First `probe_len` chars of the quote, only when the quote is longer than that
fn start_probe(normalized_quote: &str, probe_len: usize) -> Option<&str> {
    normalized_quote
        .char_indices()
        .nth(probe_len)
        .map(|(end, _)| &normalized_quote[..end])
}
