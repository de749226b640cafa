//! Refinement oracle contract.
//!
//! An oracle receives one cue-based block (book, chapter, candidate start verse and a window
//! of surrounding verses) and may return adjusted boundaries plus provenance. Oracle output
//! is corrective only: every failure leaves the regex-derived block untouched.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::citation::{Provenance, Via};
use crate::corpus::Chapter;

pub mod ollama;

pub use ollama::OllamaOracle;

/// Oracle tuning and endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    /// Verses included before the candidate start
    pub window_before: usize,
    /// Verses included after the candidate start
    pub window_after: usize,
    pub timeout_secs: u64,
    /// Concurrent oracle calls per chapter
    pub concurrency: usize,
    pub url: String,
    pub model: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_before: 2,
            window_after: 26,
            timeout_secs: 120,
            concurrency: (num_cpus::get() / 2).max(1),
            url: "http://localhost:11434/api/chat".to_string(),
            model: "llama3.1:8b".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowVerse {
    pub number: u32,
    pub text: String,
}

/// Request for one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefinementRequest {
    pub book: String,
    pub chapter: String,
    pub candidate_start: u32,
    pub window: Vec<WindowVerse>,
}

impl RefinementRequest {
    /// Build the request for a block starting at `candidate_start`, with `before` verses
    /// before and `after` verses after it, clipped to the chapter. None when the start verse
    /// is not in the chapter.
    pub fn for_block(
        chapter: &Chapter,
        candidate_start: u32,
        before: usize,
        after: usize,
    ) -> Option<Self> {
        let numbers: Vec<u32> = chapter.verse_numbers().collect();
        let position = numbers.iter().position(|&n| n == candidate_start)?;
        let first = position.saturating_sub(before);
        let last = position.saturating_add(after).min(numbers.len() - 1);

        let window = numbers[first..=last]
            .iter()
            .filter_map(|&n| chapter.verse(n))
            .map(|v| WindowVerse {
                number: v.number,
                text: v.text.clone(),
            })
            .collect();

        Some(Self {
            book: chapter.book().to_string(),
            chapter: chapter.number().to_string(),
            candidate_start,
            window,
        })
    }

    /// Window rendered one verse per line as `"{number} {text}"`
    pub fn ordered_verses(&self) -> String {
        self.window
            .iter()
            .map(|v| format!("{} {}", v.number, v.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn contains_verse(&self, number: u32) -> bool {
        self.window.iter().any(|v| v.number == number)
    }

    fn window_contains_phrase(&self, phrase: &str) -> bool {
        self.window.iter().any(|v| v.text.contains(phrase))
    }
}

fn default_confidence() -> f64 {
    1.0
}

/// Oracle response; missing `via`, `confidence` and `evidence_phrases` take the defaults
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Refinement {
    pub start_verse: u32,
    pub end_verse: u32,
    #[serde(default)]
    pub via: Via,
    #[serde(default)]
    pub evidence_phrases: Vec<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl Refinement {
    pub fn provenance(&self) -> Provenance {
        Provenance {
            via: self.via,
            confidence: self.confidence,
            evidence: self.evidence_phrases.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle transport error: {0}")]
    Transport(String),
    #[error("oracle timed out after {0}s")]
    Timeout(u64),
    #[error("oracle returned HTTP {0}")]
    Status(u16),
    #[error("oracle protocol error: {0}")]
    Protocol(String),
}

/// Capability interface for block refinement
#[async_trait]
pub trait RefinementOracle: Send + Sync {
    async fn refine(&self, request: &RefinementRequest) -> Result<Refinement, OracleError>;
}

/// Check a response against its request.
///
/// Inverted ranges, verses outside the window and confidence outside `[0, 1]` are protocol
/// errors. Evidence phrases absent from the window are dropped.
pub fn validate(
    request: &RefinementRequest,
    mut refinement: Refinement,
) -> Result<Refinement, OracleError> {
    if refinement.start_verse > refinement.end_verse {
        return Err(OracleError::Protocol(format!(
            "inverted range {}-{}",
            refinement.start_verse, refinement.end_verse
        )));
    }
    if !request.contains_verse(refinement.start_verse)
        || !request.contains_verse(refinement.end_verse)
    {
        return Err(OracleError::Protocol(format!(
            "range {}-{} outside supplied window",
            refinement.start_verse, refinement.end_verse
        )));
    }
    if !(0.0..=1.0).contains(&refinement.confidence) {
        return Err(OracleError::Protocol(format!(
            "confidence {} outside [0, 1]",
            refinement.confidence
        )));
    }

    let before = refinement.evidence_phrases.len();
    refinement
        .evidence_phrases
        .retain(|phrase| request.window_contains_phrase(phrase));
    if refinement.evidence_phrases.len() < before {
        warn!(
            "Dropped {} evidence phrases not present in {} {} window",
            before - refinement.evidence_phrases.len(),
            request.book,
            request.chapter
        );
    }

    Ok(refinement)
}
