// WHY: both extraction modes and the reference condenser share one output layer so the
// JSON shapes stay identical regardless of which mode produced the citations

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::citation::Citation;

/// Full citation output with its header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationReport {
    pub total_citations: usize,
    pub description: String,
    pub note: String,
    pub citations: Vec<Citation>,
}

impl CitationReport {
    pub fn new(
        description: impl Into<String>,
        note: impl Into<String>,
        citations: Vec<Citation>,
    ) -> Self {
        Self {
            total_citations: citations.len(),
            description: description.into(),
            note: note.into(),
            citations,
        }
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        write_pretty_json(path, self).await?;
        info!(
            "Wrote {} citations to {}",
            self.total_citations,
            path.display()
        );
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read citations {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse citations {}", path.display()))
    }

    pub fn resolved_count(&self) -> usize {
        self.citations.iter().filter(|c| c.is_resolved()).count()
    }
}

/// Condensed `book -> chapter -> ["3", "5-9"]` view of a citation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceList {
    pub description: String,
    pub note: String,
    pub total_books: usize,
    pub references: Map<String, Value>,
}

impl ReferenceList {
    /// Books keep first-appearance order; chapters sort numerically. Unresolved citations
    /// are ignored.
    pub fn from_citations(
        citations: &[Citation],
        description: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        let mut book_order: Vec<&str> = Vec::new();
        let mut verses: HashMap<&str, HashMap<&str, BTreeSet<u32>>> = HashMap::new();

        for range in citations.iter().filter_map(|c| c.location.as_ref()) {
            let chapters = verses.entry(range.book()).or_insert_with(|| {
                book_order.push(range.book());
                HashMap::new()
            });
            chapters
                .entry(range.chapter())
                .or_default()
                .extend(range.verses());
        }

        let mut references = Map::new();
        for book in book_order {
            let Some(chapters) = verses.get(book) else {
                continue;
            };
            let mut chapter_keys: Vec<&str> = chapters.keys().copied().collect();
            chapter_keys.sort_by_key(|c| (c.parse::<u32>().unwrap_or(u32::MAX), c.to_string()));

            let mut chapter_map = Map::new();
            for chapter in chapter_keys {
                let numbers: Vec<u32> = chapters[chapter].iter().copied().collect();
                let condensed = condense_verses(&numbers)
                    .into_iter()
                    .map(Value::String)
                    .collect();
                chapter_map.insert(chapter.to_string(), Value::Array(condensed));
            }
            references.insert(book.to_string(), Value::Object(chapter_map));
        }

        Self {
            description: description.into(),
            note: note.into(),
            total_books: references.len(),
            references,
        }
    }

    /// Number of distinct verses listed
    pub fn verse_count(&self) -> usize {
        self.references
            .values()
            .filter_map(Value::as_object)
            .flat_map(|chapters| chapters.values())
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str)
            .map(|entry| match entry.split_once('-') {
                Some((start, end)) => match (start.parse::<usize>(), end.parse::<usize>()) {
                    (Ok(s), Ok(e)) if e >= s => e - s + 1,
                    _ => 0,
                },
                None => usize::from(entry.parse::<u32>().is_ok()),
            })
            .sum()
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        write_pretty_json(path, self).await?;
        info!(
            "Wrote reference list for {} books to {}",
            self.total_books,
            path.display()
        );
        Ok(())
    }
}

/// Merge sorted, de-duplicated verse numbers into `"n"` and `"start-end"` runs
pub fn condense_verses(verses: &[u32]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current: Option<(u32, u32)> = None;

    for &verse in verses {
        current = match current {
            Some((start, end)) if verse == end + 1 => Some((start, verse)),
            Some((_, end)) if verse == end => current,
            Some(run) => {
                runs.push(format_run(run));
                Some((verse, verse))
            }
            None => Some((verse, verse)),
        };
    }
    if let Some(run) = current {
        runs.push(format_run(run));
    }
    runs
}

fn format_run((start, end): (u32, u32)) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}

/// Which extraction produced a run
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Tagged,
    Cues,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Tagged => write!(f, "tagged"),
            RunMode::Cues => write!(f, "cues"),
        }
    }
}

/// Summary of one run, written next to the output
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub mode: RunMode,
    pub citations: u64,
    pub resolved: u64,
    pub unresolved: u64,
    pub chapters_scanned: u64,
    pub oracle_refined: u64,
    pub oracle_failed: u64,
    pub cancelled: bool,
    pub processing_time_ms: u64,
}

impl RunStats {
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        write_pretty_json(path, self).await
    }
}

async fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("Failed to serialize output")?;
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&json).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
