// WHY: one record shape for both detection modes; the location is a single Option so a
// citation is either fully resolved or fully unresolved

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Display string for an unresolved citation
pub const REFERENCE_NOT_FOUND: &str = "Reference not found";

/// Speech channel attached to cue-based citations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    #[default]
    Direct,
    Prophet,
    Angel,
    Narration,
}

/// A contiguous verse run inside one chapter; `start_verse <= end_verse` always holds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerseRange {
    book: String,
    chapter: String,
    start_verse: u32,
    end_verse: u32,
}

impl VerseRange {
    /// Range covering a single verse
    pub fn single(book: impl Into<String>, chapter: impl Into<String>, verse: u32) -> Self {
        Self {
            book: book.into(),
            chapter: chapter.into(),
            start_verse: verse,
            end_verse: verse,
        }
    }

    /// Range from `start_verse` to `end_verse`, or None when the bounds are inverted
    pub fn span(
        book: impl Into<String>,
        chapter: impl Into<String>,
        start_verse: u32,
        end_verse: u32,
    ) -> Option<Self> {
        if start_verse > end_verse {
            return None;
        }
        Some(Self {
            book: book.into(),
            chapter: chapter.into(),
            start_verse,
            end_verse,
        })
    }

    /// Same book and chapter with new bounds
    pub fn with_verses(&self, start_verse: u32, end_verse: u32) -> Option<Self> {
        Self::span(self.book.clone(), self.chapter.clone(), start_verse, end_verse)
    }

    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn chapter(&self) -> &str {
        &self.chapter
    }

    pub fn start_verse(&self) -> u32 {
        self.start_verse
    }

    pub fn end_verse(&self) -> u32 {
        self.end_verse
    }

    pub fn is_single_verse(&self) -> bool {
        self.start_verse == self.end_verse
    }

    /// Verse numbers covered by the range, in order
    pub fn verses(&self) -> impl Iterator<Item = u32> {
        self.start_verse..=self.end_verse
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_verse() {
            write!(f, "{} {}:{}", self.book, self.chapter, self.start_verse)
        } else {
            write!(
                f,
                "{} {}:{}-{}",
                self.book, self.chapter, self.start_verse, self.end_verse
            )
        }
    }
}

/// Errors from re-parsing a reference display string
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceParseError {
    #[error("reference has no chapter:verse part: {0:?}")]
    MissingLocation(String),
    #[error("reference has an empty book name: {0:?}")]
    MissingBook(String),
    #[error("invalid verse number in reference: {0:?}")]
    InvalidVerse(String),
    #[error("reference range is inverted: {0:?}")]
    InvertedRange(String),
}

/// Parse `"Book C:V"`, `"Book C:S-E"` or `"Reference not found"` back into a location.
///
/// Book names may contain spaces and leading digits (`"1 Samuel 3:4-10"`); the chapter:verse
/// part is always the last whitespace-separated token.
pub fn parse_reference(reference: &str) -> Result<Option<VerseRange>, ReferenceParseError> {
    let reference = reference.trim();
    if reference == REFERENCE_NOT_FOUND {
        return Ok(None);
    }

    let (book, location) = reference
        .rsplit_once(' ')
        .ok_or_else(|| ReferenceParseError::MissingLocation(reference.to_string()))?;
    let book = book.trim();
    if book.is_empty() {
        return Err(ReferenceParseError::MissingBook(reference.to_string()));
    }

    let (chapter, verses) = location
        .split_once(':')
        .ok_or_else(|| ReferenceParseError::MissingLocation(reference.to_string()))?;
    if chapter.is_empty() {
        return Err(ReferenceParseError::MissingLocation(reference.to_string()));
    }

    let parse_verse = |v: &str| {
        v.parse::<u32>()
            .map_err(|_| ReferenceParseError::InvalidVerse(reference.to_string()))
    };

    let (start, end) = match verses.split_once('-') {
        Some((start, end)) => (parse_verse(start)?, parse_verse(end)?),
        None => {
            let verse = parse_verse(verses)?;
            (verse, verse)
        }
    };

    VerseRange::span(book, chapter, start, end)
        .map(Some)
        .ok_or_else(|| ReferenceParseError::InvertedRange(reference.to_string()))
}

/// Provenance carried by cue-based citations only
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    pub via: Via,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

impl Default for Provenance {
    fn default() -> Self {
        Self {
            via: Via::Direct,
            confidence: 1.0,
            evidence: Vec::new(),
        }
    }
}

/// One detected quote, resolved or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CitationRecord", try_from = "CitationRecord")]
pub struct Citation {
    pub id: u64,
    pub location: Option<VerseRange>,
    pub text: String,
    pub context: Option<String>,
    pub word_count: usize,
    pub provenance: Option<Provenance>,
}

impl Citation {
    /// Derived display string, see [`VerseRange`]'s `Display`
    pub fn reference(&self) -> String {
        match &self.location {
            Some(range) => range.to_string(),
            None => REFERENCE_NOT_FOUND.to_string(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.location.is_some()
    }
}

/// Dense id sequence for one extraction run, starting at 1
#[derive(Debug)]
pub struct IdSequence {
    next: u64,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Number of ids handed out so far
    pub fn issued(&self) -> u64 {
        self.next - 1
    }
}

/// Errors raised when a serialized citation breaks the record invariants
#[derive(Debug, Error)]
pub enum CitationError {
    #[error("citation {id}: location fields must be all present or all absent")]
    PartialLocation { id: u64 },
    #[error("citation {id}: start verse {start} is after end verse {end}")]
    InvertedRange { id: u64, start: u32, end: u32 },
    #[error("citation {id}: reference {stored:?} does not match location {derived:?}")]
    ReferenceMismatch {
        id: u64,
        stored: String,
        derived: String,
    },
}

/// Flat wire shape of a citation
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CitationRecord {
    id: u64,
    reference: String,
    book: Option<String>,
    chapter: Option<String>,
    start_verse: Option<u32>,
    end_verse: Option<u32>,
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(default)]
    word_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    via: Option<Via>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    evidence: Option<Vec<String>>,
}

impl From<Citation> for CitationRecord {
    fn from(citation: Citation) -> Self {
        let reference = citation.reference();
        let (book, chapter, start_verse, end_verse) = match citation.location {
            Some(range) => (
                Some(range.book),
                Some(range.chapter),
                Some(range.start_verse),
                Some(range.end_verse),
            ),
            None => (None, None, None, None),
        };
        let (via, confidence, evidence) = match citation.provenance {
            Some(p) => (Some(p.via), Some(p.confidence), Some(p.evidence)),
            None => (None, None, None),
        };

        Self {
            id: citation.id,
            reference,
            book,
            chapter,
            start_verse,
            end_verse,
            text: citation.text,
            context: citation.context,
            word_count: citation.word_count,
            via,
            confidence,
            evidence,
        }
    }
}

impl TryFrom<CitationRecord> for Citation {
    type Error = CitationError;

    fn try_from(record: CitationRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let location = match (record.book, record.chapter, record.start_verse, record.end_verse) {
            (Some(book), Some(chapter), Some(start), Some(end)) => Some(
                VerseRange::span(book, chapter, start, end)
                    .ok_or(CitationError::InvertedRange { id, start, end })?,
            ),
            (None, None, None, None) => None,
            _ => return Err(CitationError::PartialLocation { id }),
        };

        let provenance = if record.via.is_some()
            || record.confidence.is_some()
            || record.evidence.is_some()
        {
            Some(Provenance {
                via: record.via.unwrap_or_default(),
                confidence: record.confidence.unwrap_or(1.0),
                evidence: record.evidence.unwrap_or_default(),
            })
        } else {
            None
        };

        let citation = Citation {
            id,
            location,
            text: record.text,
            context: record.context,
            word_count: record.word_count,
            provenance,
        };

        let derived = citation.reference();
        if derived != record.reference {
            return Err(CitationError::ReferenceMismatch {
                id,
                stored: record.reference,
                derived,
            });
        }

        Ok(citation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(location: Option<VerseRange>) -> Citation {
        Citation {
            id: 1,
            location,
            text: "Peace be with you".to_string(),
            context: None,
            word_count: 4,
            provenance: None,
        }
    }

    #[test]
    fn test_reference_display_formats() {
        let single = VerseRange::single("John", "14", 27);
        assert_eq!(single.to_string(), "John 14:27");

        let range = VerseRange::span("Genesis", "1", 3, 5).unwrap();
        assert_eq!(range.to_string(), "Genesis 1:3-5");

        assert_eq!(sample(None).reference(), REFERENCE_NOT_FOUND);
    }

    #[test]
    fn test_span_rejects_inverted_bounds() {
        assert!(VerseRange::span("Exodus", "20", 5, 4).is_none());
        assert!(VerseRange::span("Exodus", "20", 4, 4).is_some());
    }

    #[test]
    fn test_parse_reference_round_trip() {
        let ranges = [
            VerseRange::single("John", "14", 27),
            VerseRange::span("1 Samuel", "3", 4, 10).unwrap(),
            VerseRange::span("Song of Solomon", "2", 1, 2).unwrap(),
        ];
        for range in ranges {
            let parsed = parse_reference(&range.to_string()).unwrap();
            assert_eq!(parsed.as_ref(), Some(&range));
        }
        assert_eq!(parse_reference(REFERENCE_NOT_FOUND).unwrap(), None);
    }

    #[test]
    fn test_parse_reference_errors() {
        assert!(matches!(
            parse_reference("John"),
            Err(ReferenceParseError::MissingLocation(_))
        ));
        assert!(matches!(
            parse_reference(" 14:27"),
            Err(ReferenceParseError::MissingLocation(_)) | Err(ReferenceParseError::MissingBook(_))
        ));
        assert!(matches!(
            parse_reference("John 14:x"),
            Err(ReferenceParseError::InvalidVerse(_))
        ));
        assert!(matches!(
            parse_reference("John 14:9-3"),
            Err(ReferenceParseError::InvertedRange(_))
        ));
    }

    #[test]
    fn test_id_sequence_dense_from_one() {
        let mut ids = IdSequence::new();
        assert_eq!(ids.issued(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
        assert_eq!(ids.issued(), 3);
    }

    #[test]
    fn test_serialize_resolved_tagged_citation() {
        let citation = Citation {
            context: Some("And Jesus said".to_string()),
            ..sample(Some(VerseRange::single("John", "14", 27)))
        };
        let value = serde_json::to_value(&citation).unwrap();

        assert_eq!(value["reference"], "John 14:27");
        assert_eq!(value["book"], "John");
        assert_eq!(value["chapter"], "14");
        assert_eq!(value["start_verse"], 27);
        assert_eq!(value["end_verse"], 27);
        assert_eq!(value["context"], "And Jesus said");
        assert!(value.get("via").is_none(), "tagged citations carry no provenance");
    }

    #[test]
    fn test_serialize_unresolved_citation() {
        let value = serde_json::to_value(sample(None)).unwrap();
        assert_eq!(value["reference"], REFERENCE_NOT_FOUND);
        assert!(value["book"].is_null());
        assert!(value["chapter"].is_null());
        assert!(value["start_verse"].is_null());
        assert!(value["end_verse"].is_null());
    }

    #[test]
    fn test_deserialize_round_trip_with_provenance() {
        let citation = Citation {
            provenance: Some(Provenance {
                via: Via::Prophet,
                confidence: 0.8,
                evidence: vec!["Thus saith the LORD".to_string()],
            }),
            ..sample(Some(VerseRange::span("Haggai", "1", 2, 11).unwrap()))
        };
        let json = serde_json::to_string(&citation).unwrap();
        let back: Citation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, citation);
    }

    #[test]
    fn test_deserialize_rejects_partial_location() {
        let json = r#"{"id":3,"reference":"John 1:1","book":"John","chapter":null,
            "start_verse":1,"end_verse":1,"text":"x","word_count":1}"#;
        let err = serde_json::from_str::<Citation>(json).unwrap_err();
        assert!(err.to_string().contains("all present or all absent"));
    }

    #[test]
    fn test_deserialize_rejects_reference_mismatch() {
        let json = r#"{"id":4,"reference":"John 1:2","book":"John","chapter":"1",
            "start_verse":1,"end_verse":1,"text":"x","word_count":1}"#;
        assert!(serde_json::from_str::<Citation>(json).is_err());
    }
}
