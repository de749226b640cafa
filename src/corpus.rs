// WHY: read-only structured view of the source text shared by every extractor
// Chapters and verses are kept in ascending numeric order; that order is the canonical scan order

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// One numbered verse; never mutated after load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub book: String,
    pub chapter: String,
    pub verse: String,
    pub number: u32,
    pub text: String,
}

/// A chapter's verses keyed by verse number
#[derive(Debug, Clone)]
pub struct Chapter {
    book: String,
    number: String,
    verses: BTreeMap<u32, Verse>,
}

impl Chapter {
    pub fn book(&self) -> &str {
        &self.book
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn verse(&self, number: u32) -> Option<&Verse> {
        self.verses.get(&number)
    }

    /// Verses in ascending numeric order
    pub fn verses(&self) -> impl Iterator<Item = &Verse> {
        self.verses.values()
    }

    /// Verse numbers in ascending order
    pub fn verse_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.verses.keys().copied()
    }

    pub fn last_verse(&self) -> Option<u32> {
        self.verses.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Book {
    name: String,
    chapters: Vec<Chapter>,
}

impl Book {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chapters in ascending numeric order
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, number: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }
}

/// In-memory corpus: book -> chapter -> verse -> text
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    books: Vec<Book>,
    index: HashMap<String, usize>,
}

impl Corpus {
    /// Parse the nested JSON mapping `book -> chapter -> verse -> text`.
    ///
    /// Entries that are not mappings (metadata keys), non-numeric chapter or verse keys, and
    /// non-string verse values are skipped without failing the load.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json).context("Corpus is not valid JSON")?;
        let books = root
            .as_object()
            .context("Corpus root must be a mapping of book names")?;

        let mut builder = CorpusBuilder::new();
        for (book_name, book_value) in books {
            let Some(chapters) = book_value.as_object() else {
                debug!("Skipping non-book corpus entry: {}", book_name);
                continue;
            };
            builder.ensure_book(book_name);
            add_chapters(&mut builder, book_name, chapters);
        }

        let corpus = builder.build();
        debug!(
            "Parsed corpus: {} books, {} verses",
            corpus.books.len(),
            corpus.verse_count()
        );
        Ok(corpus)
    }

    /// Load a corpus JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let start_time = std::time::Instant::now();

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read corpus {}", path.display()))?;
        let corpus = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse corpus {}", path.display()))?;

        info!(
            "Loaded {} books ({} verses) from {} in {}ms",
            corpus.books.len(),
            corpus.verse_count(),
            path.display(),
            start_time.elapsed().as_millis()
        );
        Ok(corpus)
    }

    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::new()
    }

    /// Books in corpus order
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn book(&self, name: &str) -> Option<&Book> {
        self.index.get(name).map(|&i| &self.books[i])
    }

    pub fn verse_count(&self) -> usize {
        self.books
            .iter()
            .flat_map(|b| b.chapters.iter())
            .map(|c| c.verses.len())
            .sum()
    }
}

fn add_chapters(builder: &mut CorpusBuilder, book_name: &str, chapters: &Map<String, Value>) {
    for (chapter_key, chapter_value) in chapters {
        let Some(verses) = chapter_value.as_object() else {
            debug!("Skipping non-chapter entry {} in {}", chapter_key, book_name);
            continue;
        };
        if chapter_key.trim().parse::<u32>().is_err() {
            debug!("Skipping non-numeric chapter {} in {}", chapter_key, book_name);
            continue;
        }

        for (verse_key, verse_value) in verses {
            let (Ok(number), Some(text)) = (verse_key.trim().parse::<u32>(), verse_value.as_str())
            else {
                debug!(
                    "Skipping malformed verse {} in {} {}",
                    verse_key, book_name, chapter_key
                );
                continue;
            };
            builder.verse(book_name, chapter_key.trim(), number, text);
        }
    }
}

/// Incremental corpus construction; used by the JSON loader and by tests
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    books: Vec<(String, BTreeMap<u32, BTreeMap<u32, Verse>>)>,
    chapter_names: HashMap<(String, u32), String>,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_book(&mut self, book: &str) -> usize {
        match self.books.iter().position(|(name, _)| name == book) {
            Some(i) => i,
            None => {
                self.books.push((book.to_string(), BTreeMap::new()));
                self.books.len() - 1
            }
        }
    }

    /// Add one verse; chapters must be numerals, a later verse with the same number replaces
    /// the earlier one
    pub fn verse(&mut self, book: &str, chapter: &str, number: u32, text: &str) -> &mut Self {
        let Ok(chapter_number) = chapter.parse::<u32>() else {
            debug!("Ignoring verse with non-numeric chapter {} in {}", chapter, book);
            return self;
        };

        let book_index = self.ensure_book(book);
        self.chapter_names
            .entry((book.to_string(), chapter_number))
            .or_insert_with(|| chapter.to_string());

        self.books[book_index]
            .1
            .entry(chapter_number)
            .or_default()
            .insert(
                number,
                Verse {
                    book: book.to_string(),
                    chapter: chapter.to_string(),
                    verse: number.to_string(),
                    number,
                    text: text.to_string(),
                },
            );
        self
    }

    pub fn build(&mut self) -> Corpus {
        let mut corpus = Corpus::default();

        for (name, chapters) in std::mem::take(&mut self.books) {
            let chapters = chapters
                .into_iter()
                .map(|(chapter_number, verses)| Chapter {
                    book: name.clone(),
                    number: self
                        .chapter_names
                        .get(&(name.clone(), chapter_number))
                        .cloned()
                        .unwrap_or_else(|| chapter_number.to_string()),
                    verses,
                })
                .collect();

            corpus.index.insert(name.clone(), corpus.books.len());
            corpus.books.push(Book { name, chapters });
        }
        self.chapter_names.clear();

        corpus
    }
}
