// WHY: red-letter style markup wraps single words, not whole sentences; nearby marked
// tokens are merged into one quote before resolution

use anyhow::Result;
use regex_automata::meta::Regex;
use regex_automata::util::syntax;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::citation::{Citation, IdSequence};
use crate::normalize::{clean_markup, collapse_whitespace};
use crate::resolver::ReferenceResolver;

/// Configuration for delimiter grouping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Opening delimiter, matched case-insensitively
    pub start_tag: String,
    /// Closing delimiter, matched case-insensitively
    pub end_tag: String,
    /// Maximum character gap between two tokens of the same quote
    pub gap_threshold: usize,
    /// Characters before a quote scanned for its context
    pub context_window: usize,
    /// Longest context snippet kept (tail)
    pub context_max: usize,
    /// Quotes whose cleaned text is this long or shorter are noise
    pub min_quote_len: usize,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            start_tag: "<FR>".to_string(),
            end_tag: "<Fr>".to_string(),
            gap_threshold: 100,
            context_window: 200,
            context_max: 100,
            min_quote_len: 2,
        }
    }
}

/// One delimiter-wrapped span; offsets are byte offsets of the whole match including tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkedToken<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Consecutive tokens close enough to form one quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGroup<'a> {
    tokens: Vec<MarkedToken<'a>>,
}

impl<'a> TokenGroup<'a> {
    fn new(first: MarkedToken<'a>) -> Self {
        Self {
            tokens: vec![first],
        }
    }

    pub fn tokens(&self) -> &[MarkedToken<'a>] {
        &self.tokens
    }

    /// Byte offset where the first token's match begins
    pub fn start(&self) -> usize {
        self.tokens.first().map_or(0, |t| t.start)
    }

    pub fn end(&self) -> usize {
        self.tokens.last().map_or(0, |t| t.end)
    }

    /// Tokens joined with spaces, residual markup stripped, whitespace collapsed
    pub fn clean_text(&self) -> String {
        let joined = self
            .tokens
            .iter()
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join(" ");
        clean_markup(&joined)
    }
}

/// A cleaned quote ready for resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledQuote {
    pub text: String,
    pub context: Option<String>,
    pub word_count: usize,
    pub offset: usize,
}

pub struct TagGroupingExtractor {
    config: GroupingConfig,
    pattern: Regex,
}

impl TagGroupingExtractor {
    pub fn new(config: GroupingConfig) -> Result<Self> {
        let pattern = format!(
            "{}(.*?){}",
            regex_syntax::escape(&config.start_tag),
            regex_syntax::escape(&config.end_tag)
        );
        let pattern = Regex::builder()
            .syntax(
                syntax::Config::new()
                    .case_insensitive(true)
                    .dot_matches_new_line(true),
            )
            .build(&pattern)?;

        Ok(Self { config, pattern })
    }

    pub fn with_default_config() -> Result<Self> {
        Self::new(GroupingConfig::default())
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    /// All non-overlapping delimiter-wrapped spans in document order
    pub fn find_tokens<'a>(&self, document: &'a str) -> Vec<MarkedToken<'a>> {
        self.pattern
            .captures_iter(document)
            .filter_map(|caps| {
                let whole = caps.get_match()?;
                let inner = caps.get_group(1)?;
                Some(MarkedToken {
                    text: &document[inner.range()],
                    start: whole.start(),
                    end: whole.end(),
                })
            })
            .collect()
    }

    /// Merge tokens whose character gap to the previous token is within the threshold.
    ///
    /// Needs the document only to measure gaps in characters rather than bytes.
    pub fn group_tokens<'a>(&self, document: &str, tokens: &[MarkedToken<'a>]) -> Vec<TokenGroup<'a>> {
        let mut groups = Vec::new();
        let mut current: Option<TokenGroup<'a>> = None;

        for &token in tokens {
            current = Some(match current.take() {
                None => TokenGroup::new(token),
                Some(mut group) => {
                    let gap = document[group.end()..token.start].chars().count();
                    if gap <= self.config.gap_threshold {
                        group.tokens.push(token);
                        group
                    } else {
                        groups.push(group);
                        TokenGroup::new(token)
                    }
                }
            });
        }

        // Trailing group at end of document
        if let Some(group) = current {
            groups.push(group);
        }

        groups
    }

    /// Clean each group, drop noise, and attach its preceding-context snippet
    pub fn assemble(&self, document: &str, groups: &[TokenGroup<'_>]) -> Vec<AssembledQuote> {
        groups
            .iter()
            .filter_map(|group| {
                let text = group.clean_text();
                if text.chars().count() <= self.config.min_quote_len {
                    debug!("Discarding noise group at {}: {:?}", group.start(), text);
                    return None;
                }
                Some(AssembledQuote {
                    text,
                    context: self.context_before(document, group.start()),
                    word_count: group.tokens.len(),
                    offset: group.start(),
                })
            })
            .collect()
    }

    /// Tail of the last sentence preceding `offset`, markup stripped
    pub fn context_before(&self, document: &str, offset: usize) -> Option<String> {
        let window_start = document[..offset]
            .char_indices()
            .rev()
            .nth(self.config.context_window.saturating_sub(1))
            .map_or(0, |(i, _)| i);
        let window = clean_markup(&document[window_start..offset]);

        let snippet = window.rsplit('.').next().unwrap_or("").trim();
        let snippet = tail_chars(snippet, self.config.context_max);
        let snippet = collapse_whitespace(snippet);

        (!snippet.is_empty()).then_some(snippet)
    }

    /// Full tag-grouping run: tokens, groups, cleanup, then resolution in document order
    pub fn extract(&self, document: &str, resolver: &ReferenceResolver<'_>) -> Vec<Citation> {
        let tokens = self.find_tokens(document);
        if tokens.is_empty() {
            info!("No delimiter-wrapped tokens found");
            return Vec::new();
        }
        info!("Found {} individual tagged tokens", tokens.len());

        let groups = self.group_tokens(document, &tokens);
        let quotes = self.assemble(document, &groups);
        debug!("{} groups, {} quotes after noise filter", groups.len(), quotes.len());

        let mut ids = IdSequence::new();
        let citations: Vec<Citation> = quotes
            .into_iter()
            .map(|quote| {
                let resolution = resolver.resolve(&quote.text, quote.context.as_deref());
                Citation {
                    id: ids.next_id(),
                    location: resolution.map(|r| r.range),
                    text: quote.text,
                    context: quote.context,
                    word_count: quote.word_count,
                    provenance: None,
                }
            })
            .collect();

        let resolved = citations.iter().filter(|c| c.is_resolved()).count();
        info!(
            "Matched {}/{} quotes to references",
            resolved,
            citations.len()
        );
        citations
    }
}

fn tail_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().rev().nth(max_chars.saturating_sub(1)) {
        Some((i, _)) if max_chars > 0 => &text[i..],
        Some(_) => "",
        None => text,
    }
}
