// WHY: cue sets are immutable configuration handed to the block extractor, so tests can
// swap in small synthetic sets

use anyhow::{Context, Result};
use regex_automata::meta::Regex;
use regex_automata::util::syntax;

/// Formulas that open reported divine speech, in priority order
pub const DEFAULT_OPENER_PATTERNS: &[&str] = &[
    // Specific large blocks
    r"\bGod (?:spake|spoke) all these words[,;:]\s*saying\b",
    r"\bThese words the LORD spake unto\b",
    // Generic God/YHWH speaking
    r"\bGod (?:spake|spoke|said)\b",
    r"\b(?:And|Then)?\s*the LORD (?:spake|said)\b",
    // "the LORD ... unto <person>," with or without "saying"
    r"\bthe LORD (?:spake|said) unto [^,;:]+[,;:]\s*saying\b",
    r"\bthe LORD (?:spake|said) unto [^,;:]+[,;:]",
    // Prophetic word formulas
    r"\bThen came the word of the LORD (?:by|unto) [^,;:]+[,;:]\s*saying\b",
    r"\bThe word of the LORD (?:came|came again) (?:by|unto) [^,;:]+[,;:]\s*saying\b",
    r"\bThus speaketh the LORD(?: of hosts)?[,;:]\s*saying\b",
    r"\bThus saith the LORD(?: of hosts)?\b",
    // Messenger formula
    r"\bThen spake Haggai the LORD's messenger in the LORD's message [^,;:]*[,;:]\s*saying\b",
    r"\bThe word of the LORD came (?:unto|to|by) [^,;:]+[,;:]\s*saying\b",
    // Command and hearing formulas
    r"\bthe LORD commanded\b",
    r"\bHear (?:ye )?the word of the LORD\b",
];

/// Verse openings that signal narration resuming
pub const DEFAULT_TERMINATOR_PATTERNS: &[&str] = &[
    r"^(?:And|Then|So|Now)\s+(?:Moses|Aaron|Joshua|Samuel|David|Solomon|Jeremiah|Isaiah|Ezekiel|the king|the prophet|the people|all the people|the children of Israel|he|they)\b",
    r"^And it came to pass\b",
];

/// Which cue in a set matched, and the matched phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CueMatch<'t> {
    pub index: usize,
    pub phrase: &'t str,
}

#[derive(Debug)]
struct Cue {
    source: String,
    regex: Regex,
}

/// Ordered, case-insensitive cue patterns; the first match in declaration order wins
#[derive(Debug)]
pub struct CueSet {
    cues: Vec<Cue>,
}

impl CueSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cues = patterns
            .into_iter()
            .map(|pattern| {
                let source = pattern.as_ref().to_string();
                let regex = Regex::builder()
                    .syntax(syntax::Config::new().case_insensitive(true))
                    .build(&source)
                    .with_context(|| format!("Invalid cue pattern: {source}"))?;
                Ok(Cue { source, regex })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { cues })
    }

    pub fn default_openers() -> Result<Self> {
        Self::new(DEFAULT_OPENER_PATTERNS)
    }

    pub fn default_terminators() -> Result<Self> {
        Self::new(DEFAULT_TERMINATOR_PATTERNS)
    }

    /// First matching cue against the trimmed text
    pub fn first_match<'t>(&self, text: &'t str) -> Option<CueMatch<'t>> {
        let text = text.trim();
        self.cues.iter().enumerate().find_map(|(index, cue)| {
            cue.regex.find(text).map(|m| CueMatch {
                index,
                phrase: &text[m.range()],
            })
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        let text = text.trim();
        self.cues.iter().any(|cue| cue.regex.is_match(text))
    }

    /// Source pattern of the cue at `index`
    pub fn pattern(&self, index: usize) -> Option<&str> {
        self.cues.get(index).map(|c| c.source.as_str())
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }
}
