// WHY: long quotes span several verses; walk forward from a start verse until the
// concatenated text contains the whole quote, with a hard bound on the walk

use std::collections::BTreeMap;

/// Outcome of a multi-verse accumulation walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// The concatenation from the start verse through this verse contains the quote
    Found(u32),
    /// Bound exhausted or verse numbers ran out; degrades to the start verse
    Fallback(u32),
}

impl Accumulation {
    pub fn end_verse(&self) -> u32 {
        match *self {
            Accumulation::Found(end) | Accumulation::Fallback(end) => end,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Accumulation::Found(_))
    }
}

/// Find the verse at which `normalized_quote` is contained in the normalized text of
/// `start..=verse`.
///
/// `normalized_verses` holds one chapter's already-normalized verse text. The walk visits
/// consecutive verse numbers only, stops at the first missing number, and never goes past
/// `start + max_verses`.
pub fn accumulate_end_verse(
    normalized_quote: &str,
    normalized_verses: &BTreeMap<u32, String>,
    start: u32,
    max_verses: u32,
) -> Accumulation {
    let mut accumulated = String::new();
    let limit = start.saturating_add(max_verses);

    for number in start..=limit {
        let Some(verse_text) = normalized_verses.get(&number) else {
            break;
        };
        accumulated.push(' ');
        accumulated.push_str(verse_text);

        if accumulated.contains(normalized_quote) {
            return Accumulation::Found(number);
        }
    }

    Accumulation::Fallback(start)
}
