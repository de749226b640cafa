use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

use redletter::output::CitationReport;

/// Print the distinct verse ranges cited per chapter of a citation file
#[derive(Parser, Debug)]
#[command(name = "check_references")]
#[command(version)]
struct Args {
    /// Citation file written by `redletter tagged` or `redletter cues`
    citations: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let report = CitationReport::load(&args.citations).await?;

    let mut by_chapter: BTreeMap<String, Vec<(u32, u32)>> = BTreeMap::new();
    let mut unresolved = 0usize;
    for citation in &report.citations {
        match &citation.location {
            Some(range) => by_chapter
                .entry(format!("{} {}", range.book(), range.chapter()))
                .or_default()
                .push((range.start_verse(), range.end_verse())),
            None => unresolved += 1,
        }
    }

    for (chapter, mut ranges) in by_chapter {
        ranges.sort_unstable();
        ranges.dedup();
        let listed: Vec<String> = ranges
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{start}-{end}")
                }
            })
            .collect();
        println!("{chapter}: {}", listed.join(", "));
    }

    println!();
    println!(
        "{} citations, {} without a reference",
        report.citations.len(),
        unresolved
    );
    Ok(())
}
