pub mod blocks;
pub mod citation;
pub mod config;
pub mod corpus;
pub mod normalize;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod resolver;
pub mod tagged;

// Re-export the record and corpus types for convenient access
pub use citation::{parse_reference, Citation, Provenance, VerseRange, Via, REFERENCE_NOT_FOUND};
pub use corpus::{Chapter, Corpus, Verse};

// Re-export the extraction engines
pub use blocks::{BlockExtractor, CueSet, SpeechBlock};
pub use resolver::{ReferenceResolver, ResolverConfig};
pub use tagged::{GroupingConfig, TagGroupingExtractor};

// Re-export run orchestration and output
pub use config::RunConfig;
pub use oracle::{OllamaOracle, OracleConfig, OracleError, RefinementOracle};
pub use output::{CitationReport, ReferenceList, RunMode, RunStats};
pub use pipeline::{extract_tagged_citations, CancellationFlag, CuePipeline, RunOutput};
