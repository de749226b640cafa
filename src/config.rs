use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::oracle::OracleConfig;
use crate::resolver::ResolverConfig;
use crate::tagged::GroupingConfig;

/// Default candidate books for tagged extraction
pub const GOSPEL_BOOKS: &[&str] = &["Matthew", "Mark", "Luke", "John", "Acts", "Revelation"];

/// Default candidate books for cue extraction
pub const OLD_TESTAMENT_BOOKS: &[&str] = &[
    "Genesis", "Exodus", "Leviticus", "Numbers", "Deuteronomy",
    "Joshua", "Judges", "Ruth", "1 Samuel", "2 Samuel",
    "1 Kings", "2 Kings", "1 Chronicles", "2 Chronicles", "Ezra",
    "Nehemiah", "Esther", "Job", "Psalms", "Proverbs",
    "Ecclesiastes", "Song of Solomon", "Isaiah", "Jeremiah", "Lamentations",
    "Ezekiel", "Daniel", "Hosea", "Joel", "Amos",
    "Obadiah", "Jonah", "Micah", "Nahum", "Habakkuk",
    "Zephaniah", "Haggai", "Zechariah", "Malachi",
];

/// Every tunable of a run; a JSON file may override any subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub grouping: GroupingConfig,
    pub resolver: ResolverConfig,
    pub oracle: OracleConfig,
    pub tagged_books: Vec<String>,
    pub cue_books: Vec<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            grouping: GroupingConfig::default(),
            resolver: ResolverConfig::default(),
            oracle: OracleConfig::default(),
            tagged_books: GOSPEL_BOOKS.iter().map(|b| b.to_string()).collect(),
            cue_books: OLD_TESTAMENT_BOOKS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid run configuration")
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded run configuration from {}", path.display());
        Ok(config)
    }
}
