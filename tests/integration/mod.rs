// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture helper for a temporary workspace holding corpus, documents and outputs
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self {
            temp_dir,
            root_path,
        }
    }

    /// Write a file relative to the fixture root, creating parent directories
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &[u8]) -> PathBuf {
        let file_path = self.root_path.join(relative_path);

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }

        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }

    /// Write the sample corpus JSON
    pub fn create_corpus(&self, json: &str) -> PathBuf {
        self.create_file("corpus.json", json.as_bytes())
    }

    /// Path for an output file inside the fixture
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.root_path.join(name)
    }

    /// Read an output file back as JSON
    pub fn read_json(&self, name: &str) -> serde_json::Value {
        let content = fs::read_to_string(self.output_path(name)).expect("Failed to read output");
        serde_json::from_str(&content).expect("Output is not valid JSON")
    }
}

/// Compare reference strings, providing a readable diff on mismatch
pub fn assert_references(actual: &[String], expected: &[&str], context: &str) {
    if actual.len() != expected.len() {
        panic!(
            "{}: Citation count mismatch. Expected {:?}, got {:?}",
            context, expected, actual
        );
    }

    for (i, (actual_ref, expected_ref)) in actual.iter().zip(expected.iter()).enumerate() {
        if actual_ref != expected_ref {
            panic!(
                "{}: Citation {} mismatch\nExpected: {}\nActual:   {}",
                context,
                i + 1,
                expected_ref,
                actual_ref
            );
        }
    }
}
