use anyhow::{Context, Result};
use memmap2::Mmap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Configuration for source document reading
#[derive(Debug, Clone, Default)]
pub struct ReaderConfig {
    /// Map the file instead of reading it into a buffer
    pub use_mmap: bool,
}

/// Statistics for one document read
#[derive(Debug, Clone)]
pub struct ReadStats {
    pub file_path: String,
    pub bytes_read: u64,
    pub chars_decoded: u64,
    pub encoding: SourceEncoding,
    pub duration_ms: u64,
}

/// Encodings tried, in order, when decoding a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1252,
    Latin1,
}

// Windows-1252 assignments for 0x80..=0x9F; None marks bytes the code page leaves undefined
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

impl SourceEncoding {
    pub const FALLBACK_ORDER: [SourceEncoding; 3] = [
        SourceEncoding::Utf8,
        SourceEncoding::Windows1252,
        SourceEncoding::Latin1,
    ];

    /// Strict decode; None when the bytes are not valid in this encoding
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            SourceEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            SourceEncoding::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
                    _ => Some(char::from(b)),
                })
                .collect(),
            SourceEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Decode with the first encoding in [`SourceEncoding::FALLBACK_ORDER`] that accepts the bytes.
/// Latin-1 accepts every byte sequence, so this always succeeds.
pub fn decode_with_fallback(bytes: &[u8]) -> (String, SourceEncoding) {
    for encoding in SourceEncoding::FALLBACK_ORDER {
        if let Some(text) = encoding.decode(bytes) {
            return (text, encoding);
        }
        debug!("Source is not valid {:?}, trying next encoding", encoding);
    }
    (
        bytes.iter().map(|&b| char::from(b)).collect(),
        SourceEncoding::Latin1,
    )
}

/// Reads a whole marked-up source document into memory
pub struct DocumentReader {
    config: ReaderConfig,
}

impl DocumentReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self { config }
    }

    /// Read and decode a document. I/O failures are fatal; decoding never is.
    pub async fn read_document<P: AsRef<Path>>(&self, path: P) -> Result<(String, ReadStats)> {
        let path = path.as_ref();
        let start_time = std::time::Instant::now();

        debug!("Starting read of document: {}", path.display());

        let (text, encoding, bytes_read) = if self.config.use_mmap {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || -> Result<(String, SourceEncoding, u64)> {
                let file = std::fs::File::open(&owned)
                    .with_context(|| format!("Failed to open document {}", owned.display()))?;
                // SAFETY: the map is read-only and dropped before this closure returns
                let mmap = unsafe { Mmap::map(&file) }
                    .with_context(|| format!("Failed to map document {}", owned.display()))?;
                let (text, encoding) = decode_with_fallback(&mmap);
                Ok((text, encoding, mmap.len() as u64))
            })
            .await
            .context("Document read task panicked")??
        } else {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read document {}", path.display()))?;
            let (text, encoding) = decode_with_fallback(&bytes);
            (text, encoding, bytes.len() as u64)
        };

        if encoding != SourceEncoding::Utf8 {
            warn!(
                "Document {} is not UTF-8, decoded as {:?}",
                path.display(),
                encoding
            );
        }

        let stats = ReadStats {
            file_path: path.display().to_string(),
            bytes_read,
            chars_decoded: text.chars().count() as u64,
            encoding,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Read {}: {} bytes in {}ms ({:.2} MB/s)",
            path.display(),
            bytes_read,
            stats.duration_ms,
            if stats.duration_ms > 0 {
                (bytes_read as f64 / 1_000_000.0) / (stats.duration_ms as f64 / 1000.0)
            } else {
                0.0
            }
        );

        Ok((text, stats))
    }
}

/// Read a single document with default configuration
pub async fn read_document<P: AsRef<Path>>(path: P) -> Result<String> {
    let reader = DocumentReader::new(ReaderConfig::default());
    let (text, _stats) = reader.read_document(path).await?;
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::fs;

    async fn create_test_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let file_path = dir.join(name);
        fs::write(&file_path, content).await.unwrap();
        file_path
    }

    #[test]
    fn test_utf8_preferred() {
        let (text, encoding) = decode_with_fallback("Peace I leave with you".as_bytes());
        assert_eq!(text, "Peace I leave with you");
        assert_eq!(encoding, SourceEncoding::Utf8);
    }

    #[test]
    fn test_windows_1252_smart_quotes() {
        let bytes = b"\x93Follow me\x94 \x97 he said";
        let (text, encoding) = decode_with_fallback(bytes);
        assert_eq!(encoding, SourceEncoding::Windows1252);
        assert_eq!(text, "\u{201C}Follow me\u{201D} \u{2014} he said");
    }

    #[test]
    fn test_latin1_for_undefined_cp1252_bytes() {
        let bytes = b"caf\xe9 \x81";
        let (text, encoding) = decode_with_fallback(bytes);
        assert_eq!(encoding, SourceEncoding::Latin1);
        assert_eq!(text, "caf\u{e9} \u{81}");
    }

    #[test]
    fn test_strict_decoders() {
        assert!(SourceEncoding::Utf8.decode(b"\xff").is_none());
        assert!(SourceEncoding::Windows1252.decode(b"\x9d").is_none());
        assert_eq!(
            SourceEncoding::Windows1252.decode(b"\x80").as_deref(),
            Some("\u{20AC}")
        );
    }

    #[tokio::test]
    async fn test_read_document_buffered_and_mapped() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(temp_dir.path(), "doc.txt", b"<FR>Follow me<Fr>\n").await;

        for use_mmap in [false, true] {
            let reader = DocumentReader::new(ReaderConfig { use_mmap });
            let (text, stats) = reader.read_document(&path).await.unwrap();
            assert_eq!(text, "<FR>Follow me<Fr>\n");
            assert_eq!(stats.bytes_read, 18);
            assert_eq!(stats.chars_decoded, 18);
            assert_eq!(stats.encoding, SourceEncoding::Utf8);
        }
    }

    #[tokio::test]
    async fn test_read_document_single_byte_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(temp_dir.path(), "latin.txt", b"na\xefve").await;
        let (text, stats) = DocumentReader::new(ReaderConfig::default())
            .read_document(&path)
            .await
            .unwrap();
        assert_eq!(text, "na\u{ef}ve");
        assert_eq!(stats.encoding, SourceEncoding::Windows1252);
        assert_eq!(stats.chars_decoded, 5);
    }

    #[tokio::test]
    async fn test_missing_document_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");
        assert!(read_document(&missing).await.is_err());

        let reader = DocumentReader::new(ReaderConfig { use_mmap: true });
        let err = reader.read_document(&missing).await.unwrap_err();
        assert!(err.to_string().contains("missing.txt"));
    }

    #[tokio::test]
    async fn test_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_test_file(temp_dir.path(), "empty.txt", b"").await;
        let text = read_document(&path).await.unwrap();
        assert!(text.is_empty());
    }
}
