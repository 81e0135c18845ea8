//! Fixed-window character splitting.
//!
//! Every loaded document is cut into windows of at most `chunk_size` characters. Consecutive
//! windows share `overlap` characters: window `i` starts at `i * (chunk_size - overlap)`. The
//! policy ignores document structure entirely, so a paragraph or CSV row can straddle two
//! chunks. Lengths are counted in Unicode scalar values, never bytes, so multi-byte text is
//! never cut inside a character.

use super::types::{Chunk, ChunkingError, LoadedDocument};

/// Splitter holding a validated size/overlap pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Validate and build a splitter. `overlap` must be strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if overlap >= chunk_size {
            return Err(ChunkingError::InvalidOverlap {
                overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters shared by consecutive chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into overlapping windows.
    ///
    /// Returns an empty vector when the input is all whitespace.
    pub fn split_text<'a>(&self, text: &'a str) -> Vec<&'a str> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        let total = boundaries.len();
        let byte_at = |position: usize| boundaries.get(position).copied().unwrap_or(text.len());
        let stride = self.chunk_size - self.overlap;

        let mut windows = Vec::with_capacity(total.div_ceil(stride));
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total);
            windows.push(&text[byte_at(start)..byte_at(end)]);
            if end == total {
                break;
            }
            start += stride;
        }
        windows
    }

    /// Split every loaded document of one upload, numbering chunks from `first_index`.
    pub fn split_documents(
        &self,
        source: &str,
        documents: &[LoadedDocument],
        first_index: usize,
    ) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|document| self.split_text(&document.text))
            .enumerate()
            .map(|(offset, text)| Chunk {
                source: source.to_string(),
                index: first_index + offset,
                text: text.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn reassemble(chunks: &[&str], overlap: usize) -> String {
        let mut text = String::new();
        for (position, chunk) in chunks.iter().enumerate() {
            if position == 0 {
                text.push_str(chunk);
            } else {
                text.extend(chunk.chars().skip(overlap));
            }
        }
        text
    }

    #[test]
    fn twelve_thousand_characters_make_three_windows() {
        let text: String = (0..12_000)
            .map(|i| char::from(b'a' + (i % 26) as u8))
            .collect();
        let splitter = TextSplitter::new(5000, 100).unwrap();
        let chunks = splitter.split_text(&text);

        let lengths: Vec<usize> = chunks.iter().map(|chunk| chunk.chars().count()).collect();
        assert_eq!(lengths, vec![5000, 5000, 2200]);
        assert_eq!(&chunks[0][4900..], &chunks[1][..100]);
        assert_eq!(&chunks[1][4900..], &chunks[2][..100]);
        assert_eq!(reassemble(&chunks, 100), text);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(5000, 100).unwrap();
        assert_eq!(splitter.split_text("hello world"), vec!["hello world"]);
    }

    #[test]
    fn whitespace_only_text_has_no_chunks() {
        let splitter = TextSplitter::new(10, 2).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\t ").is_empty());
    }

    #[test]
    fn multibyte_text_splits_on_character_boundaries() {
        let text = "héllo wörld ünïcode ✓✓✓";
        let splitter = TextSplitter::new(7, 2).unwrap();
        let chunks = splitter.split_text(text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 7);
        }
        assert_eq!(reassemble(&chunks, 2), text);
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(matches!(
            TextSplitter::new(0, 0),
            Err(ChunkingError::InvalidChunkSize)
        ));
        assert!(matches!(
            TextSplitter::new(100, 100),
            Err(ChunkingError::InvalidOverlap { .. })
        ));
    }

    #[test]
    fn split_documents_numbers_chunks_across_documents() {
        let splitter = TextSplitter::new(4, 1).unwrap();
        let documents = vec![
            LoadedDocument {
                source: PathBuf::from("temp/rows.csv"),
                text: "abcdef".into(),
            },
            LoadedDocument {
                source: PathBuf::from("temp/rows.csv"),
                text: "xyz".into(),
            },
        ];

        let chunks = splitter.split_documents("rows.csv", &documents, 3);
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let indexes: Vec<usize> = chunks.iter().map(|chunk| chunk.index).collect();
        assert_eq!(texts, vec!["abcd", "def", "xyz"]);
        assert_eq!(indexes, vec![3, 4, 5]);
        assert!(chunks.iter().all(|chunk| chunk.source == "rows.csv"));
    }
}
