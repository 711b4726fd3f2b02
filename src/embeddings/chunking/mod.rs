
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::loader::Document;
use crate::{RagError, Result};

/// A bounded piece of a document, with `metadata.start_index` set to the
/// character offset it was found at in the parent document.
pub type Chunk = Document;

/// Configuration for recursive character splitting. Sizes are counted in
/// characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
    /// Separators tried in order. The empty string splits into characters.
    #[serde(default = "default_separators")]
    pub separators: Vec<String>,
}

fn default_separators() -> Vec<String> {
    ["\n\n", "\n", " ", ""]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separators: default_separators(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(RagError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap > config.chunk_size {
            return Err(RagError::Config(format!(
                "Chunk overlap ({}) is larger than chunk size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    #[inline]
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split raw text into chunk strings.
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    /// Split every document, carrying metadata over and recording where each
    /// chunk starts in its parent.
    #[inline]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for document in documents {
            let mut index = 0_usize;
            let mut previous_len = 0_usize;

            for piece in self.split_text(&document.content) {
                let search_from =
                    (index + previous_len).saturating_sub(self.config.chunk_overlap);
                index = find_char_offset(&document.content, &piece, search_from)
                    .or_else(|| find_char_offset(&document.content, &piece, 0))
                    .unwrap_or(search_from);
                previous_len = char_len(&piece);

                let mut metadata = document.metadata.clone();
                metadata.start_index = Some(index);
                chunks.push(Chunk::new(piece, metadata));
            }
        }

        debug!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // First separator that occurs in the text wins; "" always matches.
        let mut separator = separators.last().map(String::as_str).unwrap_or_default();
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                remaining = separators.get(i + 1..).unwrap_or_default();
                break;
            }
        }

        let mut good_splits: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                if separator.is_empty() {
                    final_chunks.push(piece);
                } else {
                    // Out of separators: fall back to character windows.
                    final_chunks.extend(self.split_recursive(&piece, &[String::new()]));
                }
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily pack small splits into chunks no longer than `chunk_size`,
    /// carrying up to `chunk_overlap` characters into the next chunk.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let chunk_overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: std::collections::VecDeque<(&str, usize)> =
            std::collections::VecDeque::new();
        let mut total = 0_usize;

        for split in splits {
            let len = char_len(split);

            if total + len > chunk_size {
                if total > chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, chunk_size
                    );
                }

                if !current.is_empty() {
                    if let Some(doc) = join_trimmed(current.iter().map(|(s, _)| *s)) {
                        docs.push(doc);
                    }

                    while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                        match current.pop_front() {
                            Some((_, front_len)) => total -= front_len,
                            None => break,
                        }
                    }
                }
            }

            current.push_back((split.as_str(), len));
            total += len;
        }

        if let Some(doc) = join_trimmed(current.iter().map(|(s, _)| *s)) {
            docs.push(doc);
        }

        docs
    }
}

/// Split every document with the given configuration.
#[inline]
pub fn chunk_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    Ok(TextSplitter::new(config.clone())?.split_documents(documents))
}

/// Split on `separator`, keeping each separator attached to the start of the
/// piece that follows it. Empty pieces are dropped.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        if let Some(piece) = text.get(start..position) {
            pieces.push(piece.to_string());
        }
        start = position;
    }
    if let Some(rest) = text.get(start..) {
        pieces.push(rest.to_string());
    }

    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn join_trimmed<'a>(parts: impl Iterator<Item = &'a str>) -> Option<String> {
    let joined: String = parts.collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Character offset of `needle` in `haystack`, searching from character
/// offset `from`.
fn find_char_offset(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let byte_start = match haystack.char_indices().nth(from) {
        Some((byte, _)) => byte,
        None if from == char_len(haystack) => haystack.len(),
        None => return None,
    };

    let tail = haystack.get(byte_start..)?;
    let byte_offset = tail.find(needle)?;
    let prefix = tail.get(..byte_offset)?;
    Some(from + char_len(prefix))
}
