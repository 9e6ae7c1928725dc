//! Recursive text splitting for retrieval pipelines.
//!
//! Long documents have to be cut into pieces small enough for an embedding
//! model before they can be indexed. The splitter here works the way most
//! retrieval stacks do it: try the most significant separator first (paragraph
//! breaks), and only fall back to finer-grained separators (line breaks,
//! spaces, single characters) for pieces that are still too large. Adjacent
//! small pieces are then merged back together up to the configured chunk size,
//! carrying a tail of the previous chunk forward so neighbouring chunks
//! overlap and no sentence is stranded at a boundary.
//!
//! # Usage
//!
//! ```
//! use archmind_context::TextSplitter;
//!
//! let splitter = TextSplitter::new(100, 20);
//! let chunks = splitter.split("First paragraph.\n\nSecond paragraph, which keeps going for a while.");
//! assert!(!chunks.is_empty());
//! for chunk in &chunks {
//!     assert!(chunk.len() <= 100);
//! }
//! ```
use serde::{Deserialize, Serialize};

/// Default separators, ordered from most to least significant.
///
/// The empty string is the terminal fallback: it splits per character, which
/// bounds the size of every chunk no matter what the input looks like.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Splitting parameters in a serializable form, for config files and CLI use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Splits text into overlapping chunks using a cascade of separators.
///
/// Sizes are measured in bytes. Chunks never exceed `chunk_size` as long as
/// the separator list ends with the empty string; a custom list without it can
/// emit an oversized chunk when a piece contains none of the separators.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Creates a splitter with the default separator cascade.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_overlap >= chunk_size`: the overlap is a tail carried
    /// between chunks and has to leave room for new content.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|&s| s.to_string()).collect(),
        )
    }

    /// Creates a splitter with a caller-provided separator cascade.
    ///
    /// Separators are tried in order; the empty string, if present, splits per
    /// character and should come last.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_overlap >= chunk_size`.
    pub fn with_separators(chunk_size: usize, chunk_overlap: usize, separators: Vec<String>) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        );
        TextSplitter {
            chunk_size,
            chunk_overlap,
            separators,
        }
    }

    pub fn from_config(config: &SplitConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text` into chunks.
    ///
    /// Empty or whitespace-only input yields no chunks. Input that already
    /// fits in `chunk_size` is returned as a single chunk, byte for byte.
    /// Otherwise the separator cascade is applied recursively and the
    /// resulting pieces are merged back up to `chunk_size`, each chunk
    /// starting with up to `chunk_overlap` bytes of the previous one.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if text.len() <= self.chunk_size {
            return vec![text.to_string()];
        }
        self.split_text(text, &self.separators)
    }

    fn split_text(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator that occurs in the text. The remaining
        // separators are kept for recursing into oversized pieces.
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces = split_on_separator(text, separator);

        let mut chunks: Vec<String> = Vec::new();
        // Pieces small enough to merge are held here until an oversized piece
        // (or the end of the input) flushes them.
        let mut held: Vec<&str> = Vec::new();

        for piece in pieces {
            if piece.len() < self.chunk_size {
                held.push(piece);
                continue;
            }
            if !held.is_empty() {
                chunks.extend(self.merge_pieces(&held, separator));
                held.clear();
            }
            if remaining.is_empty() {
                // No finer separator left: emit the piece as-is.
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_text(piece, remaining));
            }
        }

        if !held.is_empty() {
            chunks.extend(self.merge_pieces(&held, separator));
        }

        chunks
    }

    /// Merges consecutive pieces into chunks of at most `chunk_size` bytes,
    /// joined by `separator`, carrying a window of trailing pieces into the
    /// next chunk until its joined length drops to `chunk_overlap`.
    fn merge_pieces(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = separator.len();
        let mut chunks: Vec<String> = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = piece.len();
            let extra = if window.is_empty() { 0 } else { sep_len };
            if total + len + extra > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_pieces(&window, separator) {
                    chunks.push(chunk);
                }
                // Drop pieces from the front until what remains fits inside
                // the overlap budget and leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total + len + if window.is_empty() { 0 } else { sep_len }
                        > self.chunk_size
                        && total > 0)
                {
                    total -= window[0].len() + if window.len() > 1 { sep_len } else { 0 };
                    window.remove(0);
                }
            }
            if !window.is_empty() {
                total += sep_len;
            }
            total += len;
            window.push(piece);
        }

        if let Some(chunk) = join_pieces(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        let config = SplitConfig::default();
        Self::new(config.chunk_size, config.chunk_overlap)
    }
}

fn split_on_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        // Per-character splitting, respecting UTF-8 boundaries.
        let mut pieces = Vec::with_capacity(text.chars().count());
        let mut iter = text.char_indices().peekable();
        while let Some((start, _)) = iter.next() {
            let end = iter.peek().map_or(text.len(), |&(next, _)| next);
            pieces.push(&text[start..end]);
        }
        pieces
    } else {
        text.split(separator).filter(|s| !s.is_empty()).collect()
    }
}

fn join_pieces(pieces: &[&str], separator: &str) -> Option<String> {
    let joined = pieces.join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
