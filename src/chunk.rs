use anyhow::{anyhow, Result};
use tiktoken_rs::CoreBPE;

use crate::error::PipelineError;

pub const DEFAULT_WINDOW_TOKENS: usize = 500;
pub const DEFAULT_OVERLAP_TOKENS: usize = 50;
pub const DEFAULT_MAX_WINDOWS: usize = 5;

/// Token-window splitter backed by the embedding provider's BPE
/// (cl100k_base, bundled with the crate so no network fetch is needed).
pub struct TokenChunker {
    bpe: CoreBPE,
    window: usize,
    overlap: usize,
    max_windows: usize,
}

impl TokenChunker {
    pub fn new(window: usize, overlap: usize, max_windows: usize) -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| anyhow!("{e}"))?;
        Ok(Self {
            bpe,
            window,
            overlap,
            max_windows,
        })
    }

    /// Split text into overlapping token windows, decoded back to strings.
    /// Empty or whitespace-only text yields no windows.
    pub fn split_text(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let ids = self.bpe.encode_ordinary(text);
        let mut out = Vec::new();
        for window in window_token_ids(&ids, self.window, self.overlap, self.max_windows) {
            let piece = self
                .bpe
                .decode(window.to_vec())
                .map_err(|e| PipelineError::decode("tokenizer", e.to_string()))?;
            out.push(piece);
        }
        Ok(out)
    }
}

/// Slice token ids into windows of `target` tokens, each overlapping the
/// previous by `overlap`, stopping after `max_windows`.
pub fn window_token_ids<T>(
    ids: &[T],
    target: usize,
    overlap: usize,
    max_windows: usize,
) -> Vec<&[T]> {
    let target = target.max(1);
    let overlap = overlap.min(target.saturating_sub(1));

    let mut out = Vec::new();
    let mut start = 0usize;

    while start < ids.len() && out.len() < max_windows {
        let end = (start + target).min(ids.len());
        out.push(&ids[start..end]);
        if end == ids.len() {
            break;
        }
        start = end.saturating_sub(overlap);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap_by_the_configured_amount() {
        let ids: Vec<u32> = (0..12).collect();
        let windows = window_token_ids(&ids, 5, 2, usize::MAX);
        assert_eq!(windows[0], &[0, 1, 2, 3, 4]);
        assert_eq!(windows[1], &[3, 4, 5, 6, 7]);
        assert_eq!(windows[2], &[6, 7, 8, 9, 10]);
        assert_eq!(windows[3], &[9, 10, 11]);
    }

    #[test]
    fn cap_limits_windows_per_article() {
        let ids: Vec<u32> = (0..1000).collect();
        let windows = window_token_ids(&ids, 10, 2, 5);
        assert_eq!(windows.len(), 5);
    }

    #[test]
    fn short_input_yields_single_window() {
        let ids: Vec<u32> = (0..3).collect();
        let windows = window_token_ids(&ids, 500, 50, 5);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0], &[0, 1, 2]);
    }

    #[test]
    fn empty_input_yields_no_windows() {
        let ids: Vec<u32> = Vec::new();
        assert!(window_token_ids(&ids, 500, 50, 5).is_empty());
    }

    #[test]
    fn overlap_larger_than_window_is_clamped() {
        // would loop forever without the clamp
        let ids: Vec<u32> = (0..10).collect();
        let windows = window_token_ids(&ids, 3, 7, usize::MAX);
        assert!(windows.len() >= 4);
        assert_eq!(windows.last().unwrap().last(), Some(&9));
    }

    #[test]
    fn split_text_round_trips_short_text() {
        let chunker = TokenChunker::new(DEFAULT_WINDOW_TOKENS, DEFAULT_OVERLAP_TOKENS, 5).unwrap();
        let out = chunker.split_text("Nvidia announced record results.").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0], "Nvidia announced record results.");
    }

    #[test]
    fn split_text_of_empty_text_is_empty() {
        let chunker = TokenChunker::new(DEFAULT_WINDOW_TOKENS, DEFAULT_OVERLAP_TOKENS, 5).unwrap();
        assert!(chunker.split_text("").unwrap().is_empty());
        assert!(chunker.split_text("   \n").unwrap().is_empty());
    }

    #[test]
    fn split_text_caps_windows() {
        let chunker = TokenChunker::new(4, 1, 3).unwrap();
        let text = "one two three four five six seven eight nine ten eleven twelve \
                    thirteen fourteen fifteen sixteen seventeen eighteen nineteen twenty";
        let out = chunker.split_text(text).unwrap();
        assert_eq!(out.len(), 3);
    }
}
