/*
 * This module provides utilities for token counting.
 * It defines an abstraction `TokenCounterOperations` for counting tokens in a
 * string, and concrete implementations: `CoreTikTokenCounter` that uses the
 * `tiktoken-rs` library and `SimpleWhitespaceTokenCounter` for a basic word
 * count. Token counts are display annotations only; nothing in the selection
 * logic is allowed to branch on them.
 */
use crate::checksum_utils;
use crate::models::FileTokenDetails;
use log::error;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tiktoken_rs::cl100k_base;

/*
 * Defines the contract for a service that can count tokens in a given text
 * string. Implementations of this trait provide specific tokenization
 * strategies. Must be a pure function of the text: no side effects, so the
 * providers can cache results keyed by content checksum.
 */
pub trait TokenCounterOperations: Send + Sync {
    /*
     * Counts the number of tokens in the provided text.
     * The definition of a "token" depends on the underlying implementation.
     */
    fn count_tokens(&self, text: &str) -> usize;
}

/*
 * A concrete implementation of `TokenCounterOperations` that uses the
 * `tiktoken-rs` library with the "cl100k_base" model for tokenization.
 */
pub struct CoreTikTokenCounter;

impl CoreTikTokenCounter {
    pub fn new() -> Self {
        CoreTikTokenCounter
    }
}

impl Default for CoreTikTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for CoreTikTokenCounter {
    /*
     * Estimates the number of tokens in a given string using the
     * `cl100k_base` model from the `tiktoken-rs` library.
     *
     * If the BPE model fails to initialize, an error is logged and the
     * function falls back to a simple whitespace split count, so token
     * counting remains functional, albeit less accurate.
     */
    fn count_tokens(&self, text: &str) -> usize {
        match cl100k_base() {
            Ok(bpe) => bpe.encode_with_special_tokens(text).len(),
            Err(e) => {
                error!(
                    "Failed to initialize TikToken BPE (cl100k_base): {:?}. Falling back to whitespace token count.",
                    e
                );
                text.split_whitespace().count()
            }
        }
    }
}

/*
 * A concrete implementation of `TokenCounterOperations` that estimates tokens
 * by counting words separated by whitespace. This is a very basic estimation,
 * useful in tests and as a cheap fallback.
 */
pub struct SimpleWhitespaceTokenCounter;

impl SimpleWhitespaceTokenCounter {
    pub fn new() -> Self {
        SimpleWhitespaceTokenCounter
    }
}

impl Default for SimpleWhitespaceTokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounterOperations for SimpleWhitespaceTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

/*
 * Per-file token counts guarded by content checksums. A cached count is
 * served only while the file's current SHA-256 matches the one the count
 * was computed from, so a content change that slipped past the watcher can
 * never surface a stale number. Unreadable or non-text files report no
 * count.
 */
#[derive(Default)]
pub struct FileTokenCache {
    details: HashMap<PathBuf, FileTokenDetails>,
}

impl FileTokenCache {
    pub fn new() -> Self {
        FileTokenCache {
            details: HashMap::new(),
        }
    }

    pub fn count_for(
        &mut self,
        path: &Path,
        counter: &dyn TokenCounterOperations,
    ) -> Option<usize> {
        let checksum = match checksum_utils::calculate_sha256_checksum(path) {
            Ok(checksum) => checksum,
            Err(e) => {
                log::debug!("FileTokenCache: No checksum for {path:?}: {e}");
                self.details.remove(path);
                return None;
            }
        };

        if let Some(details) = self.details.get(path) {
            if details.checksum == checksum {
                return Some(details.token_count);
            }
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                log::debug!("FileTokenCache: Could not read {path:?} for token count: {e}");
                return None;
            }
        };
        let token_count = counter.count_tokens(&content);
        self.details.insert(
            path.to_path_buf(),
            FileTokenDetails {
                checksum,
                token_count,
            },
        );
        Some(token_count)
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.details.remove(path);
    }

    pub fn clear(&mut self) {
        self.details.clear();
    }
}
