//! Reader configuration

use serde::{Deserialize, Serialize};

/// Default traversal limit: 8 Mi words (64 MiB of message content)
pub const DEFAULT_TRAVERSAL_LIMIT_WORDS: u64 = 8 * 1024 * 1024;

/// Configuration applied when parsing an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderOptions {
    /// Upper bound on the total number of words in a received message
    ///
    /// A hostile peer can declare arbitrarily large segment sizes; the
    /// reader rejects anything above this cap before allocating.
    pub traversal_limit_words: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            traversal_limit_words: DEFAULT_TRAVERSAL_LIMIT_WORDS,
        }
    }
}

impl ReaderOptions {
    /// Create options with the default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the traversal limit in words
    pub fn with_traversal_limit_words(mut self, limit: u64) -> Self {
        self.traversal_limit_words = limit;
        self
    }
}
