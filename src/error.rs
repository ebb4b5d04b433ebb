//! Error types and handling for Matisse

/// Result type alias for Matisse operations
pub type Result<T> = std::result::Result<T, MatisseError>;

/// Error types for envelope parsing, stream I/O, and message writing
#[derive(Debug, thiserror::Error)]
pub enum MatisseError {
    /// A writer was invoked with zero segments
    #[error("tried to serialize uninitialized message (zero segments)")]
    UninitializedMessage,

    /// The input ends before the declared segment table does
    #[error("message ends prematurely in segment table: need {needed} words, have {available}")]
    PrematureSegmentTable { needed: usize, available: usize },

    /// The input ends before a declared segment body does
    #[error("message ends prematurely in segment {segment}: need {needed} words, have {available}")]
    PrematureSegment {
        segment: u32,
        needed: usize,
        available: usize,
    },

    /// A stream header declared an implausible number of segments
    #[error("message has too many segments: {count} (limit {limit})")]
    TooManySegments { count: u32, limit: u32 },

    /// The total message size exceeds the configured traversal limit
    #[error("message of {total_words} words exceeds traversal limit of {limit_words} words")]
    TraversalLimitExceeded { total_words: u64, limit_words: u64 },

    /// I/O related errors (stream reads, fd writes, etc.)
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl MatisseError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create an I/O error with a bare message
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create a premature segment table error
    pub fn premature_segment_table(needed: usize, available: usize) -> Self {
        Self::PrematureSegmentTable { needed, available }
    }

    /// Create a premature segment error
    pub fn premature_segment(segment: u32, needed: usize, available: usize) -> Self {
        Self::PrematureSegment {
            segment,
            needed,
            available,
        }
    }

    /// Create a too-many-segments error
    pub fn too_many_segments(count: u32, limit: u32) -> Self {
        Self::TooManySegments { count, limit }
    }

    /// Create a traversal limit error
    pub fn traversal_limit_exceeded(total_words: u64, limit_words: u64) -> Self {
        Self::TraversalLimitExceeded {
            total_words,
            limit_words,
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for MatisseError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

#[cfg(unix)]
impl From<nix::errno::Errno> for MatisseError {
    fn from(err: nix::errno::Errno) -> Self {
        Self::from_io(std::io::Error::from(err), "syscall failed")
    }
}
