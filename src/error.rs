//! Error types for the layout reconstruction engine.
//!
//! This module defines all error types that can occur while parsing the
//! intermediate glyph stream and emitting OOXML content.

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classification.
///
/// Callers that only care about the broad class of failure (rather than the
/// precise variant) can switch on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or unexpected input data.
    InvalidInput,
    /// A required tag or attribute was absent.
    NotFound,
    /// An underlying I/O failure.
    Io,
}

/// Error types that can occur during layout reconstruction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A tag appeared where the grammar does not allow it
    #[error("Unexpected tag <{found}>: expected <{expected}>")]
    UnexpectedTag {
        /// Tag name the grammar required at this point
        expected: String,
        /// Tag name actually read
        found: String,
    },

    /// Input ended while a structure was still open
    #[error("Input ended unexpectedly while reading <{context}>")]
    UnexpectedEof {
        /// Tag being read when the input ran out
        context: String,
    },

    /// A required attribute was absent from a tag
    #[error("Tag <{tag}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Tag the attribute was expected on
        tag: String,
        /// Name of the missing attribute
        attribute: String,
    },

    /// An attribute value failed to coerce to its expected type
    #[error("Tag <{tag}> attribute '{attribute}' has malformed value '{value}'")]
    InvalidAttribute {
        /// Tag carrying the attribute
        tag: String,
        /// Name of the offending attribute
        attribute: String,
        /// Raw attribute value
        value: String,
    },

    /// Tag syntax that the tokenizer could not read
    #[error("Malformed tag near byte {offset}: {reason}")]
    MalformedTag {
        /// Byte offset where tokenization failed
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// Non-hex byte inside inline image data
    #[error("Bad hex character {found:?} at offset {offset} in image data")]
    BadImageData {
        /// Offending character
        found: char,
        /// Offset within the image data text
        offset: usize,
    },

    /// Pixmap image rows arrived out of order
    #[error("Expected <line y={expected}> but found <line y={found}>")]
    ImageLineOutOfOrder {
        /// Row index the grammar required
        expected: i32,
        /// Row index actually read
        found: i32,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map this error onto its coarse [`ErrorCategory`].
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnexpectedTag { .. }
            | Error::UnexpectedEof { .. }
            | Error::InvalidAttribute { .. }
            | Error::MalformedTag { .. }
            | Error::BadImageData { .. }
            | Error::ImageLineOutOfOrder { .. } => ErrorCategory::InvalidInput,
            Error::MissingAttribute { .. } => ErrorCategory::NotFound,
            Error::Io(_) => ErrorCategory::Io,
        }
    }
}
