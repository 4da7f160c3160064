//! Error type for contract violations raised by the scatter plot core.
//!
//! Timing-dependent absence of data (no picking surface yet, sprite sheet not
//! loaded, empty selections) is never an error; those paths return `None` or
//! an empty set instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScatterError {
    /// An attribute buffer does not line up with the current point set.
    #[error("{buffer} buffer has length {actual}, expected {expected}")]
    BufferLengthMismatch {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Only 2D and 3D scenes exist.
    #[error("dimensions must be 2 or 3, got {0}")]
    InvalidDimensions(u8),

    /// An operation needs point positions but none were supplied yet.
    #[error("no point positions have been set")]
    NoDataset,

    /// The 24-bit picking encoding reserves 0xFFFFFF for the background.
    #[error("{0} points exceed the picking id range")]
    TooManyPoints(usize),

    /// A polyline sequence refers to a point that does not exist.
    #[error("sequence {sequence} refers to point {index}, but only {len} points exist")]
    SequenceIndexOutOfRange {
        sequence: usize,
        index: usize,
        len: usize,
    },

    /// A per-label field has the wrong number of entries.
    #[error("label field `{field}` has {actual} entries, expected {expected}")]
    LabelParamsMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The rendering backend failed to submit or read back a pass.
    #[error("render backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, ScatterError>;

/// Checks an optional per-point buffer against the point count.
pub(crate) fn check_len(buffer: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ScatterError::BufferLengthMismatch {
            buffer,
            expected,
            actual,
        })
    }
}
