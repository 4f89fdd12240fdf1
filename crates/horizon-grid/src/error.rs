//! Error types for the grid crate.

use thiserror::Error;

/// Errors that can occur while building, mutating, or persisting a grid.
#[derive(Error, Debug)]
pub enum GridError {
    /// An index was outside the valid range.
    #[error("{what} index {index} out of range (len {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A node cannot be removed while it still has children.
    #[error("node has {0} children and cannot be removed")]
    NodeHasChildren(usize),

    /// The node handle does not refer to a live node.
    #[error("invalid node handle")]
    InvalidNode,

    /// The path model already has a root node.
    #[error("path model already has a root node")]
    RootExists,

    /// An expansion request was refused by a listener.
    #[error("expansion vetoed: {0}")]
    ExpansionVetoed(String),

    /// A model column is already shown by the header.
    #[error("model column {0} is already in the header")]
    DuplicateColumn(usize),

    /// Too many sort keys.
    #[error("at most {limit} sort keys are allowed")]
    TooManySortKeys { limit: usize },

    /// Too many grouping keys.
    #[error("at most {limit} group keys are allowed")]
    TooManyGroupKeys { limit: usize },

    /// The grid state document could not be parsed.
    #[error("failed to parse grid state: {0}")]
    StateParse(String),

    /// The grid state document declares a version this crate cannot read.
    #[error("unsupported state-version {0}")]
    UnsupportedVersion(u32),

    /// The grid state document could not be written.
    #[error("failed to write grid state: {0}")]
    StateWrite(String),

    /// The model refused an edited value.
    #[error("model rejected the edit of cell ({col}, {row})")]
    CommitRejected { col: usize, row: usize },

    /// The cell cannot be edited.
    #[error("cell ({col}, {row}) is not editable")]
    NotEditable { col: usize, row: usize },

    /// The operation conflicts with the current interaction.
    #[error("grid is busy: {0}")]
    Busy(&'static str),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O failure while loading or saving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = GridError::OutOfRange {
            what: "row",
            index: 7,
            len: 5,
        };
        assert_eq!(err.to_string(), "row index 7 out of range (len 5)");
        assert_eq!(
            GridError::ExpansionVetoed("offline".into()).to_string(),
            "expansion vetoed: offline"
        );
    }

    #[test]
    fn test_io_conversion() {
        fn open() -> GridResult<()> {
            std::fs::read("/definitely/not/here")?;
            Ok(())
        }
        assert!(matches!(open(), Err(GridError::Io(_))));
    }
}
