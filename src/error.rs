use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookaheadError {
    #[error("Lookahead must be built before resolving")]
    NotBuilt,

    #[error("Lookahead has not been resolved yet")]
    NotResolved,

    #[error("Lookahead already resolved; call reset() before resolving again")]
    AlreadyResolved,

    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Shape mismatch for {name}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("No depth-limit batch index for action {0}")]
    UnmappedAction(usize),

    #[error("Unknown action at the re-solved node: {0}")]
    UnknownAction(String),

    #[error("No depth-limit value function attached to the lookahead")]
    MissingValueFunction,

    #[error("Invalid public tree: {0}")]
    InvalidTree(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Value function failed: {0}")]
    ValueFunction(String),

    #[error("Tensor reshape failed: {0}")]
    Reshape(#[from] ndarray::ShapeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type LookaheadResult<T> = Result<T, LookaheadError>;

/// Shape guard shared by every entry point that accepts tensors.
pub fn check_shape(name: &'static str, expected: &[usize], got: &[usize]) -> LookaheadResult<()> {
    if expected != got {
        return Err(LookaheadError::ShapeMismatch {
            name,
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}
