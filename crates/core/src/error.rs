#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A catalog record is missing a required field or carries an invalid value.
    #[error("Malformed task at index {index}: {reason}")]
    MalformedTask { index: usize, reason: String },

    /// The optimizer could not produce any assignment within its budget.
    #[error("No feasible assignment: {0}")]
    Infeasible(String),

    /// Publish/subscribe setup or delivery failed.
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// An inbound message could not be decoded.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
