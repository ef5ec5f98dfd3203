use thiserror::Error;

/// Errors surfaced by queue operations.
///
/// None of these leave partial state behind: a rejected command mutates nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Malformed arguments (bad queue name, zero count, empty batch, ...)
    #[error("{0}")]
    Validation(String),

    /// Storage limits reached (queue full, batch or payload too large)
    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    /// The referenced queue has never been created
    #[error("EMPTYKEY")]
    EmptyKey(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            QueueError::Validation("Queue name cannot be empty".to_string()).to_string(),
            "Queue name cannot be empty"
        );
        assert_eq!(
            QueueError::Capacity("queue 'q' is full".to_string()).to_string(),
            "Capacity exceeded: queue 'q' is full"
        );
        assert_eq!(QueueError::EmptyKey("q".to_string()).to_string(), "EMPTYKEY");
    }
}
