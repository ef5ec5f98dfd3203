//! Input validation functions and default limits for queue operations.
//!
//! Contains validation logic for queue names, payload sizes, batch sizes
//! and pop counts.

use super::error::{QueueError, Result};
use crate::protocol::Payload;

/// Maximum payload size in bytes (10MB)
pub const MAX_PAYLOAD_SIZE: usize = 10_485_760;

/// Maximum queue name length
pub const MAX_QUEUE_NAME_LENGTH: usize = 256;

/// Maximum number of payloads in a single PUSH
pub const MAX_BATCH_SIZE: usize = 1000;

/// Maximum number of pending jobs per queue
pub const MAX_QUEUE_LEN: usize = 1_000_000;

/// Validate queue name - any non-empty string up to the length limit
#[inline]
pub fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(QueueError::Validation(
            "Queue name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err(QueueError::Validation(format!(
            "Queue name too long (max {} chars)",
            MAX_QUEUE_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Validate a PUSH batch: non-empty, bounded, every payload within size.
#[inline]
pub fn validate_batch(payloads: &[Payload], max_batch: usize, max_payload: usize) -> Result<()> {
    if payloads.is_empty() {
        return Err(QueueError::Validation(
            "PUSH requires at least one payload".to_string(),
        ));
    }
    if payloads.len() > max_batch {
        return Err(QueueError::Capacity(format!(
            "Batch too large ({} payloads, max {})",
            payloads.len(),
            max_batch
        )));
    }
    if let Some(big) = payloads.iter().find(|p| p.len() > max_payload) {
        return Err(QueueError::Capacity(format!(
            "Payload too large ({} bytes, max {} bytes)",
            big.len(),
            max_payload
        )));
    }
    Ok(())
}

/// Validate the COUNT of a POP
#[inline]
pub fn validate_count(count: usize) -> Result<()> {
    if count == 0 {
        return Err(QueueError::Validation(
            "COUNT must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_queue_name_empty() {
        assert!(validate_queue_name("").is_err());
    }

    #[test]
    fn test_validate_queue_name_valid() {
        assert!(validate_queue_name("my-queue").is_ok());
        assert!(validate_queue_name("my_queue").is_ok());
        assert!(validate_queue_name("my.queue").is_ok());
        assert!(validate_queue_name("app:emails").is_ok());
        assert!(validate_queue_name("queue123").is_ok());
    }

    #[test]
    fn test_validate_queue_name_any_chars() {
        assert!(validate_queue_name("my queue").is_ok());
        assert!(validate_queue_name("jobs/high").is_ok());
        assert!(validate_queue_name("user@example").is_ok());
        assert!(validate_queue_name("żółw").is_ok());
    }

    #[test]
    fn test_validate_queue_name_too_long() {
        let name = "q".repeat(MAX_QUEUE_NAME_LENGTH + 1);
        assert!(validate_queue_name(&name).is_err());
    }

    #[test]
    fn test_validate_batch() {
        assert!(matches!(
            validate_batch(&[], 10, 10),
            Err(QueueError::Validation(_))
        ));

        let payloads: Vec<Payload> = (0..3).map(|i| Payload::from(i.to_string())).collect();
        assert!(validate_batch(&payloads, 3, 10).is_ok());
        assert!(matches!(
            validate_batch(&payloads, 2, 10),
            Err(QueueError::Capacity(_))
        ));

        let big = vec![Payload::from("0123456789ab")];
        assert!(matches!(
            validate_batch(&big, 10, 10),
            Err(QueueError::Capacity(_))
        ));
    }

    #[test]
    fn test_validate_count() {
        assert!(validate_count(0).is_err());
        assert!(validate_count(1).is_ok());
    }
}
