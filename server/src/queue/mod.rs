mod ack;
mod background;
mod dispatcher;
mod error;
mod inflight;
mod manager;
mod monitoring;
mod push;
mod registry;
mod store;
mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use error::QueueError;
pub use manager::{QueueManager, QueueSettings};
pub use types::init_coarse_time;
pub use validation::{MAX_BATCH_SIZE, MAX_PAYLOAD_SIZE, MAX_QUEUE_LEN};
