//! Protocol data types: job ids, payloads, deliveries and report structs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ProtocolError;

/// Identifier of a session/connection that receives deliveries.
pub type ConsumerId = u64;

// ============== Job ID ==============

/// Job identifier: millisecond timestamp plus a sequence number.
///
/// Ids are strictly increasing within a queue and render as `"<ms>-<seq>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct JobId {
    pub ms: u64,
    pub seq: u64,
}

impl JobId {
    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Next id after `self` given the current wall-clock time.
    ///
    /// Never goes backwards: a clock that stands still or jumps back keeps the
    /// previous millisecond and bumps the sequence.
    pub fn next(self, now: u64) -> JobId {
        if now > self.ms {
            return JobId::new(now, 1);
        }
        if self.seq == u64::MAX {
            if self.ms == u64::MAX {
                JobId::new(0, 0)
            } else {
                JobId::new(self.ms + 1, 0)
            }
        } else {
            JobId::new(self.ms, self.seq + 1)
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for JobId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProtocolError::InvalidId(s.to_string());
        let (ms, seq) = s.split_once('-').ok_or_else(invalid)?;
        let ms = ms.parse().map_err(|_| invalid())?;
        let seq = seq.parse().map_err(|_| invalid())?;
        Ok(JobId { ms, seq })
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ============== Payload ==============

/// Opaque job payload.
///
/// Serialized as a string when it is valid UTF-8, as raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(pub Bytes);

impl Payload {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(v: Vec<u8>) -> Self {
        Payload(Bytes::from(v))
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(s) => serializer.serialize_str(s),
            Err(_) => serializer.serialize_bytes(&self.0),
        }
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or byte payload")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Payload, E> {
        Ok(Payload::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Payload, E> {
        Ok(Payload::from(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Payload, E> {
        Ok(Payload(Bytes::copy_from_slice(v)))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Payload, E> {
        Ok(Payload::from(v))
    }

    // JSON has no byte type: binary payloads arrive as arrays of numbers
    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Payload, A::Error> {
        let mut buf = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(byte) = seq.next_element::<u8>()? {
            buf.push(byte);
        }
        Ok(Payload::from(buf))
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PayloadVisitor)
    }
}

// ============== Block Timeout ==============

/// How long a POP may wait when nothing is ready.
///
/// On the wire: `0` returns immediately, `-1` blocks forever, any positive
/// value is a timeout in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum BlockTimeout {
    #[default]
    NoWait,
    For(Duration),
    Forever,
}

pub const BLOCK_FOREVER: i64 = -1;

impl TryFrom<i64> for BlockTimeout {
    type Error = ProtocolError;

    fn try_from(ms: i64) -> Result<Self, Self::Error> {
        match ms {
            0 => Ok(BlockTimeout::NoWait),
            BLOCK_FOREVER => Ok(BlockTimeout::Forever),
            ms if ms > 0 => Ok(BlockTimeout::For(Duration::from_millis(ms as u64))),
            ms => Err(ProtocolError::InvalidBlock(ms)),
        }
    }
}

impl From<BlockTimeout> for i64 {
    fn from(block: BlockTimeout) -> i64 {
        match block {
            BlockTimeout::NoWait => 0,
            BlockTimeout::For(d) => d.as_millis().min(i64::MAX as u128) as i64,
            BlockTimeout::Forever => BLOCK_FOREVER,
        }
    }
}

// ============== Job ==============

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub queue: Arc<str>,
    pub payload: Payload,
    pub enqueued_at: u64,
    /// How many times the job has been handed to a consumer
    pub deliveries: u32,
    pub last_delivery: u64,
}

impl Job {
    pub fn new(id: JobId, queue: Arc<str>, payload: Payload, now: u64) -> Self {
        Self {
            id,
            queue,
            payload,
            enqueued_at: now,
            deliveries: 0,
            last_delivery: 0,
        }
    }
}

/// One popped job as returned to the client: `[key, id, payload]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub queue: Arc<str>,
    pub id: JobId,
    pub payload: Payload,
}

impl From<&Job> for Delivery {
    fn from(job: &Job) -> Self {
        Self {
            queue: Arc::clone(&job.queue),
            id: job.id,
            payload: job.payload.clone(),
        }
    }
}

impl Serialize for Delivery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&*self.queue, &self.id, &self.payload).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Delivery {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (queue, id, payload) = <(String, JobId, Payload)>::deserialize(deserializer)?;
        Ok(Delivery {
            queue: queue.into(),
            id,
            payload,
        })
    }
}

// ============== Reports ==============

/// Per-queue counters returned by INFO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub queue: String,
    pub last_id: JobId,
    pub pending: usize,
    pub in_flight: usize,
    pub waiters: usize,
}

/// Server-wide counters returned by STATS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsData {
    pub queues: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub waiters: usize,
    pub pushed: u64,
    pub delivered: u64,
    pub acked: u64,
    pub redelivered: u64,
    pub dropped: u64,
}
