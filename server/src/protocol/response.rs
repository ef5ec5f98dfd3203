//! Protocol responses for rqueue.
//!
//! Contains the Response enum and helper constructors.

use serde::Serialize;

use super::types::{Delivery, JobId, QueueInfo, StatsData};

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Ids {
        ok: bool,
        ids: Vec<JobId>,
    },
    Jobs {
        ok: bool,
        jobs: Vec<Delivery>,
    },
    Acked {
        ok: bool,
        acked: bool,
    },
    Info {
        ok: bool,
        info: QueueInfo,
    },
    Queues {
        ok: bool,
        queues: Vec<String>,
    },
    Stats {
        ok: bool,
        stats: StatsData,
    },
    Pong {
        ok: bool,
        pong: &'static str,
    },
    Error {
        ok: bool,
        error: String,
    },
}

impl Response {
    #[inline(always)]
    pub fn ids(ids: Vec<JobId>) -> Self {
        Response::Ids { ok: true, ids }
    }

    #[inline(always)]
    pub fn jobs(jobs: Vec<Delivery>) -> Self {
        Response::Jobs { ok: true, jobs }
    }

    #[inline(always)]
    pub fn acked(acked: bool) -> Self {
        Response::Acked { ok: true, acked }
    }

    #[inline(always)]
    pub fn info(info: QueueInfo) -> Self {
        Response::Info { ok: true, info }
    }

    #[inline(always)]
    pub fn queues(queues: Vec<String>) -> Self {
        Response::Queues { ok: true, queues }
    }

    #[inline(always)]
    pub fn stats(stats: StatsData) -> Self {
        Response::Stats { ok: true, stats }
    }

    #[inline(always)]
    pub fn pong() -> Self {
        Response::Pong {
            ok: true,
            pong: "PONG",
        }
    }

    #[inline(always)]
    pub fn error(msg: impl Into<String>) -> Self {
        Response::Error {
            ok: false,
            error: msg.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Response::Error { .. })
    }
}
