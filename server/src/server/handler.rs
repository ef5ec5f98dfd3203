//! Command processing for rqueue.
//!
//! Handles all protocol commands for both text and binary protocols.

use crate::protocol::{deserialize_msgpack, Command, Request, Response, ResponseWithId};
use crate::queue::QueueManager;

use super::connection::Session;

/// Process command from binary (MessagePack) input
#[inline(always)]
pub async fn process_command_binary(
    data: &[u8],
    queue_manager: &QueueManager,
    session: &Session,
) -> ResponseWithId {
    let request: Request = match deserialize_msgpack(data) {
        Ok(req) => req,
        Err(e) => return ResponseWithId::new(Response::error(e.to_string()), None),
    };

    process_request(request, queue_manager, session).await
}

/// Process command from text input (JSON object or inline command)
#[inline(always)]
pub async fn process_command_text(
    line: &str,
    queue_manager: &QueueManager,
    session: &Session,
) -> ResponseWithId {
    let request = match Request::parse_line(line) {
        Ok(req) => req,
        Err(e) => return ResponseWithId::new(Response::error(e.to_string()), None),
    };

    process_request(request, queue_manager, session).await
}

/// Shared command processing logic for both text and binary protocols
#[inline(always)]
pub async fn process_request(
    request: Request,
    queue_manager: &QueueManager,
    session: &Session,
) -> ResponseWithId {
    let response = process_command(request.command, queue_manager, session).await;
    ResponseWithId::new(response, request.req_id)
}

/// Process a single command and return the response
async fn process_command(
    command: Command,
    queue_manager: &QueueManager,
    session: &Session,
) -> Response {
    match command {
        Command::Push { queue, payloads } => match queue_manager.push(&queue, payloads) {
            Ok(ids) => Response::ids(ids),
            Err(e) => Response::error(e.to_string()),
        },
        Command::Pop { count, block, keys } => {
            match queue_manager.pop(&keys, count, block, session.id).await {
                Ok(jobs) => Response::jobs(jobs),
                Err(e) => Response::error(e.to_string()),
            }
        }
        Command::Ack { queue, id } => Response::acked(queue_manager.ack(&queue, id)),
        Command::Info { queue } => match queue_manager.info(&queue) {
            Ok(info) => Response::info(info),
            Err(e) => Response::error(e.to_string()),
        },
        Command::Queues => Response::queues(queue_manager.list_queues()),
        Command::Stats => Response::stats(queue_manager.stats()),
        Command::Ping => Response::pong(),
    }
}
