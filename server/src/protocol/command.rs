//! Protocol commands for rqueue.
//!
//! Contains the Command enum and the inline (whitespace separated) parser.

use serde::{Deserialize, Serialize};

use super::error::ProtocolError;
use super::types::{BlockTimeout, JobId, Payload};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "UPPERCASE")]
pub enum Command {
    Push {
        queue: String,
        payloads: Vec<Payload>,
    },
    Pop {
        #[serde(default = "default_count")]
        count: usize,
        #[serde(default)]
        block: BlockTimeout,
        keys: Vec<String>,
    },
    Ack {
        queue: String,
        id: JobId,
    },
    Info {
        queue: String,
    },
    Queues,
    Stats,
    Ping,
}

fn default_count() -> usize {
    1
}

impl Command {
    /// Parse an inline command line such as `POP COUNT 2 BLOCK 500 a b`.
    ///
    /// Command names are case-insensitive and may carry the `RQ.` prefix.
    pub fn parse_inline(line: &str) -> Result<Command, ProtocolError> {
        let tokens = tokenize(line)?;
        let (name, args) = tokens.split_first().ok_or(ProtocolError::Empty)?;
        let name = name.to_ascii_uppercase();
        let name = name.strip_prefix("RQ.").unwrap_or(&name);

        match name {
            "PUSH" => {
                let (queue, payloads) = args.split_first().ok_or(ProtocolError::WrongArity("PUSH"))?;
                if payloads.is_empty() {
                    return Err(ProtocolError::WrongArity("PUSH"));
                }
                Ok(Command::Push {
                    queue: queue.clone(),
                    payloads: payloads.iter().map(|p| Payload::from(p.as_str())).collect(),
                })
            }
            "POP" => parse_pop(args),
            "ACK" => match args {
                [queue, id] => Ok(Command::Ack {
                    queue: queue.clone(),
                    id: id.parse()?,
                }),
                _ => Err(ProtocolError::WrongArity("ACK")),
            },
            "INFO" => match args {
                [queue] => Ok(Command::Info {
                    queue: queue.clone(),
                }),
                _ => Err(ProtocolError::WrongArity("INFO")),
            },
            "QUEUES" if args.is_empty() => Ok(Command::Queues),
            "QUEUES" => Err(ProtocolError::WrongArity("QUEUES")),
            "STATS" if args.is_empty() => Ok(Command::Stats),
            "STATS" => Err(ProtocolError::WrongArity("STATS")),
            "PING" if args.is_empty() => Ok(Command::Ping),
            "PING" => Err(ProtocolError::WrongArity("PING")),
            _ => Err(ProtocolError::UnknownCommand(tokens[0].clone())),
        }
    }
}

/// `POP [COUNT n] [BLOCK ms] key [key ...]`
fn parse_pop(args: &[String]) -> Result<Command, ProtocolError> {
    let mut count: Option<usize> = None;
    let mut block: Option<BlockTimeout> = None;
    let mut rest = args;

    loop {
        match rest {
            [opt, value, tail @ ..] if opt.eq_ignore_ascii_case("COUNT") => {
                if count.is_some() {
                    return Err(ProtocolError::DuplicateOption("COUNT"));
                }
                count = Some(parse_integer("COUNT", value)?);
                rest = tail;
            }
            [opt, value, tail @ ..] if opt.eq_ignore_ascii_case("BLOCK") => {
                if block.is_some() {
                    return Err(ProtocolError::DuplicateOption("BLOCK"));
                }
                block = Some(BlockTimeout::try_from(parse_integer::<i64>("BLOCK", value)?)?);
                rest = tail;
            }
            _ => break,
        }
    }

    if rest.is_empty() {
        return Err(ProtocolError::WrongArity("POP"));
    }

    Ok(Command::Pop {
        count: count.unwrap_or_else(default_count),
        block: block.unwrap_or_default(),
        keys: rest.to_vec(),
    })
}

fn parse_integer<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ProtocolError> {
    value.parse().map_err(|_| ProtocolError::InvalidInteger {
        field,
        value: value.to_string(),
    })
}

/// Split a line on whitespace; double quotes group a token, `\"` and `\\` escape.
fn tokenize(line: &str) -> Result<Vec<String>, ProtocolError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };

        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped) => token.push(escaped),
                        None => break,
                    },
                    c => token.push(c),
                }
            }
            if !closed {
                return Err(ProtocolError::UnterminatedQuote);
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}
