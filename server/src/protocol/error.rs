use thiserror::Error;

/// Errors raised while decoding a request, before it reaches the queue engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Wrong number of arguments for '{0}'")]
    WrongArity(&'static str),

    #[error("Invalid {field} value '{value}': expected an integer")]
    InvalidInteger { field: &'static str, value: String },

    #[error("Invalid BLOCK value {0}: use 0, -1 or a positive timeout in ms")]
    InvalidBlock(i64),

    #[error("Invalid job id '{0}': expected <ms>-<seq>")]
    InvalidId(String),

    #[error("Option {0} given more than once")]
    DuplicateOption(&'static str),

    #[error("Unterminated quoted string")]
    UnterminatedQuote,

    #[error("Invalid: {0}")]
    Json(String),

    #[error("MessagePack error: {0}")]
    MsgPack(String),
}
