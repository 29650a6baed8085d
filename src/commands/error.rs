use thiserror::Error;

use crate::resp::RespValue;

/// Errors surfaced to clients as RESP error frames.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("wrong number of arguments for '{0}' command")]
    WrongArity(&'static str),
    #[error("unknown command")]
    UnknownCommand,
    #[error("value is not an integer or out of range")]
    InvalidExpiry,
    #[error("syntax error")]
    Syntax,
    #[error("unsupported CONFIG subcommand: {0}")]
    UnknownConfigSubcommand(String),
    #[error("unsupported CONFIG parameter: {0}")]
    UnknownConfigParameter(String),
    #[error("unsupported INFO section: {0}")]
    UnknownInfoSection(String),
    #[error("invalid glob pattern: {0}")]
    InvalidGlobPattern(String),
}

impl CommandError {
    /// Renders the error as a RESP simple error frame.
    pub fn to_resp(&self) -> Vec<u8> {
        RespValue::Error(format!("ERR {}", self)).encode()
    }
}
