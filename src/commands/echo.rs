use crate::commands::error::CommandError;
use crate::resp::RespValue;

pub struct EchoArguments {
    message: Vec<u8>,
}

impl EchoArguments {
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("echo"));
        }

        Ok(Self {
            message: arguments[0].clone(),
        })
    }
}

pub fn echo(arguments: &[Vec<u8>]) -> Result<Vec<u8>, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(RespValue::BulkString(echo_arguments.message).encode())
}
