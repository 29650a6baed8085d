use crate::commands::error::CommandError;
use crate::config::ServerConfig;
use crate::resp::RespValue;

pub enum ConfigParameter {
    Dir,
    DbFilename,
}

pub struct ConfigGetArguments {
    pub parameter: ConfigParameter,
}

impl ConfigGetArguments {
    /// Only the GET subcommand with the `dir` or `dbfilename` parameter is
    /// supported; both tokens are matched case-insensitively.
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongArity("config"));
        }

        if !arguments[0].eq_ignore_ascii_case(b"get") {
            return Err(CommandError::UnknownConfigSubcommand(
                String::from_utf8_lossy(&arguments[0]).into_owned(),
            ));
        }

        let parameter = match arguments[1].to_ascii_lowercase().as_slice() {
            b"dir" => ConfigParameter::Dir,
            b"dbfilename" => ConfigParameter::DbFilename,
            _ => {
                return Err(CommandError::UnknownConfigParameter(
                    String::from_utf8_lossy(&arguments[1]).into_owned(),
                ))
            }
        };

        Ok(Self { parameter })
    }
}

pub fn config_get(config: &ServerConfig, arguments: &[Vec<u8>]) -> Result<Vec<u8>, CommandError> {
    let config_arguments = ConfigGetArguments::parse(arguments)?;

    let (name, value) = match config_arguments.parameter {
        ConfigParameter::Dir => ("dir", config.dir.clone().unwrap_or_default()),
        ConfigParameter::DbFilename => {
            ("dbfilename", config.dbfilename.clone().unwrap_or_default())
        }
    };

    Ok(RespValue::Array(vec![
        RespValue::BulkString(name.as_bytes().to_vec()),
        RespValue::BulkString(value.into_bytes()),
    ])
    .encode())
}
