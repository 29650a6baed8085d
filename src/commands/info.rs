use crate::commands::error::CommandError;
use crate::config::ServerConfig;
use crate::replication::REPLICATION_ID;
use crate::resp::RespValue;

enum InfoSection {
    Replication,
}

struct InfoArguments {
    section: InfoSection,
}

impl InfoArguments {
    fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongArity("info"));
        }

        if !arguments[0].eq_ignore_ascii_case(b"replication") {
            return Err(CommandError::UnknownInfoSection(
                String::from_utf8_lossy(&arguments[0]).into_owned(),
            ));
        }

        Ok(Self {
            section: InfoSection::Replication,
        })
    }
}

pub fn info(config: &ServerConfig, arguments: &[Vec<u8>]) -> Result<Vec<u8>, CommandError> {
    let info_arguments = InfoArguments::parse(arguments)?;

    let body = match info_arguments.section {
        InfoSection::Replication => format!(
            "role:{}\nmaster_replid:{}\nmaster_repl_offset:{}",
            config.role().as_str(),
            REPLICATION_ID,
            0
        ),
    };

    Ok(RespValue::BulkString(body.into_bytes()).encode())
}
