use std::time::Duration;

use jiff::Timestamp;
use tokio::sync::Mutex;

use crate::commands::error::CommandError;
use crate::resp::RespValue;
use crate::store::Store;

pub struct SetArguments {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub ttl: Option<Duration>,
}

impl SetArguments {
    /// Accepts `key value` or `key value PX <ms>`; the PX token is matched
    /// case-insensitively and the duration must be a positive integer.
    pub fn parse(arguments: &[Vec<u8>]) -> Result<Self, CommandError> {
        if arguments.len() != 2 && arguments.len() != 4 {
            return Err(CommandError::WrongArity("set"));
        }

        let mut ttl = None;

        if arguments.len() == 4 {
            if !arguments[2].eq_ignore_ascii_case(b"px") {
                return Err(CommandError::Syntax);
            }

            match parse_millis(&arguments[3]) {
                Some(millis) if millis > 0 => ttl = Some(Duration::from_millis(millis)),
                _ => return Err(CommandError::InvalidExpiry),
            }
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            ttl,
        })
    }
}

fn parse_millis(operand: &[u8]) -> Option<u64> {
    std::str::from_utf8(operand).ok()?.parse::<u64>().ok()
}

pub async fn set(store: &Mutex<Store>, arguments: &[Vec<u8>]) -> Result<Vec<u8>, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    let expires_at = match set_arguments.ttl {
        Some(ttl) => Some(
            Timestamp::now()
                .checked_add(ttl)
                .map_err(|_| CommandError::InvalidExpiry)?,
        ),
        None => None,
    };

    let mut store_guard = store.lock().await;
    store_guard.set(set_arguments.key, set_arguments.value, expires_at);

    Ok(RespValue::SimpleString("OK".to_string()).encode())
}
