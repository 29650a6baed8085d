use crate::resp::RespValue;

pub fn ping() -> Vec<u8> {
    RespValue::SimpleString("PONG".to_string()).encode()
}
