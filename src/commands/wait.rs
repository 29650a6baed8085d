use crate::resp::RespValue;

// Placeholder: synchronous replication counts are not tracked.
pub fn wait() -> Vec<u8> {
    RespValue::Integer(0).encode()
}
