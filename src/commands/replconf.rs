use crate::resp::{encode_command, RespValue};

/// True when the arguments are `GETACK *`, the one REPLCONF form that must
/// be answered even in replica mode.
pub fn is_getack(arguments: &[Vec<u8>]) -> bool {
    arguments.len() == 2
        && arguments[0].eq_ignore_ascii_case(b"getack")
        && arguments[1] == b"*"
}

/// `GETACK *` reports the replication offset as it stood before the GETACK
/// frame itself was counted; every other REPLCONF form acknowledges with OK.
pub fn replconf(arguments: &[Vec<u8>], acked_offset: u64) -> Vec<u8> {
    if is_getack(arguments) {
        let offset = acked_offset.to_string();
        encode_command(&[b"REPLCONF".as_slice(), b"ACK".as_slice(), offset.as_bytes()])
    } else {
        RespValue::SimpleString("OK".to_string()).encode()
    }
}
