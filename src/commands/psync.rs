use crate::replication;

/// Produces the primary's PSYNC response: the FULLRESYNC line and the
/// bulk-framed empty snapshot. The connection loop writes both and then
/// registers the peer as a replica.
pub fn psync() -> (String, Vec<u8>) {
    (
        replication::fullresync_reply(),
        replication::snapshot_frame(),
    )
}
