//! Overflow-checked sizes for I/O primitives.
//!
//! Lengths handed to the file layer often come straight out of headers in
//! untrusted input. Anything larger than [`MAX_IO_SIZE`] is treated as
//! corrupt rather than passed down to the OS.

/// Upper bound for a single read, write or seek distance (768 MiB).
pub const MAX_IO_SIZE: u64 = 768 * 1024 * 1024;

/// Returns `true` if `bytes` can be handed to an I/O primitive.
pub fn valid_bytes(bytes: u64) -> bool {
    bytes <= MAX_IO_SIZE
}

/// Converts a requested length into a buffer length, or `None` if it is out
/// of range.
pub fn io_size(bytes: u64) -> Option<usize> {
    if !valid_bytes(bytes) {
        return None;
    }
    usize::try_from(bytes).ok()
}

/// Returns `true` if a signed seek distance is plausible.
pub(crate) fn valid_seek_distance(offset: i64) -> bool {
    valid_bytes(offset.unsigned_abs())
}
