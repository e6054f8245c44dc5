//! Wire protocol opcodes.
//!
//! Every logical message starts with one 4-byte big-endian opcode frame.
//! There is no version field; both ends agree on these values out of band.

/// Default bridge service port.
pub const DEFAULT_PORT: u16 = 17777;

/// Connection handshake (both directions, no payload).
pub const HANDSHAKE: u32 = 101;

/// Keep-alive (both directions, no payload).
pub const HEARTBEAT: u32 = 102;

/// Outbound image upload: count, then per item name string + blob.
pub const SEND_IMAGE: u32 = 201;

/// Outbound image request: count, then per item name string.
pub const REQUEST_IMAGE: u32 = 202;

/// Outbound prompt enqueue (no payload).
pub const QUEUE_PROMPT: u32 = 203;

/// Inbound image result: name string, blob, then status ([`OK`]/[`ERROR`]).
pub const RESPONSED_IMAGE: u32 = 204;

/// Inbound progress report: current, then max.
pub const PROGRESS: u32 = 301;

/// Inbound fatal error notification.
pub const ERROR: u32 = 404;

/// Inbound acknowledgement, ignored.
pub const OK: u32 = 666;

/// Returns a human-readable name for an opcode.
pub fn opcode_name(opcode: u32) -> &'static str {
    match opcode {
        HANDSHAKE => "HANDSHAKE",
        HEARTBEAT => "HEARTBEAT",
        SEND_IMAGE => "SEND_IMAGE",
        REQUEST_IMAGE => "REQUEST_IMAGE",
        QUEUE_PROMPT => "QUEUE_PROMPT",
        RESPONSED_IMAGE => "RESPONSED_IMAGE",
        PROGRESS => "PROGRESS",
        ERROR => "ERROR",
        OK => "OK",
        _ => "UNKNOWN",
    }
}
