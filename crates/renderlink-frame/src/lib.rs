//! Wire framing for the render bridge protocol.
//!
//! Every logical message on the wire is built from three frame shapes:
//! - A 4-byte big-endian unsigned integer (opcodes, counts, statuses)
//! - A string frame: u32 byte length followed by that many UTF-8 bytes
//! - A blob frame: u32 byte length followed by raw bytes (image payloads)
//!
//! No partial reads, no buffer management in user code.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

/// Size in bytes of the integer frame (and of every length prefix).
pub const INT_SIZE: usize = 4;

/// Maximum bytes pulled from the transport in a single blob read.
pub const BLOB_CHUNK_SIZE: usize = 4096;

/// Default maximum string/blob payload size: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Configuration shared by frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted string/blob payload size in bytes.
    ///
    /// Declared lengths above this cap are rejected before any allocation.
    /// A desynchronized stream otherwise presents garbage lengths.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
