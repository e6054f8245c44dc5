/// Errors that can occur in bridge client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] renderlink_frame::FrameError),

    /// Transport-level I/O error.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer answered the handshake with an unexpected opcode.
    #[error("handshake failed (peer answered opcode {opcode})")]
    HandshakeFailed { opcode: u32 },

    /// An operation needed a live connection and there was none.
    #[error("not connected")]
    NotConnected,

    /// `send_images` was called with mismatched sequence lengths.
    #[error("image name/data length mismatch ({names} names, {blobs} blobs)")]
    LengthMismatch { names: usize, blobs: usize },
}

pub type Result<T> = std::result::Result<T, ClientError>;
