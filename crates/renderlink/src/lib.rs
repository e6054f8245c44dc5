//! TCP bridge between content-creation hosts and image-generation services.
//!
//! renderlink keeps a host application (a 3D scene editor, a compositor)
//! linked to a remote image-generation backend over a plain TCP socket:
//! big-endian binary framing, a FIFO operation queue, and an event bus
//! carrying inbound notifications back into the host's own update loop.
//!
//! # Crate Structure
//!
//! - [`frame`] — Big-endian frame codec (ints, strings, blobs)
//! - [`bus`] — Thread-safe event bus with delayed re-delivery
//! - [`client`] — Bridge client session, opcode dispatch, heartbeat

/// Re-export frame types.
pub mod frame {
    pub use renderlink_frame::*;
}

/// Re-export event bus types.
pub mod bus {
    pub use renderlink_bus::*;
}

/// Re-export bridge client types.
pub mod client {
    pub use renderlink_client::*;
}
