//! Bridge client connecting a content-creation host to an external
//! image-generation service over TCP.
//!
//! The client owns three worker threads for the connection's lifetime: a
//! session thread (connect, handshake, then parked joining the loops), a
//! sender thread draining the operation queue, and a receiver thread
//! decoding inbound frames. Inbound notifications cross back into the
//! host's single consumer context through the event bus; nothing here ever
//! blocks the host thread.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod opcode;
pub mod state;

mod ops;

pub use client::BridgeClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{BridgeBus, BridgeEvent, ON_IMAGE_RECEIVED, ON_PROGRESS};
pub use opcode::DEFAULT_PORT;
pub use state::{ConnectionInfo, LinkState};
