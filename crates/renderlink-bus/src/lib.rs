//! Cross-thread event delivery for the render bridge.
//!
//! Producers on any thread enqueue named events; a single cooperative
//! consumer drains the queue one tick at a time and invokes matching
//! handlers. Subscriptions can be scoped to an opaque listener identity,
//! and delivery can be deferred by a countdown of drain ticks.
//!
//! The bus never runs its own thread. The host owns the consumer context
//! (a UI timer, a main loop) and calls [`EventBus::dispatch`] from there;
//! [`TICK_INTERVAL`] is exported for hosts that want a fixed cadence.

pub mod bus;

pub use bus::{EventBus, HandlerId, ListenerId, TICK_INTERVAL};
