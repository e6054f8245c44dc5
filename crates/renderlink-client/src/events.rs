use bytes::Bytes;
use renderlink_bus::EventBus;

/// Event name: a requested image arrived intact.
pub const ON_IMAGE_RECEIVED: &str = "on_image_received";

/// Event name: the service reported generation progress.
pub const ON_PROGRESS: &str = "on_progress";

/// Payloads published by the receiver loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    ImageReceived { name: String, data: Bytes },
    Progress { progress: u32, max: u32 },
}

/// The bus type a bridge client publishes into.
pub type BridgeBus = EventBus<BridgeEvent>;
