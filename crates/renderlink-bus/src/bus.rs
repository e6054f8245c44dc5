use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

/// Suggested drain cadence for hosts that poll on a fixed timer (30 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Opaque identity scoping a subscription to one subscriber.
///
/// `None` in the bus APIs means the global listener: handlers registered
/// without an identity receive every matching event that is not targeted
/// at a specific listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Opaque token identifying one registered handler, returned by
/// [`EventBus::add`] and consumed by [`EventBus::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<P> = Arc<dyn Fn(Option<ListenerId>, &P) + Send + Sync + 'static>;

struct ListenerEntry<P> {
    listener: Option<ListenerId>,
    handlers: Vec<(HandlerId, Handler<P>)>,
}

struct QueuedEvent<P> {
    name: String,
    payload: P,
    target: Option<ListenerId>,
    /// Remaining drain ticks before this event dispatches.
    delay: u32,
}

/// Thread-safe publish/subscribe bus with a single cooperative consumer.
///
/// Producers call the `trigger*` methods from any thread; exactly one
/// context calls [`dispatch`](Self::dispatch). Registrations are keyed by
/// event name and listener identity; handlers for one event/listener pair
/// are invoked in reverse registration order within a tick. The bus stops
/// itself once it is drained and has no registrations left, and restarts
/// on the next [`add`](Self::add).
pub struct EventBus<P> {
    registry: Mutex<HashMap<String, Vec<ListenerEntry<P>>>>,
    queue: Mutex<VecDeque<QueuedEvent<P>>>,
    running: AtomicBool,
    next_id: AtomicU64,
}

impl<P: Send> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Send> EventBus<P> {
    /// Create an idle bus with no registrations.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            running: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh listener identity.
    pub fn listener(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `handler` under `event` for `listener` (`None` = global).
    ///
    /// Starts the bus if it was stopped. The handler receives the listener
    /// identity it was registered under and a reference to the payload.
    pub fn add(
        &self,
        event: &str,
        listener: Option<ListenerId>,
        handler: impl Fn(Option<ListenerId>, &P) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler<P> = Arc::new(handler);

        let mut registry = self.registry.lock().expect("bus registry poisoned");
        let entries = registry.entry(event.to_string()).or_default();
        match entries.iter_mut().find(|entry| entry.listener == listener) {
            Some(entry) => entry.handlers.push((id, handler)),
            None => entries.push(ListenerEntry {
                listener,
                handlers: vec![(id, handler)],
            }),
        }
        // Flip the flag while still holding the registry lock; registry
        // content and the running flag must never be observed out of step
        // by the auto-stop check in `dispatch`.
        if !self.running.swap(true, Ordering::SeqCst) {
            debug!(event, "event bus started");
        }
        drop(registry);
        id
    }

    /// Unregister a handler. Returns whether anything was removed.
    ///
    /// An emptied handler list drops its listener entry; an emptied entry
    /// list drops the event name.
    pub fn remove(&self, event: &str, listener: Option<ListenerId>, handler: HandlerId) -> bool {
        let mut registry = self.registry.lock().expect("bus registry poisoned");
        let Some(entries) = registry.get_mut(event) else {
            return false;
        };

        let mut removed = false;
        if let Some(pos) = entries.iter().position(|entry| entry.listener == listener) {
            let entry = &mut entries[pos];
            let before = entry.handlers.len();
            entry.handlers.retain(|(id, _)| *id != handler);
            removed = entry.handlers.len() != before;
            if entry.handlers.is_empty() {
                entries.remove(pos);
            }
        }
        if entries.is_empty() {
            registry.remove(event);
        }
        removed
    }

    /// Enqueue an event for every listener registered under `event`.
    ///
    /// Thread-safe and non-blocking. A no-op when nothing is currently
    /// registered for the event name; producers must not assume delivery.
    pub fn trigger(&self, event: &str, payload: P) {
        self.enqueue(event, payload, None, 0);
    }

    /// Enqueue an event delivered only to `target`'s registrations.
    pub fn trigger_for(&self, event: &str, payload: P, target: ListenerId) {
        self.enqueue(event, payload, Some(target), 0);
    }

    /// Enqueue an event withheld for `delay_ticks` drain ticks.
    ///
    /// The countdown decrements once per tick; the event dispatches on the
    /// tick where it reaches zero.
    pub fn trigger_delayed(
        &self,
        event: &str,
        payload: P,
        target: Option<ListenerId>,
        delay_ticks: u32,
    ) {
        self.enqueue(event, payload, target, delay_ticks);
    }

    fn enqueue(&self, event: &str, payload: P, target: Option<ListenerId>, delay: u32) {
        {
            let registry = self.registry.lock().expect("bus registry poisoned");
            if !registry.contains_key(event) {
                return;
            }
        }
        self.queue
            .lock()
            .expect("bus queue poisoned")
            .push_back(QueuedEvent {
                name: event.to_string(),
                payload,
                target,
                delay,
            });
    }

    /// Drain one tick on the caller's context. Returns whether the bus is
    /// still running afterwards.
    ///
    /// Only the events queued before the tick are processed; events
    /// triggered by handlers dispatch on the next tick. A targeted event
    /// reaches only the matching listener entry, never the global one; an
    /// untargeted event reaches every entry. A panicking handler is logged
    /// and skipped so it cannot stall the drain.
    pub fn dispatch(&self) -> bool {
        let drained: Vec<QueuedEvent<P>> = {
            let mut queue = self.queue.lock().expect("bus queue poisoned");
            queue.drain(..).collect()
        };

        let mut withheld = Vec::new();
        for event in drained {
            if event.delay > 0 {
                withheld.push(event);
                continue;
            }

            let matched: Vec<(Option<ListenerId>, Handler<P>)> = {
                let registry = self.registry.lock().expect("bus registry poisoned");
                match registry.get(&event.name) {
                    Some(entries) => entries
                        .iter()
                        .rev()
                        .filter(|entry| match event.target {
                            Some(target) => entry.listener == Some(target),
                            None => true,
                        })
                        .flat_map(|entry| {
                            entry
                                .handlers
                                .iter()
                                .rev()
                                .map(|(_, handler)| (entry.listener, Arc::clone(handler)))
                        })
                        .collect(),
                    None => Vec::new(),
                }
            };

            for (listener, handler) in matched {
                let invocation =
                    catch_unwind(AssertUnwindSafe(|| handler(listener, &event.payload)));
                if invocation.is_err() {
                    warn!(event = %event.name, "event handler panicked, skipping");
                }
            }
        }

        if !withheld.is_empty() {
            let mut queue = self.queue.lock().expect("bus queue poisoned");
            for mut event in withheld {
                event.delay -= 1;
                queue.push_back(event);
            }
        }

        // Auto-stop holds the registry lock across the emptiness check and
        // the flag flip, so an `add` racing in from another thread either
        // lands before the check (bus keeps running) or blocks until after
        // the stop and restarts it. Lock order registry-then-queue matches
        // `stop`.
        {
            let registry = self.registry.lock().expect("bus registry poisoned");
            let queue = self.queue.lock().expect("bus queue poisoned");
            if registry.is_empty() && queue.is_empty() && self.running.swap(false, Ordering::SeqCst)
            {
                debug!("event bus stopped");
            }
        }
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the bus and clear every registration and pending event.
    pub fn stop(&self) {
        let mut registry = self.registry.lock().expect("bus registry poisoned");
        if self.running.swap(false, Ordering::SeqCst) {
            debug!("event bus stopped");
        }
        registry.clear();
        self.queue.lock().expect("bus queue poisoned").clear();
    }

    /// Whether the bus currently has a live consumer contract.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of events waiting for the next tick.
    pub fn pending(&self) -> usize {
        self.queue.lock().expect("bus queue poisoned").len()
    }
}
