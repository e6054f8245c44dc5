use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use renderlink_frame::{FrameConfig, FrameReader, FrameWriter};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::events::{BridgeBus, BridgeEvent, ON_IMAGE_RECEIVED, ON_PROGRESS};
use crate::opcode::{self, opcode_name};
use crate::ops::{Operation, OperationQueue};
use crate::state::{ConnectionInfo, LinkState, LinkStatus};

/// A bridge client session.
///
/// Owns its state, operation queue, socket handles, and worker threads;
/// one instance per connection target. Dropping the client disconnects.
///
/// All public methods are non-blocking except [`disconnect`]
/// (which joins the worker threads) — outbound work is enqueued and
/// serialized by the sender thread, never written on the caller's thread.
///
/// [`disconnect`]: BridgeClient::disconnect
pub struct BridgeClient {
    shared: Arc<Shared>,
    session: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    config: ClientConfig,
    status: LinkStatus,
    ops: OperationQueue,
    bus: Arc<BridgeBus>,
    /// Outbound endpoint. One writer lock: a frame's bytes are never
    /// interleaved with another writer's.
    writer: Mutex<Option<FrameWriter<TcpStream>>>,
    /// Duplicate stream handle kept so `disconnect` can force-shutdown the
    /// socket and unblock a receiver parked in a read.
    socket: Mutex<Option<TcpStream>>,
}

impl BridgeClient {
    /// Create a disconnected client publishing into `bus`.
    pub fn new(bus: Arc<BridgeBus>) -> Self {
        Self::with_config(bus, ClientConfig::default())
    }

    /// Create a disconnected client with explicit configuration.
    pub fn with_config(bus: Arc<BridgeBus>, config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                status: LinkStatus::new(),
                ops: OperationQueue::new(),
                bus,
                writer: Mutex::new(None),
                socket: Mutex::new(None),
            }),
            session: Mutex::new(None),
        }
    }

    /// Start a session thread connecting to `host:port`.
    ///
    /// A silent no-op while a session is still live: reconnecting after a
    /// dropped link works once the previous session thread has finished.
    pub fn connect(&self, host: &str, port: u16) {
        let mut session = self.session.lock().expect("session handle poisoned");
        if let Some(handle) = session.take() {
            if !handle.is_finished() {
                *session = Some(handle);
                debug!("connect ignored, session already live");
                return;
            }
            let _ = handle.join();
        }

        let shared = Arc::clone(&self.shared);
        let host = host.to_string();
        *session = Some(thread::spawn(move || session_loop(&shared, &host, port)));
    }

    /// Tear the link down and join all worker threads. Idempotent.
    pub fn disconnect(&self) {
        let mut session = self.session.lock().expect("session handle poisoned");
        if session.is_none() && self.shared.status.state() == LinkState::Disconnected {
            return;
        }

        self.shared.status.mark_dead();
        self.shared.status.set(LinkState::Closing);

        // Force-close the socket; this is the only cancellation path for a
        // receiver parked in a blocking read.
        if let Some(socket) = self.shared.socket.lock().expect("socket handle poisoned").take() {
            let _ = socket.shutdown(Shutdown::Both);
        }

        if let Some(handle) = session.take() {
            let _ = handle.join();
        }
        if self.shared.status.state() == LinkState::Closing {
            self.shared.status.set(LinkState::Disconnected);
        }
    }

    /// Enqueue an image upload. Names and blobs pair up positionally.
    pub fn send_images(&self, names: Vec<String>, blobs: Vec<Bytes>) -> Result<()> {
        if names.len() != blobs.len() {
            return Err(ClientError::LengthMismatch {
                names: names.len(),
                blobs: blobs.len(),
            });
        }
        self.shared.ops.push(Operation::SendImages { names, blobs });
        Ok(())
    }

    /// Enqueue a request for the named images.
    pub fn send_request_names(&self, names: Vec<String>) {
        self.shared.ops.push(Operation::RequestNames { names });
    }

    /// Enqueue a prompt-queue trigger.
    pub fn queue_prompt(&self) {
        self.shared.ops.push(Operation::QueuePrompt);
    }

    /// Snapshot of the link status.
    pub fn info(&self) -> ConnectionInfo {
        self.shared.status.info()
    }

    /// Whether the link is currently established.
    pub fn is_connected(&self) -> bool {
        self.shared.status.state() == LinkState::Connected
    }

    /// Number of operations not yet handed to the wire.
    pub fn pending_ops(&self) -> usize {
        self.shared.ops.len()
    }

    /// Whether the queue is empty and no operation is mid-write.
    ///
    /// Stronger than `pending_ops() == 0`, which reads zero as soon as the
    /// sender pops the last entry, possibly while its bytes are still going
    /// out. Use this before disconnecting after a batch of sends.
    pub fn is_idle(&self) -> bool {
        self.shared.ops.is_idle()
    }

    /// The bus this client publishes into.
    pub fn bus(&self) -> &Arc<BridgeBus> {
        &self.shared.bus
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Body of the session thread: connect, handshake, run both loops to
/// completion, then reset the shared state.
fn session_loop(shared: &Arc<Shared>, host: &str, port: u16) {
    shared.status.set(LinkState::Connecting);

    let stream = match open_stream(&shared.config, host, port) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(host, port, error = %err, "bridge connect failed");
            shared.status.set(LinkState::Disconnected);
            return;
        }
    };

    if let Err(err) = install_endpoints(shared, stream) {
        warn!(host, port, error = %err, "bridge setup failed");
        teardown(shared);
        return;
    }

    shared.status.set(LinkState::Handshaking);
    let mut reader = match handshake(shared) {
        Ok(reader) => reader,
        Err(err) => {
            warn!(host, port, error = %err, "bridge handshake failed");
            teardown(shared);
            return;
        }
    };

    shared.status.set(LinkState::Connected);
    shared.status.set_alive();
    info!(host, port, "bridge handshake complete");

    // One keep-alive right after the handshake, matching the peer's
    // expectation of traffic on a fresh link.
    if let Err(err) = write_opcode(shared, opcode::HEARTBEAT) {
        warn!(error = %err, "initial heartbeat failed");
        teardown(shared);
        return;
    }

    let sender = {
        let shared = Arc::clone(shared);
        thread::spawn(move || sender_loop(&shared))
    };
    let receiver = {
        let shared = Arc::clone(shared);
        thread::spawn(move || receiver_loop(&shared, &mut reader))
    };

    let _ = sender.join();
    let _ = receiver.join();

    teardown(shared);
    info!(host, port, "bridge disconnected");
}

fn open_stream(config: &ClientConfig, host: &str, port: u16) -> std::io::Result<TcpStream> {
    match config.connect_timeout {
        Some(timeout) => {
            let mut last_err = None;
            for addr in (host, port).to_socket_addrs()? {
                match TcpStream::connect_timeout(&addr, timeout) {
                    Ok(stream) => return Ok(stream),
                    Err(err) => last_err = Some(err),
                }
            }
            Err(last_err.unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "host resolved to no addresses",
                )
            }))
        }
        None => TcpStream::connect((host, port)),
    }
}

/// Split the stream into the shared writer, the shutdown handle, and the
/// receiver's reader. The reader is returned to the session thread rather
/// than shared: the receiver loop is its sole owner after the handshake.
fn install_endpoints(shared: &Shared, stream: TcpStream) -> Result<()> {
    let shutdown_handle = stream.try_clone()?;
    let frame_config = FrameConfig {
        max_payload_size: shared.config.max_payload_size,
    };
    *shared.writer.lock().expect("writer lock poisoned") =
        Some(FrameWriter::with_config(stream, frame_config));
    *shared.socket.lock().expect("socket handle poisoned") = Some(shutdown_handle);
    Ok(())
}

fn handshake(shared: &Shared) -> Result<FrameReader<TcpStream>> {
    let reader_stream = shared
        .socket
        .lock()
        .expect("socket handle poisoned")
        .as_ref()
        .ok_or(ClientError::NotConnected)?
        .try_clone()?;
    let frame_config = FrameConfig {
        max_payload_size: shared.config.max_payload_size,
    };
    let mut reader = FrameReader::with_config(reader_stream, frame_config);

    write_opcode(shared, opcode::HANDSHAKE)?;
    let answer = reader.read_u32()?;
    if answer != opcode::HANDSHAKE {
        return Err(ClientError::HandshakeFailed { opcode: answer });
    }
    Ok(reader)
}

fn teardown(shared: &Shared) {
    shared.status.mark_dead();
    shared.writer.lock().expect("writer lock poisoned").take();
    shared.socket.lock().expect("socket handle poisoned").take();
    shared.status.set(LinkState::Disconnected);
}

/// Sender loop: pop one operation at a time, serialize it onto the wire,
/// idle briefly when the queue is empty. A failed write ends the session;
/// popped entries are never retried.
fn sender_loop(shared: &Arc<Shared>) {
    while shared.status.is_alive() {
        match shared.ops.begin() {
            Some(op) => {
                if let Err(err) = send_operation(shared, &op) {
                    warn!(error = %err, "sender loop terminating");
                    shared.status.mark_dead();
                }
                shared.ops.complete();
            }
            None => thread::sleep(shared.config.sender_idle),
        }
    }
    debug!("sender loop exited");
}

fn send_operation(shared: &Shared, op: &Operation) -> Result<()> {
    let mut guard = shared.writer.lock().expect("writer lock poisoned");
    let writer = guard.as_mut().ok_or(ClientError::NotConnected)?;
    match op {
        Operation::SendImages { names, blobs } => {
            writer.write_u32(opcode::SEND_IMAGE)?;
            writer.write_u32(names.len() as u32)?;
            for (name, blob) in names.iter().zip(blobs) {
                writer.write_string(name)?;
                writer.write_blob(blob)?;
            }
        }
        Operation::RequestNames { names } => {
            writer.write_u32(opcode::REQUEST_IMAGE)?;
            writer.write_u32(names.len() as u32)?;
            for name in names {
                writer.write_string(name)?;
            }
        }
        Operation::QueuePrompt => {
            writer.write_u32(opcode::QUEUE_PROMPT)?;
        }
    }
    Ok(())
}

/// Receiver loop: block on the next opcode, dispatch, repeat. Inbound
/// frames are processed strictly in arrival order.
fn receiver_loop(shared: &Arc<Shared>, reader: &mut FrameReader<TcpStream>) {
    while shared.status.is_alive() {
        let code = match reader.read_u32() {
            Ok(code) => code,
            Err(err) => {
                // A read unblocked by disconnect() is expected noise.
                if shared.status.is_alive() {
                    warn!(error = %err, "receiver loop terminating");
                }
                shared.status.mark_dead();
                break;
            }
        };

        match code {
            opcode::HEARTBEAT => start_heartbeat(shared),
            opcode::RESPONSED_IMAGE => {
                if let Err(err) = receive_image(shared, reader) {
                    warn!(error = %err, "image frame decode failed");
                    shared.status.mark_dead();
                }
            }
            opcode::PROGRESS => {
                if let Err(err) = receive_progress(shared, reader) {
                    warn!(error = %err, "progress frame decode failed");
                    shared.status.mark_dead();
                }
            }
            opcode::OK => continue,
            opcode::ERROR => {
                warn!("peer reported a protocol error");
                shared.status.mark_dead();
            }
            other => {
                warn!(opcode = other, name = opcode_name(other), "unknown opcode");
                thread::sleep(shared.config.unknown_opcode_pause);
            }
        }
    }
    debug!("receiver loop exited");
}

fn receive_image(shared: &Shared, reader: &mut FrameReader<TcpStream>) -> Result<()> {
    let name = reader.read_string()?;
    let data = reader.read_blob()?;
    let status = reader.read_u32()?;
    if status == opcode::OK {
        debug!(name, bytes = data.len(), "image received");
        shared
            .bus
            .trigger(ON_IMAGE_RECEIVED, BridgeEvent::ImageReceived { name, data });
    } else {
        // Failed transfers are logged and skipped; the stream stays usable.
        warn!(name, status, "image transfer reported failure");
    }
    Ok(())
}

fn receive_progress(shared: &Shared, reader: &mut FrameReader<TcpStream>) -> Result<()> {
    let progress = reader.read_u32()?;
    let max = reader.read_u32()?;
    shared
        .bus
        .trigger(ON_PROGRESS, BridgeEvent::Progress { progress, max });
    Ok(())
}

/// One-shot heartbeat timer: wait out the idle window in small steps,
/// rechecking the alive flag, then emit one keep-alive. Overlapping timers
/// are tolerated; each self-terminates if the link drops mid-wait.
fn start_heartbeat(shared: &Arc<Shared>) {
    let shared = Arc::clone(shared);
    thread::spawn(move || {
        let mut waited = Duration::ZERO;
        while shared.status.is_alive() {
            thread::sleep(shared.config.heartbeat_step);
            waited += shared.config.heartbeat_step;
            if !shared.status.is_alive() {
                return;
            }
            if waited >= shared.config.heartbeat_window {
                if let Err(err) = write_opcode(&shared, opcode::HEARTBEAT) {
                    warn!(error = %err, "heartbeat send failed");
                    shared.status.mark_dead();
                }
                return;
            }
        }
    });
}

fn write_opcode(shared: &Shared, code: u32) -> Result<()> {
    let mut guard = shared.writer.lock().expect("writer lock poisoned");
    let writer = guard.as_mut().ok_or(ClientError::NotConnected)?;
    writer.write_u32(code)?;
    Ok(())
}
