//! Session tests against a scripted mock bridge server.

use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use renderlink_client::opcode;
use renderlink_client::{BridgeBus, BridgeClient, BridgeEvent, ClientConfig, ON_IMAGE_RECEIVED, ON_PROGRESS};
use renderlink_frame::{FrameReader, FrameWriter};

fn fast_config() -> ClientConfig {
    ClientConfig {
        connect_timeout: Some(Duration::from_secs(1)),
        sender_idle: Duration::from_millis(5),
        heartbeat_step: Duration::from_millis(5),
        heartbeat_window: Duration::from_millis(25),
        unknown_opcode_pause: Duration::from_millis(20),
        ..ClientConfig::default()
    }
}

fn wait_for(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    pred()
}

fn split(stream: TcpStream) -> (FrameReader<TcpStream>, FrameWriter<TcpStream>) {
    let reader = FrameReader::new(stream.try_clone().expect("clone mock stream"));
    (reader, FrameWriter::new(stream))
}

fn accept_and_handshake(listener: &TcpListener) -> (FrameReader<TcpStream>, FrameWriter<TcpStream>) {
    let (stream, _) = listener.accept().expect("mock accept");
    let (mut reader, mut writer) = split(stream);
    assert_eq!(reader.read_u32().unwrap(), opcode::HANDSHAKE);
    writer.write_u32(opcode::HANDSHAKE).unwrap();
    // The client emits one keep-alive right after a successful handshake.
    assert_eq!(reader.read_u32().unwrap(), opcode::HEARTBEAT);
    (reader, writer)
}

#[test]
fn operations_arrive_in_fifo_order_with_exact_wire_shapes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, _writer) = accept_and_handshake(&listener);

        assert_eq!(reader.read_u32().unwrap(), opcode::SEND_IMAGE);
        assert_eq!(reader.read_u32().unwrap(), 1);
        assert_eq!(reader.read_string().unwrap(), "a");
        assert_eq!(reader.read_blob().unwrap().as_ref(), &[0x00, 0x01]);

        assert_eq!(reader.read_u32().unwrap(), opcode::QUEUE_PROMPT);

        assert_eq!(reader.read_u32().unwrap(), opcode::REQUEST_IMAGE);
        assert_eq!(reader.read_u32().unwrap(), 2);
        assert_eq!(reader.read_string().unwrap(), "depth");
        assert_eq!(reader.read_string().unwrap(), "normal");
    });

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());

    // Enqueued before the link is even up; the sender drains them in order.
    client
        .send_images(vec!["a".into()], vec![Bytes::from_static(&[0x00, 0x01])])
        .unwrap();
    client.queue_prompt();
    client.send_request_names(vec!["depth".into(), "normal".into()]);

    client.connect("127.0.0.1", port);
    assert!(wait_for(Duration::from_secs(2), || client.is_connected()));
    assert!(wait_for(Duration::from_secs(2), || client.pending_ops() == 0));

    server.join().unwrap();
    client.disconnect();
    assert!(!client.is_connected());
}

#[test]
fn queue_stays_busy_until_the_last_write_finishes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    // Bigger than any socket buffer pair, so the write must block until the
    // server starts consuming.
    let payload_len = 32 * 1024 * 1024;

    let server = thread::spawn(move || {
        let (mut reader, _writer) = accept_and_handshake(&listener);
        // Let the upload pile up against full buffers before reading it.
        thread::sleep(Duration::from_millis(300));
        assert_eq!(reader.read_u32().unwrap(), opcode::SEND_IMAGE);
        assert_eq!(reader.read_u32().unwrap(), 1);
        assert_eq!(reader.read_string().unwrap(), "huge");
        assert_eq!(reader.read_blob().unwrap().len(), payload_len);
    });

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());
    client.connect("127.0.0.1", port);
    assert!(wait_for(Duration::from_secs(2), || client.is_connected()));

    client
        .send_images(vec!["huge".into()], vec![Bytes::from(vec![7u8; payload_len])])
        .unwrap();

    // The queue count drops as soon as the sender pops the entry, but the
    // client is not idle until the blob is fully written.
    assert!(wait_for(Duration::from_secs(2), || client.pending_ops() == 0));
    assert!(!client.is_idle());

    assert!(wait_for(Duration::from_secs(10), || client.is_idle()));
    server.join().unwrap();
    client.disconnect();
}

#[test]
fn mismatched_image_lengths_are_rejected_before_enqueue() {
    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::new(bus);

    let err = client
        .send_images(vec!["a".into(), "b".into()], vec![Bytes::new()])
        .unwrap_err();
    assert!(matches!(
        err,
        renderlink_client::ClientError::LengthMismatch { names: 2, blobs: 1 }
    ));
    assert_eq!(client.pending_ops(), 0);
}

#[test]
fn inbound_image_and_progress_reach_the_bus() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, mut writer) = accept_and_handshake(&listener);

        writer.write_u32(opcode::RESPONSED_IMAGE).unwrap();
        writer.write_string("beauty").unwrap();
        writer.write_blob(&[1, 2, 3]).unwrap();
        writer.write_u32(opcode::OK).unwrap();

        writer.write_u32(opcode::PROGRESS).unwrap();
        writer.write_u32(3).unwrap();
        writer.write_u32(10).unwrap();

        // Hold the link open until the client disconnects.
        assert!(reader.read_u32().is_err());
    });

    let bus = Arc::new(BridgeBus::new());
    let images: Arc<Mutex<Vec<(String, Bytes)>>> = Arc::default();
    let progress: Arc<Mutex<Vec<(u32, u32)>>> = Arc::default();

    let sink = Arc::clone(&images);
    bus.add(ON_IMAGE_RECEIVED, None, move |_, event| {
        if let BridgeEvent::ImageReceived { name, data } = event {
            sink.lock().unwrap().push((name.clone(), data.clone()));
        }
    });
    let sink = Arc::clone(&progress);
    bus.add(ON_PROGRESS, None, move |_, event| {
        if let BridgeEvent::Progress { progress, max } = event {
            sink.lock().unwrap().push((*progress, *max));
        }
    });

    let client = BridgeClient::with_config(Arc::clone(&bus), fast_config());
    client.connect("127.0.0.1", port);

    assert!(wait_for(Duration::from_secs(2), || {
        bus.dispatch();
        !images.lock().unwrap().is_empty() && !progress.lock().unwrap().is_empty()
    }));

    assert_eq!(
        images.lock().unwrap().as_slice(),
        &[("beauty".to_string(), Bytes::from_static(&[1, 2, 3]))]
    );
    assert_eq!(progress.lock().unwrap().as_slice(), &[(3, 10)]);

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn failed_image_status_is_skipped_without_killing_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, mut writer) = accept_and_handshake(&listener);

        writer.write_u32(opcode::RESPONSED_IMAGE).unwrap();
        writer.write_string("broken").unwrap();
        writer.write_blob(&[9]).unwrap();
        writer.write_u32(opcode::ERROR).unwrap();

        // A later frame still gets through.
        writer.write_u32(opcode::PROGRESS).unwrap();
        writer.write_u32(1).unwrap();
        writer.write_u32(2).unwrap();

        assert!(reader.read_u32().is_err());
    });

    let bus = Arc::new(BridgeBus::new());
    let images: Arc<Mutex<Vec<String>>> = Arc::default();
    let progress: Arc<Mutex<Vec<(u32, u32)>>> = Arc::default();

    let sink = Arc::clone(&images);
    bus.add(ON_IMAGE_RECEIVED, None, move |_, event| {
        if let BridgeEvent::ImageReceived { name, .. } = event {
            sink.lock().unwrap().push(name.clone());
        }
    });
    let sink = Arc::clone(&progress);
    bus.add(ON_PROGRESS, None, move |_, event| {
        if let BridgeEvent::Progress { progress, max } = event {
            sink.lock().unwrap().push((*progress, *max));
        }
    });

    let client = BridgeClient::with_config(Arc::clone(&bus), fast_config());
    client.connect("127.0.0.1", port);

    assert!(wait_for(Duration::from_secs(2), || {
        bus.dispatch();
        !progress.lock().unwrap().is_empty()
    }));
    assert!(images.lock().unwrap().is_empty());
    assert!(client.is_connected());

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn unknown_opcode_pauses_but_does_not_terminate() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, mut writer) = accept_and_handshake(&listener);

        writer.write_u32(0xBEEF).unwrap();
        writer.write_u32(opcode::PROGRESS).unwrap();
        writer.write_u32(7).unwrap();
        writer.write_u32(7).unwrap();

        assert!(reader.read_u32().is_err());
    });

    let bus = Arc::new(BridgeBus::new());
    let progress: Arc<Mutex<Vec<(u32, u32)>>> = Arc::default();
    let sink = Arc::clone(&progress);
    bus.add(ON_PROGRESS, None, move |_, event| {
        if let BridgeEvent::Progress { progress, max } = event {
            sink.lock().unwrap().push((*progress, *max));
        }
    });

    let client = BridgeClient::with_config(Arc::clone(&bus), fast_config());
    client.connect("127.0.0.1", port);

    assert!(wait_for(Duration::from_secs(2), || {
        bus.dispatch();
        !progress.lock().unwrap().is_empty()
    }));
    assert!(client.is_connected());

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn handshake_mismatch_never_starts_the_loops() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let (mut reader, mut writer) = split(stream);
        assert_eq!(reader.read_u32().unwrap(), opcode::HANDSHAKE);
        writer.write_u32(999).unwrap();
        // The client aborts the attempt and closes the socket.
        assert!(reader.read_u32().is_err());
    });

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());
    client.connect("127.0.0.1", port);

    server.join().unwrap();
    assert!(wait_for(Duration::from_secs(2), || {
        let info = client.info();
        !info.is_connected && !info.is_connecting && !info.is_closing
    }));

    // Idempotent when nothing is connected.
    client.disconnect();
    client.disconnect();
}

#[test]
fn connect_failure_leaves_disconnected() {
    // Grab a port with no listener behind it.
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());
    client.connect("127.0.0.1", port);

    assert!(wait_for(Duration::from_secs(3), || {
        let info = client.info();
        !info.is_connected && !info.is_connecting
    }));
    client.disconnect();
}

#[test]
fn connect_is_a_noop_while_a_session_is_live() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, _writer) = accept_and_handshake(&listener);
        assert!(reader.read_u32().is_err());
        // No second connection ever arrives; accept() would block forever.
    });

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());
    client.connect("127.0.0.1", port);
    assert!(wait_for(Duration::from_secs(2), || client.is_connected()));

    client.connect("127.0.0.1", port);
    thread::sleep(Duration::from_millis(50));
    assert!(client.is_connected());

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn error_opcode_tears_down_and_reconnect_works() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        // First session: peer reports a fatal error.
        let (_reader, mut writer) = accept_and_handshake(&listener);
        writer.write_u32(opcode::ERROR).unwrap();

        // Second session: a clean handshake succeeds again.
        let (mut reader, _writer) = accept_and_handshake(&listener);
        assert!(reader.read_u32().is_err());
    });

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());
    client.connect("127.0.0.1", port);

    assert!(wait_for(Duration::from_secs(2), || {
        let info = client.info();
        !info.is_connected && !info.is_connecting
    }));

    // Recovery is an explicit host-initiated connect.
    client.connect("127.0.0.1", port);
    assert!(wait_for(Duration::from_secs(2), || client.is_connected()));

    client.disconnect();
    server.join().unwrap();
}

#[test]
fn heartbeat_answers_after_the_idle_window() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, mut writer) = accept_and_handshake(&listener);

        writer.write_u32(opcode::HEARTBEAT).unwrap();
        // Exactly one keep-alive comes back once the window elapses.
        assert_eq!(reader.read_u32().unwrap(), opcode::HEARTBEAT);

        reader
            .get_ref()
            .set_read_timeout(Some(Duration::from_millis(150)))
            .unwrap();
        assert!(reader.read_u32().is_err());
    });

    let bus = Arc::new(BridgeBus::new());
    let client = BridgeClient::with_config(bus, fast_config());
    client.connect("127.0.0.1", port);
    assert!(wait_for(Duration::from_secs(2), || client.is_connected()));

    server.join().unwrap();
    client.disconnect();
}

#[test]
fn heartbeat_is_suppressed_when_the_link_drops_mid_wait() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut reader, mut writer) = accept_and_handshake(&listener);
        writer.write_u32(opcode::HEARTBEAT).unwrap();
        // The client disconnects well inside the window: the next thing the
        // server sees is EOF, never a keep-alive frame.
        assert!(matches!(
            reader.read_u32(),
            Err(renderlink_frame::FrameError::ConnectionClosed)
        ));
    });

    let bus = Arc::new(BridgeBus::new());
    let config = ClientConfig {
        heartbeat_step: Duration::from_millis(20),
        heartbeat_window: Duration::from_millis(500),
        ..fast_config()
    };
    let client = BridgeClient::with_config(bus, config);
    client.connect("127.0.0.1", port);
    assert!(wait_for(Duration::from_secs(2), || client.is_connected()));

    thread::sleep(Duration::from_millis(30));
    client.disconnect();
    server.join().unwrap();
}
