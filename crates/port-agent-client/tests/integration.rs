//! Integration tests exercising a [`Client`] against a fake port agent.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use packet::{Packet, PacketType};
use port_agent_client::{Callbacks, Client, Config};
use test_support::{CommandRecorder, FakePortAgent, encode_frame, write_raw};

fn recv_within(rx: &mpsc::Receiver<Packet>, timeout: Duration) -> Packet {
    rx.recv_timeout(timeout)
        .expect("expected a packet to be dispatched within the timeout")
}

#[test]
fn clean_frame_delivers_on_data_and_on_raw() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();

    let (data_tx, data_rx) = mpsc::channel();
    let (raw_tx, raw_rx) = mpsc::channel();
    let callbacks = Callbacks::new()
        .on_data(move |packet| {
            let _ = data_tx.send(packet.clone());
        })
        .on_raw(move |packet| {
            let _ = raw_tx.send(packet.clone());
        });

    let client = Client::new(config, callbacks);
    client.init_comms().expect("connect to fake port agent");

    let mut stream = agent.accept();
    write_raw(&mut stream, &encode_frame(PacketType::DataFromInstrument, b"hello"));

    let data_packet = recv_within(&data_rx, Duration::from_secs(2));
    assert_eq!(data_packet.payload(), b"hello");
    assert!(
        data_packet.is_valid(),
        "client must verify the checksum before handing the packet to on_data"
    );
    let raw_packet = recv_within(&raw_rx, Duration::from_secs(2));
    assert_eq!(raw_packet.payload(), b"hello");
    assert!(
        raw_packet.is_valid(),
        "client must verify the checksum before handing the packet to on_raw"
    );

    client.stop_comms();
}

#[test]
fn fragmented_frame_still_assembles_into_one_packet() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();

    let (data_tx, data_rx) = mpsc::channel();
    let callbacks = Callbacks::new().on_data(move |packet| {
        let _ = data_tx.send(packet.clone());
    });

    let client = Client::new(config, callbacks);
    client.init_comms().expect("connect to fake port agent");

    let mut stream = agent.accept();
    let frame = encode_frame(PacketType::DataFromInstrument, b"fragmented-payload");
    let (header, payload) = frame.split_at(16);

    write_raw(&mut stream, header);
    thread::sleep(Duration::from_millis(150));
    write_raw(&mut stream, payload);

    let packet = recv_within(&data_rx, Duration::from_secs(2));
    assert_eq!(packet.payload(), b"fragmented-payload");

    client.stop_comms();
}

#[test]
fn coalesced_frames_are_each_dispatched_separately() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();

    let (data_tx, data_rx) = mpsc::channel();
    let callbacks = Callbacks::new().on_data(move |packet| {
        let _ = data_tx.send(packet.clone());
    });

    let client = Client::new(config, callbacks);
    client.init_comms().expect("connect to fake port agent");

    let mut stream = agent.accept();
    let mut coalesced = encode_frame(PacketType::DataFromInstrument, b"first");
    coalesced.extend(encode_frame(PacketType::DataFromInstrument, b"second"));
    write_raw(&mut stream, &coalesced);

    let first = recv_within(&data_rx, Duration::from_secs(2));
    let second = recv_within(&data_rx, Duration::from_secs(2));
    assert_eq!(first.payload(), b"first");
    assert_eq!(second.payload(), b"second");

    client.stop_comms();
}

#[test]
fn heartbeat_packets_do_not_reach_on_data_or_on_raw() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();

    let raw_hits = Arc::new(Mutex::new(0u32));
    let raw_hits2 = Arc::clone(&raw_hits);
    let callbacks = Callbacks::new().on_raw(move |_packet| {
        *raw_hits2.lock().unwrap() += 1;
    });

    let client = Client::new(config, callbacks);
    client.init_comms().expect("connect to fake port agent");

    let mut stream = agent.accept();
    write_raw(&mut stream, &encode_frame(PacketType::Heartbeat, &[]));
    thread::sleep(Duration::from_millis(200));

    assert_eq!(*raw_hits.lock().unwrap(), 0);
    client.stop_comms();
}

#[test]
fn missed_heartbeats_surface_a_timeout_error() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();

    let (error_tx, error_rx) = mpsc::channel();
    let callbacks = Callbacks::new().on_error(move |message| {
        let _ = error_tx.send(message.to_string());
    });

    let client = Client::new(config, callbacks);
    // No command port is configured, so this only updates the local
    // heartbeat settings used by the next init_comms; the remote-notify half
    // fails and is ignored, which is fine for this test.
    client.set_heartbeat_interval(1, 1).unwrap_or(());
    client.init_comms().expect("connect to fake port agent");
    let _stream = agent.accept();

    // No heartbeats are sent; with a 1s interval (+1s fudge) and a
    // missed-beat ceiling of 1 this should surface within a few seconds,
    // even though the client's own bounded recovery attempts a reconnect in
    // between (which will itself fail since nothing is listening for it).
    let message = error_rx
        .recv_timeout(Duration::from_secs(6))
        .expect("expected a heartbeat timeout to surface");
    assert!(message.contains("heartbeat"), "unexpected message: {message}");
}

#[test]
fn send_forwards_bytes_to_the_data_socket() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();
    let client = Client::new(config, Callbacks::new());

    client.init_comms().expect("connect to fake port agent");
    let mut stream = agent.accept();

    let sent = client.send(b"to-instrument");
    assert_eq!(sent, b"to-instrument".len());

    let mut buf = [0u8; 32];
    stream.set_nonblocking(false).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let n = std::io::Read::read(&mut stream, &mut buf).expect("read forwarded bytes");
    assert_eq!(&buf[..n], b"to-instrument");

    client.stop_comms();
}

#[test]
fn init_comms_pushes_the_initial_heartbeat_interval_over_the_command_port() {
    let agent = FakePortAgent::bind();
    let commands = CommandRecorder::bind();
    let config = Config::builder("127.0.0.1", agent.port())
        .command_port(commands.port())
        .build();
    let client = Client::new(config, Callbacks::new());

    client.init_comms().expect("connect to fake port agent");
    let _stream = agent.accept();

    wait_for_commands(&commands, 1);
    let received = commands.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0], "heartbeat_interval 0");

    client.stop_comms();
}

#[test]
fn set_heartbeat_interval_writes_the_exact_command_string() {
    let agent = FakePortAgent::bind();
    let commands = CommandRecorder::bind();
    let config = Config::builder("127.0.0.1", agent.port())
        .command_port(commands.port())
        .build();
    let client = Client::new(config, Callbacks::new());

    client.init_comms().expect("connect to fake port agent");
    let _stream = agent.accept();
    wait_for_commands(&commands, 1); // the initial push from init_comms

    client
        .set_heartbeat_interval(5, 2)
        .expect("set heartbeat interval over command port");
    wait_for_commands(&commands, 2);

    let received = commands.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[1], "heartbeat_interval 5");

    client.stop_comms();
}

#[test]
fn send_break_writes_the_literal_break_command_on_the_command_port() {
    let agent = FakePortAgent::bind();
    let commands = CommandRecorder::bind();
    let config = Config::builder("127.0.0.1", agent.port())
        .command_port(commands.port())
        .build();
    let client = Client::new(config, Callbacks::new());

    client.init_comms().expect("connect to fake port agent");
    let _stream = agent.accept();
    wait_for_commands(&commands, 1); // the initial push from init_comms

    client.send_break().expect("send break over command port");
    wait_for_commands(&commands, 2);

    let received = commands.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[1], "break");

    client.stop_comms();
}

fn wait_for_commands(commands: &CommandRecorder, count: usize) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while commands.received().len() < count && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn closed_connection_triggers_exactly_one_reconnect_attempt() {
    let agent = FakePortAgent::bind();
    let config = Config::builder("127.0.0.1", agent.port()).build();

    let (error_tx, error_rx) = mpsc::channel();
    let callbacks = Callbacks::new().on_error(move |message| {
        let _ = error_tx.send(message.to_string());
    });

    let client = Client::new(config, callbacks);
    client.init_comms().expect("connect to fake port agent");

    // First connection: accept then immediately close it from the agent side.
    let first = agent.accept();
    drop(first);

    // Bounded recovery means the client reconnects exactly once; the fake
    // agent must see a second incoming connection.
    let second = agent.accept();
    drop(second);

    // The second closed connection exhausts the recovery budget and should
    // surface to on_error.
    let message = error_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("expected the second closed connection to surface");
    assert!(message.contains("closed"), "unexpected message: {message}");
}
