//! Socket-level tests: a loopback TCP listener stands in for the
//! controller, the real client drives the handshake over it.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use torqlink_client::{Client, ClientConfig, Event};
use torqlink_frame::{decode_step, encode_frame_raw, extend_stripped, Decoded, Frame};

/// Blocking frame read on the controller side of the pair.
fn read_frame(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<Frame> {
    loop {
        match decode_step(buf) {
            Decoded::Frame(frame) => return Some(frame),
            Decoded::Defect(_) | Decoded::GarbledMid { .. } => continue,
            Decoded::Incomplete => {
                let mut chunk = [0u8; 1024];
                let n = stream.read(&mut chunk).ok()?;
                if n == 0 {
                    return None;
                }
                extend_stripped(buf, &chunk[..n]);
            }
        }
    }
}

fn write_frame(stream: &mut TcpStream, mid: u16, payload: &[u8]) {
    let mut wire = BytesMut::new();
    encode_frame_raw(mid, 1, true, 1, 1, payload, &mut wire).unwrap();
    stream.write_all(&wire).unwrap();
    stream.flush().unwrap();
}

fn client_for(port: u16, auto_reconnect: bool) -> (Client, mpsc::Receiver<Event>) {
    let mut config = ClientConfig::new("127.0.0.1");
    config.port = port;
    config.auto_reconnect = auto_reconnect;
    let client = Client::new(config);

    let (tx, rx) = mpsc::channel();
    client.on(move |event| {
        let _ = tx.send(event.clone());
    });
    (client, rx)
}

fn wait_for(rx: &mpsc::Receiver<Event>, mut predicate: impl FnMut(&Event) -> bool) -> Event {
    let deadline = Duration::from_secs(5);
    loop {
        let event = rx.recv_timeout(deadline).expect("event before timeout");
        if predicate(&event) {
            return event;
        }
    }
}

#[test]
fn handshake_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let controller = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = BytesMut::new();

        let comm_start = read_frame(&mut stream, &mut buf).expect("comm start");
        assert_eq!(comm_start.mid, 1);
        write_frame(&mut stream, 3, b"02");

        // The client auto-subscribes after the ack.
        let mut seen = Vec::new();
        while seen.len() < 2 {
            let frame = read_frame(&mut stream, &mut buf).expect("subscription");
            write_frame(&mut stream, 5, format!("{:04}", frame.mid).as_bytes());
            seen.push(frame.mid);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![60, 70]);
    });

    let (client, rx) = client_for(port, false);
    client.connect().unwrap();

    wait_for(&rx, |e| matches!(e, Event::Connected));
    let established = wait_for(&rx, |e| matches!(e, Event::LinkEstablished { .. }));
    assert_eq!(established, Event::LinkEstablished { revision: 2 });

    // Both subscription acks must land before checking the snapshot.
    let (mut results_acked, mut alarms_acked) = (false, false);
    while !(results_acked && alarms_acked) {
        match wait_for(&rx, |e| matches!(e, Event::CommandSuccess { .. })) {
            Event::CommandSuccess { mid: 60, .. } => results_acked = true,
            Event::CommandSuccess { mid: 70, .. } => alarms_acked = true,
            _ => {}
        }
    }

    controller.join().unwrap();

    assert!(client.is_ready());
    let state = client.get_state();
    assert_eq!(state.protocol.revision, 2);
    assert!(state.protocol.subscriptions.tightening_results);
    assert!(state.protocol.subscriptions.alarms);
}

#[test]
fn explicit_disconnect_sends_comm_stop() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let controller = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = BytesMut::new();

        let comm_start = read_frame(&mut stream, &mut buf).expect("comm start");
        assert_eq!(comm_start.mid, 1);
        write_frame(&mut stream, 3, b"01");

        // Skip subscriptions, wait for the stop.
        loop {
            match read_frame(&mut stream, &mut buf) {
                Some(frame) if frame.mid == 2 => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    });

    let (client, rx) = client_for(port, false);
    client.connect().unwrap();
    wait_for(&rx, |e| matches!(e, Event::LinkEstablished { .. }));

    client.disconnect();
    wait_for(&rx, |e| matches!(e, Event::Disconnected));
    assert!(!client.is_connected());

    assert!(controller.join().unwrap(), "controller saw MID 0002");
}

#[test]
fn dropped_socket_emits_disconnected() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let controller = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = BytesMut::new();
        let _ = read_frame(&mut stream, &mut buf);
        // Drop without answering: the client sees EOF.
    });

    let (client, rx) = client_for(port, false);
    client.connect().unwrap();
    wait_for(&rx, |e| matches!(e, Event::Connected));

    controller.join().unwrap();
    wait_for(&rx, |e| matches!(e, Event::Disconnected));
    assert!(!client.is_connected());
}
