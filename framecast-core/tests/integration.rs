//! Integration tests: handshake, broadcast and viewer lifecycle over real
//! TCP connections on localhost.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use framecast_core::geometry::{FrameSize, GeometryPlan};
use framecast_core::pixel;
use framecast_core::{
    Dimensions, FrameGeometry, FrameSink, RelaySink, ScaleConfig, SinkState, SourceGeometry,
    StreamError, StreamSettings, StreamViewer, StreamingSession, TransportConfig,
    TransportServer,
};

// ── Helpers ──────────────────────────────────────────────────────

fn loopback_config(max_clients: usize) -> TransportConfig {
    TransportConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        max_clients,
    }
}

fn preamble(width: u32, height: u32) -> FrameGeometry {
    let size = FrameSize::new(width, height);
    FrameGeometry::from_plan(
        &GeometryPlan {
            render: size,
            output: size,
            rotated: false,
            flipped: false,
        },
        false,
    )
    .unwrap()
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

/// Poll until the server has registered `expected` viewers.
fn poll_until_clients(server: &mut TransportServer, expected: usize) {
    for _ in 0..500 {
        server.poll_once().unwrap();
        if server.client_count() == expected {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!(
        "expected {expected} clients, have {}",
        server.client_count()
    );
}

fn read_handshake(stream: &mut TcpStream) -> FrameGeometry {
    let mut buf = [0u8; FrameGeometry::SIZE];
    stream.read_exact(&mut buf).unwrap();
    FrameGeometry::decode(&buf).unwrap()
}

/// Whether the server closed `stream` without sending anything.
fn closed_without_data(stream: &mut TcpStream) -> bool {
    let mut buf = [0u8; 1];
    match stream.read(&mut buf) {
        Ok(0) => true,
        Err(e) => e.kind() == ErrorKind::ConnectionReset,
        Ok(_) => false,
    }
}

// ── Direct transport ─────────────────────────────────────────────

#[test]
fn sixth_viewer_is_closed_without_handshake() {
    let geometry = preamble(4, 2);
    let mut server = TransportServer::new(loopback_config(5));
    server.start(geometry).unwrap();
    let addr = server.local_addr().unwrap();

    let mut viewers = Vec::new();
    for n in 1..=5 {
        viewers.push(connect(addr));
        poll_until_clients(&mut server, n);
    }
    for viewer in &mut viewers {
        let handshake = read_handshake(viewer);
        assert_eq!(handshake, geometry);
        assert_eq!(
            handshake.total_bytes,
            handshake.stride_bytes * handshake.height
        );
    }

    let mut extra = connect(addr);
    for _ in 0..20 {
        server.poll_once().unwrap();
        thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(server.client_count(), 5);

    let frame = [0x5au8; 16];
    let report = server.broadcast(&frame);
    assert_eq!(report.delivered, 5);
    assert_eq!(report.dropped, 0);

    for viewer in &mut viewers {
        let mut got = [0u8; 16];
        viewer.read_exact(&mut got).unwrap();
        assert_eq!(got, frame);
    }
    assert!(closed_without_data(&mut extra));

    server.stop();
    assert_eq!(server.state(), SinkState::Stopped);
    for viewer in &mut viewers {
        assert!(closed_without_data(viewer));
    }
}

#[test]
fn departed_viewer_is_dropped_and_others_continue() {
    let mut server = TransportServer::new(loopback_config(5));
    server.start(preamble(4, 2)).unwrap();
    let addr = server.local_addr().unwrap();

    let mut stay = connect(addr);
    poll_until_clients(&mut server, 1);
    let leave = connect(addr);
    poll_until_clients(&mut server, 2);
    read_handshake(&mut stay);
    drop(leave);

    // The first write after the peer closes may still be buffered locally;
    // the reset reported afterwards drops the client.
    let mut dropped = 0;
    let mut frames = 0;
    for i in 0..200u8 {
        let report = server.broadcast(&[i; 16]);
        frames += 1;
        dropped += report.dropped;
        if report.dropped > 0 {
            assert_eq!(server.client_count(), 1);
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(dropped, 1);
    assert_eq!(server.client_count(), 1);

    // The remaining viewer received every frame, in order.
    for i in 0..frames {
        let mut got = [0u8; 16];
        stay.read_exact(&mut got).unwrap();
        assert_eq!(got, [i as u8; 16]);
    }

    let report = server.broadcast(&[0xee; 16]);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, 0);
}

// ── Session end to end ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn viewer_receives_downsampled_frames() {
    let colour = pixel::pack(200, 100, 40);
    let running = Arc::new(AtomicBool::new(true));
    let (addr_tx, addr_rx) = tokio::sync::oneshot::channel();

    let emulation = thread::spawn({
        let running = Arc::clone(&running);
        move || {
            let settings = StreamSettings {
                scale: ScaleConfig::shortest_x_aspect(Dimensions {
                    width: 320,
                    height: 240,
                }),
                ..StreamSettings::default()
            };
            let sink = Box::new(TransportServer::new(loopback_config(5)));
            let mut session = StreamingSession::new(settings, sink);
            session
                .configure(SourceGeometry::landscape(384, 224, 4, 3))
                .unwrap();
            let _ = addr_tx.send(session.local_addr().unwrap());

            let mut max_clients = 0;
            while running.load(Ordering::SeqCst) {
                session.render_pixels_mut().fill(colour);
                let report = session.frame_produced();
                assert!(report.streaming);
                max_clients = max_clients.max(report.clients);
                thread::sleep(Duration::from_millis(5));
            }
            session.stop();
            max_clients
        }
    });

    let addr = addr_rx.await.unwrap();
    let mut viewer = tokio::time::timeout(Duration::from_secs(5), StreamViewer::connect(addr))
        .await
        .expect("timeout")
        .unwrap();

    let geometry = *viewer.geometry();
    assert_eq!((geometry.width, geometry.height), (298, 224));
    assert_eq!(geometry.stride_bytes, 298 * 2);
    assert_eq!(geometry.total_bytes, geometry.stride_bytes * geometry.height);

    for _ in 0..3 {
        let frame = tokio::time::timeout(Duration::from_secs(5), viewer.next_frame())
            .await
            .expect("timeout")
            .unwrap()
            .expect("stream ended early");
        assert_eq!(frame.len(), geometry.frame_len());
        assert!(
            frame
                .chunks_exact(2)
                .all(|p| u16::from_ne_bytes([p[0], p[1]]) == colour)
        );
    }

    running.store(false, Ordering::SeqCst);
    let max_clients = tokio::task::spawn_blocking(move || emulation.join().unwrap())
        .await
        .unwrap();
    assert_eq!(max_clients, 1);

    // The server closed the connection on stop.
    let tail = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match viewer.next_frame().await {
                Ok(Some(_)) => continue,
                other => return other,
            }
        }
    })
    .await
    .expect("timeout");
    assert!(matches!(tail, Ok(None) | Err(StreamError::Io(_))));
}

// ── Relay transport ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dead_relay_stops_streaming_but_not_frames() {
    let addr = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap()
    };

    let sink = Box::new(RelaySink::from_current(addr).unwrap());
    let mut session = StreamingSession::new(StreamSettings::default(), sink);
    session
        .configure(SourceGeometry::landscape(32, 16, 2, 1))
        .unwrap();
    assert!(session.is_streaming());

    for _ in 0..250 {
        session.frame_produced();
        if !session.is_streaming() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!session.is_streaming());
    assert_eq!(session.sink_state(), SinkState::Stopped);

    // The frame loop keeps going; the session just has no sink.
    let report = session.frame_produced();
    assert!(!report.streaming);
    assert_eq!(session.render_buffer_mut().len(), 32 * 16 * 2);
}
