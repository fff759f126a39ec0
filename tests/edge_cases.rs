#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the header codec and the server's failure paths:
//! boundary values, corrupted headers, and misbehaving peers.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framewire::config::ServerConfig;
use framewire::core::header::{
    decode_header, encode_header, HEADER_FLAG, LENGTH_BITS, MAX_FRAME_LEN,
};
use framewire::error::ProtocolError;
use framewire::{BlockingClient, Dispatcher, Handler};

// ============================================================================
// HEADER CODEC EDGE CASES
// ============================================================================

#[test]
fn test_header_roundtrip_across_domain() {
    let lengths = [0u32, 1, 2, 0xFF, 0x1000, 0x12_3456, MAX_FRAME_LEN - 1, MAX_FRAME_LEN];
    for &len in &lengths {
        for tag in 0u8..=3 {
            let (decoded_len, decoded_tag) =
                decode_header(encode_header(len, tag)).expect("valid header should decode");
            assert_eq!(decoded_len, len);
            assert_eq!(decoded_tag, tag);
        }
    }
}

#[test]
fn test_flag_rejection_regardless_of_other_bits() {
    // Every flag byte except 0xE5 must be rejected, whatever the length and
    // tag bits say.
    for flag in 0u32..=0xFF {
        if flag == HEADER_FLAG {
            continue;
        }
        let header = (3 << 30) | (flag << LENGTH_BITS) | 0x12_3456;
        assert!(
            matches!(decode_header(header), Err(ProtocolError::InvalidHeader)),
            "flag {flag:#04x} must not decode"
        );
    }
}

#[test]
fn test_length_masking_boundary() {
    let (len, _) = decode_header(encode_header(MAX_FRAME_LEN, 0)).expect("boundary decodes");
    assert_eq!(len, MAX_FRAME_LEN);
}

#[test]
#[should_panic(expected = "exceeds the 22-bit field")]
fn test_encode_over_limit_panics() {
    // 0x400000 is out of contract: the encoder rejects it rather than
    // silently truncating into a valid-looking header.
    let _ = encode_header(MAX_FRAME_LEN + 1, 0);
}

#[test]
#[should_panic(expected = "exceeds the 2-bit field")]
fn test_encode_bad_tag_panics() {
    let _ = encode_header(0, 4);
}

#[test]
fn test_zero_length_header() {
    let (len, tag) = decode_header(encode_header(0, 0)).expect("empty frame header decodes");
    assert_eq!(len, 0);
    assert_eq!(tag, 0);
}

// ============================================================================
// SERVER FAILURE PATHS
// ============================================================================

async fn start_echo_server(counter: Arc<AtomicUsize>) -> (Dispatcher, std::net::SocketAddr) {
    let config = ServerConfig {
        address: "127.0.0.1:0".to_string(),
        worker_threads: 2,
        ..ServerConfig::default()
    };
    let handler = Handler::new().on_message(move |reply, msg| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = reply.write(msg);
    });
    let mut server = Dispatcher::new(config, handler);
    server.start().await.expect("bind on an ephemeral port");
    let addr = server.local_addr().expect("started server has an address");
    (server, addr)
}

async fn wait_until_idle(server: &Dispatcher) {
    for _ in 0..100 {
        if server.active_connections() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "active connections never drained: {}",
        server.active_connections()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_header_closes_without_handler() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (mut server, addr) = start_echo_server(Arc::clone(&invocations)).await;

    // Raw peer: 4 header bytes with flag 0x00, then arbitrary payload.
    let bad = tokio::task::spawn_blocking(move || {
        let mut stream = std::net::TcpStream::connect(addr).expect("connect");
        stream.write_all(&42u32.to_ne_bytes()).expect("bad header");
        stream.write_all(b"arbitrary payload bytes").ok();
        stream
    })
    .await
    .expect("spawn_blocking");

    // A well-formed exchange on another connection must still succeed.
    let echoed = tokio::task::spawn_blocking(move || {
        let mut client =
            BlockingClient::connect(addr, Duration::from_secs(5)).expect("connect");
        client.send(b"still alive")
    })
    .await
    .expect("spawn_blocking");
    assert_eq!(echoed, b"still alive");

    drop(bad);
    wait_until_idle(&server).await;
    assert_eq!(
        invocations.load(Ordering::SeqCst),
        1,
        "handler must fire for the valid exchange only"
    );

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_oversized_client_payload_yields_empty() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (mut server, addr) = start_echo_server(Arc::clone(&invocations)).await;

    let reply = tokio::task::spawn_blocking(move || {
        let mut client =
            BlockingClient::connect(addr, Duration::from_secs(5)).expect("connect");
        // One byte past the 22-bit limit: unrepresentable in a header, so
        // the client fails before anything reaches the wire.
        client.send(&vec![0u8; MAX_FRAME_LEN as usize + 1])
    })
    .await
    .expect("spawn_blocking");

    assert!(reply.is_empty());
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    wait_until_idle(&server).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_silent_server_times_out_to_empty() {
    // Handler that never writes a reply: the connection closes after
    // dispatch, and the client sees EOF instead of a response header.
    let (mut server, addr) = start_echo_server_without_reply().await;

    let reply = tokio::task::spawn_blocking(move || {
        let mut client =
            BlockingClient::connect(addr, Duration::from_millis(500)).expect("connect");
        client.send(b"anyone home?")
    })
    .await
    .expect("spawn_blocking");

    assert!(reply.is_empty(), "no response must yield an empty result");
    wait_until_idle(&server).await;
    server.stop().await;
}

async fn start_echo_server_without_reply() -> (Dispatcher, std::net::SocketAddr) {
    let config = ServerConfig {
        address: "127.0.0.1:0".to_string(),
        worker_threads: 1,
        ..ServerConfig::default()
    };
    let handler = Handler::new().on_message(|_reply, _msg| {
        // Swallow the message.
    });
    let mut server = Dispatcher::new(config, handler);
    server.start().await.expect("bind on an ephemeral port");
    let addr = server.local_addr().expect("started server has an address");
    (server, addr)
}

#[tokio::test]
async fn test_bind_failure_is_an_error_not_a_panic() {
    let config = ServerConfig {
        address: "127.0.0.1:0".to_string(),
        worker_threads: 1,
        ..ServerConfig::default()
    };
    let mut first = Dispatcher::new(config, Handler::new());
    first.start().await.expect("first bind succeeds");
    let addr = first.local_addr().expect("bound");

    // Same port again: the listen step fails, fatal to this start call only.
    let config = ServerConfig {
        address: addr.to_string(),
        worker_threads: 1,
        ..ServerConfig::default()
    };
    let mut second = Dispatcher::new(config, Handler::new());
    assert!(second.start().await.is_err());

    first.stop().await;
}
