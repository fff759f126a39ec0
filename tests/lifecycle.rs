#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Single-exchange lifecycle tests: one request in, at most one reply out,
//! connection closed, dispatcher bookkeeping back to zero.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use framewire::config::ServerConfig;
use framewire::{BlockingClient, Dispatcher, Handler};

fn test_config() -> ServerConfig {
    ServerConfig {
        address: "127.0.0.1:0".to_string(),
        worker_threads: 2,
        ..ServerConfig::default()
    }
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

fn round_trip(addr: std::net::SocketAddr, payload: Vec<u8>) -> Vec<u8> {
    let mut client = BlockingClient::connect(addr, Duration::from_secs(5)).expect("connect");
    client.send(&payload)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_exchange_echo() {
    let handler = Handler::new().on_message(|reply, msg| {
        let _ = reply.write(msg);
    });
    let mut server = Dispatcher::new(test_config(), handler);
    server.start().await.expect("bind");
    let addr = server.local_addr().expect("address");

    let reply = tokio::task::spawn_blocking(move || round_trip(addr, b"Hello world!".to_vec()))
        .await
        .expect("spawn_blocking");
    assert_eq!(reply, b"Hello world!");

    wait_until_idle(&server).await;
    assert_eq!(server.active_connections(), 0);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reply_is_whatever_the_handler_wrote() {
    let handler = Handler::new().on_message(|reply, _msg| {
        let _ = reply.write(b"fixed response");
    });
    let mut server = Dispatcher::new(test_config(), handler);
    server.start().await.expect("bind");
    let addr = server.local_addr().expect("address");

    let reply = tokio::task::spawn_blocking(move || round_trip(addr, b"Hello world!".to_vec()))
        .await
        .expect("spawn_blocking");
    assert_eq!(reply, b"fixed response");

    wait_until_idle(&server).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_large_payload_reassembles_across_reads() {
    // Larger than any single socket read, so the body spans many
    // data-available events.
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();

    let handler = Handler::new().on_message(|reply, msg| {
        let _ = reply.write(msg);
    });
    let mut server = Dispatcher::new(test_config(), handler);
    server.start().await.expect("bind");
    let addr = server.local_addr().expect("address");

    let expected = payload.clone();
    let reply = tokio::task::spawn_blocking(move || round_trip(addr, payload))
        .await
        .expect("spawn_blocking");
    assert_eq!(reply, expected);

    wait_until_idle(&server).await;
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lifecycle_hooks_fire_once_per_connection() {
    let opens = Arc::new(AtomicUsize::new(0));
    let closes = Arc::new(AtomicUsize::new(0));

    let opens_hook = Arc::clone(&opens);
    let closes_hook = Arc::clone(&closes);
    let handler = Handler::new()
        .on_message(|reply, msg| {
            let _ = reply.write(msg);
        })
        .on_open(move |_id| {
            opens_hook.fetch_add(1, Ordering::SeqCst);
        })
        .on_close(move |_id| {
            closes_hook.fetch_add(1, Ordering::SeqCst);
        });

    let mut server = Dispatcher::new(test_config(), handler);
    server.start().await.expect("bind");
    let addr = server.local_addr().expect("address");

    for i in 0..3u8 {
        let reply = tokio::task::spawn_blocking(move || round_trip(addr, vec![i; 8]))
            .await
            .expect("spawn_blocking");
        assert_eq!(reply, vec![i; 8]);
    }

    wait_until_idle(&server).await;
    assert_eq!(opens.load(Ordering::SeqCst), 3);
    assert_eq!(closes.load(Ordering::SeqCst), 3);
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_drains_and_is_reentrant() {
    let handler = Handler::new().on_message(|reply, msg| {
        let _ = reply.write(msg);
    });
    let mut server = Dispatcher::new(test_config(), handler);
    server.start().await.expect("bind");
    let addr = server.local_addr().expect("address");

    let reply = tokio::task::spawn_blocking(move || round_trip(addr, b"drain me".to_vec()))
        .await
        .expect("spawn_blocking");
    assert_eq!(reply, b"drain me");

    server.stop().await;
    assert_eq!(server.active_connections(), 0);
    assert!(server.local_addr().is_none());

    // Second stop: no-op.
    server.stop().await;
}
