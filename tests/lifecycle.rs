//! Graceful shutdown behavior.

use std::time::Duration;

use http_echo::EchoConfig;
use reqwest::StatusCode;
use tokio::net::TcpStream;

mod common;

fn short_grace() -> EchoConfig {
    let mut config = EchoConfig::default();
    config.timeouts.shutdown_grace_secs = 1;
    config
}

#[tokio::test]
async fn test_in_flight_request_completes_during_drain() {
    let server = common::spawn_server(short_grace()).await;

    let url = server.url("/?sleep=300ms");
    let pending = tokio::spawn(async move { common::client().get(url).send().await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    server.shutdown.trigger();

    let res = pending.await.unwrap().unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(3), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_new_connections_refused_after_shutdown() {
    let server = common::spawn_server(short_grace()).await;
    let addr = server.addr;

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(3), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_long_stream_cut_off_after_grace() {
    let server = common::spawn_server(short_grace()).await;

    let mut res = common::client()
        .get(server.url("/stream?count=30&interval=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    // Request head has been sent back; the stream is now in flight.
    res.chunk().await.unwrap();

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(4), server.handle)
        .await
        .expect("server did not stop within the grace period")
        .unwrap()
        .unwrap();
}
