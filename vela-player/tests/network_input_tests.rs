//! TCP input tests over a real loopback socket

use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use vela_common::config::{NetworkInputConfig, NetworkInputMode};
use vela_common::events::{EventBus, VelaEvent};
use vela_player::inputs::NetworkInput;

async fn serve(mode: NetworkInputMode, bus: &EventBus) -> std::net::SocketAddr {
    let config = NetworkInputConfig {
        interface: "127.0.0.1".to_string(),
        port: 0,
        mode,
    };
    let input = NetworkInput::new(config, bus.clone());
    let listener = input.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(input.serve(listener));
    addr
}

async fn recv(rx: &mut tokio::sync::broadcast::Receiver<VelaEvent>) -> VelaEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("bus closed")
}

#[tokio::test]
async fn test_lines_become_readings() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let addr = serve(NetworkInputMode::Readings, &bus).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"3\nnot a number\n4.5\r\n").await.unwrap();
    stream.shutdown().await.unwrap();

    assert_eq!(
        recv(&mut rx).await,
        VelaEvent::Reading {
            source: "network".to_string(),
            value: 3.0
        }
    );
    assert_eq!(
        recv(&mut rx).await,
        VelaEvent::Reading {
            source: "network".to_string(),
            value: 4.5
        }
    );
}

#[tokio::test]
async fn test_level_mode_requests_levels() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let addr = serve(NetworkInputMode::Levels, &bus).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    first.write_all(b"2\n").await.unwrap();
    assert_eq!(
        recv(&mut rx).await,
        VelaEvent::PlayLevelChange {
            level: 2,
            comment: "network".to_string()
        }
    );

    // Connections are served concurrently
    let mut second = TcpStream::connect(addr).await.unwrap();
    second.write_all(b"1\n").await.unwrap();
    assert_eq!(
        recv(&mut rx).await,
        VelaEvent::PlayLevelChange {
            level: 1,
            comment: "network".to_string()
        }
    );
}
