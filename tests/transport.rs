mod setup;

use blobnet::liveness::PingPongHandshaker;
use blobnet::peer::NOP_HANDSHAKER;
use blobnet::{Error, PacketEvent, Transport};
use rand::{thread_rng, Rng};
use setup::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[tokio::test]
async fn test_peer_is_registered_before_its_packets() -> Result<()> {
    let (transport, mut events, errors) = setup::transport(Arc::new(NOP_HANDSHAKER)).await?;
    let accept = setup::spawn_accept(&transport);

    let mut client = TcpStream::connect(transport.addr()).await?;
    client.write_all(b"hello").await?;

    let packet = match tokio::time::timeout(Duration::from_secs(2), events.recv()).await? {
        Some(PacketEvent::Packet(packet)) => packet,
        other => panic!("expected a packet, got {:?}", other),
    };
    assert_eq!(&packet.payload[..], b"hello");
    assert_eq!(packet.from, client.local_addr()?);
    assert!(transport.acquire_peer(packet.from).is_some());

    drop(client);
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv()).await?;
    assert!(matches!(event, Some(PacketEvent::Closed { from, .. }) if from == packet.from));
    assert!(setup::wait_until(|| transport.peer_count() == 0).await);

    transport.close().await?;
    accept.await??;
    assert!(errors.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_handshake_is_never_registered() -> Result<()> {
    let (transport, mut events, errors) =
        setup::transport(Arc::new(PingPongHandshaker::default())).await?;
    let accept = setup::spawn_accept(&transport);

    let mut client = TcpStream::connect(transport.addr()).await?;
    let client_addr = client.local_addr()?;
    client.write_all(b"HELLO\r\n").await?;

    // The node drops the connection without answering.
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf)).await?;
    assert!(matches!(read, Ok(0) | Err(_)));

    assert!(setup::wait_until(|| errors.len() == 1).await);
    let reported = errors.take();
    assert!(matches!(reported[0], Error::InvalidHandshake(addr) if addr == client_addr));

    assert!(transport.acquire_peer(client_addr).is_none());
    assert_eq!(transport.peer_count(), 0);
    assert!(events.try_recv().is_err());

    transport.close().await?;
    accept.await??;
    Ok(())
}

#[tokio::test]
async fn test_packets_keep_read_order_per_peer() -> Result<()> {
    const CLIENTS: usize = 3;
    const CHUNKS: usize = 50;

    let (transport, mut events, _errors) = setup::transport(Arc::new(NOP_HANDSHAKER)).await?;
    let accept = setup::spawn_accept(&transport);

    let mut sent: HashMap<SocketAddr, Vec<u8>> = HashMap::new();
    let mut writers = Vec::new();
    for _ in 0..CLIENTS {
        let mut client = TcpStream::connect(transport.addr()).await?;
        let chunks: Vec<Vec<u8>> = (0..CHUNKS)
            .map(|_| {
                let len = thread_rng().gen_range(1..64);
                (0..len).map(|_| thread_rng().gen()).collect()
            })
            .collect();
        sent.insert(client.local_addr()?, chunks.concat());

        writers.push(tokio::spawn(async move {
            for chunk in chunks {
                client.write_all(&chunk).await?;
                tokio::task::yield_now().await;
            }
            client.shutdown().await
        }));
    }
    for writer in writers {
        writer.await??;
    }

    // Chunks may be split or merged across packets, so compare the reassembled streams.
    let mut received: HashMap<SocketAddr, Vec<u8>> = HashMap::new();
    let mut closed = 0;
    while closed < CLIENTS {
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await? {
            Some(PacketEvent::Packet(packet)) => received
                .entry(packet.from)
                .or_default()
                .extend_from_slice(&packet.payload),
            Some(PacketEvent::Closed { .. }) => closed += 1,
            Some(PacketEvent::Error { from, error }) => panic!("read error from {}: {}", from, error),
            None => panic!("packet channel ended early"),
        }
    }

    assert_eq!(received, sent);

    transport.close().await?;
    accept.await??;
    Ok(())
}

#[tokio::test]
async fn test_close_stops_accepting_and_empties_registry() -> Result<()> {
    let (transport, _events, _errors) = setup::transport(Arc::new(NOP_HANDSHAKER)).await?;
    let accept = setup::spawn_accept(&transport);

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(transport.addr()).await?);
    }
    assert!(setup::wait_until(|| transport.peer_count() == 3).await);

    transport.close().await?;
    tokio::time::timeout(Duration::from_secs(2), accept).await???;
    assert_eq!(transport.peer_count(), 0);

    for client in &mut clients {
        let mut buf = [0u8; 8];
        let read = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf)).await?;
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    // Closing twice is harmless.
    transport.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_dial_returns_handshake_failure() -> Result<()> {
    let (transport, _events, _errors) =
        setup::transport(Arc::new(PingPongHandshaker::default())).await?;

    let remote = TcpListener::bind("127.0.0.1:0").await?;
    let remote_addr = remote.local_addr()?;
    let answer = tokio::spawn(async move {
        let (mut stream, _) = remote.accept().await?;
        let mut buf = [0u8; 16];
        let _ = stream.read(&mut buf).await?;
        stream.write_all(b"NOPE\r\n").await?;
        Ok::<_, std::io::Error>(stream)
    });

    let err = transport.dial(&remote_addr.to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Dial { ref source, .. } if matches!(**source, Error::InvalidHandshake(addr) if addr == remote_addr)
    ));
    assert_eq!(transport.peer_count(), 0);

    answer.await??;
    transport.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_dial_registers_peer() -> Result<()> {
    let (listening, _events, _) = setup::transport(Arc::new(PingPongHandshaker::default())).await?;
    let (dialing, _dial_events, _) =
        setup::transport(Arc::new(PingPongHandshaker::default())).await?;
    let accept = setup::spawn_accept(&listening);

    dialing.dial(&listening.addr().to_string()).await?;

    assert!(dialing.acquire_peer(listening.addr()).is_some());
    assert!(setup::wait_until(|| listening.peer_count() == 1).await);

    dialing.close().await?;
    assert!(setup::wait_until(|| listening.peer_count() == 0).await);

    listening.close().await?;
    accept.await??;
    Ok(())
}
