#![allow(dead_code)]

use blobnet::packet::{PacketHandler, PacketReceiver, PacketReader};
use blobnet::peer::Handshaker;
use blobnet::store::FsStorage;
use blobnet::transport::ErrorLog;
use blobnet::{FileServer, FileServerOptions, TcpOptions, TcpTransport, Transport};
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};

pub type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

pub type LineClient = Framed<TcpStream, LinesCodec>;

pub fn options() -> TcpOptions {
    TcpOptions {
        listen_addr: "127.0.0.1:0".to_string(),
        handshake_timeout: Duration::from_secs(2),
        dial_timeout: Duration::from_secs(2),
    }
}

/// A transport that reports every packet to the returned receiver and every background
/// error to the returned log.
pub async fn transport(
    handshaker: Arc<dyn Handshaker>,
) -> Result<(TcpTransport, PacketReceiver, ErrorLog)> {
    let (reader, receiver) = PacketReader::new(64);
    let errors = ErrorLog::new();

    let transport = TcpTransport::bind(options())
        .await?
        .with_error_handler(errors.handler());
    transport.set_handshaker(handshaker);
    transport.set_handler(Arc::new(PacketHandler::new(Arc::new(reader))));

    Ok((transport, receiver, errors))
}

pub fn spawn_accept(transport: &TcpTransport) -> JoinHandle<blobnet::Result<()>> {
    let transport = transport.clone();
    tokio::spawn(async move { transport.listen_and_accept().await })
}

/// A running file server with its own storage directory.
pub struct Node {
    pub server: Arc<FileServer>,
    pub transport: TcpTransport,
    pub start: JoinHandle<blobnet::Result<()>>,
    pub process: JoinHandle<()>,
    dir: TempDir,
}

impl Node {
    pub fn addr(&self) -> SocketAddr {
        self.server.addr()
    }

    pub async fn close(self) -> Result<()> {
        self.server.close().await?;
        self.start.await??;
        self.process.await?;
        Ok(())
    }
}

pub async fn node(nodes: Vec<String>) -> Result<Node> {
    let dir = tempfile::tempdir()?;
    let transport = TcpTransport::bind(options()).await?;
    let store = FsStorage::new(dir.path())?;

    let server = Arc::new(FileServer::new(
        Arc::new(store),
        Arc::new(transport.clone()),
        FileServerOptions {
            nodes,
            ..Default::default()
        },
    ));

    let start = tokio::spawn({
        let server = server.clone();
        async move { server.start().await }
    });
    let process = tokio::spawn({
        let server = server.clone();
        async move { server.process().await }
    });

    Ok(Node {
        server,
        transport,
        start,
        process,
        dir,
    })
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Raw line oriented connection, for talking to a node without a transport.
pub async fn client(addr: SocketAddr) -> Result<LineClient> {
    let stream = TcpStream::connect(addr).await?;
    Ok(Framed::new(stream, LinesCodec::new()))
}

/// Send a `\r\n` terminated line.
pub async fn send_line(client: &mut LineClient, line: &str) -> Result<()> {
    use futures::SinkExt;
    client.send(format!("{}\r", line)).await?;
    Ok(())
}

/// Next line, or `None` when the connection ends.
pub async fn next_line(client: &mut LineClient) -> Result<Option<String>> {
    use futures::StreamExt;
    match tokio::time::timeout(Duration::from_secs(2), client.next()).await? {
        Some(line) => Ok(Some(line?)),
        None => Ok(None),
    }
}
