use anyhow::Context;
use blobnet::config::Config;
use blobnet::store::FsStorage;
use blobnet::{FileServer, FileServerOptions, TcpOptions, TcpTransport};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::parse();

    let transport = TcpTransport::bind(TcpOptions {
        listen_addr: config.addr.clone(),
        handshake_timeout: config.handshake_timeout(),
        ..Default::default()
    })
    .await
    .with_context(|| format!("cannot listen on {}", config.addr))?;

    let store = FsStorage::new(&config.path)
        .with_context(|| format!("cannot open storage at {}", config.path))?;

    let server = Arc::new(FileServer::new(
        Arc::new(store),
        Arc::new(transport),
        FileServerOptions {
            nodes: config.bootstrap_nodes(),
            ..Default::default()
        },
    ));

    let signals = Signals::install().context("cannot install signal handlers")?;

    let processor = tokio::spawn({
        let server = server.clone();
        async move { server.process().await }
    });

    let closer = tokio::spawn({
        let server = server.clone();
        let timeout = config.shutdown_timeout();
        async move {
            signals.wait().await;
            log::info!("Shutting down");

            match tokio::time::timeout(timeout, server.close()).await {
                Ok(Ok(())) => log::info!("Closed"),
                Ok(Err(err)) => log::error!("Error while closing:\t{}", err),
                Err(_) => {
                    log::error!("Close did not finish within {:?}", timeout);
                    return false;
                }
            }
            true
        }
    });

    log::info!("Starting node on {}", server.addr());
    if let Err(err) = server.start().await {
        log::error!("Error:\t{}", err);
    }

    if closer.await? {
        processor.await?;
    } else {
        // The packet channel is only ended by a complete close.
        processor.abort();
    }
    Ok(())
}

/// Interrupt and terminate requests.
struct Signals {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    async fn wait(mut self) {
        #[cfg(unix)]
        tokio::select! {
            _ = tokio::signal::ctrl_c() => log::info!("Received SIGINT"),
            _ = self.terminate.recv() => log::info!("Received SIGTERM"),
        }

        #[cfg(not(unix))]
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl+C");
        }
    }
}
