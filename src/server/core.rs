use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::operations::FileManager;
use crate::server::protocol::format_response;
use crate::server::session::{SessionContext, handle_client};
use crate::storage::Storage;

/// Reply sent when every session slot is taken
const TOO_MANY_CONNECTIONS: u16 = 421;

pub struct Server<S> {
    listener: TcpListener,
    manager: Arc<FileManager<S>>,
    context: Arc<SessionContext>,
    slots: Arc<Semaphore>,
    max_clients: usize,
}

impl<S: Storage + 'static> Server<S> {
    pub async fn bind(
        addr: &str,
        manager: FileManager<S>,
        context: SessionContext,
        max_clients: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            manager: Arc::new(manager),
            context: Arc::new(context),
            slots: Arc::new(Semaphore::new(max_clients)),
            max_clients,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts clients until the process exits.
    pub async fn start(self) {
        info!(
            "Serving {} on {:?} (max {} clients)",
            self.manager.storage().base_dir().display(),
            self.listener.local_addr().ok(),
            self.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => match Arc::clone(&self.slots).try_acquire_owned() {
                    Ok(permit) => self.spawn_session(stream, addr, permit),
                    Err(_) => {
                        warn!("Rejecting {}: all {} slots taken", addr, self.max_clients);
                        tokio::spawn(reject(stream));
                    }
                },
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    /// Sessions call the synchronous engine, so each runs on the blocking pool.
    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr, permit: OwnedSemaphorePermit) {
        info!("Client {} connected", addr);

        let stream = match stream.into_std().and_then(|s| {
            s.set_nonblocking(false)?;
            Ok(s)
        }) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to prepare connection from {}: {}", addr, e);
                return;
            }
        };

        let manager = Arc::clone(&self.manager);
        let context = Arc::clone(&self.context);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            if let Err(e) = handle_client(stream, addr, &manager, &context) {
                warn!("Session with {} ended with error: {}", addr, e);
            }
        });
    }
}

async fn reject(mut stream: TcpStream) {
    let reply = format_response(TOO_MANY_CONNECTIONS, "Too many connections. Try again later.");
    if let Err(e) = stream.write_all(reply.as_bytes()).await {
        warn!("Failed to send rejection: {}", e);
    }
    let _ = stream.shutdown().await;
}
