//! TCP listener for the SMTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use super::session::{SessionSettings, SmtpSession};
use crate::config::SmtpConfig;
use crate::storage::StorageEngine;
use crate::store::EphemeralStore;
use crate::{JunkmailError, Result};

/// Accepts SMTP connections, at most `max_connections` at a time.
pub struct SmtpServer {
    listener: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl SmtpServer {
    pub async fn bind(config: &SmtpConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        info!(
            "SMTP server for {} listening on {}",
            config.domain,
            listener.local_addr()?
        );

        Ok(Self {
            listener,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Sessions currently holding a slot.
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.slots.available_permits()
    }

    /// Wait for a free slot, then accept the next connection.
    ///
    /// The slot is held until the returned permit is dropped.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit)> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| JunkmailError::Io(std::io::Error::other("connection slots closed")))?;

        let (stream, addr) = self.listener.accept().await?;
        debug!("Accepted connection from {}", addr);

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Accept connections forever, running one SMTP session per connection.
    ///
    /// Accept failures are logged and do not stop the loop.
    pub async fn serve<S: EphemeralStore>(
        self,
        engine: Arc<StorageEngine<S>>,
        settings: SessionSettings,
    ) -> Result<()> {
        let settings = Arc::new(settings);

        loop {
            let (stream, addr, permit) = match self.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept SMTP connection: {}", e);
                    continue;
                }
            };

            let session = SmtpSession::new(engine.clone(), settings.clone(), addr);
            tokio::spawn(async move {
                let id = session.id();
                if let Err(e) = session.run(stream).await {
                    debug!("SMTP session {} from {} ended with error: {}", id, addr, e);
                }
                drop(permit);
            });
        }
    }
}

/// An occupied connection slot, released on drop.
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
