//! UDP server loop for the registry.
//!
//! One task receives every datagram on the registry's well-known port,
//! hands it to the `Registry` engine and performs the sends it asks for.
//! Receive and routing are strictly sequential, so the engine needs no lock.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{error, info, warn};

use crate::config::RegistrySettings;
use crate::protocol::MAX_DATAGRAM_SIZE;
use crate::registry::engine::Registry;
use crate::utils::{PubSubError, Result};

pub struct RegistryServer {
    socket: UdpSocket,
    registry: Registry,
}

impl RegistryServer {
    pub async fn bind(addr: &str, registry: Registry) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| PubSubError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self { socket, registry })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive and route forever. Per-datagram failures are logged and skipped.
    pub async fn run(mut self) -> Result<()> {
        info!(addr = %self.local_addr()?, "registry listening");
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];

        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "registry receive failed");
                    continue;
                }
            };
            if len > MAX_DATAGRAM_SIZE {
                warn!(%from, len, "dropping oversized datagram");
                continue;
            }
            let text = match std::str::from_utf8(&buf[..len]) {
                Ok(text) => text,
                Err(_) => {
                    warn!(%from, "dropping non UTF-8 datagram");
                    continue;
                }
            };

            for out in self.registry.handle_datagram(text, from) {
                if let Err(e) = self.socket.send_to(out.payload.as_bytes(), out.to).await {
                    error!(to = %out.to, error = %e, "failed to forward datagram");
                }
            }
        }
    }
}

/// Bind the registry on its configured address and serve until the task is dropped.
pub async fn start_registry_server(settings: &RegistrySettings) -> Result<()> {
    let server = RegistryServer::bind(&settings.address(), Registry::new(settings)).await?;
    server.run().await
}
