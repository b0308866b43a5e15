//! UDP transport: one socket per listener, a bounded pool of request tasks,
//! and the seams ([`RadiusService`], [`ResponseWriter`], [`SecretProvider`])
//! the services plug into.

use crate::repository::NasRepository;
use async_trait::async_trait;
use radius_wire::{verify_accounting_request_authenticator, Code, Packet, PacketError};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Largest RADIUS packet (RFC 2865 Section 3)
const MAX_PACKET_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("worker pool closed")]
    WorkerPoolClosed,
}

/// A decoded datagram and the shared secret of the NAS that sent it
#[derive(Debug, Clone)]
pub struct Request {
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub packet: Packet,
    /// Datagram as received; empty for requests built in process
    pub raw: Vec<u8>,
    pub secret: Vec<u8>,
}

impl Request {
    pub fn new(
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        packet: Packet,
        secret: Vec<u8>,
    ) -> Self {
        Request {
            remote_addr,
            local_addr,
            packet,
            raw: Vec::new(),
            secret,
        }
    }

    pub fn from_datagram(
        remote_addr: SocketAddr,
        local_addr: SocketAddr,
        raw: Vec<u8>,
        secret: Vec<u8>,
    ) -> Result<Self, PacketError> {
        let packet = Packet::decode(&raw)?;
        Ok(Request {
            remote_addr,
            local_addr,
            packet,
            raw,
            secret,
        })
    }
}

#[async_trait]
pub trait ResponseWriter: Send + Sync {
    /// Send an already signed reply
    async fn write(&self, packet: &Packet) -> Result<(), ServerError>;
}

#[async_trait]
pub trait RadiusService: Send + Sync {
    async fn serve_radius(&self, writer: Arc<dyn ResponseWriter>, request: Request);
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// `None` drops the datagram unanswered
    async fn radius_secret(&self, remote_addr: SocketAddr) -> Option<Vec<u8>>;
}

/// Secrets of the NAS devices in the repository, matched by source address.
/// Disabled devices still get their secret so the reject can be signed.
pub struct NasSecretProvider {
    nas: Arc<dyn NasRepository>,
}

impl NasSecretProvider {
    pub fn new(nas: Arc<dyn NasRepository>) -> Self {
        NasSecretProvider { nas }
    }
}

#[async_trait]
impl SecretProvider for NasSecretProvider {
    async fn radius_secret(&self, remote_addr: SocketAddr) -> Option<Vec<u8>> {
        match self.nas.get_by_ip_or_identifier(remote_addr.ip(), "").await {
            Ok(nas) => nas.map(|n| n.secret.into_bytes()),
            Err(e) => {
                warn!(client_ip = %remote_addr.ip(), error = %e, "NAS lookup failed");
                None
            }
        }
    }
}

struct UdpResponseWriter {
    socket: Arc<UdpSocket>,
    addr: SocketAddr,
}

#[async_trait]
impl ResponseWriter for UdpResponseWriter {
    async fn write(&self, packet: &Packet) -> Result<(), ServerError> {
        let data = packet.encode()?;
        self.socket.send_to(&data, self.addr).await?;
        debug!(
            response_type = ?packet.code,
            client_addr = %self.addr,
            request_id = packet.identifier,
            "Sent RADIUS response"
        );
        Ok(())
    }
}

pub struct RadiusServer {
    socket: Arc<UdpSocket>,
    service: Arc<dyn RadiusService>,
    secrets: Arc<dyn SecretProvider>,
    workers: Arc<Semaphore>,
}

impl RadiusServer {
    pub async fn bind(
        addr: SocketAddr,
        service: Arc<dyn RadiusService>,
        secrets: Arc<dyn SecretProvider>,
        max_workers: usize,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(addr).await?;
        info!("RADIUS listener on {}", socket.local_addr()?);
        Ok(RadiusServer {
            socket: Arc::new(socket),
            service,
            secrets,
            workers: Arc::new(Semaphore::new(max_workers.max(1))),
        })
    }

    /// Useful when bound to port 0
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.socket.local_addr().map_err(ServerError::from)
    }

    pub async fn run(&self) -> Result<(), ServerError> {
        let local_addr = self.local_addr()?;
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            let (len, addr) = self.socket.recv_from(&mut buf).await?;
            let data = buf[..len].to_vec();

            // a full pool stops reading; the kernel buffer absorbs the burst
            let permit = Arc::clone(&self.workers)
                .acquire_owned()
                .await
                .map_err(|_| ServerError::WorkerPoolClosed)?;

            let socket = Arc::clone(&self.socket);
            let service = Arc::clone(&self.service);
            let secrets = Arc::clone(&self.secrets);
            tokio::spawn(async move {
                Self::handle_datagram(data, addr, local_addr, socket, service, secrets).await;
                drop(permit);
            });
        }
    }

    async fn handle_datagram(
        data: Vec<u8>,
        addr: SocketAddr,
        local_addr: SocketAddr,
        socket: Arc<UdpSocket>,
        service: Arc<dyn RadiusService>,
        secrets: Arc<dyn SecretProvider>,
    ) {
        let Some(secret) = secrets.radius_secret(addr).await else {
            let request_id = data.get(1).copied().unwrap_or(0);
            warn!(client_ip = %addr.ip(), request_id, "Dropped request from unknown client");
            return;
        };

        let request = match Request::from_datagram(addr, local_addr, data, secret) {
            Ok(request) => request,
            Err(e) => {
                warn!(client_ip = %addr.ip(), error = %e, "Dropped malformed packet");
                return;
            }
        };

        if request.packet.code == Code::AccountingRequest
            && !verify_accounting_request_authenticator(&request.packet, &request.secret)
        {
            warn!(
                client_ip = %addr.ip(),
                request_id = request.packet.identifier,
                "Dropped Accounting-Request with bad authenticator"
            );
            return;
        }

        debug!(
            packet_type = ?request.packet.code,
            client_addr = %addr,
            request_id = request.packet.identifier,
            "Received RADIUS packet"
        );

        let writer: Arc<dyn ResponseWriter> = Arc::new(UdpResponseWriter { socket, addr });
        service.serve_radius(writer, request).await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tokio::sync::Mutex;

    /// Collects written replies
    #[derive(Default)]
    pub struct CapturingWriter {
        pub packets: Mutex<Vec<Packet>>,
    }

    #[async_trait]
    impl ResponseWriter for CapturingWriter {
        async fn write(&self, packet: &Packet) -> Result<(), ServerError> {
            self.packets.lock().await.push(packet.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Nas;
    use crate::repository::MemoryNasRepository;

    #[tokio::test]
    async fn test_nas_secret_provider() {
        let provider = NasSecretProvider::new(Arc::new(MemoryNasRepository::with_nas([
            Nas::new("192.0.2.10".parse().unwrap(), "s3cret"),
        ])));
        assert_eq!(
            provider
                .radius_secret("192.0.2.10:5000".parse().unwrap())
                .await
                .as_deref(),
            Some(&b"s3cret"[..])
        );
        assert!(provider
            .radius_secret("198.51.100.1:5000".parse().unwrap())
            .await
            .is_none());
    }

    #[test]
    fn test_request_from_datagram() {
        let packet = Packet::new(Code::AccessRequest, 4, [9u8; 16]);
        let raw = packet.encode().unwrap();
        let request = Request::from_datagram(
            "192.0.2.10:5000".parse().unwrap(),
            "192.0.2.1:1812".parse().unwrap(),
            raw.clone(),
            b"s".to_vec(),
        )
        .unwrap();
        assert_eq!(request.packet.identifier, 4);
        assert_eq!(request.raw, raw);

        assert!(Request::from_datagram(
            "192.0.2.10:5000".parse().unwrap(),
            "192.0.2.1:1812".parse().unwrap(),
            vec![1, 2, 3],
            Vec::new(),
        )
        .is_err());
    }
}
