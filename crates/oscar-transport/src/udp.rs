//! UDP connection implementation
//!
//! A [`UdpConnection`] owns one socket. It is created either by
//! [`listen`](UdpConnection::listen) (bind for receiving) or by
//! [`dial`](UdpConnection::dial) (bind and associate with a fixed remote).
//!
//! [`serve`](UdpConnection::serve) handles one datagram at a time: read,
//! decode, dispatch every contained message, then read again. The only way
//! to stop it is [`close`](UdpConnection::close), which may be called from
//! another task or from inside a handler running on the serve loop itself.

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use oscar_core::{codec, Dispatcher, Encodable, Message, Methods};

use crate::error::{Result, TransportError};
use crate::traits::DatagramSocket;

/// UDP configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    /// Maximum datagram size, inbound and outbound
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

fn default_max_packet_size() -> usize {
    65507 // Max UDP payload
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            max_packet_size: default_max_packet_size(),
        }
    }
}

/// Network identifier accepted by `listen` and `dial`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Either address family
    Udp,
    Udp4,
    Udp6,
}

impl Network {
    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Network::Udp => true,
            Network::Udp4 => addr.is_ipv4(),
            Network::Udp6 => addr.is_ipv6(),
        }
    }

    /// Resolve `addr` to the first socket address of an allowed family
    pub async fn resolve(self, addr: &str) -> Result<SocketAddr> {
        let mut candidates = tokio::net::lookup_host(addr)
            .await
            .map_err(|e| TransportError::AddressResolution(format!("{addr}: {e}")))?;
        candidates.find(|a| self.accepts(a)).ok_or_else(|| {
            TransportError::AddressResolution(format!("{addr}: no {self} address"))
        })
    }
}

impl FromStr for Network {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "udp" => Ok(Network::Udp),
            "udp4" => Ok(Network::Udp4),
            "udp6" => Ok(Network::Udp6),
            other => Err(TransportError::InvalidNetwork(other.to_string())),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Network::Udp => "udp",
            Network::Udp4 => "udp4",
            Network::Udp6 => "udp6",
        })
    }
}

fn unspecified_for(remote: &SocketAddr) -> SocketAddr {
    match remote {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

/// An OSC endpoint over one UDP socket
pub struct UdpConnection<S: DatagramSocket = UdpSocket> {
    /// Released on close; in-flight operations keep their own handle
    socket: RwLock<Option<Arc<S>>>,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    closed: AtomicBool,
    shutdown: Notify,
    config: UdpConfig,
}

impl UdpConnection<UdpSocket> {
    /// Bind a socket for receiving
    pub async fn listen(network: &str, addr: &str) -> Result<Self> {
        Self::listen_with_config(network, addr, UdpConfig::default()).await
    }

    /// Bind with config
    pub async fn listen_with_config(network: &str, addr: &str, config: UdpConfig) -> Result<Self> {
        let network: Network = network.parse()?;
        let local = network.resolve(addr).await?;
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("bind {local}: {e}")))?;

        let conn = Self::from_socket(socket, None, config)?;
        info!("OSC listening on {}", conn.local_addr);
        Ok(conn)
    }

    /// Bind a socket and associate it with `remote` for sending
    ///
    /// With no `local` address an ephemeral port on the unspecified address
    /// of the remote's family is used.
    pub async fn dial(network: &str, local: Option<&str>, remote: &str) -> Result<Self> {
        Self::dial_with_config(network, local, remote, UdpConfig::default()).await
    }

    /// Dial with config
    pub async fn dial_with_config(
        network: &str,
        local: Option<&str>,
        remote: &str,
        config: UdpConfig,
    ) -> Result<Self> {
        let network: Network = network.parse()?;
        let remote = network.resolve(remote).await?;
        let local = match local {
            Some(addr) => network.resolve(addr).await?,
            None => unspecified_for(&remote),
        };

        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("bind {local}: {e}")))?;
        socket
            .connect(remote)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("connect {remote}: {e}")))?;

        let conn = Self::from_socket(socket, Some(remote), config)?;
        info!("OSC dialed {} from {}", remote, conn.local_addr);
        Ok(conn)
    }
}

impl<S: DatagramSocket> UdpConnection<S> {
    /// Wrap an existing socket
    ///
    /// When `remote_addr` is set the socket must already be connected to it,
    /// since [`send`](Self::send) uses the socket's connected peer.
    pub fn from_socket(socket: S, remote_addr: Option<SocketAddr>, config: UdpConfig) -> Result<Self> {
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket: RwLock::new(Some(Arc::new(socket))),
            local_addr,
            remote_addr,
            closed: AtomicBool::new(false),
            shutdown: Notify::new(),
            config,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The associated remote, set only for dialed connections
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn socket(&self) -> Result<Arc<S>> {
        self.socket
            .read()
            .clone()
            .ok_or(TransportError::ConnectionClosed)
    }

    fn encode<P: Encodable + ?Sized>(&self, packet: &P) -> Result<Bytes> {
        let data = packet.to_bytes()?;
        if data.len() > self.config.max_packet_size {
            return Err(TransportError::PacketTooLarge {
                size: data.len(),
                max: self.config.max_packet_size,
            });
        }
        Ok(data)
    }

    /// Send a message to the associated remote
    pub async fn send(&self, msg: &Message) -> Result<()> {
        let remote = self.remote_addr.ok_or(TransportError::NotConnected)?;
        let data = self.encode(msg)?;
        let socket = self.socket()?;

        socket
            .send(&data)
            .await
            .map_err(|e| TransportError::SendFailed(format!("{remote}: {e}")))?;
        debug!("Sent {} bytes to {}", data.len(), remote);
        Ok(())
    }

    /// Send any packet to an explicit address
    pub async fn send_to<P: Encodable + ?Sized>(&self, target: SocketAddr, packet: &P) -> Result<()> {
        let data = self.encode(packet)?;
        let socket = self.socket()?;

        socket
            .send_to(&data, target)
            .await
            .map_err(|e| TransportError::SendFailed(format!("{target}: {e}")))?;
        debug!("Sent {} bytes to {}", data.len(), target);
        Ok(())
    }

    /// Receive and dispatch packets until the connection is closed
    ///
    /// The method table is compiled before anything is read; a malformed
    /// pattern, a missing table or an empty one is returned immediately.
    /// Returns `Ok(())` once [`close`](Self::close) has been called. Any
    /// other receive error, and any packet that fails to decode, ends the
    /// loop with an error. Handler failures never end the loop.
    pub async fn serve(&self, methods: Option<Methods>) -> Result<()> {
        let dispatcher = Dispatcher::build(methods)?;
        let socket = match self.socket() {
            Ok(socket) => socket,
            Err(_) => {
                debug!("Serve called on closed connection {}", self.local_addr);
                return Ok(());
            }
        };

        info!(
            "Serving {} methods on {}",
            dispatcher.len(),
            self.local_addr
        );
        let mut buf = vec![0u8; self.config.max_packet_size];

        loop {
            // Register for the shutdown signal before checking the flag so a
            // close between the two is not missed.
            let shutdown = self.shutdown.notified();
            tokio::pin!(shutdown);
            shutdown.as_mut().enable();
            if self.is_closed() {
                info!("Connection {} closed, serve finished", self.local_addr);
                return Ok(());
            }

            let received = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Connection {} closed, serve finished", self.local_addr);
                    return Ok(());
                }
                result = socket.recv_from(&mut buf) => result,
            };

            let (len, from) = match received {
                Ok(received) => received,
                Err(_) if self.is_closed() => return Ok(()),
                Err(e) => {
                    error!("UDP receive error on {}: {}", self.local_addr, e);
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            };
            debug!("UDP received {} bytes from {}", len, from);

            let packet = codec::decode(&buf[..len]).map_err(|e| {
                error!("Undecodable packet from {}: {}", from, e);
                e
            })?;
            for msg in packet.messages() {
                dispatcher.dispatch(msg);
            }
        }
    }

    /// Close the connection
    ///
    /// Idempotent. Wakes a blocked [`serve`](Self::serve), which then
    /// returns `Ok(())`; safe to call from inside a handler.
    pub fn close(&self) -> Result<()> {
        let released = self.socket.write().take();
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Connection {} already closed", self.local_addr);
            return Ok(());
        }
        self.shutdown.notify_waiters();
        drop(released);
        info!("Closed connection {}", self.local_addr);
        Ok(())
    }
}

impl<S: DatagramSocket> std::fmt::Debug for UdpConnection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpConnection")
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse() {
        assert_eq!("udp".parse::<Network>().unwrap(), Network::Udp);
        assert_eq!("udp4".parse::<Network>().unwrap(), Network::Udp4);
        assert_eq!("udp6".parse::<Network>().unwrap(), Network::Udp6);
        assert!(matches!(
            "tcp".parse::<Network>(),
            Err(TransportError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_network_family_filter() {
        let v4: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let v6: SocketAddr = "[::1]:9000".parse().unwrap();
        assert!(Network::Udp.accepts(&v4) && Network::Udp.accepts(&v6));
        assert!(Network::Udp4.accepts(&v4) && !Network::Udp4.accepts(&v6));
        assert!(Network::Udp6.accepts(&v6) && !Network::Udp6.accepts(&v4));
    }

    #[test]
    fn test_config_defaults() {
        assert_eq!(UdpConfig::default().max_packet_size, 65507);
    }

    #[tokio::test]
    async fn test_listen_ephemeral() {
        let conn = UdpConnection::listen("udp", "127.0.0.1:0").await.unwrap();
        assert!(conn.local_addr().port() > 0);
        assert_eq!(conn.remote_addr(), None);
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let conn = UdpConnection::listen("udp", "127.0.0.1:0").await.unwrap();
        conn.close().unwrap();
        conn.close().unwrap();
        assert!(conn.is_closed());
    }
}
