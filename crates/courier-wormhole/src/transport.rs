use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};

const LINK_CAPACITY: usize = 64;

/// A transport address; serialised form is the "SDP" swapped through disco
/// records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Addr {
    pub ip: String,
    pub port: u16,
}

impl Addr {
    pub fn to_sdp(&self) -> String {
        serde_json::to_string(self).expect("addr serialization")
    }

    pub fn from_sdp(sdp: &str) -> Result<Self, TransportError> {
        serde_json::from_str(sdp).map_err(|e| TransportError::InvalidAddr(e.to_string()))
    }
}

impl std::fmt::Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("not connected")]
    NotConnected,

    #[error("disconnected")]
    Disconnected,

    #[error("invalid addr: {0}")]
    InvalidAddr(String),
}

/// The datagram channel contract the wormhole consumes. The real transport
/// (ICE/SCTP) is an external library; implementations must provide reliable
/// ordered delivery on the single stream used.
#[async_trait]
pub trait Transport: Send + Sync {
    fn local_addr(&self) -> Addr;

    /// Dial the remote side (offerer).
    async fn connect(&self, remote: &Addr) -> Result<(), TransportError>;

    /// Wait for the remote side to dial (listener).
    async fn accept(&self, remote: &Addr) -> Result<(), TransportError>;

    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    async fn close(&self);
}

struct Link {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

struct Waiter {
    link: Link,
    ready_tx: oneshot::Sender<()>,
}

struct HubInner {
    next_port: u16,
    waiting: HashMap<(String, String), Waiter>,
}

/// In-process endpoint factory for tests: endpoints rendezvous by address
/// pair, and a matched pair gets a reliable ordered byte channel.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<StdMutex<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StdMutex::new(HubInner {
                next_port: 40_000,
                waiting: HashMap::new(),
            })),
        }
    }

    pub fn endpoint(&self) -> MemoryTransport {
        let mut inner = self.inner.lock().expect("hub lock");
        let port = inner.next_port;
        inner.next_port += 1;
        MemoryTransport {
            hub: self.clone(),
            addr: Addr {
                ip: "127.0.0.1".to_string(),
                port,
            },
            tx: StdMutex::new(None),
            rx: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn pair_key(a: &Addr, b: &Addr) -> (String, String) {
        let (a, b) = (a.to_string(), b.to_string());
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Completes when both sides of the pair have arrived.
    async fn rendezvous(&self, local: &Addr, remote: &Addr) -> Result<Link, TransportError> {
        let key = Self::pair_key(local, remote);

        let wait_rx = {
            let mut inner = self.inner.lock().expect("hub lock");
            if let Some(waiter) = inner.waiting.remove(&key) {
                let _ = waiter.ready_tx.send(());
                return Ok(waiter.link);
            }

            let (a_tx, a_rx) = mpsc::channel(LINK_CAPACITY);
            let (b_tx, b_rx) = mpsc::channel(LINK_CAPACITY);
            let (ready_tx, ready_rx) = oneshot::channel();
            inner.waiting.insert(
                key,
                Waiter {
                    link: Link { tx: b_tx, rx: a_rx },
                    ready_tx,
                },
            );
            (Link { tx: a_tx, rx: b_rx }, ready_rx)
        };

        let (link, ready_rx) = wait_rx;
        ready_rx
            .await
            .map_err(|_| TransportError::ConnectFailed("rendezvous abandoned".to_string()))?;
        Ok(link)
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MemoryTransport {
    hub: MemoryHub,
    addr: Addr,
    tx: StdMutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    async fn establish(&self, remote: &Addr) -> Result<(), TransportError> {
        let link = self.hub.rendezvous(&self.addr, remote).await?;
        {
            let mut tx = self.tx.lock().expect("transport lock");
            *tx = Some(link.tx);
        }
        {
            let mut rx = self.rx.lock().await;
            *rx = Some(link.rx);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_addr(&self) -> Addr {
        self.addr.clone()
    }

    async fn connect(&self, remote: &Addr) -> Result<(), TransportError> {
        self.establish(remote).await
    }

    async fn accept(&self, remote: &Addr) -> Result<(), TransportError> {
        self.establish(remote).await
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let tx = {
            let guard = self.tx.lock().expect("transport lock");
            guard.clone().ok_or(TransportError::NotConnected)?
        };
        tx.send(data.to_vec())
            .await
            .map_err(|_| TransportError::Disconnected)
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.rx.lock().await;
        let rx = guard.as_mut().ok_or(TransportError::NotConnected)?;
        rx.recv().await.ok_or(TransportError::Disconnected)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut tx = self.tx.lock().expect("transport lock");
        *tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_addr_sdp_roundtrip() {
        let addr = Addr {
            ip: "10.0.0.1".to_string(),
            port: 9000,
        };
        let sdp = addr.to_sdp();
        assert_eq!(Addr::from_sdp(&sdp).unwrap(), addr);
        assert!(Addr::from_sdp("not sdp").is_err());
    }

    #[tokio::test]
    async fn test_rendezvous_and_exchange() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();
        let (a_addr, b_addr) = (a.local_addr(), b.local_addr());

        let dial = tokio::spawn(async move {
            a.connect(&b_addr).await.unwrap();
            a.send(b"ping").await.unwrap();
            assert_eq!(a.recv().await.unwrap(), b"pong");
        });

        b.accept(&a_addr).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), b"ping");
        b.send(b"pong").await.unwrap();

        dial.await.unwrap();
    }

    #[tokio::test]
    async fn test_accept_waits_for_dialer() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let ghost = Addr {
            ip: "127.0.0.1".to_string(),
            port: 1,
        };

        let res =
            tokio::time::timeout(std::time::Duration::from_millis(50), a.accept(&ghost)).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_close_disconnects_peer() {
        let hub = MemoryHub::new();
        let a = hub.endpoint();
        let b = hub.endpoint();
        let (a_addr, b_addr) = (a.local_addr(), b.local_addr());

        let accept = tokio::spawn(async move {
            b.accept(&a_addr).await.unwrap();
            b
        });
        a.connect(&b_addr).await.unwrap();
        let b = accept.await.unwrap();

        a.close().await;
        assert!(matches!(
            a.send(b"x").await,
            Err(TransportError::Disconnected)
        ));
        assert!(matches!(b.recv().await, Err(TransportError::Disconnected)));
    }
}
