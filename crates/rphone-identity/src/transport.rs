//! The `Transport` capability: identity-addressed encrypted datagrams and
//! encrypted bidirectional links between two identities.
//!
//! This is deliberately a thin seam. The real implementation (Reticulum, or
//! whatever mesh-routing substrate a host application embeds) lives outside
//! this workspace entirely — per spec.md §1 the transport is an external
//! collaborator, not re-specified here. [`MockTransport`] is the second and
//! only other implementor in scope, used by every test in this workspace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ids::NodeId;

/// Opaque per-link session identifier, fed to SAS derivation once a link
/// reaches `ESTABLISHED`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LinkId(pub Vec<u8>);

impl LinkId {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinkId({})", hex::encode(&self.0))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no route to {0}")]
    NoRoute(NodeId),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("link establishment timed out")]
    LinkTimeout,
    #[error("link closed")]
    LinkClosed,
}

/// Invoked with `(from, payload)` whenever a signaling datagram arrives for
/// the destination this handler was registered against.
pub type PacketHandler = Arc<dyn Fn(NodeId, Vec<u8>) + Send + Sync>;

/// Invoked with `(destination_hash, announcer_public_key_or_identity,
/// app_data)` whenever an announce is observed on the mesh.
pub type AnnounceHandler = Arc<dyn Fn([u8; 32], Vec<u8>, Vec<u8>) + Send + Sync>;

/// A live, transport-provided bidirectional encrypted stream between two
/// identities, with per-session key material.
#[async_trait]
pub trait LinkHandle: Send + Sync {
    /// Opaque session identifier, available once the link is established.
    fn link_id(&self) -> LinkId;

    /// True once the link has completed its handshake.
    fn is_established(&self) -> bool;

    /// Send a framed media packet over the link.
    fn send(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Register the callback invoked for every inbound frame on this link.
    fn register_receive_callback(&self, handler: Arc<dyn Fn(Vec<u8>) + Send + Sync>);

    /// Tear the link down. Idempotent.
    fn close(&self);
}

/// Identity-addressed encrypted datagrams, plus the link API, as consumed by
/// the call engine. Exactly two implementors are in scope: the real
/// transport (provided by the host application) and [`MockTransport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a single encrypted datagram to `to`. May fail if there is no
    /// known route — callers treat this equivalently to a remote END when
    /// mid-call, per spec.md §7.
    async fn send_packet(&self, to: NodeId, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Register the callback invoked for every inbound signaling datagram
    /// addressed to this transport's own identity.
    fn register_packet_callback(&self, handler: PacketHandler);

    /// Register the callback invoked for every observed announce on the
    /// mesh (not just ones addressed to this identity — announces are
    /// broadcasts).
    fn register_announce_handler(&self, handler: AnnounceHandler);

    /// Initiate a link to `to`'s per-call media destination. Resolves once
    /// the link reaches `ESTABLISHED`, or fails on the 10 s timeout.
    async fn open_link(&self, to: NodeId) -> Result<Arc<dyn LinkHandle>, TransportError>;

    /// Register the callback invoked when a peer opens a link to this
    /// identity's inbound media destination.
    fn accept_link(&self, handler: Arc<dyn Fn(Arc<dyn LinkHandle>) + Send + Sync>);
}

// ---------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------

struct NodeState {
    packet_handler: Option<PacketHandler>,
    link_acceptor: Option<Arc<dyn Fn(Arc<dyn LinkHandle>) + Send + Sync>>,
}

/// A shared in-memory mesh joining every [`MockTransport`] built against it.
/// Stands in for the real mesh substrate in tests and in `rphone-cli`'s
/// offline demo mode.
#[derive(Clone, Default)]
pub struct MockNetwork {
    nodes: Arc<Mutex<HashMap<NodeId, NodeState>>>,
    announce_handlers: Arc<Mutex<Vec<AnnounceHandler>>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast an announce to every transport that registered a handler.
    pub fn broadcast_announce(&self, destination_hash: [u8; 32], public_key: Vec<u8>, app_data: Vec<u8>) {
        for handler in self.announce_handlers.lock().unwrap().iter() {
            handler(destination_hash, public_key.clone(), app_data.clone());
        }
    }

    fn register_node(&self, id: NodeId) {
        self.nodes.lock().unwrap().entry(id).or_insert_with(|| NodeState {
            packet_handler: None,
            link_acceptor: None,
        });
    }
}

/// An in-memory [`Transport`] implementation. Delivery is synchronous and
/// always succeeds unless the destination was never registered on the
/// shared [`MockNetwork`], which mirrors "no route" in the real transport.
pub struct MockTransport {
    id: NodeId,
    network: MockNetwork,
}

impl MockTransport {
    pub fn new(id: NodeId, network: MockNetwork) -> Self {
        network.register_node(id);
        Self { id, network }
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_packet(&self, to: NodeId, payload: Vec<u8>) -> Result<(), TransportError> {
        let handler = {
            let nodes = self.network.nodes.lock().unwrap();
            nodes
                .get(&to)
                .and_then(|n| n.packet_handler.clone())
                .ok_or(TransportError::NoRoute(to))?
        };
        let from = self.id;
        handler(from, payload);
        Ok(())
    }

    fn register_packet_callback(&self, handler: PacketHandler) {
        let mut nodes = self.network.nodes.lock().unwrap();
        nodes
            .entry(self.id)
            .or_insert_with(|| NodeState {
                packet_handler: None,
                link_acceptor: None,
            })
            .packet_handler = Some(handler);
    }

    fn register_announce_handler(&self, handler: AnnounceHandler) {
        self.network.announce_handlers.lock().unwrap().push(handler);
    }

    async fn open_link(&self, to: NodeId) -> Result<Arc<dyn LinkHandle>, TransportError> {
        let acceptor = {
            let nodes = self.network.nodes.lock().unwrap();
            nodes
                .get(&to)
                .and_then(|n| n.link_acceptor.clone())
                .ok_or(TransportError::NoRoute(to))?
        };

        let mut link_id_bytes = self.id.as_bytes().to_vec();
        link_id_bytes.extend_from_slice(to.as_bytes());
        let link_id = LinkId(link_id_bytes);

        let (local, remote) = MockLink::pair(link_id);
        acceptor(Arc::new(remote));
        Ok(Arc::new(local))
    }

    fn accept_link(&self, handler: Arc<dyn Fn(Arc<dyn LinkHandle>) + Send + Sync>) {
        let mut nodes = self.network.nodes.lock().unwrap();
        nodes
            .entry(self.id)
            .or_insert_with(|| NodeState {
                packet_handler: None,
                link_acceptor: None,
            })
            .link_acceptor = Some(handler);
    }
}

struct MockLinkInner {
    link_id: LinkId,
    peer_callback: Mutex<Option<Arc<dyn Fn(Vec<u8>) + Send + Sync>>>,
    closed: std::sync::atomic::AtomicBool,
}

/// A paired, already-established link between two [`MockTransport`]s.
struct MockLink {
    inner: Arc<MockLinkInner>,
    peer: Arc<MockLinkInner>,
}

impl MockLink {
    fn pair(link_id: LinkId) -> (Self, Self) {
        let a = Arc::new(MockLinkInner {
            link_id: link_id.clone(),
            peer_callback: Mutex::new(None),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        let b = Arc::new(MockLinkInner {
            link_id,
            peer_callback: Mutex::new(None),
            closed: std::sync::atomic::AtomicBool::new(false),
        });
        (
            MockLink {
                inner: a.clone(),
                peer: b.clone(),
            },
            MockLink { inner: b, peer: a },
        )
    }
}

#[async_trait]
impl LinkHandle for MockLink {
    fn link_id(&self) -> LinkId {
        self.inner.link_id.clone()
    }

    fn is_established(&self) -> bool {
        !self.inner.closed.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn send(&self, data: Vec<u8>) -> Result<(), TransportError> {
        if self.inner.closed.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TransportError::LinkClosed);
        }
        if let Some(cb) = self.peer.peer_callback.lock().unwrap().as_ref() {
            cb(data);
        }
        Ok(())
    }

    fn register_receive_callback(&self, handler: Arc<dyn Fn(Vec<u8>) + Send + Sync>) {
        *self.inner.peer_callback.lock().unwrap() = Some(handler);
    }

    fn close(&self) {
        self.inner.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        self.peer.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn mock_transport_delivers_packets_between_two_nodes() {
        let network = MockNetwork::new();
        let alice = MockTransport::new(NodeId::from_bytes([1u8; 32]), network.clone());
        let bob = MockTransport::new(NodeId::from_bytes([2u8; 32]), network.clone());

        let received = Arc::new(AtomicBool::new(false));
        let received2 = received.clone();
        bob.register_packet_callback(Arc::new(move |_from, _payload| {
            received2.store(true, Ordering::SeqCst);
        }));

        alice
            .send_packet(bob.node_id(), b"hello".to_vec())
            .await
            .unwrap();

        assert!(received.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn send_to_unregistered_node_fails_with_no_route() {
        let network = MockNetwork::new();
        let alice = MockTransport::new(NodeId::from_bytes([1u8; 32]), network.clone());
        let ghost = NodeId::from_bytes([9u8; 32]);

        let result = alice.send_packet(ghost, b"hi".to_vec()).await;
        assert!(matches!(result, Err(TransportError::NoRoute(_))));
    }

    #[tokio::test]
    async fn opening_a_link_invokes_the_peer_acceptor() {
        let network = MockNetwork::new();
        let alice = MockTransport::new(NodeId::from_bytes([1u8; 32]), network.clone());
        let bob = MockTransport::new(NodeId::from_bytes([2u8; 32]), network.clone());

        let accepted = Arc::new(AtomicBool::new(false));
        let accepted2 = accepted.clone();
        bob.accept_link(Arc::new(move |_link| {
            accepted2.store(true, Ordering::SeqCst);
        }));

        let link = alice.open_link(bob.node_id()).await.unwrap();
        assert!(accepted.load(Ordering::SeqCst));
        assert!(link.is_established());
    }
}
