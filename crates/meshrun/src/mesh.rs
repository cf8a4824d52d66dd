//! # In-Memory Mesh
//!
//! A process-local network of peers, connected by tokio channels.
//!
//! Every joined peer gets a broadcast endpoint and a unicast endpoint. Broadcast
//! delivery is FIFO per sender, which is a valid causal order when every peer
//! lives in the same process. Used by the test suite and by demos that run
//! several interpreters side by side.

use std::sync::Arc;

use dashmap::DashMap;
use meshrpc::CausalToken;
use meshrpc::PeerId;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::store::Membership;
use crate::transport;
use crate::transport::Broadcast;
use crate::transport::Unicast;

/// Inbound queues of one joined peer.
struct Route {
    broadcast: mpsc::UnboundedSender<Vec<u8>>,
    unicast: mpsc::UnboundedSender<(PeerId, Vec<u8>)>,
}

#[derive(Default)]
struct MeshInner {
    routes: DashMap<PeerId, Route>,
    /// Highest token counter delivered per origin.
    delivered: DashMap<PeerId, u64>,
}

/// Handle to an in-memory network. Cheap to clone.
#[derive(Clone, Default)]
pub struct Mesh {
    inner: Arc<MeshInner>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `peer` to the mesh and returns its two endpoints.
    ///
    /// Joining again under the same identifier replaces the previous route;
    /// the old endpoints then see their channels close.
    pub fn join(&self, peer: PeerId) -> (MeshBroadcast, MeshUnicast) {
        let (btx, brx) = mpsc::unbounded_channel();
        let (utx, urx) = mpsc::unbounded_channel();

        self.inner.routes.insert(peer.clone(), Route { broadcast: btx, unicast: utx });
        debug!(%peer, "joined mesh");

        let broadcast = MeshBroadcast {
            peer: peer.clone(),
            mesh: self.clone(),
            rx: Arc::new(Mutex::new(brx)),
        };
        let unicast = MeshUnicast {
            peer,
            mesh: self.clone(),
            rx: Arc::new(Mutex::new(urx)),
        };
        (broadcast, unicast)
    }

    /// Removes `peer`; its receivers observe a closed channel.
    pub fn leave(&self, peer: &PeerId) {
        self.inner.routes.remove(peer);
        debug!(%peer, "left mesh");
    }

    /// Every joined peer except `peer`, in a stable order.
    pub fn neighbours(&self, peer: &PeerId) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.inner.routes
            .iter()
            .map(|e| e.key().clone())
            .filter(|p| p != peer)
            .collect();
        peers.sort();
        peers
    }

    /// A membership view of the mesh as seen from `peer`.
    pub fn membership(&self, peer: PeerId) -> MeshMembership {
        MeshMembership { peer, mesh: self.clone() }
    }

    /// Records `token` as delivered. Returns false if it is not newer than
    /// the last token seen from the same origin; such a broadcast is refused,
    /// not delivered.
    fn admit(&self, token: &CausalToken) -> bool {
        let mut last = self.inner.delivered.entry(token.origin.clone()).or_insert(0);
        if token.counter <= *last {
            return false;
        }
        *last = token.counter;
        true
    }
}

/// Broadcast endpoint of one mesh peer.
pub struct MeshBroadcast {
    peer: PeerId,
    mesh: Mesh,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

#[async_trait::async_trait]
impl Broadcast for MeshBroadcast {
    async fn send(&self, payload: &[u8], token: CausalToken) -> transport::Result<()> {
        if !self.mesh.admit(&token) {
            debug!(peer = %self.peer, origin = %token.origin, counter = token.counter, "refusing stale broadcast");
            return Err(transport::Error::StaleToken(token));
        }

        for route in self.mesh.inner.routes.iter() {
            if route.key() == &self.peer {
                continue;
            }
            // A closed receiver means that peer stopped listening; others still get it.
            let _ = route.value().broadcast.send(payload.to_vec());
        }
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}

/// Unicast endpoint of one mesh peer.
pub struct MeshUnicast {
    peer: PeerId,
    mesh: Mesh,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<(PeerId, Vec<u8>)>>>,
}

#[async_trait::async_trait]
impl Unicast for MeshUnicast {
    async fn send(&self, payload: &[u8], peer: &PeerId) -> transport::Result<()> {
        let route = self.mesh.inner.routes
            .get(peer)
            .ok_or_else(|| transport::Error::UnknownPeer(peer.clone()))?;

        route.unicast
            .send((self.peer.clone(), payload.to_vec()))
            .map_err(|_| transport::Error::ConnectionLost("Channel closed".into()))
    }

    async fn recv(&self) -> transport::Result<Option<(PeerId, Vec<u8>)>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}

/// Neighbour view backed by the mesh routing table.
#[derive(Clone)]
pub struct MeshMembership {
    peer: PeerId,
    mesh: Mesh,
}

impl Membership for MeshMembership {
    fn neighbours(&self) -> Vec<PeerId> {
        self.mesh.neighbours(&self.peer)
    }
}
