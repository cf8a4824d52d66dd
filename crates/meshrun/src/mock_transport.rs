//! Mock transports for testing.
//!
//! These record what the interpreter sends and let tests inject what it receives.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use meshrpc::CausalToken;
use meshrpc::Command;
use meshrpc::PeerId;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

use crate::transport;
use crate::transport::Broadcast;
use crate::transport::Unicast;

/// Broadcast transport that records sends and replays injected payloads.
pub struct RecordingBroadcast {
    sent: Arc<StdMutex<Vec<(Vec<u8>, CausalToken)>>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

/// Test-side handle of a `RecordingBroadcast`.
#[derive(Clone)]
pub struct BroadcastProbe {
    sent: Arc<StdMutex<Vec<(Vec<u8>, CausalToken)>>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl RecordingBroadcast {
    pub fn new() -> (Self, BroadcastProbe) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            sent: sent.clone(),
            rx: Arc::new(Mutex::new(rx)),
        };
        (transport, BroadcastProbe { sent, tx })
    }
}

impl BroadcastProbe {
    /// Decoded commands sent so far, with their tokens.
    pub fn sent(&self) -> Vec<(Command, CausalToken)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(bytes, token)| (meshrpc::decode(bytes).unwrap(), token.clone()))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn inject(&self, command: &Command) {
        self.tx.send(meshrpc::encode(command).unwrap()).unwrap();
    }
}

#[async_trait::async_trait]
impl Broadcast for RecordingBroadcast {
    async fn send(&self, payload: &[u8], token: CausalToken) -> transport::Result<()> {
        self.sent.lock().unwrap().push((payload.to_vec(), token));
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}

/// Unicast transport that records sends and replays injected payloads.
pub struct RecordingUnicast {
    sent: Arc<StdMutex<Vec<(Vec<u8>, PeerId)>>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<(PeerId, Vec<u8>)>>>,
}

#[derive(Clone)]
pub struct UnicastProbe {
    sent: Arc<StdMutex<Vec<(Vec<u8>, PeerId)>>>,
    tx: mpsc::UnboundedSender<(PeerId, Vec<u8>)>,
}

impl RecordingUnicast {
    pub fn new() -> (Self, UnicastProbe) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            sent: sent.clone(),
            rx: Arc::new(Mutex::new(rx)),
        };
        (transport, UnicastProbe { sent, tx })
    }
}

impl UnicastProbe {
    pub fn sent(&self) -> Vec<(Command, PeerId)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(bytes, peer)| (meshrpc::decode(bytes).unwrap(), peer.clone()))
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn inject(&self, from: &PeerId, command: &Command) {
        self.tx.send((from.clone(), meshrpc::encode(command).unwrap())).unwrap();
    }
}

#[async_trait::async_trait]
impl Unicast for RecordingUnicast {
    async fn send(&self, payload: &[u8], peer: &PeerId) -> transport::Result<()> {
        self.sent.lock().unwrap().push((payload.to_vec(), peer.clone()));
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<(PeerId, Vec<u8>)>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }
}

/// Broadcast transport whose sends always fail.
pub struct DeadBroadcast;

#[async_trait::async_trait]
impl Broadcast for DeadBroadcast {
    async fn send(&self, _payload: &[u8], _token: CausalToken) -> transport::Result<()> {
        Err(transport::Error::ConnectionLost("Channel closed".into()))
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}
