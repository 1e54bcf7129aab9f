//! TCP peer server. Frames are newline-delimited JSON [`PeerMessage`]s.

use crate::message::PeerMessage;
use crate::Broadcast;
use anyhow::{Context, Result};
use ledger_core::{Chain, Transaction, TransactionPool};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

pub type PeerId = u64;

/// Longest accepted frame, excluding the newline. Longer frames drop the peer.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;
/// Frames queued per peer before further sends to it are dropped.
pub const OUTBOX_CAPACITY: usize = 64;

/// Live peer set plus the local chain and pool it feeds.
#[derive(Clone)]
pub struct P2pServer {
    chain: Chain,
    pool: Arc<dyn TransactionPool>,
    peers: Arc<Mutex<HashMap<PeerId, mpsc::Sender<String>>>>,
    next_id: Arc<AtomicU64>,
}

impl P2pServer {
    pub fn new(chain: Chain, pool: Arc<dyn TransactionPool>) -> Self {
        Self {
            chain,
            pool,
            peers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Bind `addr` and accept peers in the background. Returns the bound address.
    pub async fn listen(&self, addr: &str) -> Result<SocketAddr> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding p2p listener on {addr}"))?;
        let local = listener.local_addr()?;
        info!("listening for peer-to-peer connections on {local}");

        let server = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        server.connect_socket(stream, addr);
                    }
                    Err(e) => warn!(error = %e, "failed to accept peer"),
                }
            }
        });
        Ok(local)
    }

    /// Dial every configured peer; failures are logged and skipped.
    pub async fn connect_to_peers(&self, peers: &[String]) {
        for peer in peers {
            if let Err(e) = self.connect(peer).await {
                warn!(%peer, error = %e, "could not connect to peer");
            }
        }
    }

    pub async fn connect(&self, addr: &str) -> Result<PeerId> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connecting to peer {addr}"))?;
        let peer_addr = stream.peer_addr()?;
        Ok(self.connect_socket(stream, peer_addr))
    }

    fn connect_socket(&self, stream: TcpStream, addr: SocketAddr) -> PeerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reader, writer) = stream.into_split();
        let (outbox, inbox) = mpsc::channel(OUTBOX_CAPACITY);

        self.peers().insert(id, outbox);
        info!(peer = id, %addr, "socket connected");

        tokio::spawn(write_frames(id, writer, inbox));
        let server = self.clone();
        tokio::spawn(async move {
            server.read_frames(id, reader).await;
            server.peers().remove(&id);
            info!(peer = id, %addr, "socket disconnected");
        });

        self.send_chain(id);
        id
    }

    async fn read_frames(&self, id: PeerId, reader: OwnedReadHalf) {
        let mut reader = BufReader::new(reader);
        let mut frame = Vec::new();
        loop {
            frame.clear();
            let limit = MAX_FRAME_LEN as u64 + 1;
            match (&mut reader).take(limit).read_until(b'\n', &mut frame).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(peer = id, error = %e, "peer read failed");
                    break;
                }
            }
            if frame.last() != Some(&b'\n') && frame.len() > MAX_FRAME_LEN {
                warn!(peer = id, limit = MAX_FRAME_LEN, "frame too long, dropping peer");
                break;
            }
            let line = match std::str::from_utf8(&frame) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(peer = id, error = %e, "dropping message");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match PeerMessage::decode(line) {
                Ok(message) => {
                    debug!(peer = id, kind = message.kind(), "received message");
                    self.handle_message(message).await;
                }
                Err(e) => warn!(peer = id, error = %e, "dropping message"),
            }
        }
    }

    /// Apply one received message to the local chain or pool.
    pub async fn handle_message(&self, message: PeerMessage) {
        match message {
            PeerMessage::Chain { chain } => {
                let local = self.chain.clone();
                // rejections are logged by the chain itself
                if let Err(e) = tokio::task::spawn_blocking(move || local.replace_chain(chain)).await {
                    warn!(error = %e, "chain replacement task failed");
                }
            }
            PeerMessage::Transaction { transaction } => {
                self.pool.update_or_add_transaction(transaction);
            }
            PeerMessage::ClearTransactions => self.pool.clear(),
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<PeerId, mpsc::Sender<String>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn peer_count(&self) -> usize {
        self.peers().len()
    }

    fn send(&self, id: PeerId, message: &PeerMessage) {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode message");
                return;
            }
        };
        if let Some(outbox) = self.peers().get(&id) {
            enqueue(id, outbox, frame);
        }
    }

    fn broadcast(&self, message: &PeerMessage) {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode message");
                return;
            }
        };
        let peers = self.peers();
        debug!(kind = message.kind(), peers = peers.len(), "broadcasting");
        for (id, outbox) in peers.iter() {
            enqueue(*id, outbox, frame.clone());
        }
    }

    fn send_chain(&self, id: PeerId) {
        let chain = self.chain.blocks().to_vec();
        self.send(id, &PeerMessage::Chain { chain });
    }
}

impl Broadcast for P2pServer {
    fn sync_chains(&self) {
        let chain = self.chain.blocks().to_vec();
        self.broadcast(&PeerMessage::Chain { chain });
    }

    fn broadcast_transaction(&self, transaction: &Transaction) {
        self.broadcast(&PeerMessage::Transaction {
            transaction: transaction.clone(),
        });
    }

    fn broadcast_clear_transactions(&self) {
        self.broadcast(&PeerMessage::ClearTransactions);
    }
}

/// Queue a frame without waiting; a full outbox drops the frame.
fn enqueue(id: PeerId, outbox: &mpsc::Sender<String>, frame: String) {
    match outbox.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(peer = id, "peer outbox full, dropping frame"),
        Err(TrySendError::Closed(_)) => debug!(peer = id, "peer writer gone"),
    }
}

/// Drain one peer's outbox. A slow peer only backs up its own queue.
async fn write_frames(
    id: PeerId,
    mut writer: OwnedWriteHalf,
    mut inbox: mpsc::Receiver<String>,
) {
    while let Some(frame) = inbox.recv().await {
        let result = async {
            writer.write_all(frame.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!(peer = id, error = %e, "peer write failed");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::MemPool;

    #[test]
    fn stalled_peer_outbox_is_capped() {
        let server = P2pServer::new(Chain::new(), Arc::new(MemPool::new()));
        let (outbox, mut inbox) = mpsc::channel(OUTBOX_CAPACITY);
        server.peers().insert(7, outbox);

        for _ in 0..OUTBOX_CAPACITY + 10 {
            server.sync_chains();
        }
        server.broadcast_clear_transactions();

        let mut queued = 0;
        while let Ok(frame) = inbox.try_recv() {
            assert!(frame.starts_with(r#"{"type":"CHAIN""#));
            queued += 1;
        }
        assert_eq!(queued, OUTBOX_CAPACITY);
    }
}
