// alife-master: CIS client pool

use alife_proto::cell_interaction_service_client::CellInteractionServiceClient;
use tokio::sync::{mpsc, Mutex};
use tonic::transport::Channel;

pub type CisClient = CellInteractionServiceClient<Channel>;

/// Bounded FIFO of live CIS clients, shared by all dispatchers.
///
/// Capacity must be at least the peak number of concurrently borrowed
/// clients; a full pool blocks the borrower that is returning one.
pub struct CisClientPool {
    sender: mpsc::Sender<CisClient>,
    receiver: Mutex<mpsc::Receiver<CisClient>>,
}

impl CisClientPool {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Hand a client to the pool, waiting while the pool is full.
    pub async fn add(&self, client: CisClient) {
        // The pool owns its receiver for its whole lifetime, so the channel
        // cannot be closed underneath a send.
        let _ = self.sender.send(client).await;
    }

    /// Borrow the next free client, waiting until one is available.
    pub async fn get(&self) -> CisClient {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(client) => client,
            // Unreachable while the pool holds a sender.
            None => unreachable!("client pool channel closed"),
        }
    }
}
