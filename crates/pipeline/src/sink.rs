//! Downstream block sink trait and types.

use async_trait::async_trait;

use crate::Block;

/// Sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The storage layer rejected the block.
    #[error("Store failed: {0}")]
    StoreFailed(String),
    /// The storage layer is not reachable.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Receipt returned by a sink once a block is durably accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StoreReceipt {
    /// Id of the stored block.
    pub block_id: crate::BlockId,
    /// Position of the block in the sink's accept order.
    pub sequence: u64,
}

/// Sink for completed blocks.
///
/// Implementations own the storage/management layer behind the generator;
/// `store` may block for as long as the storage layer needs. The drain worker
/// is the only caller, so implementations never see concurrent `store` calls
/// from a single generator.
#[async_trait]
pub trait BlockSink: Send + Sync {
    /// Item type carried by the blocks this sink accepts.
    type Item: Send;

    /// Store a completed block. Resolves once the block is accepted.
    async fn store(&mut self, block: Block<Self::Item>) -> Result<StoreReceipt, SinkError>;

    /// Check if the sink is healthy/reachable.
    async fn health_check(&self) -> Result<(), SinkError>;
}
