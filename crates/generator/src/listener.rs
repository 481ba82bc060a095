//! Listener capability invoked at the generator's lifecycle points.

use async_trait::async_trait;
use rill_pipeline::{Block, BlockId};

use crate::error::ListenerError;

/// Callbacks a [`BlockGenerator`](crate::BlockGenerator) invokes on behalf of
/// its owner.
///
/// Two callbacks are dispatched while the generator holds its state mutex:
/// [`on_add_data`](Self::on_add_data) and
/// [`on_generate_block`](Self::on_generate_block). They therefore never
/// overlap with each other or with buffer mutation, which lets an
/// implementation keep per-item accounting and per-block accounting
/// consistent without its own locking. In exchange both must be fast and
/// non-blocking.
///
/// [`on_push_block`](Self::on_push_block) is invoked only by the drain
/// worker, one block at a time, and may block for as long as the downstream
/// sink needs. [`on_error`](Self::on_error) may fire from any worker
/// concurrently with the other callbacks; implementations must be
/// concurrency-safe there.
#[async_trait]
pub trait BlockListener: Send + Sync + 'static {
    /// Item type ingested by the generator.
    type Item: Send + 'static;
    /// Metadata supplied with callback admissions.
    type Metadata: Send + 'static;

    /// Called after an admission lands in the current buffer.
    ///
    /// `items` borrows the tail of the current buffer holding exactly the
    /// items of this admission (one for the single-item variant, the whole
    /// group for the multi-item variant). An error is propagated to the
    /// `add*` caller; the items stay admitted.
    fn on_add_data(
        &self,
        items: &[Self::Item],
        metadata: &Self::Metadata,
    ) -> Result<(), ListenerError>;

    /// Called when the current buffer is about to be sealed under `block_id`.
    ///
    /// An error cancels the roll: the buffer is left intact for the next
    /// tick and the failure is routed to [`on_error`](Self::on_error).
    fn on_generate_block(&self, block_id: BlockId) -> Result<(), ListenerError>;

    /// Called by the drain worker to hand a completed block downstream.
    async fn on_push_block(&self, block: Block<Self::Item>) -> Result<(), ListenerError>;

    /// Called when a worker encounters an error it can survive.
    fn on_error(&self, message: &str, cause: &ListenerError);
}
