//! Bounded queue of completed blocks.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use rill_pipeline::Block;
use tokio::sync::{Notify, Semaphore};

use crate::GeneratorError;

/// Fixed-capacity FIFO between the roll worker and the drain worker.
///
/// Insertion waits while the queue is full; this is the backpressure path
/// from a slow drain back to the roll worker. Removal is single-consumer.
/// Capacity is tracked by a semaphore whose permits stay consumed for as
/// long as a block occupies a slot.
pub(crate) struct BlockQueue<T> {
    blocks: Mutex<VecDeque<Block<T>>>,
    capacity: usize,
    slots: Semaphore,
    arrived: Notify,
}

impl<T> BlockQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Block queue capacity must be greater than zero");
        Self {
            blocks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            slots: Semaphore::new(capacity),
            arrived: Notify::new(),
        }
    }

    /// Inserts a block, waiting while the queue is full.
    pub(crate) async fn push(&self, block: Block<T>) -> Result<(), GeneratorError> {
        let permit = self.slots.acquire().await.map_err(|_| GeneratorError::QueueClosed)?;
        self.blocks.lock().unwrap().push_back(block);
        permit.forget();
        self.arrived.notify_one();
        Ok(())
    }

    /// Removes the oldest block without waiting.
    pub(crate) fn try_take(&self) -> Option<Block<T>> {
        let block = self.blocks.lock().unwrap().pop_front()?;
        self.slots.add_permits(1);
        Some(block)
    }

    /// Removes the oldest block, waiting until one arrives.
    pub(crate) async fn take(&self) -> Block<T> {
        loop {
            // Register for arrivals before the check so an insert between the
            // check and the await is not lost.
            let arrived = self.arrived.notified();
            if let Some(block) = self.try_take() {
                return block;
            }
            arrived.await;
        }
    }

    /// Removes the oldest block, waiting at most `timeout` for one.
    pub(crate) async fn poll(&self, timeout: Duration) -> Option<Block<T>> {
        tokio::time::timeout(timeout, self.take()).await.ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.blocks.lock().unwrap().is_empty()
    }

    #[cfg(test)]
    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> std::fmt::Debug for BlockQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rill_pipeline::BlockId;

    use super::*;

    fn block(k: u64) -> Block<u64> {
        Block::new(BlockId::new(0, k * 100), vec![k])
    }

    #[test]
    #[should_panic(expected = "Block queue capacity must be greater than zero")]
    fn new_panics_on_zero_capacity() {
        let _ = BlockQueue::<u64>::new(0);
    }

    #[test]
    fn new_queue_is_empty() {
        let queue = BlockQueue::<u64>::new(4);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.capacity(), 4);
    }

    #[tokio::test]
    async fn push_and_take_preserve_fifo_order() {
        let queue = BlockQueue::new(4);
        for k in 0..4 {
            queue.push(block(k)).await.unwrap();
        }
        assert_eq!(queue.len(), 4);

        for k in 0..4 {
            let taken = queue.take().await;
            assert_eq!(taken.items, vec![k]);
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn push_waits_while_full() {
        let queue = Arc::new(BlockQueue::new(2));
        queue.push(block(0)).await.unwrap();
        queue.push(block(1)).await.unwrap();

        let pusher = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.push(block(2)).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pusher.is_finished(), "push into a full queue must wait");
        assert_eq!(queue.len(), 2);

        // Removing one block frees a slot for the waiting pusher.
        let taken = queue.take().await;
        assert_eq!(taken.items, vec![0]);
        tokio::time::timeout(Duration::from_secs(1), pusher).await.unwrap().unwrap().unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn poll_times_out_on_empty_queue() {
        let queue = BlockQueue::<u64>::new(2);
        let polled = queue.poll(Duration::from_millis(10)).await;
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn poll_returns_a_waiting_block() {
        let queue = BlockQueue::new(2);
        queue.push(block(7)).await.unwrap();
        let polled = queue.poll(Duration::from_millis(10)).await;
        assert_eq!(polled.map(|b| b.items), Some(vec![7]));
    }

    #[tokio::test]
    async fn take_resolves_when_a_block_arrives() {
        let queue = Arc::new(BlockQueue::new(2));

        let taker = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move { queue.take().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!taker.is_finished());

        queue.push(block(3)).await.unwrap();
        let taken = tokio::time::timeout(Duration::from_secs(1), taker).await.unwrap().unwrap();
        assert_eq!(taken.items, vec![3]);
    }

    #[test]
    fn try_take_on_empty_returns_none() {
        let queue = BlockQueue::<u64>::new(2);
        assert!(queue.try_take().is_none());
    }
}
