//! Block and block identifier types.

use std::fmt;

/// Opaque item payload (encoding is the producer's concern).
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    derive_more::Deref,
    derive_more::DerefMut,
    derive_more::From,
    derive_more::Into,
    derive_more::AsRef,
    derive_more::AsMut,
)]
pub struct Bytes(pub Vec<u8>);

/// Identifier of a generated block, unique within a generator instance.
///
/// Combines the owning receiver's numeric id with the timestamp of the start
/// of the interval the block covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    /// Numeric id of the receiver that produced the block.
    pub receiver_id: u64,
    /// Start of the covered interval, in milliseconds.
    pub created_at_ms: u64,
}

impl BlockId {
    /// Creates a block id for the given receiver and interval start.
    pub const fn new(receiver_id: u64, created_at_ms: u64) -> Self {
        Self { receiver_id, created_at_ms }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input-{}-{}", self.receiver_id, self.created_at_ms)
    }
}

/// An ordered group of items sealed together by a roll.
#[derive(Clone, Debug)]
pub struct Block<T> {
    /// Identifier of the block.
    pub id: BlockId,
    /// Items in admission order.
    pub items: Vec<T>,
}

impl<T> Block<T> {
    /// Creates a block from an id and its sealed items.
    pub const fn new(id: BlockId, items: Vec<T>) -> Self {
        Self { id, items }
    }

    /// Returns the number of items in the block.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the block carries no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn bytes_deref_to_inner() {
        let payload = Bytes(vec![1, 2, 3]);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload.0, vec![1, 2, 3]);
    }

    #[test]
    fn bytes_from_vec() {
        let payload = Bytes::from(vec![0xde, 0xad]);
        assert_eq!(payload.0, vec![0xde, 0xad]);
    }

    #[rstest]
    #[case(0, 0, "input-0-0")]
    #[case(3, 1500, "input-3-1500")]
    #[case(42, 1_700_000_000_000, "input-42-1700000000000")]
    fn block_id_display(#[case] receiver_id: u64, #[case] created_at_ms: u64, #[case] expected: &str) {
        let id = BlockId::new(receiver_id, created_at_ms);
        assert_eq!(id.to_string(), expected);
    }

    #[test]
    fn block_id_orders_by_receiver_then_time() {
        let a = BlockId::new(1, 200);
        let b = BlockId::new(1, 400);
        let c = BlockId::new(2, 100);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn block_id_equality() {
        assert_eq!(BlockId::new(7, 100), BlockId::new(7, 100));
        assert_ne!(BlockId::new(7, 100), BlockId::new(7, 200));
    }

    #[test]
    fn block_len_and_empty() {
        let id = BlockId::new(0, 100);
        let empty: Block<Bytes> = Block::new(id, vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);

        let block = Block::new(id, vec![Bytes(vec![1]), Bytes(vec![2])]);
        assert!(!block.is_empty());
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn block_preserves_item_order() {
        let items: Vec<Bytes> = (0u8..5).map(|i| Bytes(vec![i])).collect();
        let block = Block::new(BlockId::new(1, 0), items);
        for (i, item) in block.items.iter().enumerate() {
            assert_eq!(item.0, vec![i as u8]);
        }
    }
}
