use std::num::NonZeroU64;

use crate::types::transfer::{BlockId, BlockSpec, TransferPlan};

/// Splits an object of `object_size` bytes into `object_size / max_block_size + 1`
/// consecutive blocks.
///
/// Every block but the last is exactly `max_block_size` long. The last one holds
/// the remainder and is empty when the size is a multiple of the block size
/// (including an empty object); callers skip empty blocks.
pub fn plan_transfer(object_size: u64, max_block_size: NonZeroU64) -> TransferPlan {
    let block_size = max_block_size.get();
    let block_count = object_size / block_size + 1;

    let blocks = (0..block_count)
        .map(|index| {
            let offset = index * block_size;
            BlockSpec {
                index,
                offset,
                length: block_size.min(object_size - offset),
                block_id: BlockId::from_index(index),
            }
        })
        .collect();

    TransferPlan { object_size, max_block_size: block_size, blocks }
}
