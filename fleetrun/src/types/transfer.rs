use std::fmt;

const BLOCK_ID_PREFIX: &str = "block-";
/// Wide enough for any `u64`, so ids sort in block order.
const BLOCK_INDEX_WIDTH: usize = 20;

/// Identifier of one block of a transfer. Only ASCII letters, digits and `-`,
/// so it is usable both as a storage block name and as a file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(String);

impl BlockId {
    pub fn from_index(index: u64) -> Self {
        Self(format!("{BLOCK_ID_PREFIX}{index:0width$}", width = BLOCK_INDEX_WIDTH))
    }

    /// Recovers the block index, `None` if the id was not produced by [`BlockId::from_index`].
    pub fn index(&self) -> Option<u64> {
        let digits = self.0.strip_prefix(BLOCK_ID_PREFIX)?;
        if digits.len() != BLOCK_INDEX_WIDTH {
            return None;
        }
        digits.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub index: u64,
    pub offset: u64,
    pub length: u64,
    pub block_id: BlockId,
}

impl BlockSpec {
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Inclusive end offset, only meaningful for non-empty blocks.
    pub fn last_byte(&self) -> u64 {
        self.offset + self.length.saturating_sub(1)
    }
}

/// Ordered partition of `[0, object_size)` into blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub object_size: u64,
    pub max_block_size: u64,
    pub blocks: Vec<BlockSpec>,
}

impl TransferPlan {
    pub fn non_empty_blocks(&self) -> impl Iterator<Item = &BlockSpec> {
        self.blocks.iter().filter(|block| !block.is_empty())
    }

    /// Ids to commit, in block order.
    pub fn committed_block_ids(&self) -> Vec<BlockId> {
        self.non_empty_blocks().map(|block| block.block_id.clone()).collect()
    }
}
