//! Item stacks and pending drops.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ItemStack
// ---------------------------------------------------------------------------

/// A stack of items of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type identifier, e.g. `"rotten_flesh"`, `"bone"`.
    pub item: String,
    /// Stack size, always at least 1.
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: &str, count: u32) -> Self {
        debug_assert!(count >= 1, "item stack count must be at least 1");
        Self {
            item: item.to_owned(),
            count,
        }
    }

    /// A single item.
    pub fn single(item: &str) -> Self {
        Self::new(item, 1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
