//! Append-only capture buffers with drain-once discipline.
//!
//! A [`CaptureBuffer`] records proposed side effects of one category during a
//! unit of work instead of letting them apply immediately. The owning flush
//! drains it exactly once; appends after the drain mean the context is being
//! reused past its lifetime and are rejected as a contract violation.

use crate::TrackerError;

// ---------------------------------------------------------------------------
// Category names
// ---------------------------------------------------------------------------

/// Capture category names, used in diagnostics and error messages.
pub mod category {
    pub const BLOCK_CHANGES: &str = "block_changes";
    pub const ENTITY_SPAWNS: &str = "entity_spawns";
    pub const ITEM_DROPS: &str = "item_drops";
    pub const BLOCK_ITEM_DROPS: &str = "block_item_drops";
    pub const ITEM_STACK_DROPS: &str = "item_stack_drops";
}

// ---------------------------------------------------------------------------
// CaptureBuffer
// ---------------------------------------------------------------------------

/// An ordered, append-only buffer of captured effects, scoped to one context.
///
/// The buffer records which phase and source it serves so a rejected capture
/// can identify the offending context, not just the category.
///
/// Invariants:
/// - Items come back out of [`drain`](Self::drain) in insertion order.
/// - `drain` empties the buffer; a second call yields an empty vector.
/// - [`capture`](Self::capture) after `drain` returns
///   [`TrackerError::CaptureAfterDrain`] rather than silently accepting.
#[derive(Debug)]
pub struct CaptureBuffer<T> {
    items: Vec<T>,
    drained: bool,
    category: &'static str,
    phase: &'static str,
    source: String,
}

impl<T> CaptureBuffer<T> {
    /// Create an empty buffer for the named category, owned by the context
    /// for `phase` rooted at the described `source`.
    pub fn new(category: &'static str, phase: &'static str, source: String) -> Self {
        Self {
            items: Vec::new(),
            drained: false,
            category,
            phase,
            source,
        }
    }

    /// The category this buffer belongs to.
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Append a captured item.
    pub fn capture(&mut self, item: T) -> Result<(), TrackerError> {
        if self.drained {
            return Err(TrackerError::CaptureAfterDrain {
                category: self.category,
                phase: self.phase,
                source_desc: self.source.clone(),
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Empty the buffer, returning everything captured in insertion order.
    ///
    /// The first call returns the captures; any later call returns an empty
    /// vector, and the buffer refuses further captures.
    pub fn drain(&mut self) -> Vec<T> {
        self.drained = true;
        std::mem::take(&mut self.items)
    }

    /// Whether nothing has been captured (or everything was drained).
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of captured items not yet drained.
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
