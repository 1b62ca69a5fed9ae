//! The strictly nested stack of active phase contexts.
//!
//! One context per in-flight unit of work, LIFO, single-threaded. The stack
//! must be empty between ticks; a leaked context corrupts attribution for all
//! subsequent work and is surfaced as a hard error, never swallowed.

use crate::context::PhaseContext;
use crate::TrackerError;

// ---------------------------------------------------------------------------
// PhaseStack
// ---------------------------------------------------------------------------

/// A bounded LIFO stack of [`PhaseContext`]s.
///
/// The depth bound exists to catch runaway re-entrancy (an explosion
/// triggering an explosion triggering an explosion without end); exceeding it
/// fails fast instead of silently continuing.
#[derive(Debug)]
pub struct PhaseStack {
    contexts: Vec<PhaseContext>,
    max_depth: usize,
}

impl PhaseStack {
    /// Create an empty stack with the given depth bound.
    pub fn new(max_depth: usize) -> Self {
        assert!(max_depth > 0, "max_depth must be at least 1");
        Self {
            contexts: Vec::new(),
            max_depth,
        }
    }

    /// Push a context for a unit of work that is about to begin.
    pub fn push(&mut self, context: PhaseContext) -> Result<(), TrackerError> {
        if self.contexts.len() >= self.max_depth {
            return Err(TrackerError::DepthExceeded {
                depth: self.contexts.len() + 1,
                limit: self.max_depth,
            });
        }
        self.contexts.push(context);
        Ok(())
    }

    /// Pop the context of the unit of work that just ended.
    pub fn pop(&mut self) -> Option<PhaseContext> {
        self.contexts.pop()
    }

    /// The currently active context, if any. An empty stack is a valid
    /// "no active phase" state (e.g. during initialization).
    pub fn peek(&self) -> Option<&PhaseContext> {
        self.contexts.last()
    }

    /// Mutable access to the currently active context.
    pub fn peek_mut(&mut self) -> Option<&mut PhaseContext> {
        self.contexts.last_mut()
    }

    /// Number of in-flight units of work.
    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// The configured depth bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Verify the empty-at-idle invariant.
    pub fn assert_idle(&self) -> Result<(), TrackerError> {
        if self.contexts.is_empty() {
            Ok(())
        } else {
            Err(TrackerError::LeakedContexts {
                remaining: self.contexts.len(),
            })
        }
    }

    /// Discard contexts above `depth`. Recovery path for an unbalanced unit
    /// of work; the discarded captures are never flushed.
    pub(crate) fn truncate(&mut self, depth: usize) {
        self.contexts.truncate(depth);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
