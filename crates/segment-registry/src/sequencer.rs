//! Global logical iteration counter

use std::sync::atomic::{AtomicU64, Ordering};

use runtime_core::Iteration;

/// Monotonically increasing count of completed logical steps
///
/// `advance` is the sole mutator during normal execution; recovery
/// restores the counter wholesale. The counter is deliberately decoupled
/// from checkpointing: applications advance every loop iteration and
/// checkpoint every N, and their own loop condition
/// (`while sequencer.current() < max_iterations`) makes a restarted run
/// skip the iterations the restored counter already covers.
#[derive(Debug, Default)]
pub struct IterationSequencer {
    iteration: AtomicU64,
}

impl IterationSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of completed iterations
    pub fn current(&self) -> Iteration {
        self.iteration.load(Ordering::SeqCst)
    }

    /// Complete one iteration and return the new count
    pub fn advance(&self) -> Iteration {
        self.iteration.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Set the counter from a recovered checkpoint
    pub fn restore(&self, iteration: Iteration) {
        self.iteration.store(iteration, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let sequencer = IterationSequencer::new();
        assert_eq!(sequencer.current(), 0);
        for expected in 1..=50 {
            assert_eq!(sequencer.advance(), expected);
        }
        assert_eq!(sequencer.current(), 50);
    }

    #[test]
    fn test_restore() {
        let sequencer = IterationSequencer::new();
        sequencer.advance();
        sequencer.restore(1000);
        assert_eq!(sequencer.current(), 1000);
        assert_eq!(sequencer.advance(), 1001);
    }
}
