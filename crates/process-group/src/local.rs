//! In-process group of simulated ranks
//!
//! `LocalGroup::create(n)` hands out one handle per rank, all sharing a
//! reusable barrier and a round-based vote cell. Each simulated rank
//! runs as its own task; the collectives block exactly like a real
//! transport would, which makes partial-failure scenarios (one rank
//! failing its checkpoint write) reproducible in ordinary tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use runtime_core::Result;
use tokio::sync::Barrier;

use crate::ProcessGroup;
use tracing::debug;

#[derive(Debug)]
struct VoteRound {
    /// Ranks that still have to vote this round; 0 means idle
    pending: usize,

    /// Running AND of the votes cast so far
    conjunction: bool,

    /// Outcome of the last completed round
    result: bool,
}

#[derive(Debug)]
struct Shared {
    size: usize,
    barrier: Barrier,
    vote: Mutex<VoteRound>,
}

/// One rank's handle onto an in-process group
#[derive(Debug, Clone)]
pub struct LocalGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// Create a group of `size` ranks; returns one handle per rank
    pub fn create(size: usize) -> Vec<LocalGroup> {
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            vote: Mutex::new(VoteRound {
                pending: 0,
                conjunction: true,
                result: true,
            }),
        });

        debug!(size, "created in-process group");
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

#[async_trait]
impl ProcessGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    async fn barrier(&self) -> Result<()> {
        self.shared.barrier.wait().await;
        Ok(())
    }

    async fn all_succeeded(&self, local_ok: bool) -> Result<bool> {
        {
            let mut vote = self.shared.vote.lock();
            if vote.pending == 0 {
                // first voter of a new round
                vote.pending = self.shared.size;
                vote.conjunction = true;
            }
            vote.conjunction &= local_ok;
            vote.pending -= 1;
            if vote.pending == 0 {
                vote.result = vote.conjunction;
            }
        }

        // wait for every rank to vote, then read the settled result
        self.shared.barrier.wait().await;
        let result = self.shared.vote.lock().result;

        // hold the round open until every rank has read it
        self.shared.barrier.wait().await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_barrier_releases_together() {
        let handles: Vec<_> = LocalGroup::create(4)
            .into_iter()
            .map(|group| {
                tokio::spawn(async move {
                    group.barrier().await.unwrap();
                    group.rank()
                })
            })
            .collect();

        let mut ranks = Vec::new();
        for handle in handles {
            ranks.push(handle.await.unwrap());
        }
        ranks.sort_unstable();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unanimous_success() {
        let handles: Vec<_> = LocalGroup::create(3)
            .into_iter()
            .map(|group| tokio::spawn(async move { group.all_succeeded(true).await.unwrap() }))
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_single_failure_fails_all() {
        let handles: Vec<_> = LocalGroup::create(3)
            .into_iter()
            .map(|group| {
                tokio::spawn(async move {
                    let ok = group.rank() != 1;
                    group.all_succeeded(ok).await.unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(!handle.await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_vote_rounds_are_independent() {
        let handles: Vec<_> = LocalGroup::create(2)
            .into_iter()
            .map(|group| {
                tokio::spawn(async move {
                    let first = group.all_succeeded(group.rank() == 0).await.unwrap();
                    let second = group.all_succeeded(true).await.unwrap();
                    (first, second)
                })
            })
            .collect();

        for handle in handles {
            let (first, second) = handle.await.unwrap();
            assert!(!first);
            assert!(second);
        }
    }
}
