//! Multi-rank collective scenarios
//!
//! Simulates a process group in-process: one tokio task per rank, each
//! with its own coordinator and its own store, joined by the shared
//! `LocalGroup` collectives. This is the same topology a real deployment
//! has (segments are per-process state, storage is per-rank), so the
//! unanimous-commit protocol is exercised for real.

use std::sync::Arc;

use anyhow::Result;
use coordinator::Coordinator;
use process_group::{LocalGroup, ProcessGroup};
use runtime_core::{CheckpointConfig, Error, ShapeKind};
use segment_registry::Initializer;
use storage::MemoryStore;

const WORLD: usize = 3;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

async fn make_running(group: LocalGroup, store: Arc<MemoryStore>) -> Result<Coordinator> {
    let co = Coordinator::new(Arc::new(group));
    co.initialize_with_store(store, CheckpointConfig::default(), false)
        .await?;
    Ok(co)
}

#[tokio::test]
async fn test_collective_checkpoint_and_recovery() -> Result<()> {
    init_tracing();
    let groups = LocalGroup::create(WORLD);

    let mut handles = Vec::new();
    for group in groups {
        handles.push(tokio::spawn(async move {
            let rank = group.rank();
            let store = Arc::new(MemoryStore::new());
            let co = make_running(group, store).await?;

            // every rank registers the same names with matching shapes
            let view = co.register(
                "local_sum",
                ShapeKind::Vector,
                &[32],
                Initializer::Constant(0.0f64),
            )?;
            co.start().await?;

            // rank-dependent contents, as in any real domain decomposition
            {
                let mut data = view.write();
                for (i, slot) in data.iter_mut().enumerate() {
                    *slot = (rank * 1000 + i) as f64;
                }
            }
            co.advance();
            co.checkpoint(1).await?;

            view.write().fill(f64::NAN);
            co.recover().await?;

            {
                let data = view.read();
                for (i, &v) in data.iter().enumerate() {
                    assert_eq!(v, (rank * 1000 + i) as f64);
                }
            }

            co.finalize().await?;
            anyhow::Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }
    Ok(())
}

#[tokio::test]
async fn test_rejected_checkpoint_is_invisible_to_every_rank() -> Result<()> {
    init_tracing();
    let groups = LocalGroup::create(WORLD);
    let faulty_rank = 1usize;

    let mut handles = Vec::new();
    for group in groups {
        handles.push(tokio::spawn(async move {
            let rank = group.rank();
            let store = Arc::new(MemoryStore::new());
            let co = make_running(group, store.clone()).await?;

            let view = co.register(
                "state",
                ShapeKind::Vector,
                &[16],
                Initializer::Constant(1i32),
            )?;
            co.start().await?;

            // a first checkpoint commits everywhere
            co.advance();
            co.checkpoint(1).await?;

            // second attempt: one rank's backend fails, so the whole
            // group must reject the checkpoint
            view.write().fill(2);
            co.advance();
            if rank == faulty_rank {
                store.set_fail_writes(true);
            }
            let err = co
                .checkpoint(1)
                .await
                .expect_err("checkpoint must fail on every rank");
            assert!(matches!(err, Error::Storage { .. }));
            store.set_fail_writes(false);

            // no rank observes the rejected attempt as latest: recovery
            // lands on the first checkpoint on all ranks
            co.recover().await?;
            assert_eq!(co.current(), 1);
            assert_eq!(&*view.read(), &[1; 16]);
            assert_eq!(store.committed_count(), 1);

            co.finalize().await?;
            anyhow::Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }
    Ok(())
}

#[tokio::test]
async fn test_retry_after_rejected_checkpoint() -> Result<()> {
    init_tracing();
    let groups = LocalGroup::create(WORLD);
    let faulty_rank = 2usize;

    let mut handles = Vec::new();
    for group in groups {
        handles.push(tokio::spawn(async move {
            let rank = group.rank();
            let store = Arc::new(MemoryStore::new());
            let co = make_running(group, store.clone()).await?;

            let view = co.register(
                "state",
                ShapeKind::Scalar,
                &[],
                Initializer::Constant(0i64),
            )?;
            co.start().await?;

            view.write()[0] = 41;
            co.advance();
            if rank == faulty_rank {
                store.set_fail_writes(true);
            }
            assert!(co.checkpoint(1).await.is_err());
            store.set_fail_writes(false);

            // the caller's retry policy: try again at a later iteration
            view.write()[0] = 42;
            co.advance();
            co.checkpoint(1).await?;

            view.write()[0] = 0;
            co.recover().await?;
            assert_eq!(view.read()[0], 42);
            assert_eq!(co.current(), 2);

            co.finalize().await?;
            anyhow::Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }
    Ok(())
}
