//! Single-process restart and recovery scenarios against the local
//! filesystem store
//!
//! Each test simulates a crash by dropping a coordinator without
//! finalizing it, then brings up a fresh coordinator over the same
//! storage directory, exactly as a restarted process would.

use std::sync::Arc;

use anyhow::Result;
use coordinator::Coordinator;
use process_group::SoloGroup;
use runtime_core::{Error, ManagerConfig, ShapeKind};
use segment_registry::Initializer;

fn solo() -> Coordinator {
    Coordinator::new(Arc::new(SoloGroup))
}

#[tokio::test]
async fn test_round_trip_after_corruption() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let co = solo();
    co.initialize(ManagerConfig::local(dir.path()), true).await?;

    let view = co.register(
        "squares",
        ShapeKind::Vector,
        &[1024],
        Initializer::<i32>::zero(),
    )?;
    co.start().await?;

    {
        let mut data = view.write();
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = (i * i) as i32;
        }
    }
    co.advance();
    co.checkpoint(1).await?;

    // wreck the in-memory state, then recover
    view.write().fill(0);
    co.recover().await?;

    let data = view.read();
    for (i, &v) in data.iter().enumerate() {
        assert_eq!(v, (i * i) as i32);
    }

    co.finalize().await?;
    Ok(())
}

#[tokio::test]
async fn test_restart_resumes_at_checkpointed_iteration() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = ManagerConfig::local(dir.path());
    let max_iterations = 10u64;

    // first run: iterate, checkpointing every 3rd iteration, then "crash"
    {
        let co = solo();
        co.initialize(config.clone(), true).await?;
        assert!(!co.is_resuming());

        let view = co.register(
            "field",
            ShapeKind::Vector,
            &[64],
            Initializer::generate(|i| i as f64),
        )?;
        co.register_param("max_iterations", max_iterations as i64)
            .await?;
        co.start().await?;

        while co.current() < max_iterations {
            {
                let mut data = view.write();
                for slot in data.iter_mut() {
                    *slot += 1.0;
                }
            }
            let iteration = co.advance();
            if iteration % 3 == 0 {
                co.checkpoint(1).await?;
            }
            if iteration == 9 {
                // preempted before iteration 10 runs; no finalize
                break;
            }
        }
    }

    // second run: same startup code resumes from iteration 9
    let co = solo();
    co.initialize(config, true).await?;
    assert!(co.is_resuming());
    assert!(co.exists("field"));
    assert_eq!(co.current(), 9);

    let view = co.register(
        "field",
        ShapeKind::Vector,
        &[64],
        Initializer::generate(|i| i as f64),
    )?;
    let limit = co.get_param("max_iterations")?.as_i64().unwrap() as u64;
    assert_eq!(limit, max_iterations);
    co.start().await?;

    // the loop condition skips the 9 already-completed iterations
    while co.current() < limit {
        {
            let mut data = view.write();
            for slot in data.iter_mut() {
                *slot += 1.0;
            }
        }
        co.advance();
    }
    assert_eq!(co.current(), max_iterations);

    // every element saw exactly max_iterations increments in total
    let data = view.read();
    for (i, &v) in data.iter().enumerate() {
        assert_eq!(v, i as f64 + max_iterations as f64);
    }

    co.finalize().await?;
    Ok(())
}

#[tokio::test]
async fn test_resize_keeps_later_checkpoints_valid() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let co = solo();
    co.initialize(ManagerConfig::local(dir.path()), true).await?;

    let n = 128usize;
    let view = co.register("buf", ShapeKind::Vector, &[n], Initializer::Constant(1i64))?;
    co.start().await?;

    co.advance();
    co.checkpoint(1).await?;
    assert_eq!(view.generation(), 0);

    // grow to 2N, fill with new values, checkpoint again
    let view = co.resize("buf", ShapeKind::Vector, &[2 * n], Initializer::Constant(0i64))?;
    assert_eq!(view.generation(), 1);
    {
        let mut data = view.write();
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = i as i64;
        }
    }
    co.advance();
    co.checkpoint(1).await?;

    // corrupt and recover: the post-resize shape and values come back
    view.write().fill(-1);
    co.recover().await?;

    let meta = co.meta("buf")?;
    assert_eq!(meta.dims, vec![2 * n]);
    assert_eq!(meta.generation, 1);

    let data = view.read();
    assert_eq!(data.len(), 2 * n);
    for (i, &v) in data.iter().enumerate() {
        assert_eq!(v, i as i64);
    }

    co.finalize().await?;
    Ok(())
}

#[tokio::test]
async fn test_recovery_before_resize_restores_old_shape() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let co = solo();
    co.initialize(ManagerConfig::local(dir.path()), true).await?;

    let view = co.register("buf", ShapeKind::Vector, &[8], Initializer::Constant(5i32))?;
    co.start().await?;
    co.advance();
    co.checkpoint(1).await?;

    // resize after the checkpoint, but never checkpoint the new shape
    co.resize("buf", ShapeKind::Vector, &[16], Initializer::Constant(0i32))?;
    drop(view);

    co.recover().await?;

    // recovery rolled back to the pre-resize shape and generation
    let meta = co.meta("buf")?;
    assert_eq!(meta.dims, vec![8]);
    assert_eq!(meta.generation, 0);
    let view = co.get::<i32>("buf")?;
    assert_eq!(&*view.read(), &[5; 8]);

    co.finalize().await?;
    Ok(())
}

#[tokio::test]
async fn test_parameters_survive_restart_without_checkpoint() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = ManagerConfig::local(dir.path());

    {
        let co = solo();
        co.initialize(config.clone(), true).await?;
        co.register_param("population", 100i32).await?;
        // crash before start, before any checkpoint
    }

    let co = solo();
    co.initialize(config, true).await?;
    assert_eq!(co.get_param("population")?.as_i32(), Some(100));
    Ok(())
}

#[tokio::test]
async fn test_recover_on_fresh_run_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let co = solo();
    co.initialize(ManagerConfig::local(dir.path()), true).await?;
    co.start().await?;

    match co.recover().await {
        Err(Error::NoCheckpointForRecovery) => Ok(()),
        other => anyhow::bail!("expected NoCheckpointForRecovery, got {:?}", other),
    }
}
