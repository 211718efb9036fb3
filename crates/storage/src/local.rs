//! Local filesystem checkpoint store
//!
//! One directory per rank under a shared base path. Bundles are written
//! atomically (temp file, fsync, rename) as `ckpt-<iteration>-l<level>.bin`;
//! a checkpoint counts as committed only once its empty `.commit` marker
//! exists, so a crash between write and commit leaves behind an attempt
//! that `read_latest` ignores and `discard` removes.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use runtime_core::{CheckpointBundle, Error, Iteration, Level, ParamValue, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{decode_bundle, encode_bundle};
use crate::store::CheckpointStore;

const PARAMS_FILE: &str = "params.json";

/// Local filesystem store for one rank
#[derive(Debug, Clone)]
pub struct LocalStore {
    /// This rank's directory
    root: PathBuf,

    /// Committed checkpoints to keep; 0 keeps all
    keep_count: usize,
}

impl LocalStore {
    /// Open (creating if needed) the store directory for `rank`
    pub async fn open<P: AsRef<Path>>(
        base_path: P,
        rank: usize,
        keep_count: usize,
    ) -> Result<Self> {
        let root = base_path.as_ref().join(format!("rank-{:04}", rank));
        fs::create_dir_all(&root).await.map_err(|e| Error::Storage {
            message: format!("failed to create store directory {:?}: {}", root, e),
        })?;
        debug!(?root, keep_count, "opened local checkpoint store");
        Ok(Self { root, keep_count })
    }

    /// This rank's storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_path(&self, iteration: Iteration, level: Level) -> PathBuf {
        self.root
            .join(format!("ckpt-{:020}-l{}.bin", iteration, level))
    }

    fn commit_path(&self, iteration: Iteration, level: Level) -> PathBuf {
        self.root
            .join(format!("ckpt-{:020}-l{}.commit", iteration, level))
    }

    /// Parse a store file name into (iteration, level, is_commit_marker)
    fn parse_entry(name: &str) -> Option<(Iteration, Level, bool)> {
        let (stem, committed) = if let Some(stem) = name.strip_suffix(".commit") {
            (stem, true)
        } else if let Some(stem) = name.strip_suffix(".bin") {
            (stem, false)
        } else {
            return None;
        };
        let rest = stem.strip_prefix("ckpt-")?;
        let (iteration, level) = rest.split_once("-l")?;
        Some((iteration.parse().ok()?, level.parse().ok()?, committed))
    }

    /// List (iteration, level, is_commit_marker) for every store entry
    async fn entries(&self) -> Result<Vec<(Iteration, Level, bool)>> {
        let mut dir = fs::read_dir(&self.root).await.map_err(|e| Error::Storage {
            message: format!("failed to list {:?}: {}", self.root, e),
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::Storage {
            message: format!("failed to list {:?}: {}", self.root, e),
        })? {
            if let Some(parsed) = Self::parse_entry(&entry.file_name().to_string_lossy()) {
                entries.push(parsed);
            }
        }
        Ok(entries)
    }

    /// Write `data` to `path` atomically: temp file, fsync, rename
    async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        let temp_name = format!(
            ".{}.{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy(),
            Uuid::new_v4()
        );
        let temp_path = path.with_file_name(temp_name);

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| Error::Storage {
                message: format!("failed to create temp file {:?}: {}", temp_path, e),
            })?;

        file.write_all(data).await.map_err(|e| Error::Storage {
            message: format!("failed to write {:?}: {}", temp_path, e),
        })?;

        file.sync_all().await.map_err(|e| Error::Storage {
            message: format!("failed to sync {:?}: {}", temp_path, e),
        })?;

        fs::rename(&temp_path, path).await.map_err(|e| Error::Storage {
            message: format!("failed to rename {:?} to {:?}: {}", temp_path, path, e),
        })?;

        Ok(())
    }

    /// Prune oldest committed checkpoints beyond `keep_count`
    async fn prune(&self) {
        if self.keep_count == 0 {
            return;
        }

        let mut committed: Vec<(Iteration, Level)> = match self.entries().await {
            Ok(entries) => entries
                .into_iter()
                .filter(|(_, _, is_commit)| *is_commit)
                .map(|(iteration, level, _)| (iteration, level))
                .collect(),
            Err(e) => {
                warn!(error = %e, "retention scan failed");
                return;
            }
        };
        committed.sort_unstable();

        while committed.len() > self.keep_count {
            let (iteration, level) = committed.remove(0);
            // marker first, so a failure never leaves a marker without data
            for path in [
                self.commit_path(iteration, level),
                self.bundle_path(iteration, level),
            ] {
                if let Err(e) = fs::remove_file(&path).await {
                    warn!(?path, error = %e, "failed to delete old checkpoint");
                } else {
                    debug!(?path, "deleted old checkpoint");
                }
            }
        }
    }
}

#[async_trait]
impl CheckpointStore for LocalStore {
    async fn write(&self, bundle: &CheckpointBundle) -> Result<()> {
        let data = encode_bundle(bundle)?;
        let path = self.bundle_path(bundle.iteration, bundle.level);
        self.write_atomic(&path, &data).await?;
        debug!(
            iteration = bundle.iteration,
            level = bundle.level,
            size_bytes = data.len(),
            "checkpoint bundle written"
        );
        Ok(())
    }

    async fn commit(&self, iteration: Iteration, level: Level) -> Result<()> {
        let bundle = self.bundle_path(iteration, level);
        if fs::metadata(&bundle).await.is_err() {
            return Err(Error::Storage {
                message: format!(
                    "cannot commit iteration {}: bundle {:?} is missing",
                    iteration, bundle
                ),
            });
        }

        self.write_atomic(&self.commit_path(iteration, level), &[])
            .await?;
        info!(iteration, level, "checkpoint committed");

        self.prune().await;
        Ok(())
    }

    async fn discard(&self, iteration: Iteration) -> Result<()> {
        for (entry_iteration, level, is_commit) in self.entries().await? {
            if entry_iteration != iteration || is_commit {
                continue;
            }
            // only uncommitted attempts are discarded
            if fs::metadata(self.commit_path(entry_iteration, level))
                .await
                .is_ok()
            {
                continue;
            }
            let path = self.bundle_path(entry_iteration, level);
            fs::remove_file(&path).await.map_err(|e| Error::Storage {
                message: format!("failed to discard {:?}: {}", path, e),
            })?;
            debug!(iteration, level, "discarded rejected checkpoint attempt");
        }
        Ok(())
    }

    async fn read_latest(&self, max_iteration: Iteration) -> Result<CheckpointBundle> {
        let latest = self
            .entries()
            .await?
            .into_iter()
            .filter(|(iteration, _, is_commit)| *is_commit && *iteration <= max_iteration)
            .max_by_key(|(iteration, _, _)| *iteration);

        let (iteration, level, _) = latest.ok_or(Error::NoCheckpointForRecovery)?;

        let path = self.bundle_path(iteration, level);
        let data = fs::read(&path).await.map_err(|e| Error::Storage {
            message: format!("committed checkpoint data missing at {:?}: {}", path, e),
        })?;

        let bundle = decode_bundle(&data)?;
        debug!(iteration, level, "loaded committed checkpoint");
        Ok(bundle)
    }

    async fn write_params(&self, entries: &[(String, ParamValue)]) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        self.write_atomic(&self.root.join(PARAMS_FILE), &json).await
    }

    async fn read_params(&self) -> Result<Option<Vec<(String, ParamValue)>>> {
        let path = self.root.join(PARAMS_FILE);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Storage {
                    message: format!("failed to read {:?}: {}", path, e),
                })
            }
        };
        let entries =
            serde_json::from_slice(&data).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Some(entries))
    }

    async fn flush(&self) -> Result<()> {
        // every write is fsynced before rename, nothing is buffered here
        Ok(())
    }
}
