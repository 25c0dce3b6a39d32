//! Durable loot store
//!
//! Filesystem layout under the configured root:
//! ```text
//! targets/<target>/<digest>.json   one record per file
//! invocations/<id>.json            aggregate manifest per invocation
//! work/<scratch dirs>              transient executor working areas
//! ```
//!
//! Records are append-only and written exactly once per (target, digest):
//! writes go to a temp file and are renamed into place, and a record that
//! already exists is left untouched, which makes claiming idempotent.
//! Serialization is per key through a lock map; unrelated keys write in
//! parallel, and idle entries are pruned so the map stays bounded by the
//! number of in-flight writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::{AggregateResult, JobResult, LootRecord, Target};
use crate::error::{HarvestrError, Result};
use crate::loot::parse::parse_output;

/// Outcome of claiming one job result
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    /// Every record parsed from the result, committed or already present
    pub records: Vec<LootRecord>,
    /// Records newly written by this claim
    pub written: usize,
    /// Records that already existed (idempotent re-claim)
    pub duplicates: usize,
}

impl ClaimOutcome {
    /// Records attributable to the job, independent of claim repetition
    pub fn loot_count(&self) -> usize {
        self.records.len()
    }
}

/// Path-addressed, append-only record store
pub struct LootStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LootStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: &Path) -> Result<Self> {
        for sub in ["targets", "invocations", "work"] {
            std::fs::create_dir_all(root.join(sub)).map_err(|e| {
                HarvestrError::Persist(format!("cannot create {}/{}: {}", root.display(), sub, e))
            })?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Transient working area for executor scratch dirs
    pub fn work_root(&self) -> PathBuf {
        self.root.join("work")
    }

    fn target_dir(&self, target: &Target) -> PathBuf {
        self.root.join("targets").join(target.fs_key())
    }

    /// Parse a job result and persist its records exactly once each
    ///
    /// Partial output from failed or timed-out jobs is claimed the same way
    /// as success output; whatever was genuinely extracted survives.
    pub async fn claim(&self, result: &JobResult) -> Result<ClaimOutcome> {
        let records = parse_output(&result.target, &result.stdout);
        let mut written = 0usize;
        let mut duplicates = 0usize;

        for record in &records {
            if self.persist_record(record).await? {
                written += 1;
            } else {
                duplicates += 1;
            }
        }

        Ok(ClaimOutcome {
            records,
            written,
            duplicates,
        })
    }

    /// Write one record if absent; returns true when newly written
    async fn persist_record(&self, record: &LootRecord) -> Result<bool> {
        let digest = record.digest();
        let dir = self.target_dir(&record.target);
        let path = dir.join(format!("{}.json", digest));
        let key = format!("{}/{}", record.target.fs_key(), digest);

        let lock = self.lock_for(&key).await;
        let written = {
            let _held = lock.lock().await;
            self.write_record(record, &dir, &path).await
        };
        drop(lock);
        self.prune_key(&key).await;
        written
    }

    async fn write_record(&self, record: &LootRecord, dir: &Path, path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| HarvestrError::Persist(format!("cannot create {}: {}", dir.display(), e)))?;

        let json = serde_json::to_vec_pretty(record)?;
        self.write_atomic(path, &json).await?;
        Ok(true)
    }

    /// Persist the invocation manifest
    pub async fn write_manifest(&self, aggregate: &AggregateResult) -> Result<PathBuf> {
        let path = self
            .root
            .join("invocations")
            .join(format!("{}.json", aggregate.invocation_id));
        let json = serde_json::to_vec_pretty(aggregate)?;
        self.write_atomic(&path, &json).await?;
        Ok(path)
    }

    /// Temp-then-rename write; a partial file is never visible at `path`
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let suffix: u32 = rand::rng().random();
        let tmp = path.with_extension(format!("tmp-{:08x}", suffix));

        let map_err = |e: std::io::Error| {
            HarvestrError::Persist(format!("write {}: {}", path.display(), e))
        };

        {
            let mut file = tokio::fs::File::create(&tmp).await.map_err(map_err)?;
            file.write_all(bytes).await.map_err(map_err)?;
            file.flush().await.map_err(map_err)?;
        }

        // Another writer may have won the race between processes; keep theirs
        if path.exists() {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Ok(());
        }

        tokio::fs::rename(&tmp, path).await.map_err(map_err)
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a key's lock entry once no writer holds it
    ///
    /// Callers drop their clone first; holding the map mutex, a count of 1
    /// means only the map itself still references the lock, so the last
    /// writer of a key always removes its entry.
    async fn prune_key(&self, key: &str) {
        let mut locks = self.locks.lock().await;
        let idle = locks
            .get(key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1);
        if idle {
            locks.remove(key);
        }
    }

    /// Persisted records for one target
    pub fn records_for(&self, target: &Target) -> Result<Vec<LootRecord>> {
        let dir = self.target_dir(target);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<LootRecord>(&content) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("skipping unreadable record {}: {}", path.display(), e);
                }
            }
        }
        records.sort_by(|a, b| (a.kind.as_str(), &a.label).cmp(&(b.kind.as_str(), &b.label)));
        Ok(records)
    }

    /// All targets with persisted records, with their record counts
    pub fn targets(&self) -> Result<Vec<(String, usize)>> {
        let targets_dir = self.root.join("targets");
        let mut out = Vec::new();

        for entry in std::fs::read_dir(&targets_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let count = std::fs::read_dir(entry.path())?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
                .count();
            out.push((entry.file_name().to_string_lossy().into_owned(), count));
        }

        out.sort();
        Ok(out)
    }

    /// Remove an executor scratch dir once its result has been claimed
    pub async fn discard_scratch(&self, scratch: &Path) {
        if !scratch.starts_with(self.work_root()) {
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(scratch).await {
            log::debug!("leaving scratch dir {}: {}", scratch.display(), e);
        }
    }
}
