use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;

use crate::types::{PendingSubmission, SubmissionPayload, SubmissionStatus};

/// Durable set of pending submissions, mirrored to `pending.json` in the
/// data directory on every mutation.
///
/// Persistence is best-effort: a missing or corrupt file loads as an empty
/// set, and write failures are logged and swallowed. Losing durability must
/// never block a submission.
pub struct PendingStore {
    records: RwLock<Vec<PendingSubmission>>,
    file_path: PathBuf,
    data_dir: PathBuf,
}

impl PendingStore {
    pub fn open(data_dir: &Path) -> Self {
        let file_path = data_dir.join("pending.json");
        let records = if file_path.exists() {
            match std::fs::read_to_string(&file_path) {
                Ok(contents) => match serde_json::from_str::<Vec<PendingSubmission>>(&contents) {
                    Ok(records) => records,
                    Err(e) => {
                        tracing::warn!(
                            "[store] Failed to parse pending.json, starting empty: {}",
                            e
                        );
                        Vec::new()
                    }
                },
                Err(e) => {
                    tracing::warn!("[store] Failed to read pending.json, starting empty: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Self {
            records: RwLock::new(records),
            file_path,
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// Snapshot of every record currently tracked.
    pub fn load(&self) -> Vec<PendingSubmission> {
        let records = self.records.read().unwrap();
        records.clone()
    }

    pub fn get(&self, id: &str) -> Option<PendingSubmission> {
        let records = self.records.read().unwrap();
        records.iter().find(|r| r.id == id).cloned()
    }

    /// Insert a record, replacing any existing record with the same id.
    pub fn insert(&self, record: PendingSubmission) {
        let mut records = self.records.write().unwrap();
        records.retain(|r| r.id != record.id);
        records.push(record);
        drop(records);
        self.save();
    }

    /// Merge-edit the record matching `id`. Returns false when absent.
    pub fn update<F>(&self, id: &str, apply: F) -> bool
    where
        F: FnOnce(&mut PendingSubmission),
    {
        let mut records = self.records.write().unwrap();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                apply(record);
                drop(records);
                self.save();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        let removed = records.len() < before;
        drop(records);
        if removed {
            self.save();
        }
        removed
    }

    /// Drop records older than `max_age` regardless of status. Returns how
    /// many were evicted.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now().timestamp_millis() - max_age.as_millis() as i64;
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| r.created_at >= cutoff);
        let evicted = before - records.len();
        drop(records);
        if evicted > 0 {
            self.save();
        }
        evicted
    }

    /// Drop likely_success records whose grace window has passed. The
    /// in-process scheduled removal normally handles these; this catches
    /// records left behind when the process exited first.
    pub fn prune_settled(&self, grace: Duration) -> usize {
        let cutoff = Utc::now().timestamp_millis() - grace.as_millis() as i64;
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|r| {
            !(r.status == SubmissionStatus::LikelySuccess
                && r.completed_at.map(|t| t < cutoff).unwrap_or(false))
        });
        let pruned = before - records.len();
        drop(records);
        if pruned > 0 {
            self.save();
        }
        pruned
    }

    /// Best-effort dump of a payload for manual recovery after exhausted
    /// retries. Returns the backup path when the write stuck.
    pub fn write_backup(&self, payload: &SubmissionPayload) -> Option<PathBuf> {
        let path = self
            .data_dir
            .join(format!("backup_{}.json", Utc::now().timestamp_millis()));
        let json = match serde_json::to_string_pretty(payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("[store] Failed to serialize backup: {}", e);
                return None;
            }
        };
        let _ = std::fs::create_dir_all(&self.data_dir);
        match std::fs::write(&path, json) {
            Ok(()) => {
                tracing::info!("[store] Wrote submission backup: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("[store] Failed to write backup {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save(&self) {
        let records = self.records.read().unwrap();
        if let Ok(json) = serde_json::to_string_pretty(&*records) {
            if let Some(parent) = self.file_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(&self.file_path, json) {
                tracing::warn!("[store] Failed to save pending.json: {}", e);
            }
        }
    }
}
