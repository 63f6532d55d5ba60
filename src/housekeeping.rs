//! Housekeeping passes over the workspace stores: scan refresh, orphan
//! cleanup, image optimization, rescue cleanup and single-item delete/load.
//!
//! Batch passes are best-effort. Each item gets an [`ItemOutcome`]; a failure
//! on one item is recorded and the pass moves on. Nothing is rolled back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LabError, LabResult};
use crate::project::model::Project;
use crate::project::ProjectManager;
use crate::storage::backend::StoreKind;
use crate::storage::index::{project_from_stored, Owner};
use crate::storage::key::{StorageKey, IDEA_LAB_STATE, WORKFLOW_STATE};
use crate::storage::optimize::recompress;
use crate::storage::scanner::{scan, ScanReport};
use crate::storage::value::StoredValue;
use crate::workspace::Workspace;

/// What happened to one item of a batch pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Outcome {
    Deleted { size: u64 },
    Optimized { before: u64, after: u64 },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub key: String,
    pub outcome: Outcome,
}

/// Per-item results of a batch pass, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub items: Vec<ItemOutcome>,
}

/// Report of an optimization pass.
pub type OptimizeReport = BatchReport;

impl BatchReport {
    fn push(&mut self, key: &str, outcome: Outcome) {
        self.items.push(ItemOutcome {
            key: key.to_string(),
            outcome,
        });
    }

    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Deleted { .. }))
    }

    pub fn optimized(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Optimized { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Bytes released by deletions.
    pub fn bytes_freed(&self) -> u64 {
        self.items
            .iter()
            .map(|i| match i.outcome {
                Outcome::Deleted { size } => size,
                _ => 0,
            })
            .sum()
    }

    /// Bytes saved by recompression.
    pub fn bytes_saved(&self) -> u64 {
        self.items
            .iter()
            .map(|i| match i.outcome {
                Outcome::Optimized { before, after } => before.saturating_sub(after),
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

impl Workspace {
    /// Rescans both stores.
    ///
    /// On failure the error is logged and the previous report is kept, so
    /// callers displaying statistics never lose them to a transient error.
    pub fn refresh(&mut self) -> LabResult<&ScanReport> {
        let scanned = self
            .sync_session_references()
            .and_then(|_| scan(self.objects.as_ref(), self.kv.as_ref(), &self.index));
        match scanned {
            Ok(report) => Ok(self.last_scan.insert(report)),
            Err(e) => {
                warn!(error = %e, "storage scan failed");
                Err(e)
            }
        }
    }

    /// The latest successful scan, if any.
    pub fn last_scan(&self) -> Option<&ScanReport> {
        self.last_scan.as_ref()
    }

    fn rescan(&mut self) {
        // Failure is already logged and the previous report kept.
        let _ = self.refresh();
    }

    fn ensure_scanned(&mut self) -> LabResult<ScanReport> {
        if let Some(report) = &self.last_scan {
            return Ok(report.clone());
        }
        self.refresh().cloned()
    }

    /// Deletes every orphan listed by the latest scan, then rescans.
    pub fn clean_orphans(&mut self) -> LabResult<BatchReport> {
        let report = self.ensure_scanned()?;
        self.sync_session_references()?;
        let mut batch = BatchReport::default();

        for item in report.orphan_items() {
            // The index may have changed since the scan; never delete a
            // key something references now.
            if self.index.is_referenced(&item.key) {
                batch.push(&item.key, Outcome::Skipped { reason: "referenced".into() });
                continue;
            }
            let size = match self.objects.get(&item.key) {
                Ok(Some(value)) => value.size(),
                _ => item.size,
            };
            match self.objects.delete(&item.key) {
                Ok(true) => batch.push(&item.key, Outcome::Deleted { size }),
                Ok(false) => batch.push(&item.key, Outcome::Skipped { reason: "already gone".into() }),
                Err(e) => {
                    warn!(key = %item.key, error = %e, "orphan delete failed");
                    batch.push(&item.key, Outcome::Failed { reason: e.to_string() });
                }
            }
        }

        info!(
            deleted = batch.deleted(),
            failed = batch.failed(),
            bytes = batch.bytes_freed(),
            "orphan cleanup finished"
        );
        self.rescan();
        Ok(batch)
    }

    /// Recompresses every eligible image of the latest scan.
    ///
    /// `progress` is called with `(current, total)` before each item.
    pub fn optimize<F>(&mut self, mut progress: F) -> LabResult<OptimizeReport>
    where
        F: FnMut(usize, usize),
    {
        let report = self.ensure_scanned()?;
        let eligible: Vec<_> = report.optimizable_items().collect();
        let total = eligible.len();
        let settings = self.config.optimize.clone();
        let mut batch = BatchReport::default();

        for (i, item) in eligible.into_iter().enumerate() {
            progress(i + 1, total);
            let outcome = match self.optimize_one(&item.key, &settings) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(key = %item.key, error = %e, "optimization failed");
                    Outcome::Failed { reason: e.to_string() }
                }
            };
            batch.push(&item.key, outcome);
        }

        info!(
            optimized = batch.optimized(),
            skipped = batch.skipped(),
            failed = batch.failed(),
            saved = batch.bytes_saved(),
            "optimization pass finished"
        );

        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.rescan();
        Ok(batch)
    }

    fn optimize_one(
        &mut self,
        key: &str,
        settings: &crate::config::OptimizeSettings,
    ) -> LabResult<Outcome> {
        let Some(value) = self.objects.get(key)? else {
            return Ok(Outcome::Skipped { reason: "already gone".into() });
        };
        let before = value.size();
        match recompress(&value, settings)? {
            Some(smaller) => {
                let after = smaller.size();
                self.objects.put(key, smaller)?;
                debug!(key, before, after, "optimized");
                Ok(Outcome::Optimized { before, after })
            }
            None => Ok(Outcome::Skipped { reason: "not smaller".into() }),
        }
    }

    /// Deletes every project snapshot except the one open in the session.
    ///
    /// Media those projects referenced becomes orphaned and is left for
    /// [`Workspace::clean_orphans`].
    pub fn rescue_cleanup(&mut self) -> LabResult<BatchReport> {
        let keep = match self.current.as_mut() {
            Some(manager) => Some(manager.id()?),
            None => None,
        };
        let mut batch = BatchReport::default();

        for raw in self.objects.keys()? {
            let StorageKey::Project(id) = StorageKey::parse(&raw) else {
                continue;
            };
            if keep.as_deref() == Some(id.as_str()) {
                continue;
            }
            let size = match self.objects.get(&raw) {
                Ok(value) => value.map(|v| v.size()).unwrap_or(0),
                Err(_) => 0,
            };
            match self.objects.delete(&raw) {
                Ok(_) => {
                    self.index.remove_owner(&Owner::Project(id));
                    batch.push(&raw, Outcome::Deleted { size });
                }
                Err(e) => batch.push(&raw, Outcome::Failed { reason: e.to_string() }),
            }
        }

        info!(deleted = batch.deleted(), failed = batch.failed(), "rescue cleanup finished");
        self.rescan();
        Ok(batch)
    }

    /// Removes one item from the given backend, then rescans.
    pub fn delete_item(&mut self, store: StoreKind, key: &str) -> LabResult<()> {
        let existed = match store {
            StoreKind::Structured => self.objects.delete(key)?,
            StoreKind::KeyValue => self.kv.remove(key)?,
        };
        if !existed {
            return Err(LabError::item_not_found(key));
        }

        match (store, StorageKey::parse(key)) {
            (StoreKind::Structured, StorageKey::Project(id)) => {
                self.index.remove_owner(&Owner::Project(id))
            }
            (StoreKind::KeyValue, _) if key == IDEA_LAB_STATE || key == WORKFLOW_STATE => {
                self.index.remove_owner(&Owner::State(key.to_string()))
            }
            _ => {}
        }
        debug!(key, ?store, "item deleted");
        self.rescan();
        Ok(())
    }

    /// Reads one item and replaces the session project with the project it
    /// holds.
    ///
    /// Accepted payloads: a backup document or persisted state envelope
    /// (`{"state": {...}}`), an Automerge project snapshot, or plain project
    /// JSON.
    pub fn load_item(&mut self, store: StoreKind, key: &str) -> LabResult<&mut ProjectManager> {
        let manager = match store {
            StoreKind::Structured => {
                let value = self
                    .objects
                    .get(key)?
                    .ok_or_else(|| LabError::item_not_found(key))?;
                match &value {
                    StoredValue::Blob { bytes, .. } => match ProjectManager::from_bytes(bytes) {
                        Ok(manager) => manager,
                        Err(_) => ProjectManager::from_project(project_from_stored(&value)?)?,
                    },
                    StoredValue::Text(s) => ProjectManager::from_project(project_from_json(s)?)?,
                    StoredValue::Json(v) => {
                        ProjectManager::from_project(project_from_json_value(v.clone())?)?
                    }
                }
            }
            StoreKind::KeyValue => {
                let raw = self
                    .kv
                    .get(key)?
                    .ok_or_else(|| LabError::item_not_found(key))?;
                ProjectManager::from_project(project_from_json(&raw)?)?
            }
        };
        info!(key, ?store, "session project replaced from stored item");
        Ok(self.current.insert(manager))
    }
}

/// Parses a project from JSON that is either wrapped in a `state` envelope
/// or the bare project object.
pub fn project_from_json(raw: &str) -> LabResult<Project> {
    project_from_json_value(serde_json::from_str(raw)?)
}

fn project_from_json_value(value: serde_json::Value) -> LabResult<Project> {
    let inner = match value {
        serde_json::Value::Object(mut map) if map.get("state").is_some_and(|s| s.is_object()) => {
            map.remove("state").unwrap_or_default()
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(map),
        _ => return Err(LabError::parse("payload is not a JSON object")),
    };
    Ok(serde_json::from_value(inner)?)
}
