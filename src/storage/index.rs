//! Reverse index from stored media keys to the projects that reference them.
//!
//! The index is built once from the stores when a workspace opens and then
//! kept current by the workspace on every project save and delete, so an
//! orphan check is a lookup rather than a re-read of every project.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::error::LabResult;
use crate::project::model::Project;
use crate::project::ProjectManager;
use crate::storage::backend::{KvStore, ObjectStore};
use crate::storage::key::{StorageKey, IDEA_LAB_STATE, WORKFLOW_STATE};
use crate::storage::value::StoredValue;

/// Holder of a set of media references.
///
/// Variant order is preference order when picking the owner to report for
/// a key: saved snapshots first, the unsaved session project last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    /// Stored snapshot `project-<id>`.
    Project(String),
    /// Legacy key-value state blob.
    State(String),
    /// Project open in the session, by id.
    Session(String),
}

impl Owner {
    /// Project id or state key.
    pub fn name(&self) -> &str {
        match self {
            Owner::Project(name) | Owner::State(name) | Owner::Session(name) => name,
        }
    }
}

/// Reference graph from owners to media keys.
#[derive(Debug, Default, Clone)]
pub struct ReferenceIndex {
    by_owner: HashMap<Owner, BTreeSet<String>>,
    counts: HashMap<String, usize>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index by reading every project snapshot and legacy state blob.
    ///
    /// Payloads that fail to parse contribute no references and are logged.
    pub fn rebuild(objects: &dyn ObjectStore, kv: &dyn KvStore) -> LabResult<Self> {
        let mut index = Self::new();

        for raw in objects.keys()? {
            let StorageKey::Project(id) = StorageKey::parse(&raw) else {
                continue;
            };
            let Some(value) = objects.get(&raw)? else {
                continue;
            };
            match project_from_stored(&value) {
                Ok(project) => index.set_references(Owner::Project(id), project.media_references()),
                Err(e) => warn!(key = %raw, error = %e, "skipping unreadable project snapshot"),
            }
        }

        for state_key in [IDEA_LAB_STATE, WORKFLOW_STATE] {
            let Some(raw) = kv.get(state_key)? else {
                continue;
            };
            if let Some(project) = project_from_state_blob(&raw) {
                index.set_references(Owner::State(state_key.to_string()), project.media_references());
            }
        }

        debug!(
            owners = index.by_owner.len(),
            keys = index.counts.len(),
            "reference index rebuilt"
        );
        Ok(index)
    }

    /// Replaces the reference set of an owner.
    pub fn set_references(&mut self, owner: Owner, keys: BTreeSet<String>) {
        self.remove_owner(&owner);
        for key in &keys {
            *self.counts.entry(key.clone()).or_insert(0) += 1;
        }
        if !keys.is_empty() {
            self.by_owner.insert(owner, keys);
        }
    }

    /// Drops every reference held by an owner.
    pub fn remove_owner(&mut self, owner: &Owner) {
        let Some(old) = self.by_owner.remove(owner) else {
            return;
        };
        for key in old {
            if let Some(count) = self.counts.get_mut(&key) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&key);
                }
            }
        }
    }

    pub fn is_referenced(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    pub fn reference_count(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Preferred owner referencing the key.
    pub fn owner_of(&self, key: &str) -> Option<&Owner> {
        if !self.is_referenced(key) {
            return None;
        }
        self.by_owner
            .iter()
            .filter(|(_, keys)| keys.contains(key))
            .map(|(owner, _)| owner)
            .min()
    }

    /// Drops every session owner.
    pub fn clear_session(&mut self) {
        let sessions: Vec<Owner> = self
            .by_owner
            .keys()
            .filter(|o| matches!(o, Owner::Session(_)))
            .cloned()
            .collect();
        for owner in sessions {
            self.remove_owner(&owner);
        }
    }
}

/// Decodes a project snapshot from the structured store.
///
/// Snapshots are Automerge documents; plain project JSON from older clients
/// is accepted as well.
pub fn project_from_stored(value: &StoredValue) -> LabResult<Project> {
    match value {
        StoredValue::Blob { bytes, .. } => match ProjectManager::from_bytes(bytes) {
            Ok(mut manager) => manager.get_state(),
            Err(automerge_err) => serde_json::from_slice(bytes).map_err(|_| automerge_err),
        },
        StoredValue::Text(s) => Ok(serde_json::from_str(s)?),
        StoredValue::Json(v) => Ok(serde_json::from_value(v.clone())?),
    }
}

/// Extracts the project held in a legacy `{"state": {...}, "version": n}` blob.
pub fn project_from_state_blob(raw: &str) -> Option<Project> {
    let envelope: serde_json::Value = serde_json::from_str(raw).ok()?;
    let state = envelope.get("state")?.clone();
    serde_json::from_value(state).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::ScriptCut;
    use crate::storage::backend::{MemoryKvStore, MemoryObjectStore};

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn snapshot(id: &str) -> Owner {
        Owner::Project(id.to_string())
    }

    #[test]
    fn test_incremental_updates() {
        let mut index = ReferenceIndex::new();
        index.set_references(snapshot("p1"), keys(&["media-images-a", "media-audio-a"]));
        index.set_references(snapshot("p2"), keys(&["media-images-a"]));

        assert_eq!(index.reference_count("media-images-a"), 2);
        assert_eq!(index.owner_of("media-images-a"), Some(&snapshot("p1")));

        index.set_references(snapshot("p1"), keys(&["media-audio-a"]));
        assert_eq!(index.reference_count("media-images-a"), 1);
        assert_eq!(index.owner_of("media-images-a"), Some(&snapshot("p2")));

        index.remove_owner(&snapshot("p2"));
        assert!(!index.is_referenced("media-images-a"));
        assert!(index.is_referenced("media-audio-a"));
        assert_eq!(index.owner_of("media-images-a"), None);
    }

    #[test]
    fn test_project_and_state_owners_do_not_collide() {
        let mut index = ReferenceIndex::new();
        index.set_references(Owner::State(IDEA_LAB_STATE.into()), keys(&["media-audio-legacy"]));
        index.set_references(snapshot(IDEA_LAB_STATE), keys(&["media-images-new"]));

        index.remove_owner(&snapshot(IDEA_LAB_STATE));
        assert!(index.is_referenced("media-audio-legacy"));
        assert!(!index.is_referenced("media-images-new"));
    }

    #[test]
    fn test_session_owner_prefers_saved_and_clears() {
        let mut index = ReferenceIndex::new();
        index.set_references(Owner::Session("p1".into()), keys(&["media-images-a", "media-images-b"]));
        index.set_references(snapshot("p1"), keys(&["media-images-a"]));

        assert_eq!(index.owner_of("media-images-a"), Some(&snapshot("p1")));
        assert_eq!(index.owner_of("media-images-b").map(Owner::name), Some("p1"));

        index.clear_session();
        assert!(index.is_referenced("media-images-a"));
        assert!(!index.is_referenced("media-images-b"));
    }

    #[test]
    fn test_rebuild_reads_snapshots_and_legacy_state() {
        let mut objects = MemoryObjectStore::new();
        let mut kv = MemoryKvStore::new();

        let project = Project::new("p1")
            .with_cut(ScriptCut::new("c1").with_final_image("idb://media-images-abc"));
        let mut manager = ProjectManager::from_project(project).unwrap();
        objects
            .put("project-p1", StoredValue::blob(manager.save(), "application/automerge"))
            .unwrap();

        let legacy = Project::new("old")
            .with_cut(ScriptCut::new("c9").with_audio("media-audio-legacy"));
        kv.set(
            IDEA_LAB_STATE,
            serde_json::json!({ "state": legacy, "version": 3 }).to_string(),
        )
        .unwrap();

        objects.put("project-broken", StoredValue::text("not json")).unwrap();

        let index = ReferenceIndex::rebuild(&objects, &kv).unwrap();
        assert_eq!(index.owner_of("media-images-abc"), Some(&snapshot("p1")));
        assert_eq!(
            index.owner_of("media-audio-legacy"),
            Some(&Owner::State(IDEA_LAB_STATE.into()))
        );
    }

    #[test]
    fn test_project_from_plain_json() {
        let project = Project::new("p7").with_series_name("S");
        let value = StoredValue::Json(serde_json::to_value(&project).unwrap());
        let decoded = project_from_stored(&value).unwrap();
        assert_eq!(decoded.id, "p7");
        assert_eq!(decoded.series_name, "S");
    }
}
