//! The workspace: single owner of the storage backends, the reference index
//! and the project open in the session.
//!
//! Every mutating operation takes `&mut self`, so within one process a scan
//! can never observe a store that another housekeeping pass is halfway
//! through rewriting.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LabConfig;
use crate::error::{LabError, LabResult};
use crate::project::model::Project;
use crate::project::ProjectManager;
use crate::storage::backend::{KvStore, ObjectStore};
use crate::storage::dir::{DirKvStore, DirObjectStore};
use crate::storage::index::{project_from_state_blob, project_from_stored, Owner, ReferenceIndex};
use crate::storage::key::{MediaKind, StorageKey, IDEA_LAB_STATE};
use crate::storage::scanner::ScanReport;
use crate::storage::value::StoredValue;

/// Content type of Automerge project snapshots.
pub const PROJECT_CONTENT_TYPE: &str = "application/automerge";

/// Listing entry for a stored project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: String,
    pub series_name: String,
    pub episode_name: String,
    pub cut_count: usize,
    pub updated_at: i64,
    pub size: u64,
}

pub struct Workspace {
    pub(crate) objects: Box<dyn ObjectStore>,
    pub(crate) kv: Box<dyn KvStore>,
    pub(crate) index: ReferenceIndex,
    pub(crate) current: Option<ProjectManager>,
    pub(crate) last_scan: Option<ScanReport>,
    pub(crate) config: LabConfig,
    last_autosave_ms: Option<i64>,
}

impl Workspace {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Opens a workspace over the given stores and builds the reference index.
    pub fn open(
        objects: Box<dyn ObjectStore>,
        kv: Box<dyn KvStore>,
        config: LabConfig,
    ) -> LabResult<Self> {
        let index = ReferenceIndex::rebuild(objects.as_ref(), kv.as_ref())?;
        Ok(Self {
            objects,
            kv,
            index,
            current: None,
            last_scan: None,
            config,
            last_autosave_ms: None,
        })
    }

    /// Opens directory-backed stores under `config.store_dir`.
    pub fn open_dir(config: LabConfig) -> LabResult<Self> {
        let objects = DirObjectStore::open(&config.store_dir)?;
        let kv = DirKvStore::open(&config.store_dir)?;
        info!(dir = %config.store_dir.display(), "opened workspace");
        Self::open(Box::new(objects), Box::new(kv), config)
    }

    pub fn config(&self) -> &LabConfig {
        &self.config
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    // =========================================================================
    // SESSION PROJECT
    // =========================================================================

    /// Starts a new project with a random id and makes it current.
    pub fn new_project(&mut self) -> LabResult<&mut ProjectManager> {
        let id = uuid::Uuid::new_v4().to_string();
        self.open_project(Project::new(id))
    }

    /// Makes the given state the session project.
    pub fn open_project(&mut self, project: Project) -> LabResult<&mut ProjectManager> {
        debug!(id = %project.id, "opening project");
        let manager = ProjectManager::from_project(project)?;
        Ok(self.open_manager(manager))
    }

    /// Installs an existing document as the session project.
    pub fn open_manager(&mut self, manager: ProjectManager) -> &mut ProjectManager {
        self.current.insert(manager)
    }

    /// The session project.
    pub fn current(&mut self) -> LabResult<&mut ProjectManager> {
        self.current.as_mut().ok_or(LabError::NoOpenProject)
    }

    pub fn has_open_project(&self) -> bool {
        self.current.is_some()
    }

    pub fn close_project(&mut self) {
        self.current = None;
        self.index.clear_session();
    }

    /// Records what the session project references, saved or not, so
    /// housekeeping never treats its media as orphaned.
    pub(crate) fn sync_session_references(&mut self) -> LabResult<()> {
        self.index.clear_session();
        if let Some(manager) = self.current.as_mut() {
            let state = manager.get_state()?;
            self.index
                .set_references(Owner::Session(state.id.clone()), state.media_references());
        }
        Ok(())
    }

    /// Persists the session project as `project-<id>` and updates the index.
    pub fn save_current(&mut self) -> LabResult<StorageKey> {
        let manager = self.current.as_mut().ok_or(LabError::NoOpenProject)?;
        if manager.is_dirty() {
            manager.touch_updated_at(chrono::Utc::now().timestamp_millis())?;
        }
        let state = manager.get_state()?;
        if state.id.is_empty() {
            return Err(LabError::parse("project has no id"));
        }
        let key = StorageKey::project(&state.id);
        let bytes = manager.save();

        if let Err(e) = self
            .objects
            .put(&key.to_string(), StoredValue::blob(bytes, PROJECT_CONTENT_TYPE))
        {
            warn!(key = %key, error = %e, "project save failed");
            manager.set_save_status("error")?;
            return Err(e);
        }
        self.index.set_references(Owner::Project(state.id.clone()), state.media_references());
        manager.mark_saved();
        manager.set_save_status("saved")?;
        debug!(key = %key, "project saved");
        Ok(key)
    }

    /// Saves the session project when it is dirty and the debounce window
    /// since the previous autosave has passed. Returns whether it saved.
    pub fn autosave(&mut self, now_ms: i64) -> LabResult<bool> {
        let Some(manager) = self.current.as_ref() else {
            return Ok(false);
        };
        if !manager.is_dirty() {
            return Ok(false);
        }
        let debounce = self.config.autosave_debounce_ms as i64;
        if let Some(last) = self.last_autosave_ms {
            if now_ms - last < debounce {
                return Ok(false);
            }
        }
        self.save_current()?;
        self.last_autosave_ms = Some(now_ms);
        Ok(true)
    }

    // =========================================================================
    // STORED PROJECTS
    // =========================================================================

    /// Reads `project-<id>` and makes it the session project.
    pub fn load_project(&mut self, id: &str) -> LabResult<&mut ProjectManager> {
        let key = StorageKey::project(id).to_string();
        let value = self
            .objects
            .get(&key)?
            .ok_or_else(|| LabError::project_not_found(id))?;
        let manager = match &value {
            StoredValue::Blob { bytes, .. } => match ProjectManager::from_bytes(bytes) {
                Ok(manager) => manager,
                Err(_) => ProjectManager::from_project(project_from_stored(&value)?)?,
            },
            _ => ProjectManager::from_project(project_from_stored(&value)?)?,
        };
        Ok(self.current.insert(manager))
    }

    /// Summaries of every stored project, most recently updated first.
    pub fn list_projects(&self) -> LabResult<Vec<ProjectSummary>> {
        let mut projects = Vec::new();
        for raw in self.objects.keys()? {
            let StorageKey::Project(id) = StorageKey::parse(&raw) else {
                continue;
            };
            let Some(value) = self.objects.get(&raw)? else {
                continue;
            };
            match project_from_stored(&value) {
                Ok(project) => projects.push(ProjectSummary {
                    id,
                    series_name: project.series_name,
                    episode_name: project.episode_name,
                    cut_count: project.script.len(),
                    updated_at: project.updated_at,
                    size: value.size(),
                }),
                Err(e) => warn!(key = %raw, error = %e, "unreadable project snapshot"),
            }
        }
        projects.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(projects)
    }

    /// Deletes `project-<id>`. Media it referenced becomes orphaned unless
    /// another project still points at it.
    pub fn delete_project(&mut self, id: &str) -> LabResult<bool> {
        let existed = self.objects.delete(&StorageKey::project(id).to_string())?;
        self.index.remove_owner(&Owner::Project(id.to_string()));
        if existed {
            info!(id, "project deleted");
        }
        Ok(existed)
    }

    // =========================================================================
    // MEDIA
    // =========================================================================

    /// Stores a media payload under `media-<kind>-<owner>`.
    ///
    /// The returned key's [`StorageKey::to_reference`] is what project fields
    /// should hold.
    pub fn put_media(
        &mut self,
        kind: MediaKind,
        owner: &str,
        value: StoredValue,
    ) -> LabResult<StorageKey> {
        let key = StorageKey::media(kind, owner);
        self.objects.put(&key.to_string(), value)?;
        Ok(key)
    }

    pub fn get_media(&self, key: &StorageKey) -> LabResult<Option<StoredValue>> {
        self.objects.get(&key.to_string())
    }

    // =========================================================================
    // MIGRATION
    // =========================================================================

    /// Moves the project held by the legacy `idea-lab-storage` blob into its
    /// own `project-<id>` snapshot. The legacy blob is left in place.
    ///
    /// Returns the migrated project id, or `None` when there was nothing to
    /// migrate or the snapshot already exists.
    pub fn migrate_legacy(&mut self) -> LabResult<Option<String>> {
        let Some(raw) = self.kv.get(IDEA_LAB_STATE)? else {
            return Ok(None);
        };
        let Some(mut project) = project_from_state_blob(&raw) else {
            warn!("legacy state blob holds no parseable project");
            return Ok(None);
        };
        if project.id.is_empty() {
            project.id = uuid::Uuid::new_v4().to_string();
        }
        let key = StorageKey::project(&project.id);
        if self.objects.get(&key.to_string())?.is_some() {
            debug!(id = %project.id, "legacy project already migrated");
            return Ok(None);
        }

        let refs: BTreeSet<String> = project.media_references();
        let id = project.id.clone();
        let mut manager = ProjectManager::from_project(project)?;
        self.objects
            .put(&key.to_string(), StoredValue::blob(manager.save(), PROJECT_CONTENT_TYPE))?;
        self.index.set_references(Owner::Project(id.clone()), refs);
        info!(id = %id, "migrated legacy project");
        Ok(Some(id))
    }
}
