//! ProjectManager implementation with hybrid operations pattern.
//!
//! This module provides the main `ProjectManager` struct that wraps an Automerge
//! document and provides:
//! - High-level operations via autosurgeon (hydrate/reconcile) for bulk updates
//! - Targeted O(1) updates via direct put operations for high-frequency fields
//! - Macro-generated CRUD for Character/Location/Prop per scope
//!
//! Every mutation marks the document dirty; the workspace uses the flag to
//! decide when an autosave is due.

use automerge::{transaction::Transactable, AutoCommit, ObjId, ReadDoc, ScalarValue, Value, ROOT};
use autosurgeon::{hydrate, reconcile};
use paste::paste;

use crate::error::{LabError, LabResult};
use crate::project::model::*;
use crate::storage::key::MediaKind;

// =============================================================================
// ENTITY CRUD MACRO
// =============================================================================

/// Generates CRUD methods for an entity type with consistent O(1) optimization.
/// All setters follow identical optimization path: cache invalidate → get ObjId → put/delete
macro_rules! entity_crud {
    ($entity:ident, $collection:ident, $order:ident) => {
        paste! {
            /// Creates a new entity and appends it to the order list.
            pub fn [<create_ $collection:snake>](&mut self, scope: Scope, entity: $entity) -> LabResult<()> {
                self.update_state(|state| {
                    let set = state.entities_mut(scope);
                    let id = entity.id.clone();
                    set.$collection.insert(id.clone(), entity);
                    if !set.$order.contains(&id) {
                        set.$order.push(id);
                    }
                })
            }

            /// Gets an entity by ID.
            pub fn [<get_ $collection:snake>](&mut self, scope: Scope, id: &str) -> LabResult<Option<$entity>> {
                let state = self.get_state()?;
                Ok(state.entities(scope).$collection.get(id).cloned())
            }

            /// Lists entities in display order.
            pub fn [<list_ $collection:snake>](&mut self, scope: Scope) -> LabResult<Vec<$entity>> {
                let state = self.get_state()?;
                let set = state.entities(scope);
                Ok(set
                    .$order
                    .iter()
                    .filter_map(|id| set.$collection.get(id).cloned())
                    .collect())
            }

            /// Deletes an entity by ID.
            pub fn [<delete_ $collection:snake>](&mut self, scope: Scope, id: &str) -> LabResult<()> {
                self.update_state(|state| {
                    let set = state.entities_mut(scope);
                    set.$collection.remove(id);
                    set.$order.retain(|s| s != id);
                })
            }

            /// Sets the image field (O(1) targeted update).
            pub fn [<set_ $collection:snake _image>](&mut self, scope: Scope, id: &str, image: Option<&str>) -> LabResult<()> {
                self.set_field_opt_str(
                    &[scope.as_str(), stringify!($collection), id],
                    "image_url",
                    image,
                )
            }

            /// Links the entity to an asset definition (O(1) targeted update).
            pub fn [<link_ $collection:snake _asset>](&mut self, scope: Scope, id: &str, definition_id: Option<&str>) -> LabResult<()> {
                self.set_field_opt_str(
                    &[scope.as_str(), stringify!($collection), id],
                    "asset_definition_id",
                    definition_id,
                )
            }
        }
    };
}

// =============================================================================
// PROJECT MANAGER
// =============================================================================

/// Owner of one project's state.
///
/// Uses a hybrid approach:
/// - `update_state()` for bulk struct operations (uses hydrate/reconcile)
/// - `set_series_name()`, `set_save_status()` and friends for targeted O(1) updates
/// - `entity_crud!` macro generates consistent CRUD for Character/Location/Prop
pub struct ProjectManager {
    doc: AutoCommit,
    /// Cached hydrated state - invalidated after direct document mutations.
    cached_state: Option<Project>,
    /// Set by every mutation, cleared by `mark_saved`.
    dirty: bool,
}

impl ProjectManager {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates a manager holding a fresh project with the given id.
    pub fn new(id: &str) -> LabResult<Self> {
        Self::from_project(Project::new(id))
    }

    /// Creates a manager holding the given project state.
    pub fn from_project(project: Project) -> LabResult<Self> {
        let mut doc = AutoCommit::new();
        reconcile(&mut doc, &project)?;
        Ok(Self {
            doc,
            cached_state: Some(project),
            dirty: true,
        })
    }

    /// Creates a ProjectManager from saved binary data.
    pub fn from_bytes(bytes: &[u8]) -> LabResult<Self> {
        let doc = AutoCommit::load(bytes)?;
        Ok(Self {
            doc,
            cached_state: None,
            dirty: false,
        })
    }

    /// Saves the document to binary format.
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Project id.
    pub fn id(&mut self) -> LabResult<String> {
        Ok(self.get_state()?.id)
    }

    /// Whether there are changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears the dirty flag after a successful persist.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    // =========================================================================
    // HIGH-LEVEL OPERATIONS (via Hydrate/Reconcile)
    // =========================================================================

    /// Hydrates the entire document state to Rust structs.
    pub fn get_state(&mut self) -> LabResult<Project> {
        if let Some(ref cached) = self.cached_state {
            return Ok(cached.clone());
        }
        let state: Project = hydrate(&self.doc)?;
        self.cached_state = Some(state.clone());
        Ok(state)
    }

    /// Applies a function to mutate the state, then reconciles back to the document.
    pub fn update_state<F>(&mut self, f: F) -> LabResult<()>
    where
        F: FnOnce(&mut Project),
    {
        let mut state = self.get_state()?;
        f(&mut state);
        reconcile(&mut self.doc, &state)?;
        self.cached_state = Some(state);
        self.dirty = true;
        Ok(())
    }

    /// Replaces the whole state, keeping document history.
    pub fn replace_state(&mut self, project: Project) -> LabResult<()> {
        self.update_state(|state| *state = project)
    }

    // =========================================================================
    // ROOT FIELD OPERATIONS
    // =========================================================================

    /// Sets the series name (O(1)).
    pub fn set_series_name(&mut self, name: &str) -> LabResult<()> {
        self.put_root_str("series_name", name)
    }

    /// Sets the episode name (O(1)).
    pub fn set_episode_name(&mut self, name: &str) -> LabResult<()> {
        self.put_root_str("episode_name", name)
    }

    /// Sets the story text (O(1)).
    pub fn set_story(&mut self, story: &str) -> LabResult<()> {
        self.put_root_str("story", story)
    }

    /// Sets the UI save indicator (O(1)). Does not dirty the document.
    pub fn set_save_status(&mut self, status: &str) -> LabResult<()> {
        self.cached_state = None;
        self.doc
            .put(&ROOT, "save_status", ScalarValue::Str(status.into()))?;
        Ok(())
    }

    /// Updates the updated_at timestamp (O(1)).
    pub fn touch_updated_at(&mut self, timestamp: i64) -> LabResult<()> {
        self.cached_state = None;
        self.dirty = true;
        self.doc
            .put(&ROOT, "updated_at", ScalarValue::Int(timestamp))?;
        Ok(())
    }

    /// Sets the master style reference image (O(1)).
    pub fn set_master_style_reference(&mut self, image: Option<&str>) -> LabResult<()> {
        self.set_field_opt_str(&["master_style"], "reference_image", image)
    }

    /// Sets the thumbnail image (O(1)).
    pub fn set_thumbnail_image(&mut self, image: Option<&str>) -> LabResult<()> {
        self.set_field_opt_str(&["thumbnail"], "image_url", image)
    }

    // =========================================================================
    // ENTITY CRUD (Macro-generated)
    // =========================================================================

    entity_crud!(Character, characters, character_order);
    entity_crud!(Location, locations, location_order);
    entity_crud!(Prop, props, prop_order);

    // =========================================================================
    // ASSET DEFINITIONS
    // =========================================================================

    /// Inserts or replaces an asset definition.
    pub fn upsert_asset_definition(&mut self, def: AssetDefinition) -> LabResult<()> {
        self.update_state(|state| {
            state.asset_definitions.insert(def.id.clone(), def);
        })
    }

    /// Gets an asset definition by ID.
    pub fn get_asset_definition(&mut self, id: &str) -> LabResult<Option<AssetDefinition>> {
        let state = self.get_state()?;
        Ok(state.asset_definitions.get(id).cloned())
    }

    /// Removes an asset definition.
    pub fn remove_asset_definition(&mut self, id: &str) -> LabResult<()> {
        self.update_state(|state| {
            state.asset_definitions.remove(id);
        })
    }

    /// Sets the draft image of an asset definition (O(1)).
    pub fn set_asset_draft_image(&mut self, id: &str, image: Option<&str>) -> LabResult<()> {
        self.set_field_opt_str(&["asset_definitions", id], "draft_image", image)
    }

    /// Promotes the draft image of an asset definition to its master image.
    pub fn confirm_asset_draft(&mut self, id: &str, now: i64) -> LabResult<bool> {
        if self.get_asset_definition(id)?.is_none() {
            return Err(LabError::entity_not_found(id));
        }
        let mut promoted = false;
        self.update_state(|state| {
            if let Some(def) = state.asset_definitions.get_mut(id) {
                promoted = def.confirm_draft(now);
            }
        })?;
        Ok(promoted)
    }

    // =========================================================================
    // SCRIPT OPERATIONS
    // =========================================================================

    /// Replaces the whole script.
    pub fn set_script(&mut self, cuts: Vec<ScriptCut>) -> LabResult<()> {
        self.update_state(|state| state.script = cuts)
    }

    /// Appends a cut to the script.
    pub fn append_cut(&mut self, cut: ScriptCut) -> LabResult<()> {
        self.update_state(|state| state.script.push(cut))
    }

    /// Gets a cut by ID.
    pub fn get_cut(&mut self, id: &str) -> LabResult<Option<ScriptCut>> {
        let state = self.get_state()?;
        Ok(state.script.iter().find(|c| c.id == id).cloned())
    }

    /// Removes a cut by ID.
    pub fn remove_cut(&mut self, id: &str) -> LabResult<()> {
        self.update_state(|state| state.script.retain(|c| c.id != id))
    }

    /// Applies a mutation to one cut.
    pub fn update_cut<F>(&mut self, id: &str, f: F) -> LabResult<()>
    where
        F: FnOnce(&mut ScriptCut),
    {
        let index = self.cut_index(id)?;
        self.update_state(|state| f(&mut state.script[index]))
    }

    /// Attaches generated media to a cut (O(1) targeted update).
    ///
    /// Images land in `final_image_url`; attaching new media clears the
    /// matching confirmation flag.
    pub fn attach_cut_media(&mut self, id: &str, kind: MediaKind, reference: &str) -> LabResult<()> {
        let (field, flag) = match kind {
            MediaKind::Images => ("final_image_url", "is_image_confirmed"),
            MediaKind::Audio => ("audio_url", "is_audio_confirmed"),
            MediaKind::Video => ("video_url", "is_video_confirmed"),
        };
        let obj = self.get_cut_obj(id)?;
        self.cached_state = None;
        self.dirty = true;
        self.doc.put(&obj, field, ScalarValue::Str(reference.into()))?;
        self.doc.put(&obj, flag, ScalarValue::Boolean(false))?;
        Ok(())
    }

    /// Sets a confirmation flag of a cut (O(1) targeted update).
    pub fn confirm_cut(&mut self, id: &str, kind: MediaKind, confirmed: bool) -> LabResult<()> {
        let flag = match kind {
            MediaKind::Images => "is_image_confirmed",
            MediaKind::Audio => "is_audio_confirmed",
            MediaKind::Video => "is_video_confirmed",
        };
        let obj = self.get_cut_obj(id)?;
        self.cached_state = None;
        self.dirty = true;
        self.doc.put(&obj, flag, ScalarValue::Boolean(confirmed))?;
        Ok(())
    }

    // =========================================================================
    // INTERNAL HELPERS - O(1) OPERATIONS
    // =========================================================================

    fn put_root_str(&mut self, key: &str, value: &str) -> LabResult<()> {
        self.cached_state = None;
        self.dirty = true;
        self.doc.put(&ROOT, key, ScalarValue::Str(value.into()))?;
        Ok(())
    }

    /// O(1) optional string field setter at a map path.
    fn set_field_opt_str(&mut self, path: &[&str], key: &str, value: Option<&str>) -> LabResult<()> {
        let obj = self.get_obj_at_path(path)?;
        self.cached_state = None;
        self.dirty = true;
        // None is written as null, which hydrates back to None.
        let value = match value {
            Some(v) => ScalarValue::Str(v.into()),
            None => ScalarValue::Null,
        };
        self.doc.put(&obj, key, value)?;
        Ok(())
    }

    fn cut_index(&mut self, id: &str) -> LabResult<usize> {
        let state = self.get_state()?;
        state
            .script
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| LabError::entity_not_found(id))
    }

    /// Gets ObjId for a cut in the script list.
    fn get_cut_obj(&mut self, id: &str) -> LabResult<ObjId> {
        let index = self.cut_index(id)?;
        let script = self.get_obj_at_key(&ROOT, "script")?;
        match self.doc.get(&script, index)? {
            Some((Value::Object(_), obj_id)) => Ok(obj_id),
            _ => Err(LabError::schema_violation(format!("cut {} is not an object", id))),
        }
    }

    /// Gets ObjId at a path.
    fn get_obj_at_path(&self, path: &[&str]) -> LabResult<ObjId> {
        let mut current = ROOT;
        for key in path {
            current = self.get_obj_at_key(&current, key)?;
        }
        Ok(current)
    }

    /// Gets an object ID at a map key.
    fn get_obj_at_key(&self, parent: &ObjId, key: &str) -> LabResult<ObjId> {
        match self.doc.get(parent, key) {
            Ok(Some((Value::Object(_), obj_id))) => Ok(obj_id),
            Ok(Some(_)) => Err(LabError::schema_violation(format!(
                "'{}' is not an object",
                key
            ))),
            Ok(None) => Err(LabError::entity_not_found(key)),
            Err(e) => Err(LabError::Automerge(e)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
