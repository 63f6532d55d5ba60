//! WASM bindings for project module.
//!
//! This module provides JavaScript-friendly wrappers around the
//! ProjectManager for use in browser environments.

use js_sys::{Array, Uint8Array};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

use crate::project::manager::ProjectManager;
use crate::project::model::*;
use crate::storage::key::MediaKind;
use crate::LabError;

/// Serialize a value to JsValue with HashMaps as plain JS objects (not Map).
pub(crate) fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&Serializer::new().serialize_maps_as_objects(true))
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

/// Helper macro for Result conversion
macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: LabError| JsValue::from_str(&e.to_string()))
    };
}

pub(crate) fn parse_scope(scope: &str) -> Result<Scope, JsValue> {
    match scope {
        "series" => Ok(Scope::Series),
        "episode" => Ok(Scope::Episode),
        other => Err(JsValue::from_str(&format!("unknown scope '{}'", other))),
    }
}

pub(crate) fn parse_media_kind(kind: &str) -> Result<MediaKind, JsValue> {
    kind.parse::<MediaKind>()
        .map_err(|_| JsValue::from_str(&format!("unknown media kind '{}'", kind)))
}

// =============================================================================
// MAIN WRAPPER TYPE
// =============================================================================

/// JavaScript-friendly wrapper around ProjectManager.
#[wasm_bindgen]
pub struct JsProjectManager {
    inner: ProjectManager,
}

impl JsProjectManager {
    pub(crate) fn from_inner(inner: ProjectManager) -> Self {
        Self { inner }
    }

    pub(crate) fn into_inner(self) -> ProjectManager {
        self.inner
    }
}

#[wasm_bindgen]
impl JsProjectManager {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Creates a manager holding a fresh project.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const manager = new JsProjectManager('p-123');
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(id: &str) -> Result<JsProjectManager, JsValue> {
        let inner = js_result!(ProjectManager::new(id))?;
        Ok(JsProjectManager { inner })
    }

    /// Loads from binary bytes (Uint8Array).
    #[wasm_bindgen(js_name = fromBytes)]
    pub fn from_bytes(bytes: &[u8]) -> Result<JsProjectManager, JsValue> {
        let inner = js_result!(ProjectManager::from_bytes(bytes))?;
        Ok(JsProjectManager { inner })
    }

    /// Saves to binary bytes (returns Uint8Array).
    #[wasm_bindgen(js_name = toBytes)]
    pub fn to_bytes(&mut self) -> Uint8Array {
        let bytes = self.inner.save();
        Uint8Array::from(&bytes[..])
    }

    /// Gets the full project state as a JavaScript object.
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&mut self) -> Result<JsValue, JsValue> {
        let state = js_result!(self.inner.get_state())?;
        Ok(to_js_value(&state)?)
    }

    /// Replaces the full project state.
    #[wasm_bindgen(js_name = replaceState)]
    pub fn replace_state(&mut self, state: JsValue) -> Result<(), JsValue> {
        let project: Project = from_value(state)?;
        js_result!(self.inner.replace_state(project))
    }

    /// Whether there are unsaved changes.
    #[wasm_bindgen(js_name = isDirty)]
    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    /// Store keys referenced by the project (array of strings).
    #[wasm_bindgen(js_name = mediaReferences)]
    pub fn media_references(&mut self) -> Result<Array, JsValue> {
        let state = js_result!(self.inner.get_state())?;
        Ok(state
            .media_references()
            .into_iter()
            .map(|k| JsValue::from_str(&k))
            .collect())
    }

    // =========================================================================
    // ROOT OPERATIONS
    // =========================================================================

    #[wasm_bindgen(js_name = setSeriesName)]
    pub fn set_series_name(&mut self, name: &str) -> Result<(), JsValue> {
        js_result!(self.inner.set_series_name(name))
    }

    #[wasm_bindgen(js_name = setEpisodeName)]
    pub fn set_episode_name(&mut self, name: &str) -> Result<(), JsValue> {
        js_result!(self.inner.set_episode_name(name))
    }

    #[wasm_bindgen(js_name = setStory)]
    pub fn set_story(&mut self, story: &str) -> Result<(), JsValue> {
        js_result!(self.inner.set_story(story))
    }

    #[wasm_bindgen(js_name = setSaveStatus)]
    pub fn set_save_status(&mut self, status: &str) -> Result<(), JsValue> {
        js_result!(self.inner.set_save_status(status))
    }

    #[wasm_bindgen(js_name = touchUpdatedAt)]
    pub fn touch_updated_at(&mut self, timestamp: i64) -> Result<(), JsValue> {
        js_result!(self.inner.touch_updated_at(timestamp))
    }

    #[wasm_bindgen(js_name = setMasterStyleReference)]
    pub fn set_master_style_reference(&mut self, image: Option<String>) -> Result<(), JsValue> {
        js_result!(self.inner.set_master_style_reference(image.as_deref()))
    }

    #[wasm_bindgen(js_name = setThumbnailImage)]
    pub fn set_thumbnail_image(&mut self, image: Option<String>) -> Result<(), JsValue> {
        js_result!(self.inner.set_thumbnail_image(image.as_deref()))
    }

    // =========================================================================
    // ENTITY OPERATIONS
    // =========================================================================

    /// Creates a character in 'series' or 'episode' scope.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// manager.createCharacter('series', { id: 'c1', name: 'Mina', description: 'Night nurse' });
    /// ```
    #[wasm_bindgen(js_name = createCharacter)]
    pub fn create_character(&mut self, scope: &str, character: JsValue) -> Result<(), JsValue> {
        let character: Character = from_value(character)?;
        js_result!(self.inner.create_characters(parse_scope(scope)?, character))
    }

    #[wasm_bindgen(js_name = deleteCharacter)]
    pub fn delete_character(&mut self, scope: &str, id: &str) -> Result<(), JsValue> {
        js_result!(self.inner.delete_characters(parse_scope(scope)?, id))
    }

    #[wasm_bindgen(js_name = setCharacterImage)]
    pub fn set_character_image(&mut self, scope: &str, id: &str, image: Option<String>) -> Result<(), JsValue> {
        js_result!(self.inner.set_characters_image(parse_scope(scope)?, id, image.as_deref()))
    }

    #[wasm_bindgen(js_name = createLocation)]
    pub fn create_location(&mut self, scope: &str, location: JsValue) -> Result<(), JsValue> {
        let location: Location = from_value(location)?;
        js_result!(self.inner.create_locations(parse_scope(scope)?, location))
    }

    #[wasm_bindgen(js_name = deleteLocation)]
    pub fn delete_location(&mut self, scope: &str, id: &str) -> Result<(), JsValue> {
        js_result!(self.inner.delete_locations(parse_scope(scope)?, id))
    }

    #[wasm_bindgen(js_name = setLocationImage)]
    pub fn set_location_image(&mut self, scope: &str, id: &str, image: Option<String>) -> Result<(), JsValue> {
        js_result!(self.inner.set_locations_image(parse_scope(scope)?, id, image.as_deref()))
    }

    #[wasm_bindgen(js_name = createProp)]
    pub fn create_prop(&mut self, scope: &str, prop: JsValue) -> Result<(), JsValue> {
        let prop: Prop = from_value(prop)?;
        js_result!(self.inner.create_props(parse_scope(scope)?, prop))
    }

    #[wasm_bindgen(js_name = deleteProp)]
    pub fn delete_prop(&mut self, scope: &str, id: &str) -> Result<(), JsValue> {
        js_result!(self.inner.delete_props(parse_scope(scope)?, id))
    }

    #[wasm_bindgen(js_name = setPropImage)]
    pub fn set_prop_image(&mut self, scope: &str, id: &str, image: Option<String>) -> Result<(), JsValue> {
        js_result!(self.inner.set_props_image(parse_scope(scope)?, id, image.as_deref()))
    }

    // =========================================================================
    // ASSET DEFINITIONS
    // =========================================================================

    #[wasm_bindgen(js_name = upsertAssetDefinition)]
    pub fn upsert_asset_definition(&mut self, def: JsValue) -> Result<(), JsValue> {
        let def: AssetDefinition = from_value(def)?;
        js_result!(self.inner.upsert_asset_definition(def))
    }

    #[wasm_bindgen(js_name = setAssetDraftImage)]
    pub fn set_asset_draft_image(&mut self, id: &str, image: Option<String>) -> Result<(), JsValue> {
        js_result!(self.inner.set_asset_draft_image(id, image.as_deref()))
    }

    /// Promotes the draft to the master image; returns false without a draft.
    #[wasm_bindgen(js_name = confirmAssetDraft)]
    pub fn confirm_asset_draft(&mut self, id: &str, now: i64) -> Result<bool, JsValue> {
        js_result!(self.inner.confirm_asset_draft(id, now))
    }

    // =========================================================================
    // SCRIPT OPERATIONS
    // =========================================================================

    /// Replaces the script with an array of cuts.
    #[wasm_bindgen(js_name = setScript)]
    pub fn set_script(&mut self, cuts: JsValue) -> Result<(), JsValue> {
        let cuts: Vec<ScriptCut> = from_value(cuts)?;
        js_result!(self.inner.set_script(cuts))
    }

    /// Attaches media ('images' | 'audio' | 'video') to a cut.
    #[wasm_bindgen(js_name = attachCutMedia)]
    pub fn attach_cut_media(&mut self, id: &str, kind: &str, reference: &str) -> Result<(), JsValue> {
        js_result!(self.inner.attach_cut_media(id, parse_media_kind(kind)?, reference))
    }

    #[wasm_bindgen(js_name = confirmCut)]
    pub fn confirm_cut(&mut self, id: &str, kind: &str, confirmed: bool) -> Result<(), JsValue> {
        js_result!(self.inner.confirm_cut(id, parse_media_kind(kind)?, confirmed))
    }

    #[wasm_bindgen(js_name = confirmedCutCount)]
    pub fn confirmed_cut_count(&mut self) -> Result<usize, JsValue> {
        let state = js_result!(self.inner.get_state())?;
        Ok(state.confirmed_cut_count())
    }
}
