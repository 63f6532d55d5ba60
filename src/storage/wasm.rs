//! WASM bindings for the storage housekeeping workspace.
//!
//! The browser owns persistence. It mirrors its IndexedDB and localStorage
//! contents into a `JsWorkspace`, runs housekeeping, then applies the
//! returned per-item report (deleted keys, rewritten keys) back to its own
//! stores.

use js_sys::Function;
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

use crate::config::LabConfig;
use crate::project::model::Project;
use crate::project::wasm::{parse_media_kind, to_js_value, JsProjectManager};
use crate::project::ProjectManager;
use crate::storage::backend::{KvStore, MemoryKvStore, MemoryObjectStore, ObjectStore, StoreKind};
use crate::storage::index::{project_from_state_blob, project_from_stored, Owner};
use crate::storage::key::{StorageKey, IDEA_LAB_STATE, WORKFLOW_STATE};
use crate::storage::value::StoredValue;
use crate::workspace::Workspace;
use crate::LabError;

macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: LabError| JsValue::from_str(&e.to_string()))
    };
}

fn parse_store(store: &str) -> Result<StoreKind, JsValue> {
    match store {
        "structured" | "idb" => Ok(StoreKind::Structured),
        "key-value" | "local" => Ok(StoreKind::KeyValue),
        other => Err(JsValue::from_str(&format!("unknown store '{}'", other))),
    }
}

/// JavaScript-friendly housekeeping workspace over in-memory mirrors of the
/// browser stores.
#[wasm_bindgen]
pub struct JsWorkspace {
    inner: Workspace,
}

#[wasm_bindgen]
impl JsWorkspace {
    /// Creates an empty workspace.
    ///
    /// `config` is optional and uses the same snake_case keys as the TOML
    /// file, e.g. `{ optimize: { jpeg_quality: 70 } }`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<JsWorkspace, JsValue> {
        let mut config: LabConfig = if config.is_undefined() || config.is_null() {
            LabConfig::default()
        } else {
            from_value(config)?
        };
        js_result!(config.validate())?;
        // No blocking sleep in the browser event loop.
        config.settle_delay_ms = 0;

        let inner = js_result!(Workspace::open(
            Box::new(MemoryObjectStore::new()),
            Box::new(MemoryKvStore::new()),
            config,
        ))?;
        Ok(JsWorkspace { inner })
    }

    // =========================================================================
    // STORE MIRROR
    // =========================================================================

    /// Mirrors one structured-store item. `value` is a tagged StoredValue
    /// (`{ type: "text", value: "data:..." }`).
    #[wasm_bindgen(js_name = putItem)]
    pub fn put_item(&mut self, key: &str, value: JsValue) -> Result<(), JsValue> {
        let value: StoredValue = from_value(value)?;
        js_result!(self.inner.objects.put(key, value))?;
        self.reindex_if_project(key)
    }

    /// Mirrors a text item (data URL or JSON string).
    #[wasm_bindgen(js_name = putText)]
    pub fn put_text(&mut self, key: &str, text: String) -> Result<(), JsValue> {
        js_result!(self.inner.objects.put(key, StoredValue::text(text)))?;
        self.reindex_if_project(key)
    }

    /// Mirrors a binary item.
    #[wasm_bindgen(js_name = putBlob)]
    pub fn put_blob(&mut self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), JsValue> {
        js_result!(self.inner.objects.put(key, StoredValue::blob(bytes, content_type)))?;
        self.reindex_if_project(key)
    }

    #[wasm_bindgen(js_name = getItem)]
    pub fn get_item(&self, key: &str) -> Result<JsValue, JsValue> {
        let value = js_result!(self.inner.objects.get(key))?;
        Ok(to_js_value(&value)?)
    }

    /// Mirrors a key-value entry.
    #[wasm_bindgen(js_name = setKv)]
    pub fn set_kv(&mut self, key: &str, value: String) -> Result<(), JsValue> {
        if key == IDEA_LAB_STATE || key == WORKFLOW_STATE {
            let owner = Owner::State(key.to_string());
            match project_from_state_blob(&value) {
                Some(project) => self.inner.index.set_references(owner, project.media_references()),
                None => self.inner.index.remove_owner(&owner),
            }
        }
        js_result!(self.inner.kv.set(key, value))
    }

    #[wasm_bindgen(js_name = getKv)]
    pub fn get_kv(&self, key: &str) -> Result<Option<String>, JsValue> {
        js_result!(self.inner.kv.get(key))
    }

    /// Stores a media payload and returns its `idb://` reference.
    #[wasm_bindgen(js_name = putMedia)]
    pub fn put_media(&mut self, kind: &str, owner: &str, value: JsValue) -> Result<String, JsValue> {
        let kind = parse_media_kind(kind)?;
        let value: StoredValue = from_value(value)?;
        let key = js_result!(self.inner.put_media(kind, owner, value))?;
        Ok(key.to_reference())
    }

    // =========================================================================
    // HOUSEKEEPING
    // =========================================================================

    /// Scans both stores and returns `{ stats, items }`.
    pub fn scan(&mut self) -> Result<JsValue, JsValue> {
        let report = js_result!(self.inner.refresh())?;
        Ok(to_js_value(report)?)
    }

    /// `{ count, size }` of orphaned items in the latest scan.
    pub fn orphans(&self) -> Result<JsValue, JsValue> {
        let summary = self.inner.last_scan().map(|r| r.orphans()).unwrap_or_default();
        Ok(to_js_value(&summary)?)
    }

    /// `{ count, size }` of optimization candidates in the latest scan.
    pub fn optimizable(&self) -> Result<JsValue, JsValue> {
        let summary = self.inner.last_scan().map(|r| r.optimizable()).unwrap_or_default();
        Ok(to_js_value(&summary)?)
    }

    #[wasm_bindgen(js_name = cleanOrphans)]
    pub fn clean_orphans(&mut self) -> Result<JsValue, JsValue> {
        let report = js_result!(self.inner.clean_orphans())?;
        Ok(to_js_value(&report)?)
    }

    /// Runs the optimization pass. `progress(current, total)` is optional.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const report = ws.optimize((i, n) => setProgress(i / n));
    /// ```
    pub fn optimize(&mut self, progress: Option<Function>) -> Result<JsValue, JsValue> {
        let report = js_result!(self.inner.optimize(|current, total| {
            if let Some(f) = &progress {
                let _ = f.call2(
                    &JsValue::NULL,
                    &JsValue::from(current as u32),
                    &JsValue::from(total as u32),
                );
            }
        }))?;
        Ok(to_js_value(&report)?)
    }

    #[wasm_bindgen(js_name = rescueCleanup)]
    pub fn rescue_cleanup(&mut self) -> Result<JsValue, JsValue> {
        let report = js_result!(self.inner.rescue_cleanup())?;
        Ok(to_js_value(&report)?)
    }

    /// `store` is `"structured"` or `"key-value"`.
    #[wasm_bindgen(js_name = deleteItem)]
    pub fn delete_item(&mut self, store: &str, key: &str) -> Result<(), JsValue> {
        let store = parse_store(store)?;
        js_result!(self.inner.delete_item(store, key))
    }

    /// Replaces the session project from a stored item and returns its state.
    #[wasm_bindgen(js_name = loadItem)]
    pub fn load_item(&mut self, store: &str, key: &str) -> Result<JsValue, JsValue> {
        let store = parse_store(store)?;
        let state = js_result!(self.inner.load_item(store, key).and_then(|m| m.get_state()))?;
        Ok(to_js_value(&state)?)
    }

    // =========================================================================
    // SESSION PROJECT
    // =========================================================================

    /// Hands a project document to the workspace as the session project.
    #[wasm_bindgen(js_name = openManager)]
    pub fn open_manager(&mut self, manager: JsProjectManager) {
        self.inner.open_manager(manager.into_inner());
    }

    /// Opens a project from a plain state object.
    #[wasm_bindgen(js_name = openProject)]
    pub fn open_project(&mut self, state: JsValue) -> Result<(), JsValue> {
        let project: Project = from_value(state)?;
        js_result!(self.inner.open_project(project))?;
        Ok(())
    }

    /// A copy of the session document for editing on the JS side.
    #[wasm_bindgen(js_name = currentManager)]
    pub fn current_manager(&mut self) -> Result<JsProjectManager, JsValue> {
        let bytes = js_result!(self.inner.current())?.save();
        let manager = js_result!(ProjectManager::from_bytes(&bytes))?;
        Ok(JsProjectManager::from_inner(manager))
    }

    /// Saves the session project; returns the key written.
    #[wasm_bindgen(js_name = saveCurrent)]
    pub fn save_current(&mut self) -> Result<String, JsValue> {
        let key = js_result!(self.inner.save_current())?;
        Ok(key.to_string())
    }

    /// Debounced save; `nowMs` is `Date.now()`.
    pub fn autosave(&mut self, now_ms: f64) -> Result<bool, JsValue> {
        js_result!(self.inner.autosave(now_ms as i64))
    }

    #[wasm_bindgen(js_name = listProjects)]
    pub fn list_projects(&self) -> Result<JsValue, JsValue> {
        let list = js_result!(self.inner.list_projects())?;
        Ok(to_js_value(&list)?)
    }

    #[wasm_bindgen(js_name = deleteProject)]
    pub fn delete_project(&mut self, id: &str) -> Result<bool, JsValue> {
        js_result!(self.inner.delete_project(id))
    }

    #[wasm_bindgen(js_name = migrateLegacy)]
    pub fn migrate_legacy(&mut self) -> Result<Option<String>, JsValue> {
        js_result!(self.inner.migrate_legacy())
    }

    // =========================================================================
    // BACKUP & REPORT
    // =========================================================================

    /// Returns `{ filename, json }` for a download.
    #[wasm_bindgen(js_name = exportBackup)]
    pub fn export_backup(&mut self) -> Result<JsValue, JsValue> {
        let doc = js_result!(self.inner.export_backup())?;
        let json = js_result!(doc.to_json())?;
        Ok(to_js_value(&serde_json::json!({ "filename": doc.filename(), "json": json }))?)
    }

    /// Imports a backup file's text and returns the restored state.
    #[wasm_bindgen(js_name = importBackup)]
    pub fn import_backup(&mut self, json: &str) -> Result<JsValue, JsValue> {
        let doc = js_result!(crate::backup::BackupDocument::from_json(json))?;
        let state = js_result!(self.inner.import_backup(doc).and_then(|m| m.get_state()))?;
        Ok(to_js_value(&state)?)
    }

    /// Returns `{ filename, markdown }`. `date` is `YYYY-MM-DD`.
    #[wasm_bindgen(js_name = productionReport)]
    pub fn production_report(&mut self, date: &str) -> Result<JsValue, JsValue> {
        let date = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let state = js_result!(self.inner.current().and_then(|m| m.get_state()))?;
        let (filename, markdown) = crate::report::production_report(&state, date);
        Ok(to_js_value(&serde_json::json!({ "filename": filename, "markdown": markdown }))?)
    }
}

impl JsWorkspace {
    fn reindex_if_project(&mut self, key: &str) -> Result<(), JsValue> {
        let StorageKey::Project(id) = StorageKey::parse(key) else {
            return Ok(());
        };
        if let Some(value) = js_result!(self.inner.objects.get(key))? {
            let project = js_result!(project_from_stored(&value))?;
            self.inner.index.set_references(Owner::Project(id), project.media_references());
        }
        Ok(())
    }
}
