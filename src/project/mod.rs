//! Project document module.
//!
//! This module provides:
//! - `model`: Data structures for a project (Project, AssetDefinition, ScriptCut, ...)
//! - `manager`: ProjectManager with CRUD operations and O(1) targeted updates
//! - `wasm`: WASM bindings for browser usage (JsProjectManager)

pub mod manager;
pub mod model;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use manager::ProjectManager;
pub use model::*;

#[cfg(feature = "wasm")]
pub use wasm::JsProjectManager;
