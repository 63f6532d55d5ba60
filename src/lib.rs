//! IdeaLab - project documents and storage housekeeping for the Idea to Life
//! production wizard.
//!
//! A [`Workspace`] owns two stores (a structured key/blob store for projects
//! and media, and a flat key-value store for legacy state and backups), a
//! [`ReferenceIndex`] of which project points at which media key, and the
//! project open in the session. Housekeeping runs on top of it:
//!
//! - **Scan**: per-category usage, orphan and optimization candidates
//! - **Orphan cleanup**: delete media no project references
//! - **Optimization**: recompress large images in place
//! - **Backup**: export/import the session project as a versioned JSON document
//!
//! # Example
//!
//! ```rust
//! use idealab::{LabConfig, MediaKind, Project, ScriptCut, StoredValue, Workspace};
//! use idealab::storage::{MemoryKvStore, MemoryObjectStore};
//!
//! let mut ws = Workspace::open(
//!     Box::new(MemoryObjectStore::new()),
//!     Box::new(MemoryKvStore::new()),
//!     LabConfig::default(),
//! ).unwrap();
//!
//! // Store an image and point a cut at it
//! let key = ws.put_media(MediaKind::Images, "cut-1", StoredValue::text("data:image/png;base64,AA")).unwrap();
//! ws.open_project(Project::new("p1").with_cut(ScriptCut::new("cut-1").with_final_image(key.to_reference()))).unwrap();
//! ws.save_current().unwrap();
//!
//! // Nothing is orphaned while the project references the image
//! let report = ws.refresh().unwrap();
//! assert_eq!(report.orphans().count, 0);
//! ```

pub mod backup;
pub mod compression;
pub mod config;
pub mod error;
pub mod housekeeping;
pub mod project;
pub mod report;
pub mod storage;
pub mod workspace;

// Re-exports for convenience
pub use backup::{BackupDocument, BACKUP_VERSION};
pub use config::{LabConfig, OptimizeSettings};
pub use error::{LabError, LabResult};
pub use housekeeping::{BatchReport, ItemOutcome, OptimizeReport, Outcome};
pub use project::{AssetDefinition, AssetKind, Project, ProjectManager, Scope, ScriptCut};
pub use storage::{
    Category, MediaKind, ReferenceIndex, ScanReport, StorageKey, StoreKind, StoredValue,
};
pub use workspace::{ProjectSummary, Workspace};

#[cfg(feature = "wasm")]
pub use project::JsProjectManager;

#[cfg(feature = "wasm")]
pub use storage::JsWorkspace;
