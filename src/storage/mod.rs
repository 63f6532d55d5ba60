//! Storage layer: key scheme, backends, reference index and the scanner.
//!
//! - `key`: typed storage keys and categories
//! - `value`: stored payloads (text, JSON, blobs)
//! - `backend`: store traits plus in-memory implementations
//! - `dir`: directory-backed stores used by the CLI
//! - `index`: media reference index
//! - `scanner`: usage statistics and item descriptors
//! - `optimize`: image recompression
//! - `wasm`: stores backed by JavaScript callbacks (JsWorkspace)

pub mod backend;
pub mod dir;
pub mod index;
pub mod key;
pub mod optimize;
pub mod scanner;
pub mod value;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use backend::{KvStore, MemoryKvStore, MemoryObjectStore, ObjectStore, StoreKind};
pub use index::{Owner, ReferenceIndex};
pub use key::{Category, MediaKind, StorageKey};
pub use scanner::{scan, CategoryStats, ItemDetail, ScanReport, StorageStats};
pub use value::StoredValue;

#[cfg(feature = "wasm")]
pub use wasm::JsWorkspace;
