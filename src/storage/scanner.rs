//! Storage scanner: enumerates both backends and aggregates usage.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LabResult;
use crate::storage::backend::{KvStore, ObjectStore, StoreKind};
use crate::storage::index::{project_from_state_blob, project_from_stored, ReferenceIndex};
use crate::storage::key::{Category, StorageKey};
use crate::storage::value::{truncate_chars, StoredValue};

/// Non-optimized items above this size are eligible for optimization.
pub const OPTIMIZE_MIN_BYTES: u64 = 200 * 1024;
/// Base64 data URLs above this size are eligible for optimization.
pub const BASE64_OPTIMIZE_MIN_BYTES: u64 = 30 * 1024;

/// Count and total byte size of a group of items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: u64,
    pub size: u64,
}

impl CategoryStats {
    fn add(&mut self, size: u64) {
        self.count += 1;
        self.size += size;
    }
}

/// Per-category usage totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    pub images: CategoryStats,
    pub audio: CategoryStats,
    pub video: CategoryStats,
    pub projects: CategoryStats,
    pub backups: CategoryStats,
    pub others: CategoryStats,
    pub total: CategoryStats,
}

impl StorageStats {
    pub fn get(&self, category: Category) -> CategoryStats {
        match category {
            Category::Images => self.images,
            Category::Audio => self.audio,
            Category::Video => self.video,
            Category::Projects => self.projects,
            Category::Backups => self.backups,
            Category::Others => self.others,
        }
    }

    fn record(&mut self, category: Category, size: u64) {
        let slot = match category {
            Category::Images => &mut self.images,
            Category::Audio => &mut self.audio,
            Category::Video => &mut self.video,
            Category::Projects => &mut self.projects,
            Category::Backups => &mut self.backups,
            Category::Others => &mut self.others,
        };
        slot.add(size);
        self.total.add(size);
    }
}

/// Descriptor of one stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    pub key: String,
    pub store: StoreKind,
    pub category: Category,
    pub size: u64,
    pub preview: String,
    /// Milliseconds since epoch, when the payload carries one.
    pub timestamp: Option<i64>,
    pub is_orphan: bool,
    pub is_optimized: bool,
    /// Whether the optimization pass would touch this item.
    pub is_optimizable: bool,
    /// Project referencing this item, or the project a snapshot holds.
    pub project_ref: Option<String>,
}

/// Result of one scan over both backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub stats: StorageStats,
    pub items: Vec<ItemDetail>,
}

impl ScanReport {
    /// Orphaned media items.
    pub fn orphan_items(&self) -> impl Iterator<Item = &ItemDetail> {
        self.items.iter().filter(|i| i.is_orphan)
    }

    /// Items eligible for the optimization pass.
    pub fn optimizable_items(&self) -> impl Iterator<Item = &ItemDetail> {
        self.items.iter().filter(|i| i.is_optimizable)
    }

    /// Count and size of orphaned items.
    pub fn orphans(&self) -> CategoryStats {
        summarize(self.orphan_items())
    }

    /// Count and size of items eligible for optimization.
    pub fn optimizable(&self) -> CategoryStats {
        summarize(self.optimizable_items())
    }

    pub fn find(&self, store: StoreKind, key: &str) -> Option<&ItemDetail> {
        self.items.iter().find(|i| i.store == store && i.key == key)
    }
}

fn summarize<'a>(items: impl Iterator<Item = &'a ItemDetail>) -> CategoryStats {
    items.fold(CategoryStats::default(), |mut acc, item| {
        acc.add(item.size);
        acc
    })
}

/// Whether a structured-store value is eligible for recompression.
pub fn is_optimizable(category: Category, value: &StoredValue) -> bool {
    if category != Category::Images || value.is_optimized() {
        return false;
    }
    let size = value.size();
    size > OPTIMIZE_MIN_BYTES || (value.is_base64_text() && size > BASE64_OPTIMIZE_MIN_BYTES)
}

/// Scans both backends. Read-only.
///
/// Items that cannot be read are logged and left out of the report.
pub fn scan(objects: &dyn ObjectStore, kv: &dyn KvStore, index: &ReferenceIndex) -> LabResult<ScanReport> {
    let mut report = ScanReport::default();

    for raw in objects.keys()? {
        let value = match objects.get(&raw) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                warn!(key = %raw, error = %e, "failed to read structured item");
                continue;
            }
        };
        let key = StorageKey::parse(&raw);
        let category = key.category();
        let size = value.size();

        let (timestamp, project_ref) = match &key {
            StorageKey::Project(id) => (
                project_from_stored(&value).ok().map(|p| p.updated_at),
                Some(id.clone()),
            ),
            _ => (None, index.owner_of(&raw).map(|o| o.name().to_string())),
        };

        report.stats.record(category, size);
        report.items.push(ItemDetail {
            is_orphan: key.is_media() && !index.is_referenced(&raw),
            is_optimized: value.is_optimized(),
            is_optimizable: is_optimizable(category, &value),
            preview: value.preview(),
            key: raw,
            store: StoreKind::Structured,
            category,
            size,
            timestamp,
            project_ref,
        });
    }

    for raw in kv.keys()? {
        let value = match kv.get(&raw) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                warn!(key = %raw, error = %e, "failed to read key-value item");
                continue;
            }
        };
        let category = StorageKey::parse(&raw).category();
        let size = value.len() as u64;
        // Legacy state blobs and backup documents both carry a `state` project.
        let embedded = project_from_state_blob(&value);

        report.stats.record(category, size);
        report.items.push(ItemDetail {
            key: raw,
            store: StoreKind::KeyValue,
            category,
            size,
            preview: truncate_chars(&value, 50),
            timestamp: embedded.as_ref().map(|p| p.updated_at),
            is_orphan: false,
            is_optimized: false,
            is_optimizable: false,
            project_ref: embedded.map(|p| p.id).filter(|id| !id.is_empty()),
        });
    }

    debug!(
        items = report.items.len(),
        total_bytes = report.stats.total.size,
        orphans = report.orphans().count,
        "storage scan complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::{Project, ScriptCut};
    use crate::project::ProjectManager;
    use crate::storage::backend::{MemoryKvStore, MemoryObjectStore};

    fn fixture() -> (MemoryObjectStore, MemoryKvStore, ReferenceIndex) {
        let mut objects = MemoryObjectStore::new();
        let kv = MemoryKvStore::new();

        let project = Project::new("p1")
            .with_cut(ScriptCut::new("c1").with_final_image("idb://media-images-abc"));
        let mut manager = ProjectManager::from_project(project).unwrap();
        objects
            .put("project-p1", StoredValue::blob(manager.save(), "application/automerge"))
            .unwrap();
        objects
            .put("media-images-abc", StoredValue::text("data:image/png;base64,AAAA"))
            .unwrap();
        objects
            .put("media-images-unreferenced", StoredValue::blob(vec![0; 1234], "image/png"))
            .unwrap();
        objects
            .put("media-audio-x", StoredValue::blob(vec![0; 10], "audio/mpeg"))
            .unwrap();
        objects.put("ep1-thumbnail", StoredValue::text("thumb")).unwrap();

        let index = ReferenceIndex::rebuild(&objects, &kv).unwrap();
        (objects, kv, index)
    }

    #[test]
    fn test_category_sums_equal_total() {
        let (objects, mut kv, index) = fixture();
        kv.set("backup_1", "{\"version\":5}".into()).unwrap();
        kv.set("misc", "abc".into()).unwrap();

        let report = scan(&objects, &kv, &index).unwrap();
        let stats = &report.stats;
        let size: u64 = Category::ALL.iter().map(|c| stats.get(*c).size).sum();
        let count: u64 = Category::ALL.iter().map(|c| stats.get(*c).count).sum();
        assert_eq!(size, stats.total.size);
        assert_eq!(count, stats.total.count);
        assert_eq!(stats.total.count, 7);
        assert_eq!(stats.backups.count, 1);
        assert_eq!(stats.others.size, 3);
        assert_eq!(stats.images.count, 3);
    }

    #[test]
    fn test_referenced_media_is_not_orphan() {
        let (objects, kv, index) = fixture();
        let report = scan(&objects, &kv, &index).unwrap();

        let item = report.find(StoreKind::Structured, "media-images-abc").unwrap();
        assert!(!item.is_orphan);
        assert_eq!(item.project_ref.as_deref(), Some("p1"));
    }

    #[test]
    fn test_unreferenced_media_is_orphan() {
        let (objects, kv, index) = fixture();
        let report = scan(&objects, &kv, &index).unwrap();

        let orphan_keys: Vec<&str> = report.orphan_items().map(|i| i.key.as_str()).collect();
        assert_eq!(orphan_keys, vec!["media-audio-x", "media-images-unreferenced"]);
        let item = report.find(StoreKind::Structured, "media-images-unreferenced").unwrap();
        assert_eq!(item.size, 1234);
        assert_eq!(report.orphans(), CategoryStats { count: 2, size: 1244 });

        // Legacy ad hoc keys are never orphan candidates.
        assert!(!report.find(StoreKind::Structured, "ep1-thumbnail").unwrap().is_orphan);
    }

    #[test]
    fn test_malformed_media_keys_can_be_orphans() {
        let (mut objects, kv, _) = fixture();
        objects.put("media-documents-x", StoredValue::text("doc")).unwrap();
        objects.put("media-images-", StoredValue::text("empty")).unwrap();
        let index = ReferenceIndex::rebuild(&objects, &kv).unwrap();
        let report = scan(&objects, &kv, &index).unwrap();

        for key in ["media-documents-x", "media-images-"] {
            let item = report.find(StoreKind::Structured, key).unwrap();
            assert!(item.is_orphan, "{}", key);
            assert_eq!(item.category, Category::Others);
        }
        assert_eq!(report.orphans().count, 4);
    }

    #[test]
    fn test_project_snapshot_descriptor() {
        let (objects, kv, index) = fixture();
        let report = scan(&objects, &kv, &index).unwrap();
        let item = report.find(StoreKind::Structured, "project-p1").unwrap();
        assert_eq!(item.category, Category::Projects);
        assert_eq!(item.project_ref.as_deref(), Some("p1"));
        assert!(item.timestamp.is_some());
        assert_eq!(item.preview, "[Blob application/automerge]");
    }

    #[test]
    fn test_optimizable_thresholds() {
        let big_png = StoredValue::blob(vec![0; (OPTIMIZE_MIN_BYTES + 1) as usize], "image/png");
        let small_png = StoredValue::blob(vec![0; 50 * 1024], "image/png");
        let big_jpeg = StoredValue::blob(vec![0; (OPTIMIZE_MIN_BYTES + 1) as usize], "image/jpeg");
        let b64 = StoredValue::text(format!(
            "data:image/png;base64,{}",
            "A".repeat(BASE64_OPTIMIZE_MIN_BYTES as usize)
        ));
        let b64_small = StoredValue::text("data:image/png;base64,AAAA");

        assert!(is_optimizable(Category::Images, &big_png));
        assert!(!is_optimizable(Category::Images, &small_png));
        assert!(!is_optimizable(Category::Images, &big_jpeg));
        assert!(is_optimizable(Category::Images, &b64));
        assert!(!is_optimizable(Category::Images, &b64_small));
        assert!(!is_optimizable(Category::Audio, &big_png));
    }

    #[test]
    fn test_kv_items_have_no_orphan_detection() {
        let objects = MemoryObjectStore::new();
        let mut kv = MemoryKvStore::new();
        kv.set("media-images-zzz", "data".into()).unwrap();
        let report = scan(&objects, &kv, &ReferenceIndex::new()).unwrap();
        assert_eq!(report.orphans().count, 0);
        assert_eq!(report.items[0].store, StoreKind::KeyValue);
    }
}
