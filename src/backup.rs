//! Full-state backup documents.
//!
//! A backup is a JSON object `{ "version": 5, "timestamp": "<ISO-8601>",
//! "state": { ...project... } }`. Older versions import with defaults for
//! fields they lack; newer versions are rejected.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compression::{compress, maybe_decompress};
use crate::error::{LabError, LabResult};
use crate::project::model::Project;
use crate::project::ProjectManager;
use crate::storage::key::StorageKey;
use crate::workspace::Workspace;

/// Current backup format version.
pub const BACKUP_VERSION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub version: u32,
    pub timestamp: String,
    pub state: Project,
}

impl BackupDocument {
    pub fn capture(state: Project, at: DateTime<Utc>) -> Self {
        Self {
            version: BACKUP_VERSION,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            state,
        }
    }

    /// `IdeaLab_FullBackup_<timestamp>.json`, with `:` and `.` made file-safe.
    pub fn filename(&self) -> String {
        format!("IdeaLab_FullBackup_{}.json", self.file_stamp())
    }

    fn file_stamp(&self) -> String {
        self.timestamp.replace([':', '.'], "-")
    }

    pub fn to_json(&self) -> LabResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_gzip(&self) -> LabResult<Vec<u8>> {
        compress(self.to_json()?.as_bytes())
    }

    pub fn from_json(raw: &str) -> LabResult<Self> {
        let doc: BackupDocument = serde_json::from_str(raw)?;
        if doc.version > BACKUP_VERSION {
            return Err(LabError::UnsupportedBackupVersion {
                found: doc.version,
                supported: BACKUP_VERSION,
            });
        }
        Ok(doc)
    }

    /// Reads plain or gzip-compressed backup bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> LabResult<Self> {
        let raw = maybe_decompress(bytes)?;
        let text = std::str::from_utf8(&raw).map_err(|e| LabError::parse(e.to_string()))?;
        Self::from_json(text)
    }
}

impl Workspace {
    /// Snapshots the session project into a backup document.
    pub fn export_backup(&mut self) -> LabResult<BackupDocument> {
        let state = self.current()?.get_state()?;
        let doc = BackupDocument::capture(state, Utc::now());
        info!(file = %doc.filename(), "backup exported");
        Ok(doc)
    }

    /// Replaces the session project with the backup's state.
    pub fn import_backup(&mut self, doc: BackupDocument) -> LabResult<&mut ProjectManager> {
        if doc.version > BACKUP_VERSION {
            return Err(LabError::UnsupportedBackupVersion {
                found: doc.version,
                supported: BACKUP_VERSION,
            });
        }
        info!(version = doc.version, timestamp = %doc.timestamp, "importing backup");
        self.open_project(doc.state)
    }

    /// Keeps a backup in the key-value store as `backup_<stamp>`.
    pub fn store_backup(&mut self, doc: &BackupDocument) -> LabResult<StorageKey> {
        let key = StorageKey::backup(doc.file_stamp());
        self.kv.set(&key.to_string(), doc.to_json()?)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::{AssetDefinition, AssetKind, Character, Scope, ScriptCut};
    use crate::storage::backend::KvStore;
    use crate::storage::key::Category;
    use crate::workspace::tests::memory_workspace;
    use chrono::TimeZone;

    fn rich_project() -> Project {
        let mut project = Project::new("p-42")
            .with_series_name("Harbor Lights")
            .with_episode_name("Pilot")
            .with_story("A lighthouse keeper finds a letter.")
            .with_asset_definition(
                AssetDefinition::new("def-1", AssetKind::Location, "Lighthouse")
                    .with_description("white tower")
                    .with_draft_image("idb://media-images-def-1"),
            )
            .with_cut(
                ScriptCut::new("c1")
                    .with_line("Keeper", "Who's there?")
                    .with_duration(3.5)
                    .with_final_image("idb://media-images-c1"),
            );
        project
            .entities_mut(Scope::Series)
            .characters
            .insert("ch1".into(), Character::new("ch1", "Mara").with_description("keeper"));
        project.entities_mut(Scope::Series).character_order.push("ch1".into());
        project.api_keys.llm = "sk-test".into();
        project.save_status = "saving".into();
        project
    }

    #[test]
    fn test_round_trip_preserves_state() {
        let project = rich_project();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let doc = BackupDocument::capture(project.clone(), at);
        assert_eq!(doc.timestamp, "2024-03-09T14:05:07.000Z");
        assert_eq!(doc.filename(), "IdeaLab_FullBackup_2024-03-09T14-05-07-000Z.json");

        let back = BackupDocument::from_json(&doc.to_json().unwrap()).unwrap();
        let mut expected = project;
        // Save status is UI-only and not part of the snapshot.
        expected.save_status = String::new();
        assert_eq!(back.state, expected);
        assert_eq!(back.version, BACKUP_VERSION);
    }

    #[test]
    fn test_gzip_round_trip() {
        let doc = BackupDocument::capture(rich_project(), Utc::now());
        let packed = doc.to_gzip().unwrap();
        let back = BackupDocument::from_bytes(packed).unwrap();
        assert_eq!(back.state.series_name, "Harbor Lights");

        let plain = BackupDocument::from_bytes(doc.to_json().unwrap().into_bytes()).unwrap();
        assert_eq!(plain.timestamp, doc.timestamp);
    }

    #[test]
    fn test_newer_version_rejected_older_accepted() {
        let newer = r#"{"version": 6, "timestamp": "t", "state": {"id": "p"}}"#;
        assert!(matches!(
            BackupDocument::from_json(newer),
            Err(LabError::UnsupportedBackupVersion { found: 6, supported: 5 })
        ));

        let older = r#"{"version": 3, "timestamp": "t", "state": {"id": "p", "seriesName": "Old"}}"#;
        let doc = BackupDocument::from_json(older).unwrap();
        assert_eq!(doc.state.series_name, "Old");
        assert!(doc.state.script.is_empty());
    }

    #[test]
    fn test_workspace_export_import_and_store() {
        let mut ws = memory_workspace();
        assert!(matches!(ws.export_backup(), Err(LabError::NoOpenProject)));

        ws.open_project(rich_project()).unwrap();
        let doc = ws.export_backup().unwrap();

        let key = ws.store_backup(&doc).unwrap();
        assert_eq!(key.category(), Category::Backups);
        assert!(ws.kv.get(&key.to_string()).unwrap().is_some());

        ws.close_project();
        let state = ws.import_backup(doc).unwrap().get_state().unwrap();
        assert_eq!(state.id, "p-42");
        assert_eq!(state.script.len(), 1);
    }
}
