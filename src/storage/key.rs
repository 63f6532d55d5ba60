//! Typed key scheme for both storage backends.
//!
//! Every key the crate writes is built from a [`StorageKey`] variant, so the
//! category of an item is a property of the key rather than a guess made by
//! matching on string conventions. Parsing is total: keys written by older
//! clients that match no known layout land in [`StorageKey::Other`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of whole-project snapshots in the structured store.
pub const PROJECT_PREFIX: &str = "project-";
/// Prefix of individually addressable media items.
pub const MEDIA_PREFIX: &str = "media-";
/// Prefix of backups held in the key-value store.
pub const BACKUP_PREFIX: &str = "backup_";
/// Scheme used by project fields that point into the structured store.
pub const STORE_REF_SCHEME: &str = "idb://";

/// Legacy whole-state blob of the wizard.
pub const IDEA_LAB_STATE: &str = "idea-lab-storage";
/// Legacy whole-state blob of the workflow pages.
pub const WORKFLOW_STATE: &str = "workflow-storage";

/// Kind of media payload addressed by a media key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Images,
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Images => "images",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl FromStr for MediaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "images" => Ok(MediaKind::Images),
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            _ => Err(()),
        }
    }
}

/// Accounting category of a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Images,
    Audio,
    Video,
    Projects,
    Backups,
    Others,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 6] = [
        Category::Images,
        Category::Audio,
        Category::Video,
        Category::Projects,
        Category::Backups,
        Category::Others,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Images => "images",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::Projects => "projects",
            Category::Backups => "backups",
            Category::Others => "others",
        }
    }
}

impl From<MediaKind> for Category {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Images => Category::Images,
            MediaKind::Audio => Category::Audio,
            MediaKind::Video => Category::Video,
        }
    }
}

/// A key in one of the two storage backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKey {
    /// `project-<id>`
    Project(String),
    /// `media-<kind>-<owner>`
    Media { kind: MediaKind, owner: String },
    /// `media-` key with an unknown kind or no owner. Still media, so it can
    /// be orphaned, but it is accounted under [`Category::Others`].
    UntypedMedia(String),
    /// `backup_<stamp>`
    Backup(String),
    /// `idea-lab-storage` or `workflow-storage`
    AppState(String),
    /// Legacy key containing `thumbnail`.
    Thumbnail(String),
    /// Legacy key containing `asset`.
    Asset(String),
    /// Legacy key containing `frame`.
    Frame(String),
    /// Anything else.
    Other(String),
}

impl StorageKey {
    pub fn project(id: impl Into<String>) -> Self {
        StorageKey::Project(id.into())
    }

    pub fn media(kind: MediaKind, owner: impl Into<String>) -> Self {
        StorageKey::Media {
            kind,
            owner: owner.into(),
        }
    }

    pub fn backup(stamp: impl Into<String>) -> Self {
        StorageKey::Backup(stamp.into())
    }

    /// Parses a raw key. Never fails.
    pub fn parse(raw: &str) -> Self {
        if let Some(id) = raw.strip_prefix(PROJECT_PREFIX) {
            if !id.is_empty() {
                return StorageKey::Project(id.to_string());
            }
        }
        if let Some(rest) = raw.strip_prefix(MEDIA_PREFIX) {
            if let Some((kind, owner)) = rest.split_once('-') {
                if let (Ok(kind), false) = (kind.parse::<MediaKind>(), owner.is_empty()) {
                    return StorageKey::media(kind, owner);
                }
            }
            return StorageKey::UntypedMedia(raw.to_string());
        }
        if let Some(stamp) = raw.strip_prefix(BACKUP_PREFIX) {
            return StorageKey::Backup(stamp.to_string());
        }
        if raw == IDEA_LAB_STATE || raw == WORKFLOW_STATE {
            return StorageKey::AppState(raw.to_string());
        }
        if raw.contains("thumbnail") {
            return StorageKey::Thumbnail(raw.to_string());
        }
        if raw.contains("asset") {
            return StorageKey::Asset(raw.to_string());
        }
        if raw.contains("frame") {
            return StorageKey::Frame(raw.to_string());
        }
        StorageKey::Other(raw.to_string())
    }

    /// Resolves a project field value to the media key it points at, if any.
    ///
    /// Accepts both `idb://media-images-abc` and the bare `media-images-abc`.
    /// URLs and inline data are not storage references.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let raw = reference
            .strip_prefix(STORE_REF_SCHEME)
            .unwrap_or(reference);
        match StorageKey::parse(raw) {
            key if key.is_media() => Some(key),
            _ => None,
        }
    }

    /// The `idb://` reference a project field stores for this key.
    pub fn to_reference(&self) -> String {
        format!("{}{}", STORE_REF_SCHEME, self)
    }

    pub fn category(&self) -> Category {
        match self {
            StorageKey::Project(_) | StorageKey::AppState(_) => Category::Projects,
            StorageKey::Media { kind, .. } => (*kind).into(),
            StorageKey::Backup(_) => Category::Backups,
            StorageKey::Thumbnail(_) | StorageKey::Asset(_) | StorageKey::Frame(_) => {
                Category::Images
            }
            StorageKey::UntypedMedia(_) | StorageKey::Other(_) => Category::Others,
        }
    }

    pub fn is_media(&self) -> bool {
        matches!(self, StorageKey::Media { .. } | StorageKey::UntypedMedia(_))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Project(id) => write!(f, "{}{}", PROJECT_PREFIX, id),
            StorageKey::Media { kind, owner } => {
                write!(f, "{}{}-{}", MEDIA_PREFIX, kind.as_str(), owner)
            }
            StorageKey::Backup(stamp) => write!(f, "{}{}", BACKUP_PREFIX, stamp),
            StorageKey::AppState(raw)
            | StorageKey::Thumbnail(raw)
            | StorageKey::Asset(raw)
            | StorageKey::Frame(raw)
            | StorageKey::UntypedMedia(raw)
            | StorageKey::Other(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for StorageKey {
    fn from(raw: &str) -> Self {
        StorageKey::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_layouts() {
        assert_eq!(StorageKey::parse("project-abc"), StorageKey::project("abc"));
        assert_eq!(
            StorageKey::parse("media-images-cut-3"),
            StorageKey::media(MediaKind::Images, "cut-3")
        );
        assert_eq!(
            StorageKey::parse("backup_2024-01-01"),
            StorageKey::backup("2024-01-01")
        );
        assert_eq!(
            StorageKey::parse("idea-lab-storage"),
            StorageKey::AppState("idea-lab-storage".into())
        );
    }

    #[test]
    fn test_parse_legacy_substrings() {
        assert_eq!(StorageKey::parse("ep1-thumbnail").category(), Category::Images);
        assert_eq!(StorageKey::parse("my-asset-7").category(), Category::Images);
        assert_eq!(StorageKey::parse("frame_12").category(), Category::Images);
        assert_eq!(StorageKey::parse("settings").category(), Category::Others);
    }

    #[test]
    fn test_malformed_media_keys_stay_media() {
        for raw in ["media-documents-x", "media-images-", "media-"] {
            let key = StorageKey::parse(raw);
            assert_eq!(key, StorageKey::UntypedMedia(raw.into()));
            assert!(key.is_media(), "{}", raw);
            assert_eq!(key.category(), Category::Others);
            assert_eq!(key.to_string(), raw);
        }
        assert_eq!(
            StorageKey::from_reference("idb://media-documents-x"),
            Some(StorageKey::UntypedMedia("media-documents-x".into()))
        );
    }

    #[test]
    fn test_display_round_trips_raw_key() {
        for raw in [
            "project-p1",
            "media-audio-cut-9",
            "media-documents-x",
            "backup_x",
            "workflow-storage",
            "old-thumbnail",
            "whatever",
        ] {
            assert_eq!(StorageKey::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_reference_resolution() {
        let key = StorageKey::media(MediaKind::Images, "abc");
        assert_eq!(key.to_reference(), "idb://media-images-abc");
        assert_eq!(StorageKey::from_reference("idb://media-images-abc"), Some(key.clone()));
        assert_eq!(StorageKey::from_reference("media-images-abc"), Some(key));
        assert_eq!(StorageKey::from_reference("https://cdn.example.com/a.png"), None);
        assert_eq!(StorageKey::from_reference("data:image/png;base64,AAAA"), None);
    }
}
