//! Data models for an Idea to Life production project.
//!
//! Field names serialize in camelCase to match the JSON written by the
//! browser client and the backup document. The same structs are stored in
//! the Automerge project document through autosurgeon derives.

use autosurgeon::{Hydrate, Reconcile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::storage::key::StorageKey;

// =============================================================================
// PROJECT ROOT
// =============================================================================

/// A user's work-in-progress production unit.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub series_name: String,
    pub episode_name: String,
    pub story: String,
    pub plot: String,
    /// Target runtime in seconds.
    pub target_duration: i64,
    /// e.g. "9:16"
    pub aspect_ratio: String,

    pub api_keys: ApiKeys,
    pub master_style: MasterStyle,

    /// Recurring cast and places shared by every episode of the series.
    pub series: EntitySet,
    /// Cast and places introduced by this episode.
    pub episode: EntitySet,

    /// Confirmed visual identities keyed by entity id.
    pub asset_definitions: HashMap<String, AssetDefinition>,

    /// Ordered cuts of the episode script.
    pub script: Vec<ScriptCut>,

    pub thumbnail: ThumbnailSettings,

    /// Timestamps (milliseconds since epoch)
    pub created_at: i64,
    pub updated_at: i64,

    /// UI-only save indicator: 'idle' | 'saving' | 'saved' | 'error'.
    /// Never part of a backup.
    #[serde(skip)]
    pub save_status: String,
}

impl Project {
    /// Creates an empty project with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            target_duration: 60,
            aspect_ratio: "9:16".to_string(),
            save_status: "idle".to_string(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        }
    }

    /// Builder: Set series name.
    pub fn with_series_name(mut self, name: impl Into<String>) -> Self {
        self.series_name = name.into();
        self
    }

    /// Builder: Set episode name.
    pub fn with_episode_name(mut self, name: impl Into<String>) -> Self {
        self.episode_name = name.into();
        self
    }

    /// Builder: Set story text.
    pub fn with_story(mut self, story: impl Into<String>) -> Self {
        self.story = story.into();
        self
    }

    /// Builder: Append a script cut.
    pub fn with_cut(mut self, cut: ScriptCut) -> Self {
        self.script.push(cut);
        self
    }

    /// Builder: Add an asset definition.
    pub fn with_asset_definition(mut self, def: AssetDefinition) -> Self {
        self.asset_definitions.insert(def.id.clone(), def);
        self
    }

    /// Entity set for a scope.
    pub fn entities(&self, scope: Scope) -> &EntitySet {
        match scope {
            Scope::Series => &self.series,
            Scope::Episode => &self.episode,
        }
    }

    /// Mutable entity set for a scope.
    pub fn entities_mut(&mut self, scope: Scope) -> &mut EntitySet {
        match scope {
            Scope::Series => &mut self.series,
            Scope::Episode => &mut self.episode,
        }
    }

    /// Cuts whose image and audio are both confirmed.
    pub fn confirmed_cut_count(&self) -> usize {
        self.script.iter().filter(|c| c.is_confirmed()).count()
    }

    /// Sum of estimated cut durations in seconds.
    pub fn estimated_runtime(&self) -> f64 {
        self.script.iter().map(|c| c.estimated_duration).sum()
    }

    /// Every structured-store media key this project points at.
    ///
    /// Walks script cuts, asset definitions, the master style, the thumbnail
    /// and entity images.
    pub fn media_references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        let mut add = |value: &Option<String>| {
            if let Some(key) = value.as_deref().and_then(StorageKey::from_reference) {
                refs.insert(key.to_string());
            }
        };

        for cut in &self.script {
            add(&cut.draft_image_url);
            add(&cut.final_image_url);
            add(&cut.audio_url);
            add(&cut.video_url);
        }
        for def in self.asset_definitions.values() {
            add(&def.reference_image);
            add(&def.master_image);
            add(&def.draft_image);
        }
        add(&self.master_style.reference_image);
        add(&self.thumbnail.image_url);
        for set in [&self.series, &self.episode] {
            set.characters.values().for_each(|e| add(&e.image_url));
            set.locations.values().for_each(|e| add(&e.image_url));
            set.props.values().for_each(|e| add(&e.image_url));
        }
        refs
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Provider API keys entered by the user.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiKeys {
    /// LLM prompt/image provider
    pub llm: String,
    /// Video generation provider
    pub video: String,
    /// Text-to-speech provider
    pub tts: String,
    /// Sound-effect provider
    pub sfx: String,
}

/// Series-wide visual style.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MasterStyle {
    pub description: String,
    pub reference_image: Option<String>,
    pub character_modifier: String,
    pub background_modifier: String,
}

/// Thumbnail composition.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ThumbnailSettings {
    pub image_url: Option<String>,
    pub text: String,
    pub style_preset: String,
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Whether an entity belongs to the whole series or one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Series,
    Episode,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Series => "series",
            Scope::Episode => "episode",
        }
    }
}

/// Characters, locations and props of one scope.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EntitySet {
    pub characters: HashMap<String, Character>,
    pub character_order: Vec<String>,

    pub locations: HashMap<String, Location>,
    pub location_order: Vec<String>,

    pub props: HashMap<String, Prop>,
    pub prop_order: Vec<String>,
}

macro_rules! entity_model {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
        #[serde(default, rename_all = "camelCase")]
        pub struct $name {
            pub id: String,
            pub name: String,
            pub description: String,
            /// Preview image (URL or store reference)
            pub image_url: Option<String>,
            /// Id of the confirmed asset definition
            pub asset_definition_id: Option<String>,
        }

        impl $name {
            pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
                Self {
                    id: id.into(),
                    name: name.into(),
                    ..Default::default()
                }
            }

            /// Builder: Set description.
            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.description = description.into();
                self
            }

            /// Builder: Set image.
            pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
                self.image_url = Some(url.into());
                self
            }
        }
    };
}

entity_model!(
    /// A recurring or episode-specific character.
    Character
);
entity_model!(
    /// A place where cuts are staged.
    Location
);
entity_model!(
    /// An object that needs a consistent look across cuts.
    Prop
);

// =============================================================================
// ASSET DEFINITIONS
// =============================================================================

/// Kind of entity an asset definition describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Reconcile, Hydrate, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Character,
    Location,
    Prop,
}

/// Confirmed visual identity of one character, location or prop.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub asset_type: AssetKind,
    pub name: String,
    pub description: String,
    /// User-supplied reference image
    pub reference_image: Option<String>,
    /// Confirmed generated image
    pub master_image: Option<String>,
    /// Generated image awaiting confirmation
    pub draft_image: Option<String>,
    pub last_updated: i64,
}

impl AssetDefinition {
    pub fn new(id: impl Into<String>, asset_type: AssetKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            asset_type,
            name: name.into(),
            last_updated: chrono::Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }

    /// Builder: Set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: Set reference image.
    pub fn with_reference_image(mut self, image: impl Into<String>) -> Self {
        self.reference_image = Some(image.into());
        self
    }

    /// Builder: Set draft image.
    pub fn with_draft_image(mut self, image: impl Into<String>) -> Self {
        self.draft_image = Some(image.into());
        self
    }

    /// Promotes the draft to the master image. Returns false without a draft.
    pub fn confirm_draft(&mut self, now: i64) -> bool {
        match self.draft_image.take() {
            Some(draft) => {
                self.master_image = Some(draft);
                self.last_updated = now;
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// SCRIPT
// =============================================================================

/// One shot/beat of the episode.
#[derive(Debug, Clone, Default, Reconcile, Hydrate, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptCut {
    pub id: String,
    pub speaker: String,
    pub dialogue: String,
    pub visual_prompt: String,
    /// Seconds
    pub estimated_duration: f64,

    pub is_image_confirmed: bool,
    pub is_audio_confirmed: bool,
    pub is_video_confirmed: bool,

    pub draft_image_url: Option<String>,
    pub final_image_url: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
}

impl ScriptCut {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Builder: Set speaker and dialogue.
    pub fn with_line(mut self, speaker: impl Into<String>, dialogue: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self.dialogue = dialogue.into();
        self
    }

    /// Builder: Set visual prompt.
    pub fn with_visual_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.visual_prompt = prompt.into();
        self
    }

    /// Builder: Set estimated duration.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.estimated_duration = seconds;
        self
    }

    /// Builder: Set final image.
    pub fn with_final_image(mut self, url: impl Into<String>) -> Self {
        self.final_image_url = Some(url.into());
        self
    }

    /// Builder: Set audio.
    pub fn with_audio(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    /// A cut is confirmed only when image and audio are both confirmed and present.
    pub fn is_confirmed(&self) -> bool {
        self.is_image_confirmed
            && self.is_audio_confirmed
            && self.final_image_url.is_some()
            && self.audio_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_confirmation_needs_flags_and_media() {
        let mut cut = ScriptCut::new("c1").with_final_image("idb://media-images-c1");
        cut.is_image_confirmed = true;
        cut.is_audio_confirmed = true;
        assert!(!cut.is_confirmed());

        cut.audio_url = Some("idb://media-audio-c1".into());
        assert!(cut.is_confirmed());

        cut.is_audio_confirmed = false;
        assert!(!cut.is_confirmed());
    }

    #[test]
    fn test_media_references_walks_all_fields() {
        let mut project = Project::new("p1")
            .with_cut(
                ScriptCut::new("c1")
                    .with_final_image("media-images-abc")
                    .with_audio("idb://media-audio-abc"),
            )
            .with_asset_definition(
                AssetDefinition::new("hero", AssetKind::Character, "Hero")
                    .with_reference_image("idb://media-images-hero-ref")
                    .with_draft_image("https://cdn.example.com/draft.png"),
            );
        project.master_style.reference_image = Some("idb://media-images-style".into());
        project.thumbnail.image_url = Some("idb://media-images-thumb".into());

        let refs: Vec<String> = project.media_references().into_iter().collect();
        assert_eq!(
            refs,
            vec![
                "media-audio-abc",
                "media-images-abc",
                "media-images-hero-ref",
                "media-images-style",
                "media-images-thumb",
            ]
        );
    }

    #[test]
    fn test_confirm_draft() {
        let mut def = AssetDefinition::new("loc", AssetKind::Location, "Rooftop")
            .with_draft_image("idb://media-images-loc");
        assert!(def.confirm_draft(10));
        assert_eq!(def.master_image.as_deref(), Some("idb://media-images-loc"));
        assert!(def.draft_image.is_none());
        assert_eq!(def.last_updated, 10);
        assert!(!def.confirm_draft(11));
    }

    #[test]
    fn test_json_uses_camel_case_and_skips_save_status() {
        let mut project = Project::new("p1").with_series_name("Night Shift");
        project.save_status = "saving".into();
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["seriesName"], "Night Shift");
        assert!(json.get("saveStatus").is_none());
        assert!(json.get("save_status").is_none());
    }
}
