/// Content library — characters, trait definitions, variation sets and
/// scene templates, loaded from RON content packs.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

use crate::schema::character::{Character, TraitDef};
use crate::schema::fragment::{DialogueFragment, VariationSet};
use crate::schema::scene::{SceneBeat, SceneRole, SceneTemplate};

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("scene '{scene}' declares beat '{beat}' more than once")]
    DuplicateBeat { scene: String, beat: String },
    #[error("variation set '{set}' declares fragment '{fragment}' more than once")]
    DuplicateFragment { set: String, fragment: String },
    #[error("scene '{scene}' stores beat '{beat}' under key '{key}'")]
    BeatIdMismatch { scene: String, key: String, beat: String },
}

/// Read access to authored content. The engine only ever asks for content
/// by id, so any store that can answer these lookups can back it.
pub trait ContentLibrary: Send + Sync {
    fn character(&self, id: &str) -> Option<&Character>;

    fn characters(&self) -> &[Character];

    fn trait_defs(&self) -> &[TraitDef];

    fn variation_set(&self, id: &str) -> Option<&[DialogueFragment]>;

    fn fragment(&self, id: &str) -> Option<&DialogueFragment>;

    fn scene_template(&self, id: &str) -> Option<&SceneTemplate>;
}

// The RON file lists beats in authoring order; templates key them by id.

#[derive(Debug, Deserialize)]
struct RonScene {
    id: String,
    starting_beat: String,
    #[serde(default)]
    roles: Vec<SceneRole>,
    #[serde(default)]
    beats: Vec<SceneBeat>,
}

#[derive(Debug, Default, Deserialize)]
struct RonPack {
    #[serde(default)]
    traits: Vec<TraitDef>,
    #[serde(default)]
    characters: Vec<Character>,
    #[serde(default)]
    variation_sets: Vec<VariationSet>,
    #[serde(default)]
    scenes: Vec<RonScene>,
}

impl RonScene {
    fn into_template(self) -> Result<SceneTemplate, ContentError> {
        let mut beats = HashMap::with_capacity(self.beats.len());
        for beat in self.beats {
            if beats.contains_key(&beat.id) {
                return Err(ContentError::DuplicateBeat {
                    scene: self.id,
                    beat: beat.id,
                });
            }
            beats.insert(beat.id.clone(), beat);
        }
        Ok(SceneTemplate {
            id: self.id,
            starting_beat: self.starting_beat,
            roles: self.roles,
            beats,
        })
    }
}

/// An in-memory content library. Later additions replace earlier entries
/// with the same id.
#[derive(Debug, Clone, Default)]
pub struct ContentPack {
    traits: Vec<TraitDef>,
    characters: Vec<Character>,
    variation_sets: HashMap<String, VariationSet>,
    scenes: HashMap<String, SceneTemplate>,
}

impl ContentPack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a content pack from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<ContentPack, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a content pack from a RON string.
    pub fn parse_ron(input: &str) -> Result<ContentPack, ContentError> {
        let raw: RonPack = ron::from_str(input)?;
        let mut pack = ContentPack::new();
        for def in raw.traits {
            pack.add_trait(def);
        }
        for character in raw.characters {
            pack.add_character(character);
        }
        for set in raw.variation_sets {
            pack.add_variation_set(set)?;
        }
        for scene in raw.scenes {
            pack.add_scene(scene.into_template()?)?;
        }
        Ok(pack)
    }

    /// Load and merge every `.ron` file in `dir`, in file-name order.
    pub fn load_dir(dir: &Path) -> Result<ContentPack, ContentError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut pack = ContentPack::new();
        for path in paths {
            tracing::debug!(path = %path.display(), "loading content file");
            pack.merge(Self::load_from_ron(&path)?);
        }
        Ok(pack)
    }

    /// Merge another pack into this one. Entries from `other` override
    /// entries in `self` with the same id.
    pub fn merge(&mut self, other: ContentPack) {
        for def in other.traits {
            self.add_trait(def);
        }
        for character in other.characters {
            self.add_character(character);
        }
        self.variation_sets.extend(other.variation_sets);
        self.scenes.extend(other.scenes);
    }

    pub fn add_trait(&mut self, def: TraitDef) {
        match self.traits.iter_mut().find(|t| t.id == def.id) {
            Some(existing) => *existing = def,
            None => self.traits.push(def),
        }
    }

    pub fn add_character(&mut self, character: Character) {
        match self.characters.iter_mut().find(|c| c.id == character.id) {
            Some(existing) => *existing = character,
            None => self.characters.push(character),
        }
    }

    /// Add a variation set. Fragment ids must be unique within the set.
    pub fn add_variation_set(&mut self, set: VariationSet) -> Result<(), ContentError> {
        let mut seen = HashSet::new();
        if let Some(dup) = set.fragments.iter().find(|f| !seen.insert(f.id.as_str())) {
            return Err(ContentError::DuplicateFragment {
                set: set.id.clone(),
                fragment: dup.id.clone(),
            });
        }
        self.variation_sets.insert(set.id.clone(), set);
        Ok(())
    }

    /// Add a scene template. Every beat must be stored under its own id.
    pub fn add_scene(&mut self, template: SceneTemplate) -> Result<(), ContentError> {
        if let Some((key, beat)) = template.beats.iter().find(|(key, beat)| **key != beat.id) {
            return Err(ContentError::BeatIdMismatch {
                scene: template.id.clone(),
                key: key.clone(),
                beat: beat.id.clone(),
            });
        }
        self.scenes.insert(template.id.clone(), template);
        Ok(())
    }

    /// Scene template ids, sorted.
    pub fn scene_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.scenes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn variation_set_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.variation_sets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl ContentLibrary for ContentPack {
    fn character(&self, id: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    fn characters(&self) -> &[Character] {
        &self.characters
    }

    fn trait_defs(&self) -> &[TraitDef] {
        &self.traits
    }

    fn variation_set(&self, id: &str) -> Option<&[DialogueFragment]> {
        self.variation_sets.get(id).map(|set| set.fragments.as_slice())
    }

    fn fragment(&self, id: &str) -> Option<&DialogueFragment> {
        self.variation_sets
            .values()
            .flat_map(|set| set.fragments.iter())
            .find(|f| f.id == id)
    }

    fn scene_template(&self, id: &str) -> Option<&SceneTemplate> {
        self.scenes.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::character::Pronouns;

    const PACK: &str = r#"(
        traits: [
            (id: "brave", display_name: "Brave"),
            (id: "coward", display_name: "Cowardly", category: Some("temperament")),
        ],
        characters: [
            (id: "kay", display_name: "Kay", pronouns: HeHim, traits: ["brave"]),
            (id: "mordred", display_name: "Mordred", traits: ["coward"]),
        ],
        variation_sets: [
            (id: "boasts", fragments: [
                (id: "boast_1", text: "I fear nothing.", required_traits: ["brave"]),
                (id: "boast_2", text: "Who goes there?"),
            ]),
        ],
        scenes: [
            (
                id: "gate",
                starting_beat: "hail",
                roles: [(id: "guard")],
                beats: [
                    (id: "hail", speaker_role: "guard", variation_set: "boasts",
                     branches: [(target_beat: "done")]),
                    (id: "done", speaker_role: "guard", variation_set: "boasts", is_end_beat: true),
                ],
            ),
        ],
    )"#;

    #[test]
    fn parses_pack() {
        let pack = ContentPack::parse_ron(PACK).unwrap();
        assert_eq!(pack.trait_defs().len(), 2);
        assert_eq!(pack.character("kay").unwrap().pronouns, Pronouns::HeHim);
        assert_eq!(pack.character("mordred").unwrap().pronouns, Pronouns::TheyThem);
        assert_eq!(pack.variation_set("boasts").unwrap().len(), 2);
        assert_eq!(pack.fragment("boast_2").unwrap().text, "Who goes there?");
        let scene = pack.scene_template("gate").unwrap();
        assert_eq!(scene.beats.len(), 2);
        assert!(scene.beat("done").unwrap().is_end_beat);
        assert_eq!(pack.scene_ids(), vec!["gate"]);
    }

    #[test]
    fn duplicate_beats_rejected() {
        let input = r#"(scenes: [(id: "s", starting_beat: "a", beats: [
            (id: "a", speaker_role: "r", variation_set: "v"),
            (id: "a", speaker_role: "r", variation_set: "v"),
        ])])"#;
        match ContentPack::parse_ron(input) {
            Err(ContentError::DuplicateBeat { scene, beat }) => {
                assert_eq!(scene, "s");
                assert_eq!(beat, "a");
            }
            other => panic!("expected duplicate beat error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_fragments_rejected() {
        let input = r#"(variation_sets: [(id: "greetings", fragments: [
            (id: "hi", text: "Hi."),
            (id: "hi", text: "Hello."),
        ])])"#;
        match ContentPack::parse_ron(input) {
            Err(ContentError::DuplicateFragment { set, fragment }) => {
                assert_eq!(set, "greetings");
                assert_eq!(fragment, "hi");
            }
            other => panic!("expected duplicate fragment error, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_beat_key_rejected() {
        let mut template = SceneTemplate::new("s", "a");
        template.beats.insert("a".to_string(), SceneBeat::new("b", "r", "v"));
        let err = ContentPack::new().add_scene(template).unwrap_err();
        assert!(matches!(err, ContentError::BeatIdMismatch { .. }));
    }

    #[test]
    fn malformed_ron_is_an_error() {
        assert!(matches!(ContentPack::parse_ron("(characters: ["), Err(ContentError::Ron(_))));
    }

    #[test]
    fn merge_overrides_by_id() {
        let mut base = ContentPack::parse_ron(PACK).unwrap();
        let patch = ContentPack::parse_ron(
            r#"(
                characters: [(id: "kay", display_name: "Sir Kay", traits: ["brave", "loyal"])],
                variation_sets: [(id: "boasts", fragments: [(id: "boast_3", text: "Stand aside.")])],
            )"#,
        )
        .unwrap();
        base.merge(patch);
        assert_eq!(base.characters().len(), 2);
        assert_eq!(base.character("kay").unwrap().display_name, "Sir Kay");
        assert_eq!(base.variation_set("boasts").unwrap().len(), 1);
        assert!(base.scene_template("gate").is_some());
    }

    #[test]
    fn unknown_ids_are_none() {
        let pack = ContentPack::parse_ron(PACK).unwrap();
        assert!(pack.character("arthur").is_none());
        assert!(pack.variation_set("laments").is_none());
        assert!(pack.fragment("nope").is_none());
        assert!(pack.scene_template("joust").is_none());
    }
}
