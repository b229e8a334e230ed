use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Explicit pronoun forms for characters that don't fit a preset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PronounSet {
    pub subject: String,
    pub object: String,
    pub possessive: String,
    pub reflexive: String,
    #[serde(default)]
    pub possessive_standalone: Option<String>,
}

/// Pronoun set for a character, used by the text assembler to resolve
/// `{speaker.pronoun.subject}` and friends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pronouns {
    /// she/her/her/hers/herself
    SheHer,
    /// he/him/his/his/himself
    HeHim,
    /// they/them/their/theirs/themselves
    TheyThem,
    /// it/its/its/its/itself
    ItIts,
    Custom(PronounSet),
}

impl Default for Pronouns {
    fn default() -> Self {
        Self::TheyThem
    }
}

impl Pronouns {
    /// Nominative/subject form: "she", "he", "they", "it".
    pub fn subject(&self) -> &str {
        match self {
            Self::SheHer => "she",
            Self::HeHim => "he",
            Self::TheyThem => "they",
            Self::ItIts => "it",
            Self::Custom(set) => &set.subject,
        }
    }

    /// Accusative/object form: "her", "him", "them", "it".
    pub fn object(&self) -> &str {
        match self {
            Self::SheHer => "her",
            Self::HeHim => "him",
            Self::TheyThem => "them",
            Self::ItIts => "it",
            Self::Custom(set) => &set.object,
        }
    }

    /// Possessive determiner: "her", "his", "their", "its".
    pub fn possessive(&self) -> &str {
        match self {
            Self::SheHer => "her",
            Self::HeHim => "his",
            Self::TheyThem => "their",
            Self::ItIts => "its",
            Self::Custom(set) => &set.possessive,
        }
    }

    /// Possessive standalone: "hers", "his", "theirs", "its".
    ///
    /// Custom sets without an explicit standalone form reuse the determiner.
    pub fn possessive_standalone(&self) -> &str {
        match self {
            Self::SheHer => "hers",
            Self::HeHim => "his",
            Self::TheyThem => "theirs",
            Self::ItIts => "its",
            Self::Custom(set) => set
                .possessive_standalone
                .as_deref()
                .unwrap_or(&set.possessive),
        }
    }

    /// Reflexive: "herself", "himself", "themselves", "itself".
    pub fn reflexive(&self) -> &str {
        match self {
            Self::SheHer => "herself",
            Self::HeHim => "himself",
            Self::TheyThem => "themselves",
            Self::ItIts => "itself",
            Self::Custom(set) => &set.reflexive,
        }
    }
}

/// Descriptive metadata for a trait id. The engine itself only ever
/// checks trait presence; these exist so content can be linted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitDef {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// A character that can be cast into scene roles and speak lines.
///
/// Characters are immutable for the duration of a scene; the content
/// library owns them and the engine works on clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub pronouns: Pronouns,
    #[serde(default)]
    pub traits: FxHashSet<String>,
}

impl Character {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            pronouns: Pronouns::default(),
            traits: FxHashSet::default(),
        }
    }

    pub fn with_pronouns(mut self, pronouns: Pronouns) -> Self {
        self.pronouns = pronouns;
        self
    }

    pub fn with_traits(mut self, traits: &[&str]) -> Self {
        self.traits.extend(traits.iter().map(|t| t.to_string()));
        self
    }

    /// Returns true if this character has the given trait.
    pub fn has_trait(&self, trait_id: &str) -> bool {
        self.traits.contains(trait_id)
    }

    /// Returns true if this character has ALL of the given traits.
    pub fn has_all_traits<S: AsRef<str>>(&self, traits: &[S]) -> bool {
        traits.iter().all(|t| self.traits.contains(t.as_ref()))
    }

    /// Returns true if this character has ANY of the given traits.
    pub fn has_any_trait<S: AsRef<str>>(&self, traits: &[S]) -> bool {
        traits.iter().any(|t| self.traits.contains(t.as_ref()))
    }
}
