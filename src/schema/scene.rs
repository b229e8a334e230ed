use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comparison operator for numeric scene-context conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
}

impl Comparison {
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Less => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Equal => (lhs - rhs).abs() < f64::EPSILON,
            Self::NotEqual => (lhs - rhs).abs() >= f64::EPSILON,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::Greater => lhs > rhs,
        }
    }
}

/// A single predicate guarding a beat branch. Roles are resolved against
/// the current cast; a role missing from the cast makes the condition false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BranchCondition {
    RelationshipAtLeast {
        from_role: String,
        to_role: String,
        relationship_type: String,
        threshold: f32,
    },
    RelationshipBelow {
        from_role: String,
        to_role: String,
        relationship_type: String,
        threshold: f32,
    },
    RoleHasTrait {
        role: String,
        trait_id: String,
    },
    RoleLacksTrait {
        role: String,
        trait_id: String,
    },
    ContextFlag {
        key: String,
        expected: bool,
    },
    ContextCompare {
        key: String,
        comparison: Comparison,
        value: f64,
    },
    BeatVisited {
        beat_id: String,
    },
    BeatNotVisited {
        beat_id: String,
    },
}

impl BranchCondition {
    /// Role ids this condition refers to.
    pub fn roles(&self) -> Vec<&str> {
        match self {
            Self::RelationshipAtLeast { from_role, to_role, .. }
            | Self::RelationshipBelow { from_role, to_role, .. } => {
                vec![from_role.as_str(), to_role.as_str()]
            }
            Self::RoleHasTrait { role, .. } | Self::RoleLacksTrait { role, .. } => {
                vec![role.as_str()]
            }
            _ => Vec::new(),
        }
    }
}

/// A conditional edge to another beat. All conditions must hold; an empty
/// list makes the branch unconditional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatBranch {
    pub target_beat: String,
    #[serde(default)]
    pub conditions: Vec<BranchCondition>,
}

impl BeatBranch {
    pub fn unconditional(target_beat: impl Into<String>) -> Self {
        Self {
            target_beat: target_beat.into(),
            conditions: Vec::new(),
        }
    }

    pub fn when(target_beat: impl Into<String>, conditions: Vec<BranchCondition>) -> Self {
        Self {
            target_beat: target_beat.into(),
            conditions,
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// One node in a scene's beat graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneBeat {
    pub id: String,
    pub speaker_role: String,
    #[serde(default)]
    pub target_role: Option<String>,
    pub variation_set: String,
    #[serde(default)]
    pub branches: Vec<BeatBranch>,
    /// Authoring aid only; advancement is driven by `branches`.
    #[serde(default)]
    pub default_next_beat: Option<String>,
    #[serde(default)]
    pub is_end_beat: bool,
}

impl SceneBeat {
    pub fn new(id: impl Into<String>, speaker_role: impl Into<String>, variation_set: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            speaker_role: speaker_role.into(),
            target_role: None,
            variation_set: variation_set.into(),
            branches: Vec::new(),
            default_next_beat: None,
            is_end_beat: false,
        }
    }

    pub fn targeting(mut self, role: impl Into<String>) -> Self {
        self.target_role = Some(role.into());
        self
    }

    pub fn branch(mut self, branch: BeatBranch) -> Self {
        self.branches.push(branch);
        self
    }

    pub fn end(mut self) -> Self {
        self.is_end_beat = true;
        self
    }
}

/// A trait a role would like its actor to have, with a casting weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferredTrait {
    pub trait_id: String,
    pub weight: f32,
}

/// A slot in a scene template filled by a character at cast time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRole {
    pub id: String,
    #[serde(default)]
    pub required_traits: Vec<String>,
    #[serde(default)]
    pub forbidden_traits: Vec<String>,
    #[serde(default)]
    pub preferred_traits: Vec<PreferredTrait>,
}

impl SceneRole {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required_traits: Vec::new(),
            forbidden_traits: Vec::new(),
            preferred_traits: Vec::new(),
        }
    }

    pub fn requires(mut self, trait_id: &str) -> Self {
        self.required_traits.push(trait_id.to_string());
        self
    }

    pub fn forbids(mut self, trait_id: &str) -> Self {
        self.forbidden_traits.push(trait_id.to_string());
        self
    }

    pub fn prefers(mut self, trait_id: &str, weight: f32) -> Self {
        self.preferred_traits.push(PreferredTrait {
            trait_id: trait_id.to_string(),
            weight,
        });
        self
    }
}

/// A branching scene: roles to cast and a graph of beats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneTemplate {
    pub id: String,
    pub starting_beat: String,
    #[serde(default)]
    pub roles: Vec<SceneRole>,
    #[serde(default)]
    pub beats: HashMap<String, SceneBeat>,
}

impl SceneTemplate {
    pub fn new(id: impl Into<String>, starting_beat: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            starting_beat: starting_beat.into(),
            roles: Vec::new(),
            beats: HashMap::new(),
        }
    }

    pub fn with_role(mut self, role: SceneRole) -> Self {
        self.roles.push(role);
        self
    }

    /// Adds a beat keyed by its own id, replacing any beat with the same id.
    pub fn with_beat(mut self, beat: SceneBeat) -> Self {
        self.beats.insert(beat.id.clone(), beat);
        self
    }

    pub fn beat(&self, id: &str) -> Option<&SceneBeat> {
        self.beats.get(id)
    }

    pub fn role(&self, id: &str) -> Option<&SceneRole> {
        self.roles.iter().find(|r| r.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparisons() {
        assert!(Comparison::Less.holds(1.0, 2.0));
        assert!(Comparison::GreaterOrEqual.holds(2.0, 2.0));
        assert!(Comparison::Equal.holds(3.0, 3.0));
        assert!(Comparison::NotEqual.holds(3.0, 3.5));
        assert!(!Comparison::Greater.holds(2.0, 2.0));
    }

    #[test]
    fn condition_roles() {
        let c = BranchCondition::RelationshipAtLeast {
            from_role: "host".to_string(),
            to_role: "guest".to_string(),
            relationship_type: "trust".to_string(),
            threshold: 60.0,
        };
        assert_eq!(c.roles(), vec!["host", "guest"]);
        let flag = BranchCondition::ContextFlag {
            key: "x".to_string(),
            expected: true,
        };
        assert!(flag.roles().is_empty());
    }

    #[test]
    fn template_builder() {
        let t = SceneTemplate::new("dinner", "a")
            .with_role(SceneRole::new("host").prefers("wealthy", 2.0))
            .with_beat(SceneBeat::new("a", "host", "greetings").branch(BeatBranch::unconditional("b")))
            .with_beat(SceneBeat::new("b", "host", "farewells").end());
        assert!(t.beat("a").is_some());
        assert!(t.beat("b").unwrap().is_end_beat);
        assert!(t.role("host").is_some());
        assert!(t.beat("a").unwrap().branches[0].is_unconditional());
    }

    #[test]
    fn template_from_ron() {
        let t: SceneTemplate = ron::from_str(
            r#"(
                id: "duel",
                starting_beat: "challenge",
                roles: [(id: "challenger", required_traits: ["brave"])],
                beats: {
                    "challenge": (
                        id: "challenge",
                        speaker_role: "challenger",
                        variation_set: "challenges",
                        branches: [
                            (target_beat: "accept", conditions: [ContextFlag(key: "insulted", expected: true)]),
                            (target_beat: "walk_away"),
                        ],
                    ),
                },
            )"#,
        )
        .unwrap();
        let beat = t.beat("challenge").unwrap();
        assert_eq!(beat.branches.len(), 2);
        assert!(beat.branches[1].is_unconditional());
        assert_eq!(t.roles[0].required_traits, vec!["brave".to_string()]);
    }
}
