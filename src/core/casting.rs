/// Character casting — assigns characters to scene roles under trait
/// constraints, maximizing preference score with a seeded random tie-break.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::schema::character::Character;
use crate::schema::scene::SceneRole;

/// Role id → cast character.
pub type Cast = HashMap<String, Character>;

#[derive(Debug, Clone)]
pub struct CharacterCaster {
    rng: StdRng,
}

impl CharacterCaster {
    /// A `seed` of 0 draws the generator from OS entropy.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Whether `character` satisfies the role's hard constraints.
    pub fn is_eligible(role: &SceneRole, character: &Character) -> bool {
        character.has_all_traits(&role.required_traits) && !character.has_any_trait(&role.forbidden_traits)
    }

    /// Sum of the weights of preferred traits the character has.
    pub fn preference_score(role: &SceneRole, character: &Character) -> f32 {
        role.preferred_traits
            .iter()
            .filter(|p| character.has_trait(&p.trait_id))
            .map(|p| p.weight)
            .sum()
    }

    /// Cast every role in order, each from the characters not yet taken.
    /// Returns `None` if any role has no eligible candidate.
    pub fn cast_scene(&mut self, roles: &[SceneRole], available: &[Character]) -> Option<Cast> {
        let mut taken = vec![false; available.len()];
        let mut cast = Cast::with_capacity(roles.len());

        for role in roles {
            let mut best_score = f32::NEG_INFINITY;
            let mut best: Vec<usize> = Vec::new();

            for (idx, character) in available.iter().enumerate() {
                if taken[idx] || !Self::is_eligible(role, character) {
                    continue;
                }
                let score = Self::preference_score(role, character);
                if score > best_score {
                    best_score = score;
                    best.clear();
                    best.push(idx);
                } else if score == best_score {
                    best.push(idx);
                }
            }

            if best.is_empty() {
                tracing::warn!(role = %role.id, "no eligible character for role, casting failed");
                return None;
            }

            let pick = best[self.rng.gen_range(0..best.len())];
            taken[pick] = true;
            let character = &available[pick];
            tracing::debug!(
                role = %role.id,
                character = %character.id,
                score = best_score,
                ties = best.len(),
                "role cast"
            );
            cast.insert(role.id.clone(), character.clone());
        }

        Some(cast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Vec<Character> {
        vec![
            Character::new("margaret", "Margaret").with_traits(&["host", "wealthy", "anxious"]),
            Character::new("james", "James").with_traits(&["guest", "secretive"]),
            Character::new("eleanor", "Eleanor").with_traits(&["guest", "perceptive", "caustic"]),
            Character::new("robert", "Robert").with_traits(&["guest", "diplomatic"]),
        ]
    }

    #[test]
    fn respects_required_and_forbidden() {
        let roles = vec![
            SceneRole::new("host").requires("host"),
            SceneRole::new("accuser").requires("guest").forbids("diplomatic").forbids("secretive"),
        ];
        let cast = CharacterCaster::new(1).cast_scene(&roles, &roster()).unwrap();
        assert_eq!(cast["host"].id, "margaret");
        assert_eq!(cast["accuser"].id, "eleanor");
    }

    #[test]
    fn prefers_highest_weighted_traits() {
        let roles = vec![SceneRole::new("peacemaker")
            .requires("guest")
            .prefers("diplomatic", 3.0)
            .prefers("perceptive", 1.0)];
        let cast = CharacterCaster::new(9).cast_scene(&roles, &roster()).unwrap();
        assert_eq!(cast["peacemaker"].id, "robert");
    }

    #[test]
    fn characters_are_not_cast_twice() {
        let roles = vec![
            SceneRole::new("first").requires("guest"),
            SceneRole::new("second").requires("guest"),
            SceneRole::new("third").requires("guest"),
        ];
        let cast = CharacterCaster::new(3).cast_scene(&roles, &roster()).unwrap();
        let mut ids: Vec<&str> = cast.values().map(|c| c.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn fails_without_partial_cast() {
        let roles = vec![
            SceneRole::new("host").requires("host"),
            SceneRole::new("knight").requires("brave"),
        ];
        assert!(CharacterCaster::new(1).cast_scene(&roles, &roster()).is_none());
    }

    #[test]
    fn exhausted_pool_fails() {
        let roles = vec![
            SceneRole::new("a").requires("host"),
            SceneRole::new("b").requires("host"),
        ];
        assert!(CharacterCaster::new(1).cast_scene(&roles, &roster()).is_none());
    }

    #[test]
    fn same_seed_same_cast() {
        let roles = vec![
            SceneRole::new("a").requires("guest"),
            SceneRole::new("b").requires("guest"),
        ];
        let run = |seed| {
            let mut caster = CharacterCaster::new(seed);
            (0..10)
                .map(|_| {
                    let cast = caster.cast_scene(&roles, &roster()).unwrap();
                    (cast["a"].id.clone(), cast["b"].id.clone())
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(77), run(77));
    }

    #[test]
    fn ties_are_broken_randomly() {
        let roles = vec![SceneRole::new("guest").requires("guest")];
        let mut caster = CharacterCaster::new(5);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..60 {
            let cast = caster.cast_scene(&roles, &roster()).unwrap();
            seen.insert(cast["guest"].id.clone());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn empty_role_list_is_an_empty_cast() {
        let cast = CharacterCaster::new(1).cast_scene(&[], &roster()).unwrap();
        assert!(cast.is_empty());
    }
}
