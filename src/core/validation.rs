/// Authoring-time checks for scene templates against a content library.
///
/// Errors describe templates that cannot run as written; warnings describe
/// templates that run but probably not the way the author meant.

use std::collections::{HashSet, VecDeque};

use crate::core::library::ContentLibrary;
use crate::schema::scene::{SceneBeat, SceneTemplate};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Beats in id order so reports are stable.
fn sorted_beats(template: &SceneTemplate) -> Vec<(&String, &SceneBeat)> {
    let mut beats: Vec<(&String, &SceneBeat)> = template.beats.iter().collect();
    beats.sort_by(|a, b| a.0.cmp(b.0));
    beats
}

/// Beats reachable from the starting beat by following branches.
fn reachable_beats(template: &SceneTemplate) -> HashSet<&str> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([template.starting_beat.as_str()]);
    while let Some(id) = queue.pop_front() {
        let Some(beat) = template.beat(id) else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        for branch in &beat.branches {
            queue.push_back(branch.target_beat.as_str());
        }
    }
    seen
}

pub fn validate_template(template: &SceneTemplate, library: &dyn ContentLibrary) -> ValidationReport {
    let mut report = ValidationReport::default();
    let scene = &template.id;

    if template.starting_beat.is_empty() {
        report.error(format!("scene '{scene}': no starting beat"));
    } else if template.beat(&template.starting_beat).is_none() {
        report.error(format!(
            "scene '{scene}': starting beat '{}' does not exist",
            template.starting_beat
        ));
    }

    let role_ids: HashSet<&str> = template.roles.iter().map(|r| r.id.as_str()).collect();

    let mut checked_sets: HashSet<&str> = HashSet::new();

    for (key, beat) in sorted_beats(template) {
        let id = &beat.id;
        if *key != beat.id {
            report.error(format!("scene '{scene}': beat '{id}' is stored under key '{key}'"));
        }

        if !role_ids.contains(beat.speaker_role.as_str()) {
            report.error(format!(
                "scene '{scene}': beat '{id}' speaker role '{}' is not declared",
                beat.speaker_role
            ));
        }
        if let Some(target) = &beat.target_role {
            if !role_ids.contains(target.as_str()) {
                report.error(format!("scene '{scene}': beat '{id}' target role '{target}' is not declared"));
            }
        }

        match library.variation_set(&beat.variation_set) {
            None => report.error(format!(
                "scene '{scene}': beat '{id}' uses unknown variation set '{}'",
                beat.variation_set
            )),
            Some(fragments) if checked_sets.insert(beat.variation_set.as_str()) => {
                let mut seen = HashSet::new();
                for fragment in fragments {
                    if !seen.insert(fragment.id.as_str()) {
                        report.error(format!(
                            "scene '{scene}': variation set '{}' repeats fragment id '{}'",
                            beat.variation_set, fragment.id
                        ));
                    }
                }
            }
            Some(_) => {}
        }

        for branch in &beat.branches {
            if template.beat(&branch.target_beat).is_none() {
                report.error(format!(
                    "scene '{scene}': beat '{id}' branches to unknown beat '{}'",
                    branch.target_beat
                ));
            }
            for condition in &branch.conditions {
                for role in condition.roles() {
                    if !role_ids.contains(role) {
                        report.warn(format!(
                            "scene '{scene}': beat '{id}' condition names undeclared role '{role}' and can never hold"
                        ));
                    }
                }
            }
        }

        if let Some(next) = &beat.default_next_beat {
            if template.beat(next).is_none() {
                report.error(format!("scene '{scene}': beat '{id}' default next beat '{next}' does not exist"));
            }
        }

        if beat.is_end_beat && !beat.branches.is_empty() {
            report.warn(format!(
                "scene '{scene}': end beat '{id}' has branches; the scene will continue past it"
            ));
        }
        if !beat.is_end_beat && beat.branches.is_empty() {
            report.warn(format!(
                "scene '{scene}': beat '{id}' has no branches and is not marked as an end beat; the scene ends here"
            ));
        }

        let has_fallback = beat.branches.iter().any(|b| b.is_unconditional());
        if beat.default_next_beat.is_some() && !beat.branches.is_empty() && !has_fallback {
            report.warn(format!(
                "scene '{scene}': beat '{id}' sets a default next beat, but advancement only follows branches; \
                 add an unconditional branch as the fallback"
            ));
        }

        if let Some(pos) = beat.branches.iter().position(|b| b.is_unconditional()) {
            if pos + 1 < beat.branches.len() {
                report.warn(format!(
                    "scene '{scene}': beat '{id}' has an unconditional branch before {} other branch(es), which can never be taken",
                    beat.branches.len() - pos - 1
                ));
            }
        }
    }

    if template.beat(&template.starting_beat).is_some() {
        let reachable = reachable_beats(template);
        for (_, beat) in sorted_beats(template) {
            if !reachable.contains(beat.id.as_str()) {
                report.warn(format!("scene '{scene}': beat '{}' is unreachable", beat.id));
            }
        }
    }

    check_trait_ids(template, library, &mut report);
    report
}

/// Trait ids are only checked when the library declares any.
fn check_trait_ids(template: &SceneTemplate, library: &dyn ContentLibrary, report: &mut ValidationReport) {
    let defs = library.trait_defs();
    if defs.is_empty() {
        return;
    }
    let known: HashSet<&str> = defs.iter().map(|d| d.id.as_str()).collect();
    let scene = &template.id;

    for role in &template.roles {
        let named = role
            .required_traits
            .iter()
            .chain(&role.forbidden_traits)
            .chain(role.preferred_traits.iter().map(|p| &p.trait_id));
        for trait_id in named {
            if !known.contains(trait_id.as_str()) {
                report.warn(format!(
                    "scene '{scene}': role '{}' references undeclared trait '{trait_id}'",
                    role.id
                ));
            }
        }
    }

    let mut sets: Vec<&str> = template.beats.values().map(|b| b.variation_set.as_str()).collect();
    sets.sort_unstable();
    sets.dedup();
    for set in sets {
        let Some(fragments) = library.variation_set(set) else {
            continue;
        };
        for fragment in fragments {
            let mut named: Vec<&String> = fragment
                .required_traits
                .iter()
                .chain(&fragment.forbidden_traits)
                .chain(fragment.trait_affinities.keys())
                .collect();
            named.sort();
            for trait_id in named {
                if !known.contains(trait_id.as_str()) {
                    report.warn(format!(
                        "variation set '{set}': fragment '{}' references undeclared trait '{trait_id}'",
                        fragment.id
                    ));
                }
            }
        }
    }
}
