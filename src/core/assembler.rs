/// Text assembler — renders a fragment's template into surface text.
///
/// Placeholders:
/// - `{speaker.name}` / `{target.name}`
/// - `{speaker.pronoun.subject}` (also `object`, `possessive`,
///   `possessive_standalone`, `reflexive`; same for `target`). Writing the
///   form capitalised, e.g. `{speaker.pronoun.Subject}`, capitalises the
///   output.
/// - `{var:key}` for values set with [`TextAssembler::set_variable`]
///
/// Anything else inside braces is left exactly as written.

use std::collections::HashMap;

use crate::schema::character::Character;

/// A segment of a scanned template.
#[derive(Debug, Clone, PartialEq)]
enum Segment<'t> {
    Literal(&'t str),
    /// Text between braces (exclusive) plus the full `{...}` source.
    Placeholder { body: &'t str, raw: &'t str },
}

/// Split a template into literal runs and `{...}` placeholders. An unclosed
/// or nested brace is kept as literal text.
fn scan(template: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;
    let bytes = template.as_bytes();

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        // Look for the closing brace; another '{' first means this one is literal.
        let close = template[i + 1..]
            .find(&['{', '}'][..])
            .map(|offset| i + 1 + offset)
            .filter(|&j| bytes[j] == b'}');
        match close {
            Some(j) => {
                if literal_start < i {
                    segments.push(Segment::Literal(&template[literal_start..i]));
                }
                segments.push(Segment::Placeholder {
                    body: &template[i + 1..j],
                    raw: &template[i..=j],
                });
                i = j + 1;
                literal_start = i;
            }
            None => i += 1,
        }
    }
    if literal_start < template.len() {
        segments.push(Segment::Literal(&template[literal_start..]));
    }
    segments
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve `name` or `pronoun.<form>` for one character.
fn character_field(character: &Character, field: &str) -> Option<String> {
    if field == "name" {
        return Some(character.display_name.clone());
    }
    let form = field.strip_prefix("pronoun.")?;
    let title_case = form.chars().next().is_some_and(char::is_uppercase);
    let pronouns = &character.pronouns;
    let word = match form.to_ascii_lowercase().as_str() {
        "subject" => pronouns.subject(),
        "object" => pronouns.object(),
        "possessive" => pronouns.possessive(),
        "possessive_standalone" => pronouns.possessive_standalone(),
        "reflexive" => pronouns.reflexive(),
        _ => return None,
    };
    Some(if title_case {
        capitalize(word)
    } else {
        word.to_string()
    })
}

#[derive(Debug, Clone, Default)]
pub struct TextAssembler {
    variables: HashMap<String, String>,
}

impl TextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn clear_variable(&mut self, key: &str) {
        self.variables.remove(key);
    }

    pub fn clear_all_variables(&mut self) {
        self.variables.clear();
    }

    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Render `template`. Each placeholder is resolved once against the
    /// original template; substituted text is never scanned again.
    pub fn assemble(&self, template: &str, speaker: &Character, target: Option<&Character>) -> String {
        let mut out = String::with_capacity(template.len() + 32);
        for segment in scan(template) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { body, raw } => match self.resolve(body, speaker, target) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(raw),
                },
            }
        }
        out
    }

    fn resolve(&self, body: &str, speaker: &Character, target: Option<&Character>) -> Option<String> {
        if let Some(field) = body.strip_prefix("speaker.") {
            return character_field(speaker, field);
        }
        if let Some(field) = body.strip_prefix("target.") {
            return target.and_then(|t| character_field(t, field));
        }
        if let Some(key) = body.strip_prefix("var:") {
            return self.variables.get(key).cloned();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::character::Pronouns;

    fn cast() -> (Character, Character) {
        (
            Character::new("m", "Margaret").with_pronouns(Pronouns::SheHer),
            Character::new("j", "James").with_pronouns(Pronouns::HeHim),
        )
    }

    #[test]
    fn names_substitute_verbatim() {
        let (a, b) = cast();
        let text = TextAssembler::new().assemble("{speaker.name} says hi to {target.name}", &a, Some(&b));
        assert_eq!(text, "Margaret says hi to James");
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let (a, b) = cast();
        let text = TextAssembler::new().assemble("Hm {unknown.token} and {speaker.height}.", &a, Some(&b));
        assert_eq!(text, "Hm {unknown.token} and {speaker.height}.");
    }

    #[test]
    fn pronouns_lower_and_title_case() {
        let (a, b) = cast();
        let text = TextAssembler::new().assemble(
            "{speaker.pronoun.Subject} handed {target.pronoun.object} {speaker.pronoun.possessive} glass. {target.pronoun.Subject} helped {target.pronoun.reflexive}.",
            &a,
            Some(&b),
        );
        assert_eq!(text, "She handed him her glass. He helped himself.");
    }

    #[test]
    fn target_placeholders_kept_without_target() {
        let (a, _) = cast();
        let text = TextAssembler::new().assemble("{speaker.name} mutters at {target.name}.", &a, None);
        assert_eq!(text, "Margaret mutters at {target.name}.");
    }

    #[test]
    fn custom_variables() {
        let (a, _) = cast();
        let mut asm = TextAssembler::new();
        asm.set_variable("dish", "the soufflé");
        asm.set_variable("unused", "x");
        assert_eq!(asm.assemble("Try {var:dish}, {var:wine}.", &a, None), "Try the soufflé, {var:wine}.");

        asm.clear_variable("dish");
        assert_eq!(asm.assemble("{var:dish}", &a, None), "{var:dish}");
        asm.clear_all_variables();
        assert_eq!(asm.variable("unused"), None);
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let a = Character::new("x", "{target.name}");
        let b = Character::new("y", "Bob");
        let mut asm = TextAssembler::new();
        asm.set_variable("trick", "{speaker.name}");
        let text = asm.assemble("{speaker.name} / {var:trick}", &a, Some(&b));
        assert_eq!(text, "{target.name} / {speaker.name}");
    }

    #[test]
    fn stray_braces_are_literal() {
        let (a, _) = cast();
        let asm = TextAssembler::new();
        assert_eq!(asm.assemble("a { b", &a, None), "a { b");
        assert_eq!(asm.assemble("a } b", &a, None), "a } b");
        assert_eq!(asm.assemble("{{speaker.name}}", &a, None), "{Margaret}");
        assert_eq!(asm.assemble("{}", &a, None), "{}");
    }

    #[test]
    fn non_ascii_text_survives() {
        let (a, _) = cast();
        let text = TextAssembler::new().assemble("¡Hola, {speaker.name}! — ça va?", &a, None);
        assert_eq!(text, "¡Hola, Margaret! — ça va?");
    }
}
