//! Persona template resource
//!
//! The answer prompt is assembled from a persona template holding the
//! style contract, loaded from TOML so it can be swapped without touching
//! pipeline code. Recognized placeholders: `{conversation_history}`,
//! `{context}`, `{query}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_TEMPLATE: &str = "\
You are a subject-matter expert who has deeply internalized the source \
material provided below.

RULES:
- Answer the question DIRECTLY, without hedging or equivocation.
- Ground every claim in the source material; cite its reasoning, not your own speculation.
- Explain cause and effect explicitly.
- Do not soften or qualify conclusions that the source material states plainly.
- End with practical, concrete advice when the question calls for it.

{conversation_history}

SOURCE MATERIAL:
{context}

QUESTION:
{query}

ANSWER:";

/// Persona/style contract for answer synthesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Prompt template with `{conversation_history}`, `{context}`, `{query}` placeholders
    pub template: String,
    /// Hedging phrases scrubbed from generated answers
    pub forbidden_phrases: Vec<String>,
    /// Returned when retrieval produces no documents
    pub no_context_message: String,
    /// Returned when the generation call fails
    pub failure_message: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            forbidden_phrases: vec![
                "belki de".to_string(),
                "olabilir".to_string(),
                "bazı durumlarda".to_string(),
                "her zaman değil".to_string(),
                "genelleme yapmamak gerek".to_string(),
                "yargılayıcı olmayın".to_string(),
                "herkes farklıdır".to_string(),
            ],
            no_context_message:
                "İlgili bilgi bulunamadı. Lütfen sorunuzu yeniden ifade etmeyi deneyin."
                    .to_string(),
            failure_message: "Cevap oluşturulamadı. Lütfen tekrar deneyin.".to_string(),
        }
    }
}

impl Persona {
    /// Load a persona from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona file: {}", path.display()))?;

        let persona: Persona = toml::from_str(&contents)
            .context("Failed to parse persona file")?;

        Ok(persona)
    }

    /// Render the template into a complete prompt
    pub fn render(&self, conversation_history: &str, context: &str, query: &str) -> String {
        self.template
            .replace("{conversation_history}", conversation_history)
            .replace("{context}", context)
            .replace("{query}", query)
    }

    /// Remove every occurrence of each forbidden phrase, ignoring case
    pub fn scrub(&self, text: &str) -> String {
        let mut result = text.to_string();
        for phrase in &self.forbidden_phrases {
            result = remove_case_insensitive(&result, phrase);
        }
        result
    }
}

/// Remove all case-insensitive occurrences of `needle` from `haystack`.
fn remove_case_insensitive(haystack: &str, needle: &str) -> String {
    if needle.is_empty() {
        return haystack.to_string();
    }

    let needle_lower: Vec<char> = needle.chars().flat_map(|c| c.to_lowercase()).collect();
    let hay_chars: Vec<char> = haystack.chars().collect();

    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;
    while i < hay_chars.len() {
        match match_len_at(&hay_chars[i..], &needle_lower) {
            Some(consumed) => i += consumed,
            None => {
                out.push(hay_chars[i]);
                i += 1;
            }
        }
    }

    out
}

/// If `hay` starts with `needle_lower` (comparing lowercased chars),
/// return how many chars of `hay` the match consumed.
fn match_len_at(hay: &[char], needle_lower: &[char]) -> Option<usize> {
    let mut matched = 0;
    let mut consumed = 0;

    for c in hay {
        for lc in c.to_lowercase() {
            if matched == needle_lower.len() || needle_lower[matched] != lc {
                return None;
            }
            matched += 1;
        }
        consumed += 1;
        if matched == needle_lower.len() {
            return Some(consumed);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_placeholders() {
        let persona = Persona::default();
        let prompt = persona.render("User asked about X before.", "doc one", "What is X?");

        assert!(prompt.contains("User asked about X before."));
        assert!(prompt.contains("doc one"));
        assert!(prompt.contains("What is X?"));
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{query}"));
    }

    #[test]
    fn test_scrub_removes_forbidden_phrases() {
        let persona = Persona::default();
        let raw = "Bu durum olabilir ama belki de önemli değildir.";
        let cleaned = persona.scrub(raw);

        assert!(!cleaned.contains("olabilir"));
        assert!(!cleaned.contains("belki de"));
    }

    #[test]
    fn test_scrub_is_case_insensitive() {
        let persona = Persona {
            forbidden_phrases: vec!["perhaps".to_string()],
            ..Default::default()
        };
        let cleaned = persona.scrub("Perhaps this holds. PERHAPS not.");

        assert!(!cleaned.to_lowercase().contains("perhaps"));
    }

    #[test]
    fn test_scrub_leaves_clean_text_untouched() {
        let persona = Persona::default();
        let raw = "Direct statement with no hedging.";
        assert_eq!(persona.scrub(raw), raw);
    }

    #[test]
    fn test_persona_from_toml() {
        let toml_src = r#"
template = "CTX: {context} Q: {query} H: {conversation_history}"
forbidden_phrases = ["maybe"]
no_context_message = "nothing found"
failure_message = "failed"
"#;
        let persona: Persona = toml::from_str(toml_src).unwrap();
        assert_eq!(persona.forbidden_phrases, vec!["maybe"]);
        assert_eq!(persona.no_context_message, "nothing found");
    }
}
