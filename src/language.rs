//! Central language-name to code lookup.
//!
//! Every component that needs a language code or a display name goes through
//! [`LanguageRegistry`]; there is no other table in the crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LingomuxError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

const DEFAULT_LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "fr", name: "French" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "es", name: "Spanish" },
    Language { code: "de", name: "German" },
    Language { code: "it", name: "Italian" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "nl", name: "Dutch" },
    Language { code: "ru", name: "Russian" },
    Language { code: "pl", name: "Polish" },
    Language { code: "tr", name: "Turkish" },
    Language { code: "sv", name: "Swedish" },
    Language { code: "da", name: "Danish" },
    Language { code: "no", name: "Norwegian" },
    Language { code: "fi", name: "Finnish" },
    Language { code: "cs", name: "Czech" },
    Language { code: "uk", name: "Ukrainian" },
    Language { code: "el", name: "Greek" },
    Language { code: "he", name: "Hebrew" },
    Language { code: "hi", name: "Hindi" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "vi", name: "Vietnamese" },
    Language { code: "th", name: "Thai" },
    Language { code: "id", name: "Indonesian" },
];

/// Ordered translation direction, always expressed in codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new<S: Into<String>, T: Into<String>>(source: S, target: T) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Language>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_vec(),
        }
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    /// Look a language up by name or code, ignoring case and surrounding whitespace
    pub fn resolve(&self, input: &str) -> Option<&Language> {
        let key = input.trim();
        if key.is_empty() {
            return None;
        }
        self.languages
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(key) || lang.name.eq_ignore_ascii_case(key))
    }

    pub fn code(&self, input: &str) -> Result<&'static str> {
        self.resolve(input)
            .map(|lang| lang.code)
            .ok_or_else(|| LingomuxError::UnsupportedLanguage(format!("no code mapping for '{}'", input.trim())))
    }

    pub fn pair(&self, source: &str, target: &str) -> Result<LanguagePair> {
        Ok(LanguagePair::new(self.code(source)?, self.code(target)?))
    }

    /// Human-readable, capitalized name; unknown inputs are capitalized as-is
    pub fn display_name(&self, input: &str) -> String {
        match self.resolve(input) {
            Some(lang) => lang.name.to_string(),
            None => capitalize(input.trim()),
        }
    }

    /// Identity used for comparisons: the code when known, else the lowercased input
    pub fn canonical_key(&self, input: &str) -> String {
        match self.resolve(input) {
            Some(lang) => lang.code.to_string(),
            None => input.trim().to_lowercase(),
        }
    }

    pub fn same_language(&self, a: &str, b: &str) -> bool {
        self.canonical_key(a) == self.canonical_key(b)
    }

    /// Trim, lowercase and de-duplicate a requested language list, keeping first occurrences in order
    pub fn normalize_targets<S: AsRef<str>>(&self, requested: &[S]) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut normalized = Vec::new();
        for language in requested {
            let language = language.as_ref().trim().to_lowercase();
            if language.is_empty() {
                continue;
            }
            let key = self.canonical_key(&language);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            normalized.push(language);
        }
        normalized
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}
