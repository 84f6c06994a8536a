//! Internationalization (i18n) support
//!
//! Translations are embedded in the binary; `en` is the fallback language.

use std::collections::HashMap;

use serde::Serialize;

/// Built-in language files
const LANGUAGES: &[(&str, &str)] = &[
    ("pt-BR", include_str!("languages/pt-BR.yml")),
    ("en", include_str!("languages/en.yml")),
];

/// Internationalization handler
#[derive(Debug, Clone)]
pub struct I18n {
    /// Current language
    language: String,
    /// Language data: lang -> key -> translation
    translations: HashMap<String, HashMap<String, serde_yaml::Value>>,
}

/// UI strings handed to templates
#[derive(Debug, Clone, Serialize)]
pub struct UiStrings {
    pub load_more: String,
    pub load_failed: String,
    pub retry: String,
    pub loading: String,
    pub reading_time: String,
    pub banner_alt: String,
}

impl I18n {
    /// Create a handler with the built-in languages loaded
    pub fn new(language: &str) -> Self {
        let mut translations = HashMap::new();
        for (lang, content) in LANGUAGES {
            match serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(content) {
                Ok(data) => {
                    translations.insert(lang.to_string(), data);
                }
                Err(e) => tracing::warn!("Failed to parse language {}: {}", lang, e),
            }
        }

        if !translations.contains_key(language) {
            tracing::warn!("No translations for {:?}, falling back to en", language);
        }

        Self {
            language: language.to_string(),
            translations,
        }
    }

    /// Get the current language
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Get a translation by key
    pub fn get(&self, key: &str) -> String {
        self.lookup(key)
            .map(yaml_value_to_string)
            .unwrap_or_else(|| key.to_string())
    }

    /// Abbreviated month name, `month0` counted from zero
    pub fn month_short(&self, month0: usize) -> String {
        self.lookup("months_short")
            .and_then(|v| v.as_sequence())
            .and_then(|months| months.get(month0))
            .map(yaml_value_to_string)
            .unwrap_or_else(|| format!("{:02}", month0 + 1))
    }

    /// Strings used by the page templates
    pub fn ui_strings(&self) -> UiStrings {
        UiStrings {
            load_more: self.get("load_more"),
            load_failed: self.get("load_failed"),
            retry: self.get("retry"),
            loading: self.get("loading"),
            reading_time: self.get("reading_time"),
            banner_alt: self.get("banner_alt"),
        }
    }

    /// Translation for the current language with fallback to English
    fn lookup(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.translations
            .get(&self.language)
            .and_then(|data| data.get(key))
            .or_else(|| self.translations.get("en").and_then(|data| data.get(key)))
    }
}

/// Convert a YAML value to a string
fn yaml_value_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_translation() {
        let i18n = I18n::new("pt-BR");
        assert_eq!(i18n.get("load_more"), "Carregar mais posts");
        assert_eq!(i18n.get("loading"), "Carregando...");
        assert_eq!(i18n.get("unknown"), "unknown");
    }

    #[test]
    fn test_month_short() {
        let i18n = I18n::new("pt-BR");
        assert_eq!(i18n.month_short(1), "fev");
        assert_eq!(i18n.month_short(11), "dez");
        assert_eq!(i18n.month_short(12), "13");
    }

    #[test]
    fn test_fallback_to_english() {
        let i18n = I18n::new("de");
        assert_eq!(i18n.language(), "de");
        assert_eq!(i18n.get("load_more"), "Load more posts");
        assert_eq!(i18n.month_short(2), "Mar");
    }
}
