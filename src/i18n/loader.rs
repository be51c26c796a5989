//! Translation loader and i18n management
//!
//! Translations live in `<translations_dir>/<lang>.json` as nested objects;
//! keys are addressed with dots (`events.register.success`). Plural forms
//! are objects keyed by `one`/`few`/`many`/`other`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use serde_json::{Value, Map};
use tokio::fs;
use tracing::{info, warn, debug};
use crate::utils::errors::{EventDeskError, Result};
use crate::config::I18nConfig;

/// Main internationalization manager
#[derive(Debug, Clone)]
pub struct I18n {
    translations: HashMap<String, Map<String, Value>>,
    default_language: String,
    supported_languages: Vec<String>,
    translations_dir: PathBuf,
}

/// Translation parameters for message formatting
pub type TranslationParams = HashMap<String, String>;

/// Build translation parameters from key/value pairs
pub fn params<K, V, I>(pairs: I) -> TranslationParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

impl I18n {
    pub fn new(config: &I18nConfig) -> Self {
        Self {
            translations: HashMap::new(),
            default_language: config.default_language.clone(),
            supported_languages: config.supported_languages.clone(),
            translations_dir: PathBuf::from(&config.translations_dir),
        }
    }

    /// Load every supported language; only the default language is mandatory
    pub async fn load_translations(&mut self) -> Result<()> {
        let supported_languages = self.supported_languages.clone();
        for lang_code in &supported_languages {
            let file_path = self.translations_dir.join(format!("{}.json", lang_code));

            match self.load_language_file(&file_path, lang_code).await {
                Ok(key_count) => info!(language = %lang_code, keys = key_count, "Loaded translations"),
                Err(e) if lang_code == &self.default_language => {
                    return Err(EventDeskError::Config(format!(
                        "Failed to load default language translations from {}: {}",
                        file_path.display(),
                        e
                    )));
                }
                Err(e) => warn!(language = %lang_code, path = %file_path.display(), error = %e, "Skipping translation file"),
            }
        }

        Ok(())
    }

    async fn load_language_file(&mut self, file_path: &Path, lang_code: &str) -> Result<usize> {
        let content = fs::read_to_string(file_path).await?;
        self.insert_language(lang_code, &content)
    }

    /// Register translations for a language from a JSON document
    pub fn insert_language(&mut self, lang_code: &str, json: &str) -> Result<usize> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(map) => {
                let key_count = count_keys(&map);
                self.translations.insert(lang_code.to_string(), map);
                Ok(key_count)
            }
            _ => Err(EventDeskError::Config(format!(
                "Translation file for {} must contain a JSON object",
                lang_code
            ))),
        }
    }

    /// Get a translated message, falling back to the default language and then the key itself
    pub fn t(&self, key: &str, lang: &str, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.get_effective_language(lang);

        let value = self
            .get_translation_value(key, effective_lang)
            .or_else(|| self.get_translation_value(key, &self.default_language));

        match value {
            Some(value) => format_message(&extract_text(value), params),
            None => {
                warn!(key = %key, language = %effective_lang, "Translation key not found");
                key.to_string()
            }
        }
    }

    /// Get a translated message with pluralization support
    pub fn tp(&self, key: &str, lang: &str, count: i64, params: Option<&TranslationParams>) -> String {
        let effective_lang = self.get_effective_language(lang);
        let plural_key = format!("{}.{}", key, plural_form(count, effective_lang));

        let mut final_params = params.cloned().unwrap_or_default();
        final_params.insert("count".to_string(), count.to_string());

        self.t(&plural_key, effective_lang, Some(&final_params))
    }

    /// Translated, user-facing text for a failed operation
    pub fn error_message(&self, error: &EventDeskError, lang: &str) -> String {
        let params = match error {
            EventDeskError::EventFull { capacity, .. } => params([("capacity", capacity.to_string())]),
            EventDeskError::EventNotOpen { status, .. } => params([("status", status.clone())]),
            EventDeskError::EventNotFound { event_id } => params([("event_id", event_id.to_string())]),
            _ => TranslationParams::new(),
        };
        debug!(key = error.user_message_key(), error = %error, "Rendering error for user");
        self.t(error.user_message_key(), lang, Some(&params))
    }

    pub fn is_language_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }

    fn get_effective_language<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.is_language_supported(lang) && self.translations.contains_key(lang) {
            lang
        } else {
            &self.default_language
        }
    }

    fn get_translation_value(&self, key: &str, lang: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let mut current = self.translations.get(lang)?.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    pub fn supported_languages(&self) -> &[String] {
        &self.supported_languages
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Map a Telegram locale (e.g. `en-US`) onto a supported language
    pub fn detect_user_language(&self, telegram_lang: Option<&str>) -> String {
        telegram_lang
            .and_then(|lang| lang.split('-').next())
            .filter(|code| self.is_language_supported(code))
            .map(str::to_string)
            .unwrap_or_else(|| self.default_language.clone())
    }
}

fn extract_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("other")
            .or_else(|| obj.values().next())
            .map(extract_text)
            .unwrap_or_default(),
        _ => value.to_string(),
    }
}

fn format_message(template: &str, params: Option<&TranslationParams>) -> String {
    let mut result = template.to_string();
    if let Some(params) = params {
        for (key, value) in params {
            result = result.replace(&format!("{{{}}}", key), value);
        }
    }
    result
}

fn plural_form(count: i64, lang: &str) -> &'static str {
    match lang {
        "ru" => {
            let abs_count = count.abs();
            let last_digit = abs_count % 10;
            let last_two_digits = abs_count % 100;

            if last_digit == 1 && last_two_digits != 11 {
                "one"
            } else if (2..=4).contains(&last_digit) && !(12..=14).contains(&last_two_digits) {
                "few"
            } else {
                "many"
            }
        }
        _ => {
            if count == 1 { "one" } else { "other" }
        }
    }
}

fn count_keys(obj: &Map<String, Value>) -> usize {
    obj.values()
        .map(|value| match value {
            Value::Object(nested) => count_keys(nested),
            _ => 1,
        })
        .sum()
}
