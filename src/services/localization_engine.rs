use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use crate::types::errors::LocaleError;

/// Supported locales.
const SUPPORTED_LOCALES: &[&str] = &["en", "ru"];

/// Default locale, also the fallback when a key is missing in the active one.
const DEFAULT_LOCALE: &str = "en";

/// English strings compiled into the binary, used when no locale directory exists.
const BUILTIN_EN: &str = include_str!("../../locales/en.json");

/// Resolves a message key to display text.
pub trait Translate {
    fn t(&self, key: &str) -> String;
}

/// Trait defining the localization engine interface.
pub trait LocalizationEngineTrait {
    fn initialize(&mut self) -> Result<(), LocaleError>;
    fn set_locale(&mut self, lang: &str) -> Result<(), LocaleError>;
    fn get_locale(&self) -> &str;
    fn t_with(&self, key: &str, params: Option<&HashMap<String, String>>) -> String;
    fn detect_system_locale(&self) -> String;
    fn get_available_locales(&self) -> Vec<String>;
}

/// Localization engine for the modal's strings.
pub struct LocalizationEngine {
    current_locale: String,
    /// Loaded locale data: maps locale name to its parsed JSON value.
    locales: HashMap<String, Value>,
    /// Directory containing `<locale>.json` files.
    locales_dir: PathBuf,
}

impl LocalizationEngine {
    /// Creates a new LocalizationEngine with the given locales directory path.
    pub fn new(locales_dir: impl Into<PathBuf>) -> Self {
        Self {
            current_locale: DEFAULT_LOCALE.to_string(),
            locales: HashMap::new(),
            locales_dir: locales_dir.into(),
        }
    }

    /// Creates an engine holding only the compiled-in English strings.
    pub fn builtin() -> Self {
        let mut engine = Self::new("locales");
        if let Ok(data) = serde_json::from_str(BUILTIN_EN) {
            engine.locales.insert(DEFAULT_LOCALE.to_string(), data);
        }
        engine
    }

    /// Looks up a nested key in a JSON value using dot notation.
    /// For example, "bookmarks.edit" looks up `value["bookmarks"]["edit"]`.
    fn lookup_key<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
        key.split('.').try_fold(data, |current, part| current.get(part))
    }

    /// Replaces `{param_name}` placeholders in a string with values from the params map.
    fn interpolate(template: &str, params: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in params {
            let placeholder = format!("{{{}}}", key);
            result = result.replace(&placeholder, value);
        }
        result
    }

    fn lookup_in(&self, locale: &str, key: &str) -> Option<String> {
        let data = self.locales.get(locale)?;
        Self::lookup_key(data, key)?.as_str().map(str::to_string)
    }
}

impl LocalizationEngineTrait for LocalizationEngine {
    /// Loads all locale JSON files from the locales directory. The builtin
    /// English strings stay available if the directory has no `en.json`.
    fn initialize(&mut self) -> Result<(), LocaleError> {
        let dir = &self.locales_dir;

        if !dir.exists() {
            return Err(LocaleError::FileNotFound(dir.to_string_lossy().to_string()));
        }

        for locale in SUPPORTED_LOCALES {
            let file_path = dir.join(format!("{}.json", locale));
            if !file_path.exists() {
                continue;
            }
            let content = fs::read_to_string(&file_path).map_err(|e| {
                LocaleError::FileNotFound(format!("{}: {}", file_path.to_string_lossy(), e))
            })?;
            let data: Value = serde_json::from_str(&content).map_err(|e| {
                LocaleError::FileNotFound(format!(
                    "Failed to parse {}: {}",
                    file_path.to_string_lossy(),
                    e
                ))
            })?;
            debug!(locale, "loaded locale file");
            self.locales.insert(locale.to_string(), data);
        }

        if !self.locales.contains_key(DEFAULT_LOCALE) {
            if let Ok(data) = serde_json::from_str(BUILTIN_EN) {
                self.locales.insert(DEFAULT_LOCALE.to_string(), data);
            }
        }

        Ok(())
    }

    /// Switches the active locale. Returns an error if the locale is not supported
    /// or not loaded.
    fn set_locale(&mut self, lang: &str) -> Result<(), LocaleError> {
        if !SUPPORTED_LOCALES.contains(&lang) {
            return Err(LocaleError::UnsupportedLocale(lang.to_string()));
        }
        if !self.locales.contains_key(lang) {
            return Err(LocaleError::FileNotFound(format!("Locale '{}' not loaded", lang)));
        }
        self.current_locale = lang.to_string();
        Ok(())
    }

    fn get_locale(&self) -> &str {
        &self.current_locale
    }

    /// Looks up `key` in the active locale, then in English, then returns the
    /// key itself.
    fn t_with(&self, key: &str, params: Option<&HashMap<String, String>>) -> String {
        let text = self
            .lookup_in(&self.current_locale, key)
            .or_else(|| self.lookup_in(DEFAULT_LOCALE, key));

        match (text, params) {
            (Some(text), Some(p)) => Self::interpolate(&text, p),
            (Some(text), None) => text,
            (None, _) => key.to_string(),
        }
    }

    /// Detects the system locale from `LANG` (e.g. "ru_RU.UTF-8" -> "ru").
    /// Falls back to "en" if the system locale is not supported.
    fn detect_system_locale(&self) -> String {
        let lang = std::env::var("LANG").unwrap_or_default();
        let lang_code = lang
            .split('_')
            .next()
            .unwrap_or("")
            .split('.')
            .next()
            .unwrap_or("");

        if SUPPORTED_LOCALES.contains(&lang_code) {
            lang_code.to_string()
        } else {
            DEFAULT_LOCALE.to_string()
        }
    }

    fn get_available_locales(&self) -> Vec<String> {
        let mut locales: Vec<String> = self.locales.keys().cloned().collect();
        locales.sort();
        locales
    }
}

impl Translate for LocalizationEngine {
    fn t(&self, key: &str) -> String {
        self.t_with(key, None)
    }
}
