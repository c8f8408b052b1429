use serde::{Deserialize, Serialize};

use super::bookmark::AutoDeletePreference;

/// Top-level settings container for the bookmark modal host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ModalSettings {
    pub user: UserSettings,
    pub device: DeviceSettings,
    pub api: ApiSettings,
    pub locale: LocaleSettings,
}

/// Per-user options that shape a new editing session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct UserSettings {
    /// IANA timezone name, e.g. `America/New_York`. `None` means UTC.
    pub timezone: Option<String>,
    /// Preference given to freshly created bookmarks.
    pub bookmark_auto_delete_preference: AutoDeletePreference,
}

/// Device class of the client rendering the modal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DeviceSettings {
    pub is_mobile: bool,
}

/// Remote bookmark API. Without a base URL the local SQLite store is used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocaleSettings {
    pub language: String,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
        }
    }
}
