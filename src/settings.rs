use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::storage::{KeyValueStore, SETTINGS_KEY, write_json};

pub const MIN_PER_PAGE: usize = 6;
pub const MAX_PER_PAGE: usize = 200;
pub const DEFAULT_PER_PAGE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Channel list beside the player
    #[default]
    Side,
    /// Channel list below the player
    Bottom,
}

/// User preferences, persisted as one JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Start playback as soon as a channel is selected
    pub autoplay: bool,
    pub view_mode: ViewMode,
    pub sidebar_visible: bool,
    pub per_page: usize,
    pub show_icons_only: bool,
    /// Open the most recent playlist at startup
    pub load_last_on_start: bool,
    /// Reselect the last played channel when that playlist loads
    pub resume_last_channel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autoplay: true,
            view_mode: ViewMode::Side,
            sidebar_visible: true,
            per_page: DEFAULT_PER_PAGE,
            show_icons_only: false,
            load_last_on_start: false,
            resume_last_channel: false,
        }
    }
}

impl Settings {
    /// Read settings from the store. Missing or invalid keys keep defaults.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(SETTINGS_KEY) else {
            return Self::default();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => {
                debug!("loaded settings");
                Self::merged(&map)
            }
            Ok(_) => {
                warn!("stored settings are not an object, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to parse settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        write_json(store, SETTINGS_KEY, self);
    }

    /// Apply `change` and persist the result.
    pub fn update(&mut self, store: &dyn KeyValueStore, change: impl FnOnce(&mut Settings)) {
        change(self);
        self.per_page = clamp_per_page(self.per_page);
        self.save(store);
    }

    /// Overlay recognised keys from `map` onto the defaults.
    pub fn merged(map: &Map<String, Value>) -> Self {
        let mut settings = Self::default();

        if let Some(v) = map.get("autoplay").and_then(Value::as_bool) {
            settings.autoplay = v;
        }
        if let Some(v) = map
            .get("viewMode")
            .and_then(|v| serde_json::from_value::<ViewMode>(v.clone()).ok())
        {
            settings.view_mode = v;
        }
        if let Some(v) = map.get("sidebarVisible").and_then(Value::as_bool) {
            settings.sidebar_visible = v;
        }
        if let Some(v) = map.get("perPage").and_then(Value::as_f64)
            && v.is_finite()
            && v >= 1.0
        {
            settings.per_page = clamp_per_page(v as usize);
        }
        if let Some(v) = map.get("showIconsOnly").and_then(Value::as_bool) {
            settings.show_icons_only = v;
        }
        if let Some(v) = map.get("loadLastOnStart").and_then(Value::as_bool) {
            settings.load_last_on_start = v;
        }
        if let Some(v) = map.get("resumeLastChannel").and_then(Value::as_bool) {
            settings.resume_last_channel = v;
        }

        settings
    }
}

pub fn clamp_per_page(per_page: usize) -> usize {
    per_page.clamp(MIN_PER_PAGE, MAX_PER_PAGE)
}
