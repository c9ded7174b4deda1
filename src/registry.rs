use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::playlist::{Channel, merge_extras};
use crate::storage::{EXTRAS_KEY, PLAYLISTS_KEY, SharedStore, forget, read_json, write_json};

/// Most entries the registry keeps
pub const MAX_SOURCES: usize = 50;

/// A playlist origin the user has opened before
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSource {
    /// Remote URL or local file name; unique
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: u64,
    #[serde(default)]
    pub last_accessed: u64,
}

impl PlaylistSource {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Known playlist sources, most recently accessed first
pub struct PlaylistRegistry {
    store: SharedStore,
    entries: Vec<PlaylistSource>,
}

impl PlaylistRegistry {
    pub fn load(store: SharedStore) -> Self {
        let mut entries: Vec<PlaylistSource> = read_json(store.as_ref(), PLAYLISTS_KEY).unwrap_or_default();

        entries.sort_by(|a, b| b.last_accessed.cmp(&a.last_accessed));
        let mut seen = HashSet::new();
        entries.retain(|e| !e.url.is_empty() && seen.insert(e.url.clone()));
        entries.truncate(MAX_SOURCES);

        debug!(count = entries.len(), "loaded playlist registry");
        Self { store, entries }
    }

    pub fn list_all(&self) -> &[PlaylistSource] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&PlaylistSource> {
        self.entries.iter().find(|e| e.url == key)
    }

    pub fn most_recent(&self) -> Option<&PlaylistSource> {
        self.entries.first()
    }

    /// Insert or refresh `key` and move it to the front.
    ///
    /// An empty `name` keeps the stored name, or falls back to the key.
    pub fn upsert(&mut self, key: &str, name: &str) {
        if key.is_empty() {
            return;
        }
        let now = now_millis();

        let entry = match self.entries.iter().position(|e| e.url == key) {
            Some(pos) => {
                let mut existing = self.entries.remove(pos);
                if !name.is_empty() {
                    existing.name = name.to_string();
                } else if existing.name.is_empty() {
                    existing.name = key.to_string();
                }
                existing.updated_at = now;
                existing.last_accessed = now;
                existing
            }
            None => PlaylistSource {
                url: key.to_string(),
                name: (if name.is_empty() { key } else { name }).to_string(),
                created_at: now,
                updated_at: now,
                last_accessed: now,
            },
        };

        self.entries.insert(0, entry);
        self.entries.truncate(MAX_SOURCES);
        self.persist();
    }

    pub fn remove(&mut self, key: &str) {
        let before = self.entries.len();
        self.entries.retain(|e| e.url != key);
        if self.entries.len() != before {
            self.persist();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        forget(self.store.as_ref(), PLAYLISTS_KEY);
    }

    fn persist(&self) {
        write_json(self.store.as_ref(), PLAYLISTS_KEY, &self.entries);
    }
}

/// Channels added by hand, per playlist source
pub struct ExtrasStore {
    store: SharedStore,
    map: HashMap<String, Vec<Channel>>,
}

impl ExtrasStore {
    pub fn load(store: SharedStore) -> Self {
        let map = read_json(store.as_ref(), EXTRAS_KEY).unwrap_or_default();
        Self { store, map }
    }

    pub fn get(&self, key: &str) -> &[Channel] {
        self.map.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    /// Record a manual channel for `key` and return the stored record.
    ///
    /// Returns `None` for an empty URL.
    pub fn add(&mut self, key: &str, name: &str, url: &str) -> Option<Channel> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        let list = self.map.entry(key.to_string()).or_default();
        let channel = Channel::manual(list.len(), name, url);
        list.push(channel.clone());
        self.persist();
        Some(channel)
    }

    pub fn remove_source(&mut self, key: &str) {
        if self.map.remove(key).is_some() {
            self.persist();
        }
    }

    /// `parsed` followed by the extras stored for `key`.
    pub fn merge(&self, key: &str, parsed: Vec<Channel>) -> Vec<Channel> {
        merge_extras(parsed, self.get(key))
    }

    fn persist(&self) {
        write_json(self.store.as_ref(), EXTRAS_KEY, &self.map);
    }
}
