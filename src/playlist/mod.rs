pub mod group;
pub mod parser;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub use group::{ChannelFilter, GroupIndex, GroupKey, Pagination, group_by};
pub use parser::{parse, parse_playlist};

/// Group assigned to channels that carry no usable group name.
pub const DEFAULT_GROUP: &str = "Uncategorized";

/// Group assigned to channels added by hand to a playlist source.
pub const MANUAL_GROUP: &str = "Manual";

/// Group value as it arrives from the entry grammar or from stored JSON.
///
/// `group-title` attributes surface as `Titled`, `#EXTGRP` lines as `Text`.
/// Stored records written by other tools may carry anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawGroup {
    Text(String),
    Titled { title: String },
    Other(serde_json::Value),
}

impl RawGroup {
    /// Flatten to a single display string.
    ///
    /// Keeps only the first `;`-separated segment and substitutes
    /// [`DEFAULT_GROUP`] when nothing usable remains.
    pub fn normalize(group: Option<&RawGroup>) -> String {
        let text = match group {
            Some(RawGroup::Text(s)) => s.as_str(),
            Some(RawGroup::Titled { title }) => title.as_str(),
            Some(RawGroup::Other(_)) | None => "",
        };

        let first = text.split(';').next().unwrap_or_default();
        if first.is_empty() {
            DEFAULT_GROUP.to_string()
        } else {
            first.to_string()
        }
    }
}

/// The original entry a channel was parsed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// The `#EXTINF` line, verbatim
    pub extinf: String,
    pub duration: Option<f64>,
    /// `key="value"` attributes, keys lowercased
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// `#EXTVLCOPT:key=value` options
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<RawGroup>,
}

/// One playable entry of a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Position in the list this channel belongs to
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub logo: String,
    #[serde(
        default = "default_group",
        deserialize_with = "deserialize_group"
    )]
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawEntry>,
}

impl Channel {
    /// A channel entered by hand rather than parsed from a playlist.
    pub fn manual(index: usize, name: &str, url: &str) -> Self {
        let name = if name.trim().is_empty() { url } else { name.trim() };
        Self {
            index,
            name: name.to_string(),
            url: url.to_string(),
            logo: String::new(),
            group: MANUAL_GROUP.to_string(),
            raw: None,
        }
    }

    /// Identity across lists: the same URL may appear under several indices.
    pub fn is_same(&self, other: &Channel) -> bool {
        self.url == other.url && self.index == other.index
    }

    pub fn tvg_id(&self) -> Option<&str> {
        self.attribute("tvg-id")
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.raw
            .as_ref()
            .and_then(|raw| raw.attributes.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether the stream is served as an HLS playlist.
    pub fn is_hls(&self) -> bool {
        self.url.contains(".m3u8")
    }
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn deserialize_group<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let group = Option::<RawGroup>::deserialize(deserializer)?;
    Ok(RawGroup::normalize(group.as_ref()))
}

/// A parsed playlist: channels in file order plus header metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playlist {
    pub channels: Vec<Channel>,
    /// From `x-tvg-url` or `url-tvg` in the `#EXTM3U` header
    pub epg_url: Option<String>,
}

impl Playlist {
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Append `extras` after `base`, numbering them after the last base index.
///
/// The base channels keep their indices.
pub fn merge_extras(base: Vec<Channel>, extras: &[Channel]) -> Vec<Channel> {
    let offset = base.len();
    let mut merged = base;
    merged.extend(extras.iter().enumerate().map(|(i, ch)| Channel {
        index: offset + i,
        ..ch.clone()
    }));
    merged
}
