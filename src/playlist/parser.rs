//! Extended M3U parsing.
//!
//! Parsing runs in two steps. The entry grammar turns lines into
//! [`PlaylistItem`]s and never fails on a single bad entry; the
//! normalization step turns items into [`Channel`]s with a flat group
//! string, an empty-string logo default and dense indices.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

use super::{Channel, Playlist, RawEntry, RawGroup};

/// One `key=value` attribute, anchored at the start of the input
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*([A-Za-z0-9_-]+)=(?:"([^"]*)"|([^\s,"]+))"#).expect("attribute pattern")
});

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").expect("duration pattern"));

/// One entry as read from the file, before normalization
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistItem {
    pub name: String,
    pub url: String,
    pub raw: RawEntry,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub attributes: BTreeMap<String, String>,
}

/// Parse playlist text into channels.
///
/// Returns an empty list when the text is not extended M3U at all.
pub fn parse(text: &str) -> Vec<Channel> {
    parse_playlist(text).channels
}

/// Parse playlist text, keeping header metadata.
pub fn parse_playlist(text: &str) -> Playlist {
    let Some((header, items)) = parse_items(text) else {
        debug!("input is not an extended M3U playlist");
        return Playlist::default();
    };

    let epg_url = header
        .attributes
        .get("x-tvg-url")
        .or_else(|| header.attributes.get("url-tvg"))
        .filter(|v| !v.is_empty())
        .cloned();

    let channels = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| normalize(index, item))
        .collect();

    Playlist { channels, epg_url }
}

fn normalize(index: usize, item: PlaylistItem) -> Channel {
    let group = RawGroup::normalize(item.raw.group.as_ref());
    let logo = item
        .raw
        .attributes
        .get("tvg-logo")
        .cloned()
        .unwrap_or_default();

    Channel {
        index,
        name: item.name,
        url: item.url,
        logo,
        group,
        raw: Some(item.raw),
    }
}

/// Run the entry grammar over `text`.
///
/// `None` means no M3U tags were found anywhere in the input.
pub fn parse_items(text: &str) -> Option<(Header, Vec<PlaylistItem>)> {
    let text = text.trim_start_matches('\u{feff}');
    let first = text.lines().map(str::trim).find(|l| !l.is_empty())?;

    let has_header = first.starts_with("#EXTM3U");
    if !has_header && !text.lines().any(|l| is_extinf(l.trim())) {
        return None;
    }

    let mut header = Header::default();
    if has_header {
        header.attributes = scan_attrs(&first["#EXTM3U".len()..]).attributes;
    }

    let mut items = Vec::new();
    let mut pending: Option<PlaylistItem> = None;

    for (line_num, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("#EXTM3U") {
            continue;
        }

        if is_extinf(line) {
            if let Some(dropped) = pending.take() {
                debug!(line = line_num, name = %dropped.name, "entry without stream URL skipped");
            }
            pending = Some(parse_extinf(line));
        } else if let Some(group) = line.strip_prefix("#EXTGRP:") {
            if let Some(item) = pending.as_mut()
                && item.raw.group.is_none()
            {
                item.raw.group = Some(RawGroup::Text(group.trim().to_string()));
            }
        } else if let Some(option) = line.strip_prefix("#EXTVLCOPT:") {
            if let (Some(item), Some((key, value))) = (pending.as_mut(), option.split_once('=')) {
                item.raw
                    .options
                    .insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        } else if line.starts_with('#') {
            continue;
        } else if let Some(mut item) = pending.take() {
            item.url = line.to_string();
            items.push(item);
        } else {
            debug!(line = line_num, "stream URL without #EXTINF skipped");
        }
    }

    Some((header, items))
}

fn is_extinf(line: &str) -> bool {
    line.starts_with("#EXTINF:") || line.starts_with("EXTINF:")
}

fn parse_extinf(line: &str) -> PlaylistItem {
    let info = line
        .trim_start_matches('#')
        .trim_start_matches("EXTINF:");

    let (duration, after_duration) = match DURATION_RE.captures(info) {
        Some(caps) => (
            caps.get(1).and_then(|m| m.as_str().parse().ok()),
            caps.get(0).map_or(0, |m| m.end()),
        ),
        None => (None, 0),
    };

    let mut run = scan_attrs(&info[after_duration..]);
    let mut attrs_end = after_duration + run.end;

    // `duration,attrs...,name` form
    if run.attributes.is_empty()
        && let Some(comma) = info[attrs_end..].find(|c: char| !c.is_whitespace())
        && info[attrs_end + comma..].starts_with(',')
    {
        let start = attrs_end + comma + 1;
        let after = scan_attrs(&info[start..]);
        if after.quoted && first_unquoted_comma(&info[start + after.end..]).is_some() {
            attrs_end = start + after.end;
            run = after;
        }
    }

    let name_part = first_unquoted_comma(&info[attrs_end..])
        .map(|pos| &info[attrs_end + pos + 1..])
        .unwrap_or("");
    let attributes = run.attributes;

    let mut name = name_part.trim().to_string();
    if name.is_empty() {
        name = attributes.get("tvg-name").cloned().unwrap_or_default();
    }

    let group = attributes
        .get("group-title")
        .map(|title| RawGroup::Titled {
            title: title.clone(),
        });

    PlaylistItem {
        name,
        url: String::new(),
        raw: RawEntry {
            extinf: line.to_string(),
            duration,
            attributes,
            options: BTreeMap::new(),
            group,
        },
    }
}

/// Leading run of attributes in an `#EXTINF` or `#EXTM3U` line
struct AttrRun {
    attributes: BTreeMap<String, String>,
    /// Byte offset just past the last attribute of the run
    end: usize,
    /// At least one value was quoted
    quoted: bool,
}

/// Read `key=value` pairs from the start of `info` until something else
/// appears. Keys are lowercased.
fn scan_attrs(info: &str) -> AttrRun {
    let mut run = AttrRun {
        attributes: BTreeMap::new(),
        end: 0,
        quoted: false,
    };

    while let Some(caps) = ATTR_RE.captures(&info[run.end..]) {
        let key = caps[1].to_lowercase();
        let value = match (caps.get(2), caps.get(3)) {
            (Some(quoted), _) => {
                run.quoted = true;
                quoted.as_str()
            }
            (None, Some(bare)) => bare.as_str(),
            (None, None) => "",
        };
        run.attributes.insert(key, value.to_string());
        run.end += caps.get(0).map_or(0, |m| m.end());
    }

    run
}

fn first_unquoted_comma(text: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (pos, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(pos),
            _ => {}
        }
    }
    None
}
