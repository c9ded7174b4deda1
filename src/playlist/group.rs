use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};

use super::{Channel, DEFAULT_GROUP};

/// Channel field used as the bucket key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupKey {
    #[default]
    Group,
    Name,
    Logo,
}

impl GroupKey {
    fn value<'a>(&self, channel: &'a Channel) -> &'a str {
        match self {
            GroupKey::Group => &channel.group,
            GroupKey::Name => &channel.name,
            GroupKey::Logo => &channel.logo,
        }
    }
}

/// Channels bucketed by a key, buckets in order of first appearance.
///
/// Built fresh from a channel list with [`group_by`]; there is no way to
/// mutate an index in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupIndex {
    buckets: Vec<(String, Vec<Channel>)>,
    positions: HashMap<String, usize>,
}

impl GroupIndex {
    pub fn get(&self, name: &str) -> Option<&[Channel]> {
        self.positions
            .get(name)
            .map(|&pos| self.buckets[pos].1.as_slice())
    }

    /// Bucket names in order of first appearance
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(name, _)| name.as_str())
    }

    /// Bucket names sorted alphabetically, case-insensitive
    pub fn sorted_names(&self) -> Vec<String> {
        self.names()
            .sorted_by_cached_key(|name| name.to_lowercase())
            .map(str::to_string)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Channel])> {
        self.buckets
            .iter()
            .map(|(name, channels)| (name.as_str(), channels.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Partition `channels` by `key`.
///
/// Channels with an empty value land in [`DEFAULT_GROUP`]. Within a bucket
/// channels keep their input order.
pub fn group_by(channels: &[Channel], key: GroupKey) -> GroupIndex {
    let mut index = GroupIndex::default();

    for channel in channels {
        let value = key.value(channel);
        let name = if value.is_empty() { DEFAULT_GROUP } else { value };

        match index.positions.get(name) {
            Some(&pos) => index.buckets[pos].1.push(channel.clone()),
            None => {
                index.positions.insert(name.to_string(), index.buckets.len());
                index.buckets.push((name.to_string(), vec![channel.clone()]));
            }
        }
    }

    index
}

/// Names containing `term`, case-insensitive. An empty term keeps all.
pub fn filter_group_names(names: &[String], term: &str) -> Vec<String> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return names.to_vec();
    }
    names
        .iter()
        .filter(|name| name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

/// Search text plus selected groups, as applied to the visible channel list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFilter {
    pub search: String,
    /// Empty means every group
    pub groups: BTreeSet<String>,
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        if !self.groups.is_empty() && !self.groups.contains(&channel.group) {
            return false;
        }
        let term = self.search.trim();
        term.is_empty() || channel.name.to_lowercase().contains(&term.to_lowercase())
    }

    pub fn apply(&self, channels: &[Channel]) -> Vec<Channel> {
        channels
            .iter()
            .filter(|ch| self.matches(ch))
            .cloned()
            .collect()
    }

    pub fn toggle_group(&mut self, group: &str) {
        if !self.groups.remove(group) {
            self.groups.insert(group.to_string());
        }
    }

    pub fn is_active(&self) -> bool {
        !self.groups.is_empty() || !self.search.trim().is_empty()
    }
}

/// One-based page over a list of `total` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl Pagination {
    pub fn new(page: usize, per_page: usize, total: usize) -> Self {
        let mut pagination = Self {
            page,
            per_page: per_page.max(1),
            total,
        };
        pagination.page = page.clamp(1, pagination.total_pages());
        pagination
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        let start = ((self.page - 1) * self.per_page).min(self.total);
        let end = (start + self.per_page).min(self.total);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.range();
        &items[range.start.min(items.len())..range.end.min(items.len())]
    }
}
