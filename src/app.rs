//! The player controller: one active playlist, its visible slice and the
//! playback session, with every user action persisted as it happens.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, error, info};

use crate::loader::{
    ActivePlaylist, LoadOptions, LoadReport, PlaylistLoader, PlaylistMeta, is_remote_source,
};
use crate::playlist::{Channel, ChannelFilter, GroupIndex, GroupKey, Pagination, group_by};
use crate::playlist::group::filter_group_names;
use crate::session::{DecoderFactory, PlaybackSession, PlaybackSurface, SessionEvent, SessionState};
use crate::settings::Settings;
use crate::storage::{LAST_CHANNEL_KEY, LAST_URL_KEY, SharedStore, VOLUME_KEY, read_json, write_json};

/// Stored under [`LAST_CHANNEL_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastChannel {
    pub url: String,
    #[serde(default)]
    pub name: String,
}

/// A page of the visible channel list
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub pagination: Pagination,
    pub channels: Vec<Channel>,
    /// Size of the whole visible list
    pub available: usize,
}

pub struct Player<S: PlaybackSurface, F: DecoderFactory> {
    store: SharedStore,
    settings: Settings,
    loader: PlaylistLoader,
    session: PlaybackSession<S, F>,
    meta: Option<PlaylistMeta>,
    channels: Vec<Channel>,
    epg_url: Option<String>,
    filter: ChannelFilter,
    page: usize,
    error: Option<String>,
}

impl<S: PlaybackSurface, F: DecoderFactory> Player<S, F> {
    /// Restore settings and volume from `store`; no playlist is loaded yet.
    pub fn new(store: SharedStore, loader: PlaylistLoader, mut session: PlaybackSession<S, F>) -> Self {
        let settings = Settings::load(store.as_ref());
        session.set_autoplay(settings.autoplay);
        session.set_volume(stored_volume(&store));

        Self {
            store,
            settings,
            loader,
            session,
            meta: None,
            channels: Vec::new(),
            epg_url: None,
            filter: ChannelFilter::default(),
            page: 1,
            error: None,
        }
    }

    /// Open the most recent remote playlist when configured to, otherwise the sample.
    ///
    /// File and sample entries in the registry are skipped; they cannot be
    /// reopened without the user.
    pub async fn start(&mut self) {
        if self.settings.load_last_on_start {
            let url = self
                .loader
                .registry()
                .list_all()
                .iter()
                .find(|e| is_remote_source(&e.url))
                .map(|e| e.url.clone())
                .or_else(|| self.loader.last_url().filter(|u| is_remote_source(u)));

            if let Some(url) = url {
                let fallback_name = self
                    .loader
                    .registry()
                    .get(&url)
                    .map(|e| e.name.clone())
                    .filter(|n| !n.is_empty());
                let options = LoadOptions {
                    preferred_url: self.resume_url(),
                    fallback_name,
                };
                info!(%url, "reopening last playlist");
                self.open_url_with(&url, false, options).await;
                return;
            }
        }
        self.open_sample();
    }

    pub async fn open_url(&mut self, url: &str) {
        self.open_url_with(url, false, LoadOptions::default()).await;
    }

    pub async fn open_url_with(&mut self, url: &str, silent: bool, options: LoadOptions) {
        let report = self.loader.load_url(url, silent, options).await;
        self.apply_report(report);
    }

    pub async fn open_file(&mut self, path: &Path) {
        let report = self.loader.load_file(path).await;
        self.apply_report(report);
    }

    /// Reopen a registry entry under its stored name
    pub async fn open_saved(&mut self, key: &str) {
        let fallback_name = self.loader.registry().get(key).map(|e| e.name.clone());
        let options = LoadOptions {
            preferred_url: None,
            fallback_name,
        };
        self.open_url_with(key, false, options).await;
    }

    pub fn open_sample(&mut self) {
        let playlist = self.loader.load_sample();
        self.activate(playlist);
        self.error = None;
    }

    fn apply_report(&mut self, report: LoadReport) {
        if let Some(playlist) = report.playlist {
            self.activate(playlist);
        }
        self.error = report.error;
    }

    fn activate(&mut self, playlist: ActivePlaylist) {
        let ActivePlaylist {
            meta,
            channels,
            epg_url,
            initial,
        } = playlist;

        self.meta = Some(meta);
        self.channels = channels;
        self.epg_url = epg_url;
        self.filter = ChannelFilter::default();
        self.page = 1;

        match initial {
            Some(channel) => self.select(channel),
            None => self.session.teardown(),
        }
    }

    fn resume_url(&self) -> Option<String> {
        if !self.settings.resume_last_channel {
            return None;
        }
        read_json::<LastChannel>(self.store.as_ref(), LAST_CHANNEL_KEY).map(|c| c.url)
    }

    pub fn select(&mut self, channel: Channel) {
        self.remember_channel(&channel);
        self.session.select_channel(channel);
    }

    fn remember_channel(&self, channel: &Channel) {
        if !self.settings.resume_last_channel {
            return;
        }
        let last = LastChannel {
            url: channel.url.clone(),
            name: channel.name.clone(),
        };
        write_json(self.store.as_ref(), LAST_CHANNEL_KEY, &last);
    }

    pub fn next(&mut self) -> Option<Channel> {
        let visible = self.visible();
        let target = self.session.next(&visible)?;
        self.remember_channel(&target);
        Some(target)
    }

    pub fn previous(&mut self) -> Option<Channel> {
        let visible = self.visible();
        let target = self.session.previous(&visible)?;
        self.remember_channel(&target);
        Some(target)
    }

    pub fn retry_next(&mut self) -> Option<Channel> {
        let visible = self.visible();
        let target = self.session.retry_next(&visible)?;
        self.remember_channel(&target);
        Some(target)
    }

    pub fn toggle_play_pause(&mut self) {
        self.session.toggle_play_pause();
    }

    pub fn dismiss_error(&mut self) {
        self.session.dismiss_error();
    }

    /// Route a collaborator event into the session
    pub fn handle_event(&mut self, event: SessionEvent) {
        self.session.handle_event(event);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.session.set_volume(volume);
        self.persist_volume();
    }

    pub fn toggle_mute(&mut self) {
        self.session.toggle_mute();
        self.persist_volume();
    }

    fn persist_volume(&self) {
        let value = self.session.volume().to_string();
        if let Err(e) = self.store.set(VOLUME_KEY, &value) {
            error!(error = %e, "failed to persist volume");
        }
    }

    pub fn set_search(&mut self, term: &str) {
        self.filter.search = term.to_string();
        self.page = 1;
    }

    pub fn toggle_group(&mut self, group: &str) {
        self.filter.toggle_group(group);
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.filter = ChannelFilter::default();
        self.page = 1;
    }

    pub fn filter(&self) -> &ChannelFilter {
        &self.filter
    }

    /// Channels passing the current search and group filters
    pub fn visible(&self) -> Vec<Channel> {
        self.filter.apply(&self.channels)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    pub fn page_view(&self) -> PageView {
        let visible = self.visible();
        let pagination = Pagination::new(self.page, self.settings.per_page, visible.len());
        PageView {
            pagination,
            channels: pagination.slice(&visible).to_vec(),
            available: visible.len(),
        }
    }

    pub fn groups(&self) -> GroupIndex {
        group_by(&self.channels, GroupKey::Group)
    }

    /// Group names in alphabetical order, narrowed by `term`
    pub fn group_names(&self, term: &str) -> Vec<String> {
        filter_group_names(&self.groups().sorted_names(), term)
    }

    /// Record a hand-entered channel for the active source and append it.
    ///
    /// An empty URL is ignored.
    pub fn add_manual_channel(&mut self, name: &str, url: &str) -> Option<Channel> {
        let key = self
            .meta
            .as_ref()
            .map(|m| m.source.clone())
            .unwrap_or_else(|| LAST_URL_KEY.to_string());
        let stored = self.loader.extras_mut().add(&key, name, url)?;

        let channel = Channel {
            index: self.channels.len(),
            ..stored
        };
        debug!(source = %key, url = %channel.url, "manual channel added");
        self.channels.push(channel.clone());
        Some(channel)
    }

    pub fn rename_playlist(&mut self, name: &str) {
        let name = name.trim();
        let Some(meta) = self.meta.as_mut() else {
            return;
        };
        if name.is_empty() {
            return;
        }
        meta.name = name.to_string();
        let source = meta.source.clone();
        self.loader.registry_mut().upsert(&source, name);
    }

    pub fn remove_playlist(&mut self, key: &str) {
        self.loader.registry_mut().remove(key);
    }

    pub fn clear_playlists(&mut self) {
        self.loader.registry_mut().clear();
    }

    /// Apply and persist a settings change
    pub fn update_settings(&mut self, change: impl FnOnce(&mut Settings)) {
        self.settings.update(self.store.as_ref(), change);
        self.session.set_autoplay(self.settings.autoplay);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn meta(&self) -> Option<&PlaylistMeta> {
        self.meta.as_ref()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn epg_url(&self) -> Option<&str> {
        self.epg_url.as_deref()
    }

    /// Playlist-level error from the last load
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn loader(&self) -> &PlaylistLoader {
        &self.loader
    }

    pub fn session(&self) -> &PlaybackSession<S, F> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession<S, F> {
        &mut self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }
}

fn stored_volume(store: &SharedStore) -> f64 {
    store
        .get(VOLUME_KEY)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(1.0)
}
