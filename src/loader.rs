use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::fetch::{FetchError, PlaylistFetcher};
use crate::playlist::{Channel, parse_playlist};
use crate::registry::{ExtrasStore, PlaylistRegistry};
use crate::storage::{LAST_URL_KEY, SharedStore, forget};

/// Bundled playlist used when a remote playlist cannot be fetched
pub const SAMPLE_M3U: &str = r#"#EXTM3U
#EXTINF:-1 tvg-id="sintel.demo" tvg-logo="https://i.imgur.com/1xm4ZtL.jpg" group-title="Featured",Sintel Demo
https://bitdash-a.akamaihd.net/content/sintel/hls/playlist.m3u8
#EXTINF:-1 tvg-id="bbb.demo" tvg-logo="https://storage.googleapis.com/shaka-demo-assets/bbb-dark.png" group-title="Featured",Big Buck Bunny
https://storage.googleapis.com/shaka-demo-assets/bbb-dark-truths-hls/hls.m3u8
#EXTINF:-1 tvg-id="angel.demo" tvg-logo="https://storage.googleapis.com/shaka-demo-assets/angel-one-hls/poster.png" group-title="Featured",Angel One
https://storage.googleapis.com/shaka-demo-assets/angel-one-hls/hls.m3u8
"#;

pub const SAMPLE_NAME: &str = "Included playlist";
pub const SAMPLE_SOURCE: &str = "Local sample";
pub const NO_CHANNELS_MESSAGE: &str = "Playlist has no playable channels.";
const REMOTE_FALLBACK_NAME: &str = "Remote playlist";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Enter a playlist URL first.")]
    EmptyUrl,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Text shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            LoadError::EmptyUrl => self.to_string(),
            LoadError::Fetch(e @ FetchError::Status(_)) => e.to_string(),
            LoadError::Fetch(_) => "Unable to load playlist.".to_string(),
            LoadError::ReadFile { .. } => "Unable to read playlist file.".to_string(),
        }
    }
}

/// Whether a registry key names a remote playlist rather than a file or the sample
pub fn is_remote_source(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("http://") || key.starts_with("https://")
}

/// Name and registry key of the active playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMeta {
    pub name: String,
    /// Remote URL or file name
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Channel URL to start on instead of the first channel
    pub preferred_url: Option<String>,
    /// Display name that wins over the stored one
    pub fallback_name: Option<String>,
}

/// A parsed playlist merged with its manual channels
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePlaylist {
    pub meta: PlaylistMeta,
    pub channels: Vec<Channel>,
    pub epg_url: Option<String>,
    /// The channel to select first, if any
    pub initial: Option<Channel>,
}

/// Result of a load request. Never an `Err`: failures become `error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// `None` when nothing was activated
    pub playlist: Option<ActivePlaylist>,
    pub error: Option<String>,
    /// The bundled sample was activated in place of the requested playlist
    pub fell_back: bool,
}

/// Turns playlist sources into active playlists and records them.
pub struct PlaylistLoader {
    fetcher: PlaylistFetcher,
    store: SharedStore,
    registry: PlaylistRegistry,
    extras: ExtrasStore,
}

impl PlaylistLoader {
    pub fn new(fetcher: PlaylistFetcher, store: SharedStore) -> Self {
        Self {
            registry: PlaylistRegistry::load(store.clone()),
            extras: ExtrasStore::load(store.clone()),
            fetcher,
            store,
        }
    }

    pub fn registry(&self) -> &PlaylistRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PlaylistRegistry {
        &mut self.registry
    }

    pub fn extras(&self) -> &ExtrasStore {
        &self.extras
    }

    pub fn extras_mut(&mut self) -> &mut ExtrasStore {
        &mut self.extras
    }

    /// URL of the last remote playlist loaded successfully
    pub fn last_url(&self) -> Option<String> {
        self.store.get(LAST_URL_KEY).filter(|url| !url.is_empty())
    }

    /// Fetch and activate a remote playlist.
    ///
    /// On failure the bundled sample is activated unless `silent` is set.
    pub async fn load_url(&mut self, url: &str, silent: bool, options: LoadOptions) -> LoadReport {
        let url = url.trim();
        if url.is_empty() {
            return LoadReport {
                error: Some(LoadError::EmptyUrl.user_message()),
                ..LoadReport::default()
            };
        }

        match self.fetcher.fetch_text(url).await {
            Ok(text) => {
                let name = self.remote_name(url, &options);
                let meta = PlaylistMeta {
                    name,
                    source: url.to_string(),
                };
                let playlist = self.activate(&text, meta, &options);
                if let Err(e) = self.store.set(LAST_URL_KEY, url) {
                    error!(error = %e, "failed to remember last playlist URL");
                }
                info!(url, channels = playlist.channels.len(), "playlist loaded");
                Self::report(playlist)
            }
            Err(e) => {
                let e = LoadError::from(e);
                warn!(url, error = %e, silent, "playlist load failed");
                if silent {
                    return LoadReport {
                        error: Some(e.user_message()),
                        ..LoadReport::default()
                    };
                }
                LoadReport {
                    playlist: Some(self.load_sample()),
                    error: Some(e.user_message()),
                    fell_back: true,
                }
            }
        }
    }

    /// Read and activate a local playlist file, keyed by its file name.
    pub async fn load_file(&mut self, path: &Path) -> LoadReport {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(source) => {
                let e = LoadError::ReadFile {
                    path: path.display().to_string(),
                    source,
                };
                warn!(error = %e, "playlist file unreadable");
                return LoadReport {
                    error: Some(e.user_message()),
                    ..LoadReport::default()
                };
            }
        };

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let meta = PlaylistMeta {
            name: file_name.clone(),
            source: file_name,
        };
        let playlist = self.activate(&text, meta, &LoadOptions::default());
        forget(self.store.as_ref(), LAST_URL_KEY);
        info!(file = %path.display(), channels = playlist.channels.len(), "playlist file loaded");
        Self::report(playlist)
    }

    /// A URL is fetched, anything else is read from disk
    pub async fn load_source(&mut self, source: &str, silent: bool) -> LoadReport {
        if is_remote_source(source) {
            self.load_url(source, silent, LoadOptions::default()).await
        } else {
            self.load_file(Path::new(source)).await
        }
    }

    pub fn load_sample(&mut self) -> ActivePlaylist {
        let meta = PlaylistMeta {
            name: SAMPLE_NAME.to_string(),
            source: SAMPLE_SOURCE.to_string(),
        };
        self.activate(SAMPLE_M3U, meta, &LoadOptions::default())
    }

    /// Parse `text`, append the source's manual channels and record the source.
    pub fn activate(&mut self, text: &str, meta: PlaylistMeta, options: &LoadOptions) -> ActivePlaylist {
        let parsed = parse_playlist(text);

        let name = options
            .fallback_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| Some(meta.name.clone()).filter(|n| !n.is_empty()))
            .or_else(|| self.registry.get(&meta.source).map(|e| e.name.clone()))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| meta.source.clone());
        self.registry.upsert(&meta.source, &name);

        let initial = options
            .preferred_url
            .as_deref()
            .and_then(|url| parsed.channels.iter().find(|ch| ch.url == url))
            .or_else(|| parsed.channels.first())
            .cloned();
        if let Some(url) = &options.preferred_url
            && initial.as_ref().is_none_or(|ch| &ch.url != url)
        {
            debug!(%url, "preferred channel not in playlist");
        }

        let channels = self.extras.merge(&meta.source, parsed.channels);
        ActivePlaylist {
            meta: PlaylistMeta {
                name,
                source: meta.source,
            },
            channels,
            epg_url: parsed.epg_url,
            initial,
        }
    }

    /// Caller's name, then the stored one, then the URL host
    fn remote_name(&self, url: &str, options: &LoadOptions) -> String {
        if let Some(name) = options.fallback_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        if let Some(entry) = self.registry.get(url).filter(|e| !e.name.is_empty()) {
            return entry.name.clone();
        }
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| REMOTE_FALLBACK_NAME.to_string())
    }

    fn report(playlist: ActivePlaylist) -> LoadReport {
        let error = playlist
            .initial
            .is_none()
            .then(|| NO_CHANNELS_MESSAGE.to_string());
        LoadReport {
            playlist: Some(playlist),
            error,
            fell_back: false,
        }
    }
}
