//! Core of an IPTV playlist player: M3U parsing and grouping, playlist
//! history with manual channels, persisted preferences and the playback
//! session that binds one channel at a time to a video surface.

pub mod app;
pub mod config;
pub mod fetch;
pub mod loader;
pub mod playlist;
pub mod registry;
pub mod session;
pub mod settings;
pub mod storage;

pub use app::Player;
pub use config::Config;
pub use playlist::{Channel, Playlist};
