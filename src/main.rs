use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use iptvdeck::config::{Config, ConfigError};
use iptvdeck::fetch::PlaylistFetcher;
use iptvdeck::loader::PlaylistLoader;
use iptvdeck::playlist::{GroupKey, group_by};
use iptvdeck::settings::{Settings, ViewMode};
use iptvdeck::storage::{FileStore, MemoryStore, SharedStore};

#[derive(Parser)]
#[command(name = "iptvdeck")]
#[command(version)]
#[command(about = "Inspect M3U playlists and manage iptvdeck's saved playlists and settings")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a playlist URL or file and print its groups and channels
    List {
        source: String,
        /// Only print channels of this group
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Show saved playlists, most recent first
    Playlists,
    /// Remove a saved playlist
    Forget { key: String },
    /// Remove every saved playlist
    Clear,
    /// Add a channel by hand to a saved playlist
    AddChannel {
        source: String,
        url: String,
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Show or change settings
    Settings {
        #[arg(long)]
        autoplay: Option<bool>,
        #[arg(long, value_enum)]
        view_mode: Option<ViewArg>,
        #[arg(long)]
        sidebar_visible: Option<bool>,
        #[arg(long)]
        per_page: Option<usize>,
        #[arg(long)]
        show_icons_only: Option<bool>,
        #[arg(long)]
        load_last_on_start: Option<bool>,
        #[arg(long)]
        resume_last_channel: Option<bool>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewArg {
    Side,
    Bottom,
}

impl From<ViewArg> for ViewMode {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Side => ViewMode::Side,
            ViewArg::Bottom => ViewMode::Bottom,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            if let ConfigError::ParseError(_) | ConfigError::ValidationError(_) = &e
                && let Ok(path) = Config::config_path()
            {
                eprintln!("\nCheck the config file at: {}", path.display());
            }
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let store = open_store(&config);
    if let Err(e) = run(cli.command, &config, store).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    let log_file = config.storage.data_dir().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        File::create(dir.join("iptvdeck.log")).ok()
    });

    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .init();
    } else {
        // Fallback to stderr if can't create log file
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn open_store(config: &Config) -> SharedStore {
    match config.storage.data_dir() {
        Some(dir) => {
            let store = FileStore::new(dir);
            info!(dir = %store.dir().display(), "using data directory");
            Arc::new(store)
        }
        None => {
            warn!("no data directory available, nothing will be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

async fn run(command: Command, config: &Config, store: SharedStore) -> Result<(), String> {
    let fetcher = PlaylistFetcher::new(config.fetch.retry_policy(), config.fetch.timeout());
    let mut loader = PlaylistLoader::new(fetcher, store.clone());

    match command {
        Command::List { source, group } => {
            let report = loader.load_source(&source, true).await;
            let Some(playlist) = report.playlist else {
                return Err(report.error.unwrap_or_else(|| "Unable to load playlist.".to_string()));
            };
            if let Some(error) = &report.error {
                eprintln!("{}", error);
            }

            println!("{} ({} channels)", playlist.meta.name, playlist.channels.len());
            if let Some(epg) = &playlist.epg_url {
                println!("EPG: {}", epg);
            }
            let groups = group_by(&playlist.channels, GroupKey::Group);
            for name in groups.sorted_names() {
                if group.as_deref().is_some_and(|g| !g.eq_ignore_ascii_case(&name)) {
                    continue;
                }
                let channels = groups.get(&name).unwrap_or_default();
                println!("\n[{}] {}", name, channels.len());
                for ch in channels {
                    println!("  {:>4}  {}  {}", ch.index, ch.name, ch.url);
                }
            }
        }
        Command::Playlists => {
            let entries = loader.registry().list_all();
            if entries.is_empty() {
                println!("No saved playlists. Try: iptvdeck list {}", config.playlist.default_url);
            }
            for entry in entries {
                let extras = loader.extras().get(&entry.url).len();
                if extras > 0 {
                    println!("{}  {}  (+{} manual)", entry.display_name(), entry.url, extras);
                } else {
                    println!("{}  {}", entry.display_name(), entry.url);
                }
            }
        }
        Command::Forget { key } => {
            if loader.registry().get(&key).is_none() {
                return Err(format!("no saved playlist named {}", key));
            }
            loader.registry_mut().remove(&key);
            println!("Removed {}", key);
        }
        Command::Clear => {
            loader.registry_mut().clear();
            println!("Cleared saved playlists");
        }
        Command::AddChannel { source, url, name } => {
            let channel = loader
                .extras_mut()
                .add(&source, &name, &url)
                .ok_or_else(|| "a channel URL is required".to_string())?;
            println!("Added {} to {}", channel.name, source);
        }
        Command::Settings {
            autoplay,
            view_mode,
            sidebar_visible,
            per_page,
            show_icons_only,
            load_last_on_start,
            resume_last_channel,
        } => {
            let mut settings = Settings::load(store.as_ref());
            let changed = autoplay.is_some()
                || view_mode.is_some()
                || sidebar_visible.is_some()
                || per_page.is_some()
                || show_icons_only.is_some()
                || load_last_on_start.is_some()
                || resume_last_channel.is_some();

            if changed {
                settings.update(store.as_ref(), |s| {
                    if let Some(v) = autoplay {
                        s.autoplay = v;
                    }
                    if let Some(v) = view_mode {
                        s.view_mode = v.into();
                    }
                    if let Some(v) = sidebar_visible {
                        s.sidebar_visible = v;
                    }
                    if let Some(v) = per_page {
                        s.per_page = v;
                    }
                    if let Some(v) = show_icons_only {
                        s.show_icons_only = v;
                    }
                    if let Some(v) = load_last_on_start {
                        s.load_last_on_start = v;
                    }
                    if let Some(v) = resume_last_channel {
                        s.resume_last_channel = v;
                    }
                });
            }

            let json = serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
    }

    Ok(())
}
