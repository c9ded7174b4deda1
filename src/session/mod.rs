//! Playback session: the state machine that owns the current channel, the
//! decoder bound to it and the state the UI observes.
//!
//! ```text
//! Idle --select--> Loading --ready--> Playing <--toggle--> Paused
//!                     |                  |
//!                     +----fatal---------+--> Error --retry_next--> Loading
//! ```

pub mod decoder;
pub mod driver;
pub mod event;
pub mod surface;

#[cfg(test)]
pub(crate) mod testing;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

pub use decoder::{AdaptiveDecoder, DecoderBinding, DecoderConfig, DecoderEvent, DecoderFactory, NoDecoder};
pub use driver::run_session;
pub use event::{BindingId, Command, EventKind, EventSender, SessionEvent, SessionInput};
pub use surface::{PlayRejection, PlaybackSurface, Progress, SinkHandle, SurfaceEvent};

use crate::playlist::Channel;

pub const LOAD_FAILED_MESSAGE: &str = "Stream failed to load. Try another channel.";
pub const PLAY_FAILED_MESSAGE: &str = "Stream failed to play. Try another channel.";
pub const AUTOPLAY_BLOCKED_MESSAGE: &str = "Autoplay was blocked. Click play to start.";

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// No channel selected
    Idle,
    /// Source bound, stream not ready yet
    Loading,
    Playing,
    Paused,
    Error { message: String },
}

/// How the current channel reaches the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Adaptive,
    Direct,
}

/// Flattened view of the session for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub current_channel: Option<Channel>,
    pub playing: bool,
    pub stream_loading: bool,
    pub player_error: Option<String>,
    pub status: Option<String>,
    pub progress: Progress,
    pub volume: f64,
    pub muted: bool,
}

struct Binding<D: AdaptiveDecoder> {
    id: BindingId,
    mode: BindMode,
    decoder: Option<DecoderBinding<D>>,
    /// Selection requested autoplay and no outcome has arrived yet
    play_pending: bool,
}

impl<D: AdaptiveDecoder> Binding<D> {
    fn release(self) {
        if let Some(decoder) = self.decoder {
            decoder.release();
        }
    }
}

pub struct PlaybackSession<S: PlaybackSurface, F: DecoderFactory> {
    surface: S,
    factory: F,
    config: DecoderConfig,
    events: UnboundedSender<SessionInput>,
    autoplay: bool,
    next_binding: u64,
    binding: Option<Binding<F::Decoder>>,
    current: Option<Channel>,
    phase: Phase,
    progress: Progress,
    status: Option<String>,
    volume: f64,
    muted: bool,
}

impl<S: PlaybackSurface, F: DecoderFactory> PlaybackSession<S, F> {
    /// `events` is the queue collaborator events are delivered to; feed
    /// them back through [`PlaybackSession::handle_event`] or run the
    /// session with [`run_session`].
    pub fn new(
        surface: S,
        factory: F,
        config: DecoderConfig,
        events: UnboundedSender<SessionInput>,
    ) -> Self {
        Self {
            surface,
            factory,
            config,
            events,
            autoplay: true,
            next_binding: 0,
            binding: None,
            current: None,
            phase: Phase::Idle,
            progress: Progress::default(),
            status: None,
            volume: 1.0,
            muted: false,
        }
    }

    /// Whether selecting a channel starts playback right away
    pub fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn current_channel(&self) -> Option<&Channel> {
        self.current.as_ref()
    }

    pub fn binding_id(&self) -> Option<BindingId> {
        self.binding.as_ref().map(|b| b.id)
    }

    pub fn bind_mode(&self) -> Option<BindMode> {
        self.binding.as_ref().map(|b| b.mode)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase, Phase::Playing)
    }

    pub fn stream_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading)
    }

    pub fn player_error(&self) -> Option<&str> {
        match &self.phase {
            Phase::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            current_channel: self.current.clone(),
            playing: self.is_playing(),
            stream_loading: self.stream_loading(),
            player_error: self.player_error().map(str::to_string),
            status: self.status.clone(),
            progress: self.progress,
            volume: self.volume,
            muted: self.muted,
        }
    }

    /// Bind `channel` and start loading it, releasing any previous binding first.
    pub fn select_channel(&mut self, channel: Channel) {
        self.release_binding();

        self.next_binding += 1;
        let id = BindingId(self.next_binding);
        let sender = EventSender::new(id, self.events.clone());
        self.surface.bind(sender.clone());

        let adaptive = channel.is_hls()
            && self.factory.is_supported()
            && !self.surface.can_play_native_hls();

        let decoder = if adaptive {
            let mut decoder = self.factory.create(&self.config, sender);
            decoder.load_source(&channel.url);
            decoder.attach_media(self.surface.sink());
            Some(DecoderBinding::new(id, decoder))
        } else {
            self.surface.set_source(&channel.url);
            None
        };
        let mode = if adaptive { BindMode::Adaptive } else { BindMode::Direct };
        info!(binding = ?id, ?mode, name = %channel.name, url = %channel.url, "channel selected");

        self.binding = Some(Binding {
            id,
            mode,
            decoder,
            play_pending: false,
        });
        self.current = Some(channel);
        self.progress = Progress::default();
        self.status = None;
        self.phase = Phase::Loading;

        if self.autoplay {
            if let Some(binding) = self.binding.as_mut() {
                binding.play_pending = true;
            }
            self.surface.play();
        } else {
            self.surface.pause();
            self.phase = Phase::Paused;
        }
    }

    pub fn toggle_play_pause(&mut self) {
        match self.phase {
            Phase::Playing => {
                self.surface.pause();
                self.phase = Phase::Paused;
            }
            Phase::Paused => {
                self.status = None;
                self.surface.play();
                self.phase = Phase::Playing;
            }
            Phase::Idle | Phase::Loading | Phase::Error { .. } => {}
        }
    }

    /// Select the channel after the current one in `visible`, wrapping around.
    pub fn next(&mut self, visible: &[Channel]) -> Option<Channel> {
        let target = self.neighbour(visible, Direction::Forward)?;
        self.select_channel(target.clone());
        Some(target)
    }

    /// Select the channel before the current one in `visible`, wrapping around.
    pub fn previous(&mut self, visible: &[Channel]) -> Option<Channel> {
        let target = self.neighbour(visible, Direction::Backward)?;
        self.select_channel(target.clone());
        Some(target)
    }

    /// From `Error`, move on to the next visible channel.
    pub fn retry_next(&mut self, visible: &[Channel]) -> Option<Channel> {
        if !matches!(self.phase, Phase::Error { .. }) {
            return None;
        }
        self.next(visible)
    }

    /// Leave `Error` without changing channel.
    pub fn dismiss_error(&mut self) {
        if matches!(self.phase, Phase::Error { .. }) {
            self.phase = Phase::Paused;
        }
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Clamp to `0.0..=1.0`; a volume of zero counts as muted.
    pub fn set_volume(&mut self, volume: f64) {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 1.0 };
        self.volume = volume;
        self.muted = volume == 0.0;
        self.apply_volume();
    }

    pub fn toggle_mute(&mut self) {
        if self.muted {
            self.muted = false;
        } else if self.volume > 0.0 {
            self.muted = true;
        } else {
            self.volume = 0.5;
            self.muted = false;
        }
        self.apply_volume();
    }

    fn apply_volume(&mut self) {
        self.surface.set_volume(self.volume);
        self.surface.set_muted(self.muted);
    }

    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Select(channel) => self.select_channel(channel),
            Command::TogglePlayPause => self.toggle_play_pause(),
            Command::Next(visible) => {
                self.next(&visible);
            }
            Command::Previous(visible) => {
                self.previous(&visible);
            }
            Command::RetryNext(visible) => {
                self.retry_next(&visible);
            }
            Command::DismissError => self.dismiss_error(),
            Command::SetVolume(volume) => self.set_volume(volume),
            Command::ToggleMute => self.toggle_mute(),
        }
    }

    pub fn handle_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Event(event) => self.handle_event(event),
            SessionInput::Command(command) => self.apply(command),
        }
    }

    /// Apply a collaborator event. Events from released bindings are ignored.
    pub fn handle_event(&mut self, event: SessionEvent) {
        let Some(binding) = self.binding.as_mut() else {
            debug!(binding = ?event.binding, "no active binding, event discarded");
            return;
        };
        if binding.id != event.binding {
            debug!(stale = ?event.binding, active = ?binding.id, "stale event discarded");
            return;
        }

        match event.kind {
            EventKind::Decoder(DecoderEvent::ManifestParsed) => self.on_ready(),
            EventKind::Decoder(DecoderEvent::Error { fatal: false, details }) => {
                debug!(binding = ?event.binding, %details, "non-fatal decoder error ignored");
            }
            EventKind::Decoder(DecoderEvent::Error { fatal: true, details }) => {
                warn!(binding = ?event.binding, %details, "fatal decoder error");
                self.fail(LOAD_FAILED_MESSAGE);
            }
            EventKind::Surface(event) => self.on_surface(event),
        }
    }

    fn on_surface(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::CanPlay => {
                self.on_ready();
                self.sample_progress();
            }
            SurfaceEvent::Playing => {
                if let Some(binding) = self.binding.as_mut() {
                    binding.play_pending = false;
                }
                self.status = None;
                self.phase = Phase::Playing;
                self.sample_progress();
            }
            SurfaceEvent::Pause | SurfaceEvent::Ended => {
                if matches!(self.phase, Phase::Playing | Phase::Loading) {
                    self.phase = Phase::Paused;
                }
                self.sample_progress();
            }
            SurfaceEvent::Error(details) => {
                warn!(details = details.as_deref().unwrap_or("unknown"), "playback surface error");
                self.fail(PLAY_FAILED_MESSAGE);
            }
            SurfaceEvent::TimeUpdate | SurfaceEvent::Progress | SurfaceEvent::LoadedMetadata => {
                self.sample_progress();
            }
            SurfaceEvent::PlayRejected(rejection) => {
                let autoplay = self
                    .binding
                    .as_mut()
                    .is_some_and(|b| std::mem::take(&mut b.play_pending));
                if matches!(self.phase, Phase::Error { .. }) {
                    return;
                }
                if let PlayRejection::Failed(reason) = &rejection {
                    debug!(%reason, "play request failed");
                }
                if autoplay {
                    info!("autoplay was blocked");
                    self.status = Some(AUTOPLAY_BLOCKED_MESSAGE.to_string());
                } else {
                    info!("play request was rejected");
                }
                self.phase = Phase::Paused;
            }
        }
    }

    /// The stream is ready: playing if a start was requested, paused otherwise.
    fn on_ready(&mut self) {
        if self.phase != Phase::Loading {
            return;
        }
        let play_pending = self.binding.as_ref().is_some_and(|b| b.play_pending);
        self.phase = if play_pending { Phase::Playing } else { Phase::Paused };
    }

    fn fail(&mut self, message: &str) {
        if let Some(binding) = self.binding.as_mut() {
            binding.play_pending = false;
        }
        self.phase = Phase::Error {
            message: message.to_string(),
        };
    }

    fn sample_progress(&mut self) {
        self.progress = Progress::sample(&self.surface);
    }

    fn neighbour(&self, visible: &[Channel], direction: Direction) -> Option<Channel> {
        let current = self.current.as_ref()?;
        if visible.is_empty() {
            return None;
        }
        let len = visible.len();
        let position = visible.iter().position(|ch| ch.is_same(current));

        let target = match (position, direction) {
            (Some(pos), Direction::Forward) => (pos + 1) % len,
            (Some(pos), Direction::Backward) => (pos + len - 1) % len,
            (None, Direction::Forward) => 0,
            (None, Direction::Backward) => len - 1,
        };
        visible.get(target).cloned()
    }

    fn release_binding(&mut self) {
        if let Some(binding) = self.binding.take() {
            debug!(binding = ?binding.id, "releasing binding");
            binding.release();
        }
    }

    /// Release the decoder and return to `Idle`.
    pub fn teardown(&mut self) {
        self.release_binding();
        self.surface.pause();
        self.current = None;
        self.progress = Progress::default();
        self.status = None;
        self.phase = Phase::Idle;
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeFactory, FakeSurface, SurfaceCall, channels, session};
    use super::*;

    fn decoder_event(id: BindingId, event: DecoderEvent) -> SessionEvent {
        SessionEvent {
            binding: id,
            kind: EventKind::Decoder(event),
        }
    }

    fn surface_event(id: BindingId, event: SurfaceEvent) -> SessionEvent {
        SessionEvent {
            binding: id,
            kind: EventKind::Surface(event),
        }
    }

    #[test]
    fn test_starts_idle() {
        let (session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        assert_eq!(session.phase(), &Phase::Idle);
        let state = session.state();
        assert!(state.current_channel.is_none());
        assert!(!state.playing);
        assert!(!state.stream_loading);
    }

    #[test]
    fn test_select_hls_binds_decoder() {
        let factory = FakeFactory::supported();
        let log = factory.log.clone();
        let (mut session, _rx) = session(FakeSurface::default(), factory);
        let list = channels();

        session.select_channel(list[0].clone());

        assert_eq!(session.phase(), &Phase::Loading);
        assert_eq!(session.bind_mode(), Some(BindMode::Adaptive));
        assert!(session.stream_loading());
        assert_eq!(
            log.borrow().as_slice(),
            &["create 1", "load 1 http://x/news.m3u8", "attach 1 7"]
        );
        assert_eq!(session.surface().calls.last(), Some(&SurfaceCall::Play));
    }

    #[test]
    fn test_select_direct_source_without_decoder() {
        let factory = FakeFactory::supported();
        let log = factory.log.clone();
        let (mut session, _rx) = session(FakeSurface::default(), factory);
        let list = channels();

        session.select_channel(list[1].clone());

        assert_eq!(session.bind_mode(), Some(BindMode::Direct));
        assert!(log.borrow().is_empty());
        assert!(session
            .surface()
            .calls
            .contains(&SurfaceCall::SetSource("http://x/sports.mp4".to_string())));
    }

    #[test]
    fn test_native_hls_and_unsupported_decoder_use_direct_source() {
        let surface = FakeSurface {
            native_hls: true,
            ..FakeSurface::default()
        };
        let (mut session, _rx) = session(surface, FakeFactory::supported());
        session.select_channel(channels()[0].clone());
        assert_eq!(session.bind_mode(), Some(BindMode::Direct));

        let (mut session, _rx) = session_unsupported();
        session.select_channel(channels()[0].clone());
        assert_eq!(session.bind_mode(), Some(BindMode::Direct));
    }

    fn session_unsupported() -> (
        PlaybackSession<FakeSurface, FakeFactory>,
        tokio::sync::mpsc::UnboundedReceiver<SessionInput>,
    ) {
        session(FakeSurface::default(), FakeFactory::unsupported())
    }

    #[test]
    fn test_manifest_parsed_with_autoplay_plays() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.select_channel(channels()[0].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(decoder_event(id, DecoderEvent::ManifestParsed));
        assert_eq!(session.phase(), &Phase::Playing);
        assert!(!session.stream_loading());

        session.handle_event(surface_event(id, SurfaceEvent::Playing));
        assert!(session.is_playing());
    }

    #[test]
    fn test_without_autoplay_settles_paused() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.set_autoplay(false);
        session.select_channel(channels()[0].clone());

        assert_eq!(session.phase(), &Phase::Paused);
        assert!(!session.stream_loading());
        assert!(!session.surface().calls.contains(&SurfaceCall::Play));

        let id = session.binding_id().unwrap();
        session.handle_event(decoder_event(id, DecoderEvent::ManifestParsed));
        assert_eq!(session.phase(), &Phase::Paused);

        session.toggle_play_pause();
        assert_eq!(session.phase(), &Phase::Playing);
        assert_eq!(session.surface().calls.last(), Some(&SurfaceCall::Play));
    }

    #[test]
    fn test_fatal_decoder_error_enters_error() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.select_channel(channels()[0].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(decoder_event(
            id,
            DecoderEvent::Error {
                fatal: false,
                details: "fragLoadError".to_string(),
            },
        ));
        assert_eq!(session.phase(), &Phase::Loading);

        session.handle_event(decoder_event(
            id,
            DecoderEvent::Error {
                fatal: true,
                details: "manifestLoadError".to_string(),
            },
        ));
        let state = session.state();
        assert_eq!(state.player_error.as_deref(), Some(LOAD_FAILED_MESSAGE));
        assert!(!state.stream_loading);
        assert!(!state.playing);

        // readiness does not leave the error state
        session.handle_event(decoder_event(id, DecoderEvent::ManifestParsed));
        assert!(session.player_error().is_some());
        session.toggle_play_pause();
        assert!(session.player_error().is_some());
    }

    #[test]
    fn test_surface_error_enters_error() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(surface_event(id, SurfaceEvent::Error(Some("decode".to_string()))));
        assert_eq!(session.player_error(), Some(PLAY_FAILED_MESSAGE));

        session.dismiss_error();
        assert_eq!(session.phase(), &Phase::Paused);
    }

    #[test]
    fn test_autoplay_blocked_is_advisory() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(surface_event(id, SurfaceEvent::PlayRejected(PlayRejection::NotAllowed)));
        assert_eq!(session.phase(), &Phase::Paused);
        assert_eq!(session.status(), Some(AUTOPLAY_BLOCKED_MESSAGE));
        assert!(session.player_error().is_none());

        // a later ready event keeps the session paused
        session.handle_event(surface_event(id, SurfaceEvent::CanPlay));
        assert_eq!(session.phase(), &Phase::Paused);

        session.toggle_play_pause();
        assert!(session.status().is_none());
        assert!(session.is_playing());
    }

    #[test]
    fn test_rejected_manual_play_is_not_autoplay() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.set_autoplay(false);
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.toggle_play_pause();
        assert!(session.is_playing());

        session.handle_event(surface_event(id, SurfaceEvent::PlayRejected(PlayRejection::NotAllowed)));
        assert_eq!(session.phase(), &Phase::Paused);
        assert!(session.status().is_none());
        assert!(session.player_error().is_none());
    }

    #[test]
    fn test_blocked_after_playing_is_not_autoplay() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(surface_event(id, SurfaceEvent::Playing));
        session.toggle_play_pause();
        session.toggle_play_pause();
        session.handle_event(surface_event(id, SurfaceEvent::PlayRejected(PlayRejection::Failed("aborted".to_string()))));
        assert_eq!(session.phase(), &Phase::Paused);
        assert!(session.status().is_none());
    }

    #[test]
    fn test_late_surface_error_from_previous_channel_is_discarded() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        let list = channels();

        session.select_channel(list[1].clone());
        let first = session.binding_id().unwrap();
        session.select_channel(list[2].clone());
        let second = session.binding_id().unwrap();

        session.handle_event(surface_event(first, SurfaceEvent::Error(Some("decode".to_string()))));
        assert_eq!(session.phase(), &Phase::Loading);
        assert!(session.player_error().is_none());

        session.handle_event(surface_event(first, SurfaceEvent::Playing));
        assert_eq!(session.phase(), &Phase::Loading);

        session.handle_event(surface_event(second, SurfaceEvent::Playing));
        assert!(session.is_playing());
        assert_eq!(session.current_channel().unwrap().index, 2);
    }

    #[test]
    fn test_late_events_from_previous_channel_are_discarded() {
        let factory = FakeFactory::supported();
        let log = factory.log.clone();
        let (mut session, _rx) = session(FakeSurface::default(), factory);
        let list = channels();

        session.select_channel(list[0].clone());
        let first = session.binding_id().unwrap();
        session.select_channel(list[2].clone());
        let second = session.binding_id().unwrap();
        assert_ne!(first, second);

        // the first decoder was destroyed before the second was created
        let calls = log.borrow().clone();
        let destroy = calls.iter().position(|c| c == "destroy 1").unwrap();
        let create = calls.iter().position(|c| c == "create 2").unwrap();
        assert!(destroy < create);

        session.handle_event(decoder_event(
            first,
            DecoderEvent::Error {
                fatal: true,
                details: "late".to_string(),
            },
        ));
        assert_eq!(session.phase(), &Phase::Loading);
        session.handle_event(decoder_event(first, DecoderEvent::ManifestParsed));
        assert_eq!(session.phase(), &Phase::Loading);

        session.handle_event(decoder_event(second, DecoderEvent::ManifestParsed));
        assert_eq!(session.phase(), &Phase::Playing);
        assert_eq!(session.current_channel().unwrap().index, 2);
    }

    #[test]
    fn test_next_and_previous_wrap() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        let list = channels();

        assert!(session.next(&list).is_none());

        session.select_channel(list[2].clone());
        assert_eq!(session.next(&list).unwrap().index, 0);
        assert_eq!(session.previous(&list).unwrap().index, 2);
        assert_eq!(session.previous(&list).unwrap().index, 1);
        assert!(session.next(&[]).is_none());
    }

    #[test]
    fn test_next_cycles_back_to_start() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        let list = channels();

        for start in &list {
            session.select_channel(start.clone());
            for _ in 0..list.len() {
                session.next(&list);
            }
            assert!(session.current_channel().unwrap().is_same(start));
            for _ in 0..list.len() {
                session.previous(&list);
            }
            assert!(session.current_channel().unwrap().is_same(start));
        }
    }

    #[test]
    fn test_identity_uses_url_and_index() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        let mut list = channels();
        // same URL as the first channel, different index
        list[1].url = list[0].url.clone();

        session.select_channel(list[1].clone());
        assert_eq!(session.next(&list).unwrap().index, 2);
    }

    #[test]
    fn test_current_outside_visible_list() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        let list = channels();
        session.select_channel(list[0].clone());

        let visible = vec![list[1].clone(), list[2].clone()];
        assert_eq!(session.next(&visible).unwrap().index, 1);

        session.select_channel(list[0].clone());
        assert_eq!(session.previous(&visible).unwrap().index, 2);
    }

    #[test]
    fn test_retry_next_only_from_error() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        let list = channels();
        session.select_channel(list[0].clone());
        assert!(session.retry_next(&list).is_none());

        let id = session.binding_id().unwrap();
        session.handle_event(surface_event(id, SurfaceEvent::Error(None)));
        let next = session.retry_next(&list).unwrap();
        assert_eq!(next.index, 1);
        assert_eq!(session.phase(), &Phase::Loading);
        assert!(session.player_error().is_none());
    }

    #[test]
    fn test_progress_sampling() {
        let surface = FakeSurface {
            time: 12.5,
            duration: f64::INFINITY,
            buffered: Some(20.0),
            ..FakeSurface::default()
        };
        let (mut session, _rx) = session(surface, FakeFactory::supported());
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(surface_event(id, SurfaceEvent::TimeUpdate));
        assert_eq!(
            session.progress(),
            Progress {
                time: 12.5,
                duration: 0.0,
                buffered: 0.0
            }
        );
        assert_eq!(session.phase(), &Phase::Loading);
    }

    #[test]
    fn test_progress_with_known_duration() {
        let surface = FakeSurface {
            time: 3.0,
            duration: 90.0,
            buffered: Some(30.0),
            ..FakeSurface::default()
        };
        let (mut session, _rx) = session(surface, FakeFactory::supported());
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(surface_event(id, SurfaceEvent::Progress));
        assert_eq!(session.progress().duration, 90.0);
        assert_eq!(session.progress().buffered, 30.0);
    }

    #[test]
    fn test_pause_and_ended_events() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.select_channel(channels()[1].clone());
        let id = session.binding_id().unwrap();

        session.handle_event(surface_event(id, SurfaceEvent::Playing));
        session.handle_event(surface_event(id, SurfaceEvent::Pause));
        assert_eq!(session.phase(), &Phase::Paused);

        session.handle_event(surface_event(id, SurfaceEvent::Playing));
        session.handle_event(surface_event(id, SurfaceEvent::Ended));
        assert_eq!(session.phase(), &Phase::Paused);
    }

    #[test]
    fn test_toggle_is_noop_while_loading() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());
        session.toggle_play_pause();
        assert_eq!(session.phase(), &Phase::Idle);

        session.select_channel(channels()[0].clone());
        session.toggle_play_pause();
        assert_eq!(session.phase(), &Phase::Loading);
    }

    #[test]
    fn test_teardown_releases_decoder() {
        let factory = FakeFactory::supported();
        let log = factory.log.clone();
        let (mut session, _rx) = session(FakeSurface::default(), factory);
        session.select_channel(channels()[0].clone());

        session.teardown();
        assert_eq!(session.phase(), &Phase::Idle);
        assert!(session.current_channel().is_none());
        assert_eq!(log.borrow().last().map(String::as_str), Some("destroy 1"));

        let id = BindingId(1);
        session.handle_event(decoder_event(id, DecoderEvent::ManifestParsed));
        assert_eq!(session.phase(), &Phase::Idle);
    }

    #[test]
    fn test_dropping_session_releases_decoder() {
        let factory = FakeFactory::supported();
        let log = factory.log.clone();
        {
            let (mut session, _rx) = session(FakeSurface::default(), factory);
            session.select_channel(channels()[0].clone());
        }
        assert_eq!(log.borrow().last().map(String::as_str), Some("destroy 1"));
    }

    #[test]
    fn test_volume_and_mute() {
        let (mut session, _rx) = session(FakeSurface::default(), FakeFactory::supported());

        session.set_volume(1.7);
        assert_eq!(session.volume(), 1.0);
        assert!(!session.muted());

        session.toggle_mute();
        assert!(session.muted());
        session.toggle_mute();
        assert!(!session.muted());

        session.set_volume(0.0);
        assert!(session.muted());
        session.toggle_mute();
        assert!(!session.muted());
        session.set_volume(0.0);
        session.muted = false;
        session.toggle_mute();
        assert_eq!(session.volume(), 0.5);
        assert!(!session.muted());
        assert_eq!(session.surface().volume, 0.5);
    }

    #[test]
    fn test_decoder_events_arrive_through_queue() {
        let factory = FakeFactory::supported();
        let senders = factory.senders.clone();
        let (mut session, mut rx) = session(FakeSurface::default(), factory);
        session.select_channel(channels()[0].clone());

        senders.borrow()[0].decoder(DecoderEvent::ManifestParsed);
        let input = rx.try_recv().unwrap();
        session.handle_input(input);
        assert_eq!(session.phase(), &Phase::Playing);
    }
}
