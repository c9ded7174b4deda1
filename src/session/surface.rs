use super::event::EventSender;

/// Opaque reference to the video output a decoder attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    CanPlay,
    Playing,
    Pause,
    Ended,
    Error(Option<String>),
    TimeUpdate,
    Progress,
    LoadedMetadata,
    /// A `play()` request did not start playback
    PlayRejected(PlayRejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayRejection {
    /// Playback without a user gesture is not allowed
    NotAllowed,
    Failed(String),
}

/// The video element the session plays into.
///
/// `play` and `pause` are requests; their outcome arrives later as a
/// [`SurfaceEvent`] through the sender given to [`PlaybackSurface::bind`].
pub trait PlaybackSurface {
    fn sink(&self) -> SinkHandle;

    /// Whether HLS plays without an adaptive decoder
    fn can_play_native_hls(&self) -> bool;

    /// Route future events through `events`
    fn bind(&mut self, events: EventSender);

    /// Assign a source URL directly and start loading it
    fn set_source(&mut self, url: &str);

    fn play(&mut self);
    fn pause(&mut self);

    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    /// End of the last buffered range, if any
    fn buffered_end(&self) -> Option<f64>;

    fn set_volume(&mut self, volume: f64);
    fn set_muted(&mut self, muted: bool);
}

/// Playback position, all in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Progress {
    pub time: f64,
    /// Zero when unknown, e.g. live streams
    pub duration: f64,
    pub buffered: f64,
}

impl Progress {
    pub fn sample<S: PlaybackSurface + ?Sized>(surface: &S) -> Self {
        let time = finite_or_zero(surface.current_time());
        let duration = surface.duration();

        if !duration.is_finite() || duration <= 0.0 {
            return Self {
                time,
                duration: 0.0,
                buffered: 0.0,
            };
        }

        Self {
            time,
            duration,
            buffered: surface.buffered_end().map(finite_or_zero).unwrap_or(0.0),
        }
    }

    /// `m:ss`, or `0:00` when unknown
    pub fn format_time(seconds: f64) -> String {
        if !seconds.is_finite() || seconds <= 0.0 {
            return "0:00".to_string();
        }
        let total = seconds as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
