//! In-memory surface and decoder used by the session tests.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use super::{
    AdaptiveDecoder, DecoderConfig, DecoderFactory, EventSender, PlaybackSession, PlaybackSurface,
    SessionInput, SinkHandle,
};
use crate::playlist::Channel;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Bind(u64),
    SetSource(String),
    Play,
    Pause,
}

#[derive(Debug)]
pub struct FakeSurface {
    pub native_hls: bool,
    pub time: f64,
    pub duration: f64,
    pub buffered: Option<f64>,
    pub volume: f64,
    pub muted: bool,
    pub calls: Vec<SurfaceCall>,
    pub events: Option<EventSender>,
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self {
            native_hls: false,
            time: 0.0,
            duration: f64::NAN,
            buffered: None,
            volume: 1.0,
            muted: false,
            calls: Vec::new(),
            events: None,
        }
    }
}

impl PlaybackSurface for FakeSurface {
    fn sink(&self) -> SinkHandle {
        SinkHandle(7)
    }

    fn can_play_native_hls(&self) -> bool {
        self.native_hls
    }

    fn bind(&mut self, events: EventSender) {
        self.calls.push(SurfaceCall::Bind(events.binding().0));
        self.events = Some(events);
    }

    fn set_source(&mut self, url: &str) {
        self.calls.push(SurfaceCall::SetSource(url.to_string()));
    }

    fn play(&mut self) {
        self.calls.push(SurfaceCall::Play);
    }

    fn pause(&mut self) {
        self.calls.push(SurfaceCall::Pause);
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn buffered_end(&self) -> Option<f64> {
        self.buffered
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

pub type CallLog = Rc<RefCell<Vec<String>>>;

pub struct FakeDecoder {
    id: u64,
    log: CallLog,
}

impl AdaptiveDecoder for FakeDecoder {
    fn load_source(&mut self, url: &str) {
        self.log.borrow_mut().push(format!("load {} {url}", self.id));
    }

    fn attach_media(&mut self, sink: SinkHandle) {
        self.log.borrow_mut().push(format!("attach {} {}", self.id, sink.0));
    }

    fn destroy(&mut self) {
        self.log.borrow_mut().push(format!("destroy {}", self.id));
    }
}

pub struct FakeFactory {
    pub supported: bool,
    pub log: CallLog,
    pub senders: Rc<RefCell<Vec<EventSender>>>,
}

impl FakeFactory {
    pub fn supported() -> Self {
        Self {
            supported: true,
            log: CallLog::default(),
            senders: Rc::default(),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::supported()
        }
    }
}

impl DecoderFactory for FakeFactory {
    type Decoder = FakeDecoder;

    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&mut self, _config: &DecoderConfig, events: EventSender) -> FakeDecoder {
        let id = events.binding().0;
        self.log.borrow_mut().push(format!("create {id}"));
        self.senders.borrow_mut().push(events);
        FakeDecoder {
            id,
            log: self.log.clone(),
        }
    }
}

pub fn session(
    surface: FakeSurface,
    factory: FakeFactory,
) -> (
    PlaybackSession<FakeSurface, FakeFactory>,
    UnboundedReceiver<SessionInput>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PlaybackSession::new(surface, factory, DecoderConfig::default(), tx),
        rx,
    )
}

/// News (HLS), Sports (direct), Movies (HLS)
pub fn channels() -> Vec<Channel> {
    vec![
        Channel::manual(0, "News", "http://x/news.m3u8"),
        Channel::manual(1, "Sports", "http://x/sports.mp4"),
        Channel::manual(2, "Movies", "http://x/movies.m3u8"),
    ]
}
