use serde::Deserialize;
use tracing::debug;

use super::event::{BindingId, EventSender};
use super::surface::SinkHandle;

/// Options handed to every decoder instance
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_true")]
    pub enable_worker: bool,
    #[serde(default = "default_true")]
    pub low_latency_mode: bool,
    /// Seconds of already played media to keep buffered
    #[serde(default = "default_back_buffer")]
    pub back_buffer_length: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enable_worker: true,
            low_latency_mode: true,
            back_buffer_length: default_back_buffer(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_back_buffer() -> u32 {
    60
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderEvent {
    /// The manifest is loaded and playback can begin
    ManifestParsed,
    Error { fatal: bool, details: String },
}

/// An adaptive-bitrate stream decoder bound to one source.
pub trait AdaptiveDecoder {
    fn load_source(&mut self, url: &str);
    fn attach_media(&mut self, sink: SinkHandle);
    /// Stop all network activity and drop event subscriptions
    fn destroy(&mut self);
}

/// Creates decoder instances for the session.
pub trait DecoderFactory {
    type Decoder: AdaptiveDecoder;

    /// Whether decoding is possible on this platform at all
    fn is_supported(&self) -> bool;

    /// New instance reporting `ManifestParsed` and `Error` through `events`
    fn create(&mut self, config: &DecoderConfig, events: EventSender) -> Self::Decoder;
}

/// Exclusive ownership of a live decoder instance.
///
/// The decoder is destroyed exactly once: by [`DecoderBinding::release`] or,
/// failing that, when the binding is dropped.
pub struct DecoderBinding<D: AdaptiveDecoder> {
    id: BindingId,
    decoder: Option<D>,
}

impl<D: AdaptiveDecoder> DecoderBinding<D> {
    pub fn new(id: BindingId, decoder: D) -> Self {
        Self {
            id,
            decoder: Some(decoder),
        }
    }

    pub fn release(mut self) {
        self.destroy();
    }

    fn destroy(&mut self) {
        if let Some(mut decoder) = self.decoder.take() {
            decoder.destroy();
            debug!(binding = ?self.id, "decoder released");
        }
    }
}

impl<D: AdaptiveDecoder> Drop for DecoderBinding<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Factory for platforms without adaptive decoding; every channel is
/// assigned to the surface directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecoder;

impl AdaptiveDecoder for NoDecoder {
    fn load_source(&mut self, _url: &str) {}
    fn attach_media(&mut self, _sink: SinkHandle) {}
    fn destroy(&mut self) {}
}

impl DecoderFactory for NoDecoder {
    type Decoder = NoDecoder;

    fn is_supported(&self) -> bool {
        false
    }

    fn create(&mut self, _config: &DecoderConfig, _events: EventSender) -> Self::Decoder {
        NoDecoder
    }
}
