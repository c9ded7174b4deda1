use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use super::decoder::DecoderEvent;
use super::surface::SurfaceEvent;
use crate::playlist::Channel;

/// Identifies one source binding of the session.
///
/// Every channel selection starts a new binding; events raised under an
/// older binding are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Decoder(DecoderEvent),
    Surface(SurfaceEvent),
}

/// An event from a collaborator, tagged with the binding that raised it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub binding: BindingId,
    pub kind: EventKind,
}

/// User actions, delivered through the same queue as collaborator events
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Select(Channel),
    TogglePlayPause,
    /// Carries the currently visible channel list
    Next(Vec<Channel>),
    Previous(Vec<Channel>),
    RetryNext(Vec<Channel>),
    DismissError,
    SetVolume(f64),
    ToggleMute,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Event(SessionEvent),
    Command(Command),
}

/// Handed to the decoder and the surface at bind time.
///
/// Everything sent through it is tagged with that binding.
#[derive(Debug, Clone)]
pub struct EventSender {
    binding: BindingId,
    tx: UnboundedSender<SessionInput>,
}

impl EventSender {
    pub fn new(binding: BindingId, tx: UnboundedSender<SessionInput>) -> Self {
        Self { binding, tx }
    }

    pub fn binding(&self) -> BindingId {
        self.binding
    }

    pub fn decoder(&self, event: DecoderEvent) {
        self.send(EventKind::Decoder(event));
    }

    pub fn surface(&self, event: SurfaceEvent) {
        self.send(EventKind::Surface(event));
    }

    fn send(&self, kind: EventKind) {
        let event = SessionEvent {
            binding: self.binding,
            kind,
        };
        if self.tx.send(SessionInput::Event(event)).is_err() {
            debug!(binding = ?self.binding, "session closed, event dropped");
        }
    }
}
