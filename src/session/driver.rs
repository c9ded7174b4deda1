use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{DecoderFactory, PlaybackSession, PlaybackSurface, SessionInput, SessionState};

/// Drive `session` from its input queue until cancelled or every sender is gone.
///
/// Inputs are applied one at a time in arrival order. After each one the
/// new state is published on `state`, if given. The session is torn down
/// on exit.
pub async fn run_session<S, F>(
    session: &mut PlaybackSession<S, F>,
    inputs: &mut UnboundedReceiver<SessionInput>,
    cancel: CancellationToken,
    state: Option<watch::Sender<SessionState>>,
) where
    S: PlaybackSurface,
    F: DecoderFactory,
{
    info!("playback session started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("playback session cancelled");
                break;
            }
            input = inputs.recv() => {
                let Some(input) = input else {
                    debug!("input queue closed");
                    break;
                };
                session.handle_input(input);
                if let Some(tx) = &state {
                    tx.send_replace(session.state());
                }
            }
        }
    }

    session.teardown();
    if let Some(tx) = &state {
        tx.send_replace(session.state());
    }
    info!("playback session stopped");
}
