//! Run loop: pulls updates from a transport and hands them to the per-chat sequencer.

use crate::shutdown::Shutdown;
use crate::source::UpdateSource;
use dispatcher::ChatSequencer;
use tracing::{info, instrument, warn};

/// Submits updates until the source closes, then drains the sequencer with whatever is left of
/// the shutdown grace. Returns whether every in-flight dispatch cycle finished in time.
#[instrument(skip_all)]
pub async fn run_transport<S: UpdateSource>(
    mut source: S,
    sequencer: ChatSequencer,
    shutdown: &Shutdown,
) -> bool {
    info!("step: transport loop started");
    let mut received: u64 = 0;

    while let Some(update) = source.next_update().await {
        received += 1;
        info!(
            chat_id = %update.chat_id(),
            sender_id = %update.sender_id(),
            source_id = %update.source_id(),
            command = ?update.command_token(),
            "Received update"
        );
        if let Err(e) = sequencer.submit(update) {
            warn!(error = %e, "Sequencer refused update, stopping transport");
            break;
        }
    }

    info!(received, "step: transport closed, draining");
    sequencer.shutdown(shutdown.remaining()).await
}
