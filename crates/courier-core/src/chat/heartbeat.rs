//! Server-initiated heartbeat.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use courier_types::chat::ChatMessage;
use courier_types::config::ChatConfig;

use super::Outbox;

/// Emit the configured heartbeat into `outbox` until `cancel` fires or the
/// outbound direction closes. The first beat goes out immediately.
///
/// Resolves to the number of heartbeats queued.
pub fn spawn_heartbeat(
    outbox: Outbox,
    config: &ChatConfig,
    cancel: CancellationToken,
) -> JoinHandle<u64> {
    let period = config.heartbeat_interval();
    let user = config.heartbeat_user.clone();
    let message = config.heartbeat_message.clone();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut beats = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let queued = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                queued = outbox.send(ChatMessage::now(&user, &message)) => queued,
            };
            if queued.is_err() {
                break;
            }
            beats += 1;
            tracing::trace!(beats, "heartbeat queued");
        }

        beats
    })
}
