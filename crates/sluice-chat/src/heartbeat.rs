use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::channel::ResponseChannel;

/// Keep-alive task scoped to one streaming response
///
/// Writes a heartbeat comment whenever the channel has been idle for at least
/// one interval. Stopped explicitly on the normal paths; dropping the handle
/// cancels and aborts the task on every other path.
#[derive(Debug)]
pub struct Heartbeat {
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn spawn(channel: ResponseChannel, interval: Duration) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if channel.is_closed() {
                            break;
                        }
                        if channel.idle_for() >= interval {
                            channel.write_keep_alive().await;
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Cancel the task and wait for it to exit
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
            && e.is_panic()
        {
            tracing::warn!(error = %e, "heartbeat task panicked");
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
