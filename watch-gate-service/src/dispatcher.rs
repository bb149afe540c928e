//! Long-poll loop that fans inbound updates out to handler tasks.

use crate::handlers::CommandHandler;
use crate::models::Reply;
use crate::services::metrics::record_update;
use crate::services::{UserThrottle, Verdict};
use crate::transport::{ChatTransport, InboundMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const MIN_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SWEEP_EVERY: Duration = Duration::from_secs(300);

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    handler: CommandHandler,
    throttle: UserThrottle,
    permits: Arc<Semaphore>,
    max_in_flight: u32,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        handler: CommandHandler,
        throttle: UserThrottle,
        max_in_flight: usize,
    ) -> Self {
        let max_in_flight = u32::try_from(max_in_flight.max(1)).unwrap_or(u32::MAX);
        Self {
            transport,
            handler,
            throttle,
            permits: Arc::new(Semaphore::new(max_in_flight as usize)),
            max_in_flight,
        }
    }

    /// Poll until `shutdown` resolves, then wait for in-flight handlers.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut offset: i64 = 0;
        let mut backoff = MIN_BACKOFF;
        let mut sweep = tokio::time::interval(SWEEP_EVERY);

        tracing::info!("Update dispatcher started");

        loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break,
                _ = sweep.tick() => {
                    self.throttle.sweep();
                    continue;
                }
                polled = self.transport.poll(offset) => polled,
            };

            match polled {
                Ok(updates) => {
                    backoff = MIN_BACKOFF;
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        match update.message {
                            Some(message) => self.dispatch(message).await,
                            None => record_update("non_text"),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, retry_in_ms = backoff.as_millis() as u64, "Polling for updates failed");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        tracing::info!("Update dispatcher stopping, draining in-flight handlers");
        let _ = self.permits.acquire_many(self.max_in_flight).await;
    }

    /// Spawn a handler task once a slot is free.
    async fn dispatch(&self, message: InboundMessage) {
        let verdict = self.throttle.check(&message.user);

        let Ok(permit) = self.permits.clone().acquire_owned().await else {
            return;
        };
        let transport = self.transport.clone();
        let handler = self.handler.clone();

        tokio::spawn(async move {
            let reply = match verdict {
                Verdict::Allowed => handler.handle(&message).await,
                Verdict::Throttled { notify } => {
                    record_update("throttled");
                    tracing::debug!(user_id = %message.user, "Message throttled");
                    notify.then_some(Reply::Throttled)
                }
            };

            if let Some(reply) = reply {
                if let Err(e) = transport.send(message.chat_id, &reply.text()).await {
                    tracing::warn!(
                        user_id = %message.user,
                        reply = reply.kind(),
                        error = %e,
                        "Failed to deliver reply"
                    );
                }
            }
            drop(permit);
        });
    }
}
