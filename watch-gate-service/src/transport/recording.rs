//! In-memory transport: queued inbound updates, recorded outbound messages.

use super::{ChatTransport, InboundMessage, TransportError, Update};
use crate::models::UserIdentity;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

const IDLE_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
}

#[derive(Default)]
pub struct RecordingTransport {
    inbound: Mutex<VecDeque<Update>>,
    sent: Mutex<Vec<SentMessage>>,
    next_update_id: AtomicI64,
    fail_sends: AtomicBool,
    sent_notify: Notify,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text message from `user_id` in their private chat.
    pub fn push_text(&self, user_id: i64, text: impl Into<String>) {
        self.push_message(Some(InboundMessage {
            chat_id: user_id,
            user: UserIdentity::from(user_id),
            text: text.into(),
        }));
    }

    /// Queue an update with no text message (sticker, edit, ...).
    pub fn push_non_text(&self) {
        self.push_message(None);
    }

    fn push_message(&self, message: Option<InboundMessage>) {
        let update_id = self.next_update_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut queue) = self.inbound.lock() {
            queue.push_back(Update { update_id, message });
        }
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|message| message.chat_id == chat_id)
            .map(|message| message.text)
            .collect()
    }

    /// Wait until at least `count` messages have been sent, or `timeout`.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<SentMessage> {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.sent_notify.notified();
                if self.sent().len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.sent()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn poll(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let drained: Vec<Update> = {
            let mut queue = self
                .inbound
                .lock()
                .map_err(|_| TransportError::Connection("inbound queue poisoned".to_string()))?;
            queue.retain(|update| update.update_id >= offset);
            queue.drain(..).collect()
        };

        if drained.is_empty() {
            tokio::time::sleep(IDLE_POLL).await;
        }
        Ok(drained)
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Connection("send rejected".to_string()));
        }
        self.sent
            .lock()
            .map_err(|_| TransportError::Connection("outbox poisoned".to_string()))?
            .push(SentMessage {
                chat_id,
                text: text.to_string(),
            });
        self.sent_notify.notify_waiters();
        Ok(())
    }
}
