//! In-memory transport that answers prompts from a queue of canned replies.
//!
//! A queued reply is posted to the mailbox on the first poll after a send that was
//! not followed by a baseline read, which mirrors an operator answering the most
//! recent prompt. An empty queue leaves the bridge waiting until its timeout.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{InboundMessage, Transport};
use crate::errors::BridgeError;

#[derive(Default)]
struct Inner {
    mailbox: Vec<InboundMessage>,
    queue: VecDeque<(String, String)>,
    sent: Vec<String>,
    next_id: i64,
    awaiting: bool,
    fail_sends: bool,
}

impl Inner {
    fn post(&mut self, chat_id: &str, text: &str) {
        self.next_id += 1;
        self.mailbox.push(InboundMessage {
            update_id: self.next_id,
            chat_id: Some(chat_id.to_string()),
            text: Some(text.to_string()),
        });
    }
}

pub(crate) struct ScriptedTransport {
    chat_id: String,
    inner: Mutex<Inner>,
}

impl ScriptedTransport {
    pub(crate) fn new(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub(crate) fn with_replies<I, S>(chat_id: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let transport = Self::new(chat_id);
        for reply in replies {
            transport.queue_reply(reply.as_ref());
        }
        transport
    }

    pub(crate) fn queue_reply(&self, text: &str) {
        let chat = self.chat_id.clone();
        self.queue_reply_from(&chat, text);
    }

    /// Queue a message from another chat; it is delivered alongside the next own reply.
    pub(crate) fn queue_reply_from(&self, chat_id: &str, text: &str) {
        self.lock()
            .queue
            .push_back((chat_id.to_string(), text.to_string()));
    }

    /// Post a message right now, ahead of any prompt.
    pub(crate) fn post_from(&self, chat_id: &str, text: &str) {
        self.lock().post(chat_id, text);
    }

    pub(crate) fn fail_sends(&self) {
        self.lock().fail_sends = true;
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub(crate) fn pending_replies(&self) -> usize {
        self.lock().queue.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_message(&self, _chat_id: &str, text: &str) -> Result<(), BridgeError> {
        let mut inner = self.lock();
        if inner.fail_sends {
            return Err(BridgeError::Api {
                description: "scripted send failure".to_string(),
            });
        }
        inner.sent.push(text.to_string());
        inner.awaiting = true;
        Ok(())
    }

    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<InboundMessage>, BridgeError> {
        let mut inner = self.lock();
        if inner.awaiting {
            inner.awaiting = false;
            while let Some((chat, text)) = inner.queue.pop_front() {
                inner.post(&chat, &text);
                if chat == self.chat_id {
                    break;
                }
            }
        }
        let from = offset.unwrap_or(i64::MIN);
        Ok(inner
            .mailbox
            .iter()
            .filter(|m| m.update_id >= from)
            .cloned()
            .collect())
    }

    async fn latest_update_id(&self) -> Result<Option<i64>, BridgeError> {
        let mut inner = self.lock();
        inner.awaiting = false;
        Ok(inner.mailbox.last().map(|m| m.update_id))
    }
}
