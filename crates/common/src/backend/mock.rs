//! Scripted backend for testing

use super::{ChatBackend, ChatCompletion};
use crate::errors::{AppError, Result};
use crate::models::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

enum Scripted {
    Reply(ChatCompletion),
    Fail(String),
}

/// Backend that replays scripted responses in order and records every call
pub struct MockBackend {
    name: String,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockBackend {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text reply
    pub fn with_reply(self, content: &str) -> Self {
        self.with_completion(ChatCompletion::text(content))
    }

    /// Queue a full completion, citations included
    pub fn with_completion(self, completion: ChatCompletion) -> Self {
        self.push(Scripted::Reply(completion));
        self
    }

    /// Queue a failing call
    pub fn with_error(self, message: &str) -> Self {
        self.push(Scripted::Fail(message.to_string()));
        self
    }

    /// Messages sent on every call so far
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Messages of the most recent call
    pub fn last_call(&self) -> Option<Vec<Message>> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    fn push(&self, entry: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, messages: &[Message]) -> Result<ChatCompletion> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Scripted::Reply(completion)) => Ok(completion),
            Some(Scripted::Fail(message)) => Err(AppError::backend(&self.name, message)),
            None => Err(AppError::backend(&self.name, "no scripted response left")),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
