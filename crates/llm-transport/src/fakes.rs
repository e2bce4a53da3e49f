//! In-memory fakes for the transport traits (testing only)
//!
//! Provides `ScriptedTransport` and `StaticDataset` that satisfy the trait
//! contracts without any network access.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::CompletionTransport;
use crate::dataset::DatasetSource;
use crate::error::TransportError;
use crate::types::{CompletionRequest, CompletionResponse};
use crate::Result;

// ---------------------------------------------------------------------------
// ScriptedTransport
// ---------------------------------------------------------------------------

enum Scripted {
    Reply(CompletionResponse),
    Fail(String),
}

/// Transport that answers from a queue and records every request.
///
/// Replies are consumed in order. When the queue is empty the fallback reply
/// is used if one is set, otherwise the call fails with
/// `TransportError::Exhausted`.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Option<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that answers every request with the same text.
    pub fn always(text: impl Into<String>) -> Self {
        let transport = Self::new();
        *transport.fallback.lock().unwrap() = Some(CompletionResponse::text(text));
        transport
    }

    /// Queue a text reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.reply_with(CompletionResponse::text(text))
    }

    /// Queue a full response.
    pub fn reply_with(self, response: CompletionResponse) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Reply(response));
        self
    }

    /// Queue a transport failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.queue
            .lock()
            .unwrap()
            .push_back(Scripted::Fail(message.into()));
        self
    }

    /// All requests seen so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.queue.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(TransportError::Http(message)),
            None => self
                .fallback
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| TransportError::Exhausted(request.model.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// StaticDataset
// ---------------------------------------------------------------------------

/// Dataset source serving fixed rows per URL.
#[derive(Debug, Default)]
pub struct StaticDataset {
    rows: HashMap<String, Vec<Value>>,
}

impl StaticDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, url: impl Into<String>, rows: Vec<Value>) -> Self {
        self.rows.insert(url.into(), rows);
        self
    }
}

#[async_trait]
impl DatasetSource for StaticDataset {
    async fn fetch_rows(&self, url: &str) -> Result<Vec<Value>> {
        self.rows.get(url).cloned().ok_or_else(|| TransportError::Status {
            status: 404,
            body: format!("no dataset registered for {url}"),
        })
    }
}
