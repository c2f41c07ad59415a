//! In-memory transports for driving `ApiService` without a network.
#![allow(dead_code)]

use api_service::{Transport, TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Replies from a queue of scripted responses and records every request.
/// Once the queue is empty the last response is repeated.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    last: Mutex<Option<Result<TransportResponse, TransportError>>>,
    delay: Option<Duration>,
    seen: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, response: TransportResponse) -> Self {
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, error: TransportError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Wait this long before answering each request.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.seen.lock().unwrap().push(request);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            match replies.pop_front() {
                Some(reply) => {
                    *last = Some(reply.clone());
                    reply
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Ok(TransportResponse::json(200, &serde_json::json!({})))),
            }
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        reply
    }
}

/// Never answers; counts how many requests started.
#[derive(Default)]
pub struct HangingTransport {
    started: AtomicUsize,
}

impl HangingTransport {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for HangingTransport {
    async fn fetch(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
