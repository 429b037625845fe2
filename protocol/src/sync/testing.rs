//! In-process stand-in for the coordinating service.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::transport::{HttpRequest, HttpResponse, Transport};
use super::SyncError;

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, SyncError> + Send + Sync;

/// Answers every request through `handler` and records what it saw.
pub(crate) struct MockService {
    handler: Box<Handler>,
    pub(crate) requests: Mutex<Vec<HttpRequest>>,
}

impl MockService {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, SyncError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn count(&self, url_prefix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.starts_with(url_prefix))
            .count()
    }
}

#[async_trait]
impl Transport for MockService {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, SyncError> {
        self.requests.lock().push(request.clone());
        (self.handler)(&request)
    }
}

pub(crate) fn status(code: u16, body: Value) -> Result<HttpResponse, SyncError> {
    Ok(HttpResponse { status: code, body })
}

pub(crate) fn unauthorized() -> Result<HttpResponse, SyncError> {
    status(401, json!({"code": "NOT_AUTHORIZED", "message": "session expired"}))
}
