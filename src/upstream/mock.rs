//! Scripted upstream client for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};

use crate::upstream::{OutboundRequest, UpstreamClient, UpstreamError, UpstreamResponse};

/// Replays scripted outcomes in order, repeating the last one forever.
#[derive(Debug)]
pub struct MockUpstream {
    script: Mutex<VecDeque<Result<UpstreamResponse, UpstreamError>>>,
    calls: AtomicU32,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockUpstream {
    pub fn new(script: Vec<Result<UpstreamResponse, UpstreamError>>) -> Self {
        assert!(!script.is_empty(), "script needs at least one outcome");
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: Result<UpstreamResponse, UpstreamError>) -> Self {
        Self::new(vec![outcome])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn send(&self, request: &OutboundRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

pub fn ok(body: &'static str) -> Result<UpstreamResponse, UpstreamError> {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "application/json".parse().unwrap());
    Ok(UpstreamResponse {
        status: StatusCode::OK,
        headers,
        body: Bytes::from_static(body.as_bytes()),
    })
}

pub fn status(code: u16, body: &'static str) -> Result<UpstreamResponse, UpstreamError> {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", "application/json".parse().unwrap());
    Err(UpstreamError::Response {
        status: StatusCode::from_u16(code).unwrap(),
        headers,
        body: Bytes::from_static(body.as_bytes()),
    })
}

pub fn refused() -> Result<UpstreamResponse, UpstreamError> {
    Err(UpstreamError::Transport("connection refused".into()))
}
