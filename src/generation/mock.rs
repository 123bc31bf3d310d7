//! Mock generator for development & testing
//!
//! Keeps the pipeline functional without a model dependency and records
//! every call (rendered prompt, media types, virtual timestamp).

use super::{GenerationRequest, Generator};
use crate::error::AnalysisError;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Responder = Box<dyn Fn(usize, &GenerationRequest<'_>) -> Result<String> + Send + Sync>;
type Latency = Box<dyn Fn(&GenerationRequest<'_>) -> Duration + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub media_types: Vec<String>,
    pub at: Instant,
}

pub struct MockGenerator {
    responder: Responder,
    latency: Option<Latency>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockGenerator {
    /// Respond via a closure receiving the zero-based call index.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &GenerationRequest<'_>) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always return the same response text.
    pub fn always(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Return the scripted outcomes in order; fails once the script runs out.
    pub fn scripted(script: Vec<Result<String>>) -> Self {
        let queue = Mutex::new(VecDeque::from(script));
        Self::new(move |_, _| {
            queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front()
                .unwrap_or_else(|| Err(AnalysisError::LlmError("mock script exhausted".into())))
        })
    }

    /// Fail with a service-unavailable error `failures` times, then succeed.
    pub fn unavailable_then(failures: usize, response: impl Into<String>) -> Self {
        let response = response.into();
        Self::new(move |index, _| {
            if index < failures {
                Err(AnalysisError::ServiceUnavailable(
                    "503 Service Unavailable".into(),
                ))
            } else {
                Ok(response.clone())
            }
        })
    }

    /// Delay each response by a per-request duration.
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&GenerationRequest<'_>) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let index = {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            calls.push(RecordedCall {
                prompt: request.prompt_text(),
                media_types: request.media_types(),
                at: Instant::now(),
            });
            calls.len() - 1
        };

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(request)).await;
        }

        (self.responder)(index, request)
    }
}
