//! Mock implementations of core traits for testing.
//!
//! This module provides a scripted provider mock used across the codebase
//! for unit and integration testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::{
    traits::{GenerateResponse, GenerateUsage, GenerativeClient, ImagePayload},
    Error, Result,
};

// =============================================================================
// Mock Generative Client
// =============================================================================

/// Scripted mock provider.
///
/// Plays back a queue of outcomes in order, then repeats the fallback
/// outcome for every further call. Counts calls so tests can assert exact
/// attempt counts.
pub struct MockGenerativeClient {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Box<dyn Fn() -> Result<String> + Send + Sync>,
    calls: Mutex<usize>,
}

impl MockGenerativeClient {
    /// Mock that always replies with the same content.
    pub fn constant(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Box::new(move || Ok(reply.clone())),
            calls: Mutex::new(0),
        }
    }

    /// Mock whose every call fails with the error produced by `make_error`.
    pub fn always_failing<F>(make_error: F) -> Self
    where
        F: Fn() -> Error + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Box::new(move || Err(make_error())),
            calls: Mutex::new(0),
        }
    }

    /// Queue an outcome to be consumed before the fallback applies.
    pub fn with_outcome(self, outcome: Result<String>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Queue `n` leading failures produced by `make_error`.
    pub fn with_leading_failures<F>(self, n: usize, make_error: F) -> Self
    where
        F: Fn() -> Error,
    {
        {
            let mut script = self.script.lock().unwrap();
            for _ in 0..n {
                script.push_back(Err(make_error()));
            }
        }
        self
    }

    /// Number of provider calls made so far.
    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn next_outcome(&self) -> Result<GenerateResponse> {
        *self.calls.lock().unwrap() += 1;

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| (self.fallback)());

        outcome.map(|content| GenerateResponse {
            usage: GenerateUsage {
                prompt_tokens: 10,
                completion_tokens: (content.len() / 4) as u64,
                total_tokens: 10 + (content.len() / 4) as u64,
            },
            content,
        })
    }
}

#[async_trait]
impl GenerativeClient for MockGenerativeClient {
    async fn generate(&self, _prompt: &str) -> Result<GenerateResponse> {
        self.next_outcome()
    }

    async fn generate_with_image(
        &self,
        _prompt: &str,
        _image: &ImagePayload,
    ) -> Result<GenerateResponse> {
        self.next_outcome()
    }
}
