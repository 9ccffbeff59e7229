//! Deterministic stand-ins for the embedding and generation services.

use crate::answer::{ChatMessage, Generator, TokenStream};
use crate::embedding::Embedder;
use crate::error::{Result, ScreenragError};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

/// Holds `embed_batch` calls until released.
pub struct BatchGate {
    /// Notified each time a batch reaches the gate.
    pub entered: Notify,
    release: Semaphore,
}

impl BatchGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
            release: Semaphore::new(0),
        })
    }

    /// Let every waiting and future batch through.
    pub fn open(&self) {
        self.release.add_permits(1);
    }
}

/// Bag-of-words embedder over a fixed vocabulary.
///
/// Each dimension counts occurrences of one vocabulary word, so texts sharing
/// no vocabulary word with the query have similarity 0.
pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    batch_calls: AtomicUsize,
    fail_on_batch: Option<usize>,
    gate: Option<Arc<BatchGate>>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&str]) -> Self {
        Self {
            vocabulary: vocabulary.iter().map(|w| w.to_lowercase()).collect(),
            batch_calls: AtomicUsize::new(0),
            fail_on_batch: None,
            gate: None,
        }
    }

    /// Fail the `n`th `embed_batch` call (1-based).
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Block `embed_batch` until `gate` is opened.
    pub fn gated(mut self, gate: Arc<BatchGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| **w == term.as_str()).count() as f32)
            .collect()
    }

    /// Number of `embed_batch` calls made so far.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.batch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            let _permit = gate
                .release
                .acquire()
                .await
                .map_err(|e| ScreenragError::Embedding(e.to_string()))?;
        }
        if self.fail_on_batch == Some(call) {
            return Err(ScreenragError::Embedding(format!("batch {} rejected", call)));
        }
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.vocabulary.len()
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ending {
    Complete,
    FailAfter(usize),
    Hang,
    Unreachable,
}

/// Generator that streams canned tokens.
pub struct ScriptedGenerator {
    tokens: Vec<String>,
    ending: Ending,
    calls: AtomicUsize,
    last_request: Mutex<Option<(String, Vec<ChatMessage>)>>,
}

impl ScriptedGenerator {
    pub fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ending: Ending::Complete,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Emit `n` tokens, then a stream error.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.ending = Ending::FailAfter(n);
        self
    }

    /// Emit all tokens, then never finish.
    pub fn hanging(mut self) -> Self {
        self.ending = Ending::Hang;
        self
    }

    /// Fail the request before any token is produced.
    pub fn unreachable(mut self) -> Self {
        self.ending = Ending::Unreachable;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, Vec<ChatMessage>)> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some((system.to_string(), messages.to_vec()));
        }

        let tokens: Vec<Result<String>> = self.tokens.iter().cloned().map(Ok).collect();
        let stream = match self.ending {
            Ending::Complete => futures::stream::iter(tokens).boxed(),
            Ending::FailAfter(n) => futures::stream::iter(tokens.into_iter().take(n))
                .chain(futures::stream::once(async {
                    Err(ScreenragError::Generation("stream interrupted".to_string()))
                }))
                .boxed(),
            Ending::Hang => futures::stream::iter(tokens)
                .chain(futures::stream::pending())
                .boxed(),
            Ending::Unreachable => {
                return Err(ScreenragError::Generation("connection refused".to_string()))
            }
        };
        Ok(stream)
    }

    fn model(&self) -> &str {
        "scripted-test"
    }
}
