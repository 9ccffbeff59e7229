//! Grounded answer generation.
//!
//! The [`Answerer`] turns gate-approved chunks into a single grounding block,
//! sends it to a streaming [`Generator`] together with the question, and
//! consumes the token stream in arrival order. The stream is dropped as soon
//! as the caller cancels or the generator fails, which closes the connection.

mod openai;

pub use openai::OpenAIGenerator;

use crate::config::Prompts;
use crate::error::{Result, ScreenragError};
use crate::retrieval::RetrievedChunk;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Separator between sources in the grounding block.
const SOURCE_SEPARATOR: &str = "\n\n---\n\n";

/// Live stream of generated text fragments.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// A user turn in the generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Trait for streaming language model backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Start generating a reply to `messages` under the `system` instruction.
    async fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream>;

    /// Name of the model.
    fn model(&self) -> &str;
}

/// How a generation stream ended.
#[derive(Debug)]
pub enum StreamEnd {
    /// The generator finished the reply.
    Completed,
    /// The caller abandoned the query.
    Cancelled,
    /// The request or the stream failed.
    Failed(ScreenragError),
}

/// Text produced for one question.
#[derive(Debug)]
pub struct Answer {
    /// Concatenation of every fragment received, possibly partial.
    pub text: String,
    pub end: StreamEnd,
}

impl Answer {
    pub fn is_complete(&self) -> bool {
        matches!(self.end, StreamEnd::Completed)
    }
}

/// Format accepted chunks as the model's only permitted knowledge source.
pub fn grounding_block(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "[Source {}: {} \u{2014} {} (relevance: {:.2})]\n{}",
                i + 1,
                chunk.film,
                chunk.heading,
                chunk.similarity,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(SOURCE_SEPARATOR)
}

/// Builds grounded prompts and consumes the generator's stream.
pub struct Answerer {
    generator: Arc<dyn Generator>,
    prompts: Prompts,
}

impl Answerer {
    pub fn new(generator: Arc<dyn Generator>, prompts: Prompts) -> Self {
        Self { generator, prompts }
    }

    /// System instruction sent with every request.
    pub fn system_prompt(&self) -> String {
        self.prompts
            .render_with_custom(&self.prompts.rag.system, &HashMap::new())
    }

    /// The single user message carrying grounding block and question.
    pub fn build_messages(&self, question: &str, chunks: &[RetrievedChunk]) -> Vec<ChatMessage> {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), grounding_block(chunks));
        vars.insert("question".to_string(), question.to_string());

        vec![ChatMessage::user(
            self.prompts.render_with_custom(&self.prompts.rag.user, &vars),
        )]
    }

    /// Stream an answer, forwarding each fragment to `on_token` as it arrives.
    ///
    /// Resolving `cancel` stops consumption after the current fragment. Failures
    /// are reported in [`Answer::end`] together with whatever text arrived first.
    #[instrument(skip_all, fields(model = self.generator.model(), sources = chunks.len()))]
    pub async fn answer<C, F>(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        cancel: C,
        mut on_token: F,
    ) -> Answer
    where
        C: Future<Output = ()>,
        F: FnMut(&str),
    {
        let system = self.system_prompt();
        let messages = self.build_messages(question, chunks);
        tokio::pin!(cancel);

        let started = tokio::select! {
            biased;
            _ = &mut cancel => None,
            started = self.generator.generate(&system, &messages) => Some(started),
        };

        let mut stream = match started {
            None => return Answer { text: String::new(), end: StreamEnd::Cancelled },
            Some(Err(e)) => return Answer { text: String::new(), end: StreamEnd::Failed(e) },
            Some(Ok(stream)) => stream,
        };

        let mut text = String::new();
        let end = loop {
            tokio::select! {
                biased;
                _ = &mut cancel => break StreamEnd::Cancelled,
                next = stream.next() => match next {
                    Some(Ok(fragment)) => {
                        on_token(&fragment);
                        text.push_str(&fragment);
                    }
                    Some(Err(e)) => break StreamEnd::Failed(e),
                    None => break StreamEnd::Completed,
                },
            }
        };
        drop(stream);

        match &end {
            StreamEnd::Completed => debug!("Generated {} characters", text.len()),
            StreamEnd::Cancelled => warn!("Generation cancelled after {} characters", text.len()),
            StreamEnd::Failed(e) => warn!("Generation failed after {} characters: {}", text.len(), e),
        }

        Answer { text, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    fn chunk(film: &str, heading: &str, similarity: f32, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            id: "0".to_string(),
            text: text.to_string(),
            film: film.to_string(),
            scene_id: 1,
            heading: heading.to_string(),
            similarity,
        }
    }

    fn sources() -> Vec<RetrievedChunk> {
        vec![
            chunk(
                "The Empire Strikes Back",
                "INT. CLOUD CITY - GANTRY",
                0.8123,
                "VADER: No. I am your father.",
            ),
            chunk("Return Of The Jedi", "INT. YODA'S HOUSE", 0.61, "YODA: Your father he is."),
        ]
    }

    #[test]
    fn test_grounding_block_format() {
        let block = grounding_block(&sources());
        assert_eq!(
            block,
            "[Source 1: The Empire Strikes Back \u{2014} INT. CLOUD CITY - GANTRY (relevance: 0.81)]\n\
             VADER: No. I am your father.\n\n---\n\n\
             [Source 2: Return Of The Jedi \u{2014} INT. YODA'S HOUSE (relevance: 0.61)]\n\
             YODA: Your father he is."
        );
    }

    #[test]
    fn test_user_message_carries_context_and_question() {
        let answerer = Answerer::new(Arc::new(ScriptedGenerator::new(&[])), Prompts::default());
        let messages = answerer.build_messages("Who is Luke's father?", &sources());

        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with("Context from the screenplays:\n\n[Source 1:"));
        assert!(messages[0].content.ends_with("\n\nQuestion: Who is Luke's father?"));
    }

    #[tokio::test]
    async fn test_answer_streams_tokens_in_order() {
        let generator = Arc::new(ScriptedGenerator::new(&["Darth ", "Vader", "."]));
        let answerer = Answerer::new(generator.clone(), Prompts::default());

        let mut seen = Vec::new();
        let answer = answerer
            .answer(
                "Who is Luke's father?",
                &sources(),
                std::future::pending(),
                |t| seen.push(t.to_string()),
            )
            .await;

        assert!(answer.is_complete());
        assert_eq!(answer.text, "Darth Vader.");
        assert_eq!(seen, vec!["Darth ", "Vader", "."]);

        let (system, _) = generator.last_request().unwrap();
        assert!(system.contains(&Prompts::default().rag.refusal));
    }

    #[tokio::test]
    async fn test_stream_failure_keeps_partial_text() {
        let generator = Arc::new(ScriptedGenerator::new(&["Darth ", "Vader", "."]).failing_after(1));
        let answerer = Answerer::new(generator, Prompts::default());

        let answer = answerer
            .answer("q", &sources(), std::future::pending(), |_| {})
            .await;

        assert_eq!(answer.text, "Darth ");
        assert!(matches!(answer.end, StreamEnd::Failed(ScreenragError::Generation(_))));
    }

    #[tokio::test]
    async fn test_cancel_stops_hanging_stream() {
        let generator = Arc::new(ScriptedGenerator::new(&["Partial"]).hanging());
        let answerer = Answerer::new(generator, Prompts::default());

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let cancel = async move {
            let _ = rx.await;
        };

        let mut tx = Some(tx);
        let answer = answerer
            .answer("q", &sources(), cancel, |_| {
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
            })
            .await;

        assert_eq!(answer.text, "Partial");
        assert!(matches!(answer.end, StreamEnd::Cancelled));
    }

    #[tokio::test]
    async fn test_unreachable_generator_reports_failure() {
        let generator = Arc::new(ScriptedGenerator::new(&["never"]).unreachable());
        let answerer = Answerer::new(generator, Prompts::default());

        let answer = answerer
            .answer("q", &sources(), std::future::pending(), |_| {})
            .await;

        assert!(answer.text.is_empty());
        assert!(matches!(answer.end, StreamEnd::Failed(_)));
    }
}
