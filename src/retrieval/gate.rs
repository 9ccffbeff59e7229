//! Decides whether retrieved evidence is strong enough to attempt an answer.

use super::Retrieval;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of a query, as recorded in the query log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Evidence cleared the gate and an answer was generated.
    Answered,
    /// The index returned no neighbours at all.
    RejectedNoChunks,
    /// Neighbours exist but the best one is below the threshold.
    RejectedLowSimilarity,
    /// Generation started but was cancelled or failed before completing.
    Aborted,
}

impl Outcome {
    /// Log representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Answered => "answered",
            Outcome::RejectedNoChunks => "rejected_no_chunks",
            Outcome::RejectedLowSimilarity => "rejected_low_similarity",
            Outcome::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    /// Whether generation should proceed.
    pub sufficient: bool,
    /// `Answered` when sufficient, otherwise the rejection reason.
    pub outcome: Outcome,
    /// Highest similarity among the neighbours, `None` when there were none.
    pub top_similarity: Option<f32>,
}

/// Similarity gate in front of generation.
#[derive(Debug, Clone)]
pub struct Gate {
    min_similarity: f32,
    refusal: String,
}

impl Gate {
    /// Create a gate with a threshold and the fixed refusal sentence.
    pub fn new(min_similarity: f32, refusal: impl Into<String>) -> Self {
        Self {
            min_similarity,
            refusal: refusal.into(),
        }
    }

    /// The refusal shown whenever the gate rejects.
    pub fn refusal(&self) -> &str {
        &self.refusal
    }

    /// Evaluate a retrieval.
    ///
    /// The best neighbour, including any the retriever filtered out, is checked
    /// against the threshold independently of the retriever's own filtering.
    /// Generation also needs at least one accepted chunk.
    pub fn evaluate(&self, retrieval: &Retrieval) -> GateDecision {
        let top_similarity = retrieval
            .chunks
            .iter()
            .map(|r| r.similarity)
            .chain(retrieval.best_similarity)
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));

        let (sufficient, outcome) = match top_similarity {
            None => (false, Outcome::RejectedNoChunks),
            Some(top) if top < self.min_similarity || retrieval.is_empty() => {
                (false, Outcome::RejectedLowSimilarity)
            }
            Some(_) => (true, Outcome::Answered),
        };

        GateDecision {
            sufficient,
            outcome,
            top_similarity,
        }
    }
}
