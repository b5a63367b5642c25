//! In-memory [`LlmProvider`] and canned model responses for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    CompletionRequest, CompletionResponse, DraftId, LlmError, LlmProvider, PipelineConfig,
    RetrySettings, Rubric,
};
use serde_json::json;

use crate::{LlmGateway, NodeContext, PromptLibrary};

type Responder = dyn Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync;

/// A provider that answers from a script and records every request it sees.
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    responder: Option<Box<Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Answers requests in order from `responses`. Once the queue is empty
    /// every further request fails with [`LlmError::EmptyResponse`].
    pub fn from_queue(responses: impl IntoIterator<Item = Result<CompletionResponse, LlmError>>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().collect()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Like [`Self::from_queue`] with every response a success.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_queue(texts.into_iter().map(|t| Ok(CompletionResponse::text(t))))
    }

    /// Answers each request by calling `responder`.
    pub fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<CompletionResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        lock(&self.requests).push(request.clone());
        match &self.responder {
            Some(responder) => responder(request),
            None => lock(&self.queue)
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse)),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A context over `provider` with default settings and no retry delay.
pub fn scripted_context(provider: &Arc<ScriptedProvider>) -> NodeContext {
    scripted_context_with(provider, PipelineConfig::default())
}

/// Like [`scripted_context`] with a custom configuration. The retry delay is
/// forced to zero.
pub fn scripted_context_with(provider: &Arc<ScriptedProvider>, config: PipelineConfig) -> NodeContext {
    let retry = RetrySettings {
        delay: Duration::ZERO,
        ..config.retry
    };
    NodeContext {
        gateway: LlmGateway::new(provider.clone(), retry),
        prompts: PromptLibrary::new(),
        rubric: Rubric::standard(),
        config: PipelineConfig { retry, ..config },
    }
}

/// An extraction response for `id`.
pub fn card_response(id: DraftId) -> String {
    json!({
        "article_id": id.as_u64(),
        "headline_candidates": [format!("Headline {id}"), format!("Alternative {id}")],
        "opening_hook": format!("Opening hook of draft {id}. It sets the scene."),
        "core_argument": "Community-captured 3D data fills gaps official surveys leave.",
        "key_points": ["cost", "coverage", "freshness"],
        "memorable_phrases": [format!("phrase from draft {id}")],
        "structural_approach": "Problem-Solution-CTA",
        "evidence_used": ["statistic"],
        "tone": "conversational",
        "target_audience_signals": "small survey teams",
        "weaknesses": ["no case study"],
        "word_count_estimate": 1200
    })
    .to_string()
}

/// A scoring vote giving every standard criterion `score`.
pub fn vote_response(score: u8, strengths: &[&str]) -> String {
    let scores: serde_json::Map<String, serde_json::Value> = Rubric::standard()
        .criteria()
        .iter()
        .map(|c| {
            (
                c.name.as_str().to_string(),
                json!({"score": score, "justification": format!("{} is {score}", c.name)}),
            )
        })
        .collect();
    json!({
        "article_id": 0,
        "scores": scores,
        "standout_strengths": strengths,
        "critical_weaknesses": []
    })
    .to_string()
}

/// A selection response drawing the headline from `headline_source` and
/// everything else from `other_source`.
pub fn blueprint_response(headline_source: DraftId, other_source: DraftId) -> String {
    let h = headline_source.as_u64();
    let o = other_source.as_u64();
    json!({
        "synthesis_blueprint": {
            "selected_headline": {"source_article": h, "headline": "Maps Made by Everyone", "rationale": "specific"},
            "selected_opening": {"source_article": o, "approach": "question", "key_elements": ["stakes"], "rationale": "direct"},
            "selected_structure": {"source_article": o, "structure_type": "Problem-Solution-CTA", "section_flow": ["problem", "solution", "cta"], "rationale": "clear"},
            "selected_arguments": {
                "primary_source": o,
                "core_thesis": "Community data beats stale surveys.",
                "supporting_points": [{"point": "cost", "source_article": h}],
                "rationale": "strongest"
            },
            "selected_evidence": [{"evidence": "40% cheaper", "source_article": o, "where_to_use": "solution"}],
            "phrases_to_preserve": [{"phrase": "the map is the territory", "source_article": h, "suggested_placement": "close"}],
            "elements_to_avoid": ["generic opening"],
            "synthesis_notes": "Keep it tight."
        },
        "confidence": {"level": "high", "concerns": []}
    })
    .to_string()
}

/// A validation response with the given verdict and overall score.
pub fn validation_response(passed: bool, overall: f64, issues: &[&str]) -> String {
    json!({
        "passed": passed,
        "blueprint_compliance": {"headline_used": true, "compliance_score": 0.9},
        "quality_scores": {"hook_strength": 8, "overall": overall},
        "coherence_assessment": {"flow_natural": true},
        "issues": issues,
        "improvement_suggestions": [],
        "target_threshold": 0.0,
        "threshold_met": passed
    })
    .to_string()
}
