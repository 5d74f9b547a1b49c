//! Language-model boundary for the learning platform.
//!
//! Everything that talks to an LLM lives behind the four traits in this
//! crate: [`TutorResponder`], [`ExerciseGenerator`], [`SubmissionAuditor`]
//! and [`RiskAnalyzer`]. The production implementation is [`OllamaClient`],
//! which drives a local Ollama server; tests swap in scripted fakes so no
//! model is required.

pub mod error;
pub mod ollama;
pub mod types;

use std::sync::Arc;

pub use error::AiError;
pub use ollama::OllamaClient;
pub use types::{
    AuditExercise, AuditReport, AuditRequest, ChatTurn, ExerciseAudit, ExerciseDraft,
    GenerationRequest, RiskInput, RiskReport, TutorContext,
};

/// Tutor chat. Failures surface to the caller so the HTTP layer can report
/// an upstream error while the student's turn stays persisted.
#[async_trait::async_trait]
pub trait TutorResponder: Send + Sync {
    async fn tutor_reply(&self, ctx: TutorContext) -> Result<String, AiError>;
}

/// Draft-exercise generation for the authoring workflow.
#[async_trait::async_trait]
pub trait ExerciseGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<ExerciseDraft>, AiError>;
}

/// Final-submission grading. Infallible by contract: when the model cannot
/// be reached or returns garbage the implementation must produce the
/// zero-grade fallback report so submission never blocks on the model.
#[async_trait::async_trait]
pub trait SubmissionAuditor: Send + Sync {
    async fn audit(&self, request: AuditRequest) -> AuditReport;
}

/// Post-submission risk profiling. Errors are returned to the caller, which
/// records the analysis as failed rather than inventing a score.
#[async_trait::async_trait]
pub trait RiskAnalyzer: Send + Sync {
    async fn analyze(&self, input: RiskInput) -> Result<RiskReport, AiError>;
}

/// Bundle of the four model-facing capabilities handed to the HTTP layer.
///
/// Production wires every slot to one shared [`OllamaClient`]; tests can
/// script each slot independently.
#[derive(Clone)]
pub struct AiStack {
    pub tutor: Arc<dyn TutorResponder>,
    pub generator: Arc<dyn ExerciseGenerator>,
    pub auditor: Arc<dyn SubmissionAuditor>,
    pub risk: Arc<dyn RiskAnalyzer>,
}

impl AiStack {
    /// Stack backed by a single Ollama endpoint.
    pub fn ollama(base_url: &str, model: &str, timeout_seconds: u64) -> Self {
        let client = Arc::new(OllamaClient::new(base_url, model, timeout_seconds));
        Self {
            tutor: client.clone(),
            generator: client.clone(),
            auditor: client.clone(),
            risk: client,
        }
    }
}
