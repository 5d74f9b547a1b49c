//! Scripted stand-ins for the model boundary. Each fake answers instantly
//! and deterministically so route tests never need a live model.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ai::{
    AiError, AiStack, AuditReport, AuditRequest, ExerciseAudit, ExerciseDraft, ExerciseGenerator,
    GenerationRequest, RiskAnalyzer, RiskInput, RiskReport, SubmissionAuditor, TutorContext,
    TutorResponder,
};

/// Tutor that always answers with the same reply.
pub struct FixedTutor(pub &'static str);

#[async_trait::async_trait]
impl TutorResponder for FixedTutor {
    async fn tutor_reply(&self, _ctx: TutorContext) -> Result<String, AiError> {
        Ok(self.0.to_string())
    }
}

/// Tutor that is always unreachable.
pub struct DownTutor;

#[async_trait::async_trait]
impl TutorResponder for DownTutor {
    async fn tutor_reply(&self, _ctx: TutorContext) -> Result<String, AiError> {
        Err(AiError::Status {
            status: 503,
            body: "service unavailable".to_string(),
        })
    }
}

/// Generator that returns a fixed list of drafts.
pub struct FixedGenerator(pub Vec<ExerciseDraft>);

#[async_trait::async_trait]
impl ExerciseGenerator for FixedGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Vec<ExerciseDraft>, AiError> {
        Ok(self.0.clone())
    }
}

/// Generator that always fails with the given reason.
pub struct FailingGenerator(pub &'static str);

#[async_trait::async_trait]
impl ExerciseGenerator for FailingGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Vec<ExerciseDraft>, AiError> {
        Err(AiError::MalformedOutput(self.0.to_string()))
    }
}

/// Generator that never finishes, for observing in-flight jobs.
pub struct StalledGenerator;

#[async_trait::async_trait]
impl ExerciseGenerator for StalledGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Vec<ExerciseDraft>, AiError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(AiError::MalformedOutput("never reached".to_string()))
    }
}

/// Auditor scripted with a grade per exercise id. Exercises without an entry
/// are left out of the report, which the grading path treats as grade 0.
pub struct ScriptedAuditor {
    pub grades: HashMap<i64, i32>,
    pub general_feedback: &'static str,
}

#[async_trait::async_trait]
impl SubmissionAuditor for ScriptedAuditor {
    async fn audit(&self, request: AuditRequest) -> AuditReport {
        let exercises_audit: Vec<ExerciseAudit> = request
            .exercises
            .iter()
            .filter_map(|e| {
                self.grades.get(&e.exercise_id).map(|grade| ExerciseAudit {
                    exercise_id: e.exercise_id,
                    title: e.title.clone(),
                    grade: *grade,
                    passed: *grade >= 60,
                    feedback: format!("Feedback for {}", e.title),
                })
            })
            .collect();

        let final_grade = if exercises_audit.is_empty() {
            0.0
        } else {
            exercises_audit.iter().map(|a| a.grade as f64).sum::<f64>()
                / exercises_audit.len() as f64
        };

        AuditReport {
            final_grade,
            general_feedback: self.general_feedback.to_string(),
            exercises_audit,
        }
    }
}

/// Risk analyzer that always returns the same report.
pub struct FixedRisk(pub RiskReport);

#[async_trait::async_trait]
impl RiskAnalyzer for FixedRisk {
    async fn analyze(&self, _input: RiskInput) -> Result<RiskReport, AiError> {
        Ok(self.0.clone())
    }
}

/// Risk analyzer that always fails.
pub struct FailingRisk(pub &'static str);

#[async_trait::async_trait]
impl RiskAnalyzer for FailingRisk {
    async fn analyze(&self, _input: RiskInput) -> Result<RiskReport, AiError> {
        Err(AiError::MalformedOutput(self.0.to_string()))
    }
}

/// Risk analyzer that never finishes, for observing the pending state.
pub struct StalledRisk;

#[async_trait::async_trait]
impl RiskAnalyzer for StalledRisk {
    async fn analyze(&self, _input: RiskInput) -> Result<RiskReport, AiError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(AiError::MalformedOutput("never reached".to_string()))
    }
}

pub fn low_risk_report() -> RiskReport {
    RiskReport {
        risk_score: 15,
        risk_level: "LOW".to_string(),
        diagnosis: "Healthy independent work".to_string(),
        evidence: vec!["asked conceptual questions only".to_string()],
        teacher_advice: "No intervention needed".to_string(),
        positive_aspects: vec!["worked through errors alone".to_string()],
    }
}

pub fn high_risk_report() -> RiskReport {
    RiskReport {
        risk_score: 75,
        risk_level: "HIGH".to_string(),
        diagnosis: "Requested full solutions repeatedly".to_string(),
        evidence: vec!["asked for the complete answer".to_string()],
        teacher_advice: "Discuss the solution in person".to_string(),
        positive_aspects: vec![],
    }
}

pub fn draft(title: &str) -> ExerciseDraft {
    ExerciseDraft {
        title: title.to_string(),
        problem_statement: format!("Solve: {title}"),
        starter_code: "def solve():\n    pass".to_string(),
        solution_code: "def solve():\n    return 42".to_string(),
        test_cases: Some(serde_json::json!([
            {"input_data": "", "expected_output": "42"}
        ])),
    }
}

/// A benign default stack: fixed tutor reply, two generated drafts, an
/// auditor with no scripted grades and a low-risk analyzer. Tests override
/// individual slots.
pub fn fake_stack() -> AiStack {
    AiStack {
        tutor: Arc::new(FixedTutor("Think about what the loop condition does.")),
        generator: Arc::new(FixedGenerator(vec![draft("Two Sum"), draft("Reverse A String")])),
        auditor: Arc::new(ScriptedAuditor {
            grades: HashMap::new(),
            general_feedback: "Reviewed.",
        }),
        risk: Arc::new(FixedRisk(low_risk_report())),
    }
}

/// [`fake_stack`] with the auditor scripted to grade the two given exercises
/// 90 and 80 under the feedback "Solid work".
pub fn graded_stack(first_exercise: i64, second_exercise: i64) -> AiStack {
    let mut stack = fake_stack();
    stack.auditor = Arc::new(ScriptedAuditor {
        grades: HashMap::from([(first_exercise, 90), (second_exercise, 80)]),
        general_feedback: "Solid work",
    });
    stack
}
