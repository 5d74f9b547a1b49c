//! Data carried across the model boundary, plus the tolerant parsers that
//! turn raw model output into typed reports.
//!
//! Model output is JSON in theory and JSON-shaped in practice: wrapped in
//! prose, numbers quoted, fields missing. The `from_raw` constructors here
//! absorb that so the rest of the system only ever sees well-formed values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Grades at or above this count as a pass.
const PASSING_GRADE: i32 = 60;

/// One prior turn of a tutoring conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `student` or `tutor`.
    pub role: String,
    pub content: String,
}

/// Everything the tutor needs to answer one student message.
#[derive(Debug, Clone)]
pub struct TutorContext {
    /// Tutoring mode: `socratic`, `direct` or `hint`.
    pub mode: String,
    /// The student's current message.
    pub message: String,
    /// Code the student attached to this message, if any.
    pub code_context: Option<String>,
    pub problem_statement: String,
    /// Reference solution. Shown to the model, never to the student.
    pub solution_code: String,
    /// Concatenated text of the activity's supporting documents. Empty when
    /// the activity has none.
    pub document_context: String,
    /// Most recent turns, oldest first.
    pub history: Vec<ChatTurn>,
}

/// Parameters for a draft-generation run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub difficulty: String,
    pub language: String,
    pub count: u32,
    /// Concatenated text of uploaded course material. Empty when the job has
    /// no documents attached.
    pub document_context: String,
}

/// One generated exercise awaiting teacher approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseDraft {
    pub title: String,
    pub problem_statement: String,
    pub starter_code: String,
    pub solution_code: String,
    /// Structured test cases as emitted by the model, if any.
    pub test_cases: Option<Value>,
}

/// One exercise handed to the auditor for grading.
#[derive(Debug, Clone)]
pub struct AuditExercise {
    pub exercise_id: i64,
    pub title: String,
    pub problem_statement: String,
    /// The student's final code. May be empty when nothing was submitted.
    pub code: String,
}

/// A full-submission grading request.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub exercises: Vec<AuditExercise>,
}

/// Per-exercise verdict inside an [`AuditReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseAudit {
    pub exercise_id: i64,
    pub title: String,
    /// 0 to 100.
    pub grade: i32,
    pub passed: bool,
    pub feedback: String,
}

/// The auditor's verdict over a whole submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// 0 to 100.
    pub final_grade: f64,
    pub general_feedback: String,
    pub exercises_audit: Vec<ExerciseAudit>,
}

impl AuditReport {
    /// Zero-grade report used when the model cannot produce a verdict.
    /// Grading must never block a submission, so this is what callers store
    /// when the auditor is unreachable or unintelligible.
    pub fn fallback(reason: &str) -> Self {
        Self {
            final_grade: 0.0,
            general_feedback: format!(
                "The grading service could not process this submission: {reason}. \
                 A teacher should review it manually."
            ),
            exercises_audit: Vec::new(),
        }
    }

    /// Parses raw model output into a report.
    ///
    /// Tolerates quoted numbers and missing optional fields. Entries whose
    /// `exercise_id` cannot be coerced to an integer are dropped, and
    /// `passed` is always recomputed from the grade so the two can never
    /// disagree. Returns `None` when the output is not a JSON object at all.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(extract_json(raw)).ok()?;
        let obj = value.as_object()?;

        let final_grade = obj
            .get("final_grade")
            .and_then(coerce_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 100.0);
        let general_feedback = obj
            .get("general_feedback")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let exercises_audit = obj
            .get("exercises_audit")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let exercise_id = entry.get("exercise_id").and_then(coerce_i64)?;
                        let grade = entry
                            .get("grade")
                            .and_then(coerce_f64)
                            .unwrap_or(0.0)
                            .clamp(0.0, 100.0)
                            .round() as i32;
                        Some(ExerciseAudit {
                            exercise_id,
                            title: entry
                                .get("title")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            grade,
                            passed: grade >= PASSING_GRADE,
                            feedback: entry
                                .get("feedback")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            final_grade,
            general_feedback,
            exercises_audit,
        })
    }
}

/// Material for one risk-profiling run.
#[derive(Debug, Clone)]
pub struct RiskInput {
    pub activity_title: String,
    pub final_grade: f64,
    /// The student's submitted code, all exercises concatenated.
    pub code: String,
    /// Conversation turns, oldest first. Only the most recent ones are sent
    /// to the model.
    pub chat: Vec<ChatTurn>,
}

/// The analyzer's profile of one submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    /// 0 to 100.
    pub risk_score: i32,
    /// `LOW`, `MEDIUM`, `HIGH` or `CRITICAL`.
    pub risk_level: String,
    pub diagnosis: String,
    pub evidence: Vec<String>,
    pub teacher_advice: String,
    pub positive_aspects: Vec<String>,
}

impl RiskReport {
    /// Parses raw model output into a report.
    ///
    /// `risk_score` and `risk_level` are mandatory: an analysis without them
    /// is recorded as failed rather than padded with an invented low score.
    /// The narrative fields default to empty.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(extract_json(raw)).ok()?;
        let obj = value.as_object()?;

        let risk_score = obj
            .get("risk_score")
            .and_then(coerce_f64)?
            .clamp(0.0, 100.0)
            .round() as i32;
        let risk_level = obj
            .get("risk_level")
            .and_then(Value::as_str)?
            .trim()
            .to_uppercase();
        if !matches!(risk_level.as_str(), "LOW" | "MEDIUM" | "HIGH" | "CRITICAL") {
            return None;
        }

        Some(Self {
            risk_score,
            risk_level,
            diagnosis: obj
                .get("diagnosis")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            evidence: string_list(obj.get("evidence")),
            teacher_advice: obj
                .get("teacher_advice")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            positive_aspects: string_list(obj.get("positive_aspects")),
        })
    }
}

/// Parses generator output into drafts.
///
/// Accepts either `{"exercises": [...]}` or a bare array. Entries without a
/// problem statement are dropped; an output with no usable entries is an
/// error so the job can be marked as failed instead of publishing an empty
/// activity.
pub fn parse_drafts(raw: &str) -> Result<Vec<ExerciseDraft>, crate::AiError> {
    let value: Value = serde_json::from_str(extract_json(raw))
        .map_err(|e| crate::AiError::MalformedOutput(format!("invalid JSON: {e}")))?;
    let entries = value
        .get("exercises")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())
        .ok_or_else(|| {
            crate::AiError::MalformedOutput("output has no exercises array".to_string())
        })?;

    let drafts: Vec<ExerciseDraft> = entries
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| {
            let problem_statement = entry
                .get("problem_statement")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())?
                .to_string();
            Some(ExerciseDraft {
                title: entry
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Exercise {}", i + 1)),
                problem_statement,
                starter_code: entry
                    .get("starter_code")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                solution_code: entry
                    .get("solution_code")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                test_cases: entry.get("test_cases").filter(|v| v.is_array()).cloned(),
            })
        })
        .collect();

    if drafts.is_empty() {
        return Err(crate::AiError::MalformedOutput(
            "no usable exercises in model output".to_string(),
        ));
    }
    Ok(drafts)
}

/// Trims model output down to the outermost JSON object or array.
///
/// Models regularly wrap their JSON in prose or code fences; everything
/// before the first opening brace and after the last closing brace is
/// discarded. Returns the input unchanged when no braces are found.
pub fn extract_json(raw: &str) -> &str {
    let (open, close) = match (raw.find('{'), raw.find('[')) {
        (Some(o), Some(a)) if a < o => ('[', ']'),
        (None, Some(_)) => ('[', ']'),
        _ => ('{', '}'),
    };
    match (raw.find(open), raw.rfind(close)) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
