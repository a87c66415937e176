//! Output schemas, one per `AnalysisKind`.
//!
//! Each schema is declared to the model as the input schema of a forced tool call.
//! The typed structs in `models` are the authoritative check on the reply; these
//! schemas must describe the same shape.

use serde_json::{json, Value};

use crate::analysis::models::AnalysisKind;
use crate::llm_client::OutputSchema;

/// Registry of the four output schemas. Built once at startup.
#[derive(Debug, Clone)]
pub struct OutputSchemas {
    tailor: OutputSchema,
    job_match: OutputSchema,
    skills_gap: OutputSchema,
    career_path: OutputSchema,
}

impl Default for OutputSchemas {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSchemas {
    pub fn new() -> Self {
        Self {
            tailor: OutputSchema {
                name: "report_tailored_resume",
                description: "Report resume bullet points tailored to the job description.",
                schema: object_schema(json!({
                    "tailoredBulletPoints": string_field(
                        "Tailored resume bullet points to match the job description."
                    )
                })),
            },
            job_match: OutputSchema {
                name: "report_job_match",
                description: "Report how well the job matches the resume.",
                schema: object_schema(json!({
                    "jobMatchScore": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 100,
                        "description": "A score from 0 to 100 representing how well the job matches the resume. Higher is better."
                    },
                    "feedback": string_field(
                        "Feedback on why the job was scored the way it was."
                    )
                })),
            },
            skills_gap: OutputSchema {
                name: "report_skills_gap",
                description: "Report missing and matching skills with ATS suggestions.",
                schema: object_schema(json!({
                    "missingSkills": string_list_field(
                        "Key skills mentioned in the job description that are missing from the resume."
                    ),
                    "matchingSkills": string_list_field(
                        "Key skills from the resume that are also mentioned in the job description."
                    ),
                    "atsSuggestions": string_field(
                        "Suggestions on how to phrase skills and experiences to be more friendly for Applicant Tracking Systems (ATS)."
                    )
                })),
            },
            career_path: OutputSchema {
                name: "report_career_path",
                description: "Report certifications and skills that advance the candidate toward the target role.",
                schema: object_schema(json!({
                    "suggestedCertifications": string_list_field(
                        "Relevant certifications to pursue for career advancement based on the target job."
                    ),
                    "suggestedSkills": string_list_field(
                        "Skills to learn to become a stronger candidate for the target role and similar positions."
                    )
                })),
            },
        }
    }

    pub fn get(&self, kind: AnalysisKind) -> &OutputSchema {
        match kind {
            AnalysisKind::Tailor => &self.tailor,
            AnalysisKind::Match => &self.job_match,
            AnalysisKind::SkillsGap => &self.skills_gap,
            AnalysisKind::CareerPath => &self.career_path,
        }
    }
}

/// Closed object schema: every property required, nothing extra allowed.
fn object_schema(properties: Value) -> Value {
    let required: Vec<String> = properties
        .as_object()
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn string_field(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn string_list_field(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description
    })
}
