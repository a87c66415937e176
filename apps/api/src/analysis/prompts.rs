// All LLM prompt templates for the analysis module.
// Placeholders: {resume_section}, {job_description}. Render with `render_prompt`.

use crate::analysis::models::AnalysisKind;
use crate::analysis::normalize::{AnalysisRequest, ResumeSource};

/// Tailor resume bullet points to a job description.
pub const TAILOR_PROMPT_TEMPLATE: &str = "\
You are an expert resume writer. You will tailor the provided resume to match the requirements \
of the provided job description.\n\
\n\
Job Description: {job_description}\n\
\n\
{resume_section}\n\
\n\
Please provide tailored resume bullet points that highlight the candidate's qualifications for \
the job. Focus on quantifiable achievements and use keywords from the job description.";

/// Score how well a job matches a resume.
pub const MATCH_PROMPT_TEMPLATE: &str = "\
You are an expert career coach. You will be provided with a resume and a job description. \
You will compare the two and provide a score from 0 to 100 representing how well the job \
matches the resume. You will also provide feedback on why the job was scored the way it was.\n\
\n\
{resume_section}\n\
\n\
Job Description:\n\
{job_description}";

/// Find missing and matching skills plus ATS phrasing advice.
pub const SKILLS_GAP_PROMPT_TEMPLATE: &str = "\
You are an expert career coach and resume writer. Analyze the provided resume and job description.\n\
Identify the key skills required by the job description that are NOT present in the resume.\n\
Also, identify the key skills that ARE present in both the resume and the job description.\n\
Finally, provide concise, actionable advice on how to improve the resume's language to be more \
compatible with Applicant Tracking Systems (ATS), using examples based on the provided texts.\n\
\n\
{resume_section}\n\
\n\
Job Description:\n\
{job_description}";

/// Recommend certifications and skills for the target role.
pub const CAREER_PATH_PROMPT_TEMPLATE: &str = "\
You are an expert career advisor. Based on the user's resume and a target job description, \
recommend a career path.\n\
Suggest specific, in-demand certifications that would be valuable for this career trajectory.\n\
Also, suggest the most important technical or soft skills to learn to advance in this field.\n\
\n\
{resume_section}\n\
\n\
Job Description:\n\
{job_description}";

/// Résumé section when the résumé was pasted as text. Replace `{resume_text}`.
const RESUME_TEXT_SECTION: &str = "Resume:\n{resume_text}";

/// Résumé section when the résumé arrives as an attached document.
const RESUME_FILE_SECTION: &str = "\
The user has uploaded their resume as a file. Analyze the content of the attached document \
as the resume.\n\
Resume File: (attached document)";

pub fn template_for(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::Tailor => TAILOR_PROMPT_TEMPLATE,
        AnalysisKind::Match => MATCH_PROMPT_TEMPLATE,
        AnalysisKind::SkillsGap => SKILLS_GAP_PROMPT_TEMPLATE,
        AnalysisKind::CareerPath => CAREER_PATH_PROMPT_TEMPLATE,
    }
}

/// Renders the prompt for `request`. Emits exactly one résumé branch.
pub fn render_prompt(request: &AnalysisRequest) -> String {
    let resume_section = match request.resume() {
        ResumeSource::Text(text) => {
            render_template(RESUME_TEXT_SECTION, &[("resume_text", text.as_str())])
        }
        ResumeSource::FileReference(_) => RESUME_FILE_SECTION.to_string(),
    };

    render_template(
        template_for(request.kind()),
        &[
            ("resume_section", resume_section.as_str()),
            ("job_description", request.job_description().as_str()),
        ],
    )
}

/// Single-pass `{name}` substitution. Inserted values are never re-scanned,
/// so user text containing `{job_description}` stays literal.
/// Unknown placeholders are left as-is.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
