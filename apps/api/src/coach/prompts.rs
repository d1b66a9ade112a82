// Prompt constants for the coaching conversation.

use crate::models::chat::ChatContext;

/// Coaching system prompt. Replace: {job_description}, {resume}, {cover_letter}
pub const COACH_SYSTEM_TEMPLATE: &str = "You are an expert resume and cover letter coach helping job seekers improve their applications.
Your role is to:
1. Analyze resumes and cover letters against job descriptions
2. Provide specific, actionable recommendations for improvement
3. Suggest better phrasing, structure, and content
4. Help highlight relevant skills and experience
5. Ensure applications are tailored to the job

Job Description:
{job_description}

Current Resume:
{resume}

Current Cover Letter:
{cover_letter}

Provide concise, practical advice and potential improved drafts when requested.";

/// Opening assistant message shown when a session starts. Not sent by the model.
#[allow(dead_code)]
pub const GREETING: &str = "I've received your job description, resume, and cover letter. I'll analyze them and provide you with specific recommendations for improvement.

What would you like me to focus on? For example:
- General feedback on how well your resume matches the job
- Specific improvements for your cover letter
- Suggested rewording for certain sections
- Tips on highlighting specific skills or experiences";

/// Renders the system prompt with the three documents embedded verbatim.
///
/// The documents are substituted in a single left-to-right pass, so a
/// placeholder that appears inside a user document is never expanded.
/// No truncation is applied: document size is passed through unchanged.
pub fn build_system_prompt(context: &ChatContext) -> String {
    let mut out = String::with_capacity(
        COACH_SYSTEM_TEMPLATE.len()
            + context.job_description.len()
            + context.resume.len()
            + context.cover_letter.len(),
    );
    let mut rest = COACH_SYSTEM_TEMPLATE;

    for (placeholder, value) in [
        ("{job_description}", context.job_description.as_str()),
        ("{resume}", context.resume.as_str()),
        ("{cover_letter}", context.cover_letter.as_str()),
    ] {
        if let Some((head, tail)) = rest.split_once(placeholder) {
            out.push_str(head);
            out.push_str(value);
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}
