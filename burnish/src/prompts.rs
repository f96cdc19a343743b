//! Prompt templates for the built-in pipeline flavors.
//!
//! Kept in one place so wording changes do not ripple through stage code.

use std::collections::BTreeMap;

use crate::capability::SearchHit;

/// NL → SQL translation prompt. The model must answer with one SELECT only.
pub fn sql_translation(question: &str, schema: &str) -> String {
    format!(
        "You are an expert SQL analyst. Translate the question into a single \
         read-only SQLite SELECT statement.\n\n\
         Database schema:\n{schema}\n\n\
         Question: {question}\n\n\
         Rules:\n\
         - Respond with the SQL statement only, no explanation.\n\
         - Use exactly one SELECT statement.\n\
         - Never modify data."
    )
}

/// SQL repair prompt: the previous statement failed with the given errors.
pub fn sql_repair(question: &str, failing_sql: &str, errors: &[String]) -> String {
    format!(
        "The SQL statement below failed. Fix it so it answers the question.\n\n\
         Question: {question}\n\n\
         Failing statement:\n{failing_sql}\n\n\
         Errors:\n{}\n\n\
         Respond with the corrected SELECT statement only, no explanation.",
        bullet_list(errors)
    )
}

/// Content draft prompt, with an optional research digest.
pub fn content_draft(
    objective: &str,
    format: Option<&str>,
    constraints: &BTreeMap<String, String>,
    research: Option<&str>,
) -> String {
    let mut prompt = format!("Write content for the following objective.\n\nObjective: {objective}\n");
    if let Some(format) = format {
        prompt.push_str(&format!("Format: {format}\n"));
    }
    for (key, value) in constraints {
        prompt.push_str(&format!("{key}: {value}\n"));
    }
    if let Some(research) = research {
        prompt.push_str(&format!("\nBackground research:\n{research}\n"));
    }
    prompt.push_str("\nRespond with the content only.");
    prompt
}

/// Content review prompt. The reply must follow the fixed verdict format.
pub fn content_review(content: &str, objective: &str) -> String {
    format!(
        "Review the content below against the objective. Be strict about \
         quality and brand safety.\n\n\
         Objective: {objective}\n\n\
         Content:\n{content}\n\n\
         Respond in exactly this format:\n\
         SCORE: <1-10>\n\
         SAFE: <yes|no>\n\
         FEEDBACK:\n\
         - <actionable item, one per line; leave empty only if flawless>"
    )
}

/// Content rewrite prompt from reviewer feedback.
pub fn content_rewrite(content: &str, objective: &str, feedback: &[String]) -> String {
    format!(
        "Rewrite the content below to address every feedback item while \
         keeping the objective.\n\n\
         Objective: {objective}\n\n\
         Current content:\n{content}\n\n\
         Feedback:\n{}\n\n\
         Respond with the revised content only.",
        bullet_list(feedback)
    )
}

/// Image prompt for a social post about `topic` on `platform`.
pub fn image_prompt(topic: &str, platform: &str) -> String {
    let hint = match platform.to_lowercase().as_str() {
        "instagram" => "visually stunning, high aesthetic appeal",
        "linkedin" => "professional, business-appropriate, clean design",
        _ => "bold, attention-grabbing",
    };
    format!(
        "A modern and eye-catching digital illustration for social media about {topic}. \
         The image should be {hint}. High quality, vibrant colors, professional design, \
         no text or words in the image."
    )
}

/// Renders search hits into a compact research digest for drafting.
pub fn research_digest(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| format!("- {} ({}): {}", hit.title, hit.url, hit.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
