//! Read-only guard for query execution.
//!
//! Every [`crate::capability::QueryExecutor`] calls this before dispatch:
//! the statement must begin with `SELECT`, and no mutating keyword may appear
//! anywhere in it. Matching is case-insensitive and word-bounded, so
//! identifiers that merely contain a keyword (`updated_at`, `created`) pass.

use crate::error::PipelineError;

/// Keywords that mutate data or schema. Any occurrence rejects the statement.
const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Validates that `query` is a read-only `SELECT` statement.
///
/// Returns `RejectedQuery` describing the violation; never touches a backend.
pub fn ensure_read_only(query: &str) -> Result<(), PipelineError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::RejectedQuery("empty statement".to_string()));
    }

    let mut words = trimmed.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty());
    match words.next() {
        Some(first) if first.eq_ignore_ascii_case("SELECT") => {}
        _ => {
            return Err(PipelineError::RejectedQuery(
                "only SELECT statements are allowed".to_string(),
            ))
        }
    }

    for word in trimmed.split(|c: char| !is_word_char(c)) {
        for keyword in FORBIDDEN_KEYWORDS {
            if word.eq_ignore_ascii_case(keyword) {
                return Err(PipelineError::RejectedQuery(format!(
                    "forbidden keyword: {keyword}"
                )));
            }
        }
    }
    Ok(())
}
