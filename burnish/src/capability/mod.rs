//! Capability interfaces: text generation, search, query execution, images.
//!
//! The pipeline flavors depend on these narrow traits, never on a concrete
//! backend; production backends live in the submodules and scripted mocks in
//! [`mock`]. Error mapping is fixed per trait: generation failures are
//! `Generation`, search failures `Search`, runtime query failures `Query`,
//! and guard violations `RejectedQuery`.

pub mod guard;
pub mod image;
pub mod mock;
pub mod openai;
pub mod serper;
pub mod sqlite;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// One web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Result of a read-only query: column names plus stringified rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

impl QueryRows {
    /// Renders a compact text table for prompts and feedback.
    pub fn to_table_string(&self) -> String {
        let mut out = self.columns.join(" | ");
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join(" | "));
        }
        out
    }
}

/// A generated image: where it lives and what it was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    pub prompt: String,
}

/// Produces free text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Constraints are rendered into the system context by the backend.
    async fn generate_text(
        &self,
        prompt: &str,
        constraints: &BTreeMap<String, String>,
    ) -> Result<String, PipelineError>;
}

/// Runs a web search.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, PipelineError>;
}

/// Executes read-only queries.
///
/// Implementations must call [`guard::ensure_read_only`] before dispatching;
/// a guard violation surfaces as `RejectedQuery`, a runtime failure as
/// `Query`.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute_query(&self, query: &str) -> Result<QueryRows, PipelineError>;
}

/// Generates an image for a prompt in an optional style.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Option<&str>,
    ) -> Result<GeneratedImage, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: to_table_string renders header plus one line per row.
    #[test]
    fn query_rows_table_rendering() {
        let rows = QueryRows {
            columns: vec!["name".to_string(), "count".to_string()],
            rows: vec![
                vec!["alpha".to_string(), "3".to_string()],
                vec!["beta".to_string(), "5".to_string()],
            ],
            row_count: 2,
        };
        assert_eq!(
            rows.to_table_string(),
            "name | count\nalpha | 3\nbeta | 5"
        );
    }
}
