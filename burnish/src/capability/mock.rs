//! Scripted capability implementations for tests and examples.
//!
//! Each mock replays a scripted sequence (or a fixed response), counts its
//! calls, and records what it was asked, so tests can assert on interaction
//! order without a network or a database.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::capability::{
    GeneratedImage, ImageGenerator, QueryExecutor, QueryRows, SearchHit, SearchProvider,
    TextGenerator,
};
use crate::error::PipelineError;

/// Text generator replaying scripted responses, one per call.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, PipelineError>>>,
    repeat: Option<String>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Returns the same text on every call.
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(response.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Consumes `script` front to back; running dry is a Generation error.
    pub fn from_script(script: Vec<Result<String, PipelineError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Plain-text convenience over [`Self::from_script`].
    pub fn from_responses(responses: Vec<&str>) -> Self {
        Self::from_script(responses.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate_text(
        &self,
        prompt: &str,
        _constraints: &BTreeMap<String, String>,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => match &self.repeat {
                Some(text) => Ok(text.clone()),
                None => Err(PipelineError::Generation(
                    "generator script exhausted".to_string(),
                )),
            },
        }
    }
}

/// Search provider returning a fixed hit list.
pub struct StaticSearch {
    hits: Vec<SearchHit>,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fails with a Search error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            hits: vec![],
            fail_with: Some(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.fail_with {
            return Err(PipelineError::Search(msg.clone()));
        }
        Ok(self.hits.clone())
    }
}

/// Query executor replaying scripted results, one per call.
///
/// Applies the read-only guard first, like a real executor.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<QueryRows, PipelineError>>>,
    queries: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn from_script(script: Vec<Result<QueryRows, PipelineError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            queries: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute_query(&self, query: &str) -> Result<QueryRows, PipelineError> {
        crate::capability::guard::ensure_read_only(query)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PipelineError::Query("executor script exhausted".to_string())))
    }
}

/// Image generator returning a fixed URL.
pub struct StaticImageGenerator {
    url: String,
    calls: AtomicUsize,
}

impl StaticImageGenerator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for StaticImageGenerator {
    async fn generate_image(
        &self,
        prompt: &str,
        style: Option<&str>,
    ) -> Result<GeneratedImage, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let full_prompt = match style {
            Some(style) => format!("{prompt}, {style}"),
            None => prompt.to_string(),
        };
        Ok(GeneratedImage {
            url: self.url.clone(),
            prompt: full_prompt,
        })
    }
}
