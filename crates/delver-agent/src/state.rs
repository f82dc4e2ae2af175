use serde::Serialize;

use delver_core::error::{DelverError, Result};
use delver_core::types::{ChatMessage, SearchHit, SessionId};

/// What kind of turn the classifier decided this is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Research,
    FollowUp,
    General,
    /// Anything the model said that isn't one of the three labels.
    Unrecognized(String),
}

impl Classification {
    /// Normalize raw model output into a label.
    ///
    /// Models wrap the word in quotes or markdown emphasis and sometimes end
    /// it with a period; all of that is stripped before matching.
    pub fn parse(raw: &str) -> Self {
        let label = raw
            .trim()
            .to_lowercase()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '`')
            .trim_end_matches('.')
            .trim()
            .to_string();

        match label.as_str() {
            "research" => Classification::Research,
            "follow-up" => Classification::FollowUp,
            "general" => Classification::General,
            _ => Classification::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Classification::Research => "research",
            Classification::FollowUp => "follow-up",
            Classification::General => "general",
            Classification::Unrecognized(raw) => raw,
        }
    }
}

/// Planner output before and after the search node consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedQueries {
    Raw(String),
    Decoded(Vec<String>),
}

impl Default for GeneratedQueries {
    fn default() -> Self {
        GeneratedQueries::Decoded(Vec::new())
    }
}

/// Results for one generated query.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SearchBatch {
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// Set when the provider failed for this query; `hits` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchBatch {
    pub fn ok(query: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        Self {
            query: query.into(),
            hits,
            error: None,
        }
    }

    pub fn failed(query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            hits: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// The record threaded through every node of one turn.
///
/// Created fresh per query and dropped once the caller has read `response`.
#[derive(Debug, Clone)]
pub struct ResearchState {
    query: String,
    pub session_id: SessionId,
    pub chat_history: Vec<ChatMessage>,
    pub chat_summary: String,
    classification: Option<Classification>,
    pub generated_queries: GeneratedQueries,
    retrieved_docs: Vec<SearchBatch>,
    pub reranked_docs: String,
    pub research_result: Option<String>,
    /// Summary produced by the summarizer this turn. Never fed back into
    /// `chat_summary` within the same run.
    pub turn_summary: Option<String>,
    pub response: Option<String>,
}

impl ResearchState {
    pub fn new(session_id: SessionId, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id,
            chat_history: Vec::new(),
            chat_summary: String::new(),
            classification: None,
            generated_queries: GeneratedQueries::default(),
            retrieved_docs: Vec::new(),
            reranked_docs: String::new(),
            research_result: None,
            turn_summary: None,
            response: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.chat_history = history;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.chat_summary = summary.into();
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn classification(&self) -> Option<&Classification> {
        self.classification.as_ref()
    }

    /// Record the classifier's decision. A turn is classified exactly once.
    pub fn set_classification(&mut self, classification: Classification) -> Result<()> {
        if let Some(existing) = &self.classification {
            return Err(DelverError::Graph(format!(
                "classification already set to '{}'",
                existing.as_str()
            )));
        }
        self.classification = Some(classification);
        Ok(())
    }

    pub fn retrieved_docs(&self) -> &[SearchBatch] {
        &self.retrieved_docs
    }

    pub fn push_batch(&mut self, batch: SearchBatch) {
        self.retrieved_docs.push(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_normalization() {
        assert_eq!(Classification::parse("research"), Classification::Research);
        assert_eq!(Classification::parse("  Research.\n"), Classification::Research);
        assert_eq!(Classification::parse("'follow-up'"), Classification::FollowUp);
        assert_eq!(Classification::parse("**General**"), Classification::General);
        assert_eq!(
            Classification::parse("I think research"),
            Classification::Unrecognized("I think research".into())
        );
    }

    #[test]
    fn test_classification_set_once() {
        let mut state = ResearchState::new(SessionId::new(), "q");
        state.set_classification(Classification::General).unwrap();
        assert!(state.set_classification(Classification::Research).is_err());
        assert_eq!(state.classification(), Some(&Classification::General));
    }

    #[test]
    fn test_batches_accumulate_in_order() {
        let mut state = ResearchState::new(SessionId::new(), "q");
        state.push_batch(SearchBatch::ok("a", vec![]));
        state.push_batch(SearchBatch::failed("b", "timeout"));
        let queries: Vec<_> = state.retrieved_docs().iter().map(|b| b.query.as_str()).collect();
        assert_eq!(queries, ["a", "b"]);
        assert_eq!(state.retrieved_docs()[1].error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_fresh_state() {
        let state = ResearchState::new(SessionId::from_string("s1"), "hello")
            .with_summary("prior");
        assert_eq!(state.query(), "hello");
        assert_eq!(state.chat_summary, "prior");
        assert!(state.response.is_none());
        assert!(state.retrieved_docs().is_empty());
    }
}
