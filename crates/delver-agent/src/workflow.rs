use std::sync::Arc;

use tracing::info;

use delver_core::config::AppConfig;
use delver_core::error::{DelverError, Result};
use delver_core::traits::{DocumentFetcher, SearchProvider};
use delver_core::types::{ChatMessage, SessionId};
use delver_llm::LlmGateway;
use delver_tools::{create_search_provider, HttpFetcher};

use crate::graph::{ExecutionResult, GraphBuilder, GraphExecutor, NodeRun};
use crate::nodes::{
    self, ClassifyNode, FollowUpNode, FormulateNode, GeneralNode, PlannerNode, RerankNode,
    SearchNode, SummarizeNode,
};
use crate::state::{Classification, ResearchState};

/// Knobs that shape the graph rather than any single node.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub max_chars_per_document: usize,
    pub max_steps: usize,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_chars_per_document: 20_000,
            max_steps: 32,
        }
    }
}

impl WorkflowOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_chars_per_document: config.fetch.max_chars_per_document,
            max_steps: config.graph.max_steps,
        }
    }
}

/// What a caller gets back from one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub classification: Option<Classification>,
    /// The summarizer's output, absent on the follow-up path.
    pub turn_summary: Option<String>,
    pub path: Vec<NodeRun>,
    pub total_elapsed_ms: u64,
}

/// The compiled research graph.
///
/// Holds no per-turn data, so one instance serves any number of concurrent
/// turns behind an `Arc`.
pub struct ResearchWorkflow {
    graph: GraphExecutor<ResearchState>,
}

impl ResearchWorkflow {
    pub fn new(
        llm: LlmGateway,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn DocumentFetcher>,
        options: WorkflowOptions,
    ) -> Result<Self> {
        let graph = GraphBuilder::new()
            .add_node(nodes::CLASSIFY, ClassifyNode::new(llm.clone()))
            .add_node(nodes::PLANNER, PlannerNode::new(llm.clone()))
            .add_node(nodes::SEARCH, SearchNode::new(search))
            .add_node(nodes::RERANK, RerankNode::new(llm.clone()))
            .add_node(
                nodes::FORMULATE,
                FormulateNode::new(llm.clone(), fetcher, options.max_chars_per_document),
            )
            .add_node(nodes::GENERAL, GeneralNode::new(llm.clone()))
            .add_node(nodes::FOLLOW_UP, FollowUpNode::new(llm.clone()))
            .add_node(nodes::SUMMARIZE, SummarizeNode::new(llm))
            .set_entry_point(nodes::CLASSIFY)
            .add_conditional_edges(
                nodes::CLASSIFY,
                nodes::route,
                [
                    ("research", nodes::PLANNER),
                    ("general", nodes::GENERAL),
                    ("follow-up", nodes::FOLLOW_UP),
                ],
            )
            .add_edge(nodes::PLANNER, nodes::SEARCH)
            .add_edge(nodes::SEARCH, nodes::RERANK)
            .add_edge(nodes::RERANK, nodes::FORMULATE)
            .add_edge(nodes::FORMULATE, nodes::SUMMARIZE)
            .add_edge(nodes::GENERAL, nodes::SUMMARIZE)
            .with_max_steps(options.max_steps)
            .compile()?;

        Ok(Self { graph })
    }

    /// Build the workflow with the real gateways named in `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = LlmGateway::from_config(&config.models)?;
        let search = create_search_provider(&config.search)?;
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
        Self::new(llm, search, fetcher, WorkflowOptions::from_config(config))
    }

    pub fn graph(&self) -> &GraphExecutor<ResearchState> {
        &self.graph
    }

    /// Drive a prepared state through the graph.
    pub async fn run(&self, state: ResearchState) -> Result<ExecutionResult<ResearchState>> {
        self.graph.execute(state).await
    }

    /// Answer one query.
    ///
    /// `history` and `summary` describe the conversation so far. Fails when
    /// any node fails or when the graph finishes without a response.
    pub async fn run_turn(
        &self,
        session_id: SessionId,
        query: &str,
        history: Vec<ChatMessage>,
        summary: &str,
    ) -> Result<TurnOutcome> {
        info!(session = %session_id, query = %query, history = history.len(), "Starting turn");

        let state = ResearchState::new(session_id, query)
            .with_history(history)
            .with_summary(summary);
        let result = self.run(state).await?;

        let state = result.state;
        let response = state
            .response
            .clone()
            .ok_or_else(|| DelverError::Graph("graph finished without a response".into()))?;

        info!(
            steps = result.path.len(),
            elapsed_ms = result.total_elapsed_ms,
            "Turn complete"
        );

        Ok(TurnOutcome {
            response,
            classification: state.classification().cloned(),
            turn_summary: state.turn_summary,
            path: result.path,
            total_elapsed_ms: result.total_elapsed_ms,
        })
    }
}
