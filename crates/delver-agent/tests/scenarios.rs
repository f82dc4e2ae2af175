//! End-to-end turns through the research graph with scripted gateways.

use std::sync::Arc;

use delver_agent::prompts::NO_CONTENT;
use delver_agent::{
    Classification, GeneratedQueries, ResearchState, ResearchWorkflow, WorkflowOptions,
};
use delver_core::error::DelverError;
use delver_core::types::SessionId;
use delver_test_utils::{sample_history, scripted_gateway, MockFetcher, MockSearch, ScriptedLlm};

// Phrases that identify each prompt.
const CLASSIFY: &str = "Classify the user's query";
const PLANNER: &str = "Generate exactly five search queries";
const RERANK: &str = "filtering and reranking";
const FORMULATE: &str = "comprehensive research report";
const GENERAL: &str = "friendly AI research assistant";
const FOLLOW_UP: &str = "asking a follow-up question";
const SUMMARIZE: &str = "You are summarizing a conversation";

const FIVE_QUERIES: &str = r#"["rust async overview", "tokio internals", "async-std status", "rust futures design", "async rust pitfalls"]"#;

const RERANKED: &str = r#"Here is the ranking you asked for:
[
  {"rank": 1, "title": "Tokio docs", "url": "https://tokio.rs/docs", "summary": "Runtime reference"},
  {"rank": 2, "title": "Dead link", "url": "https://gone.example/page", "summary": "Was relevant"},
  {"rank": 3, "title": "Async book", "url": "https://rust-lang.github.io/async-book", "summary": "Concepts"}
]"#;

const REPORT: &str = "## Research Report\n### 1. Introduction\nAsync Rust... \
                      ### 6. References\n[Tokio docs](https://tokio.rs/docs)";

struct Harness {
    llm: ScriptedLlm,
    search: MockSearch,
    fetcher: MockFetcher,
    workflow: ResearchWorkflow,
}

fn harness(llm: ScriptedLlm, search: MockSearch, fetcher: MockFetcher) -> Harness {
    let workflow = ResearchWorkflow::new(
        scripted_gateway(&llm),
        Arc::new(search.clone()),
        Arc::new(fetcher.clone()),
        WorkflowOptions::default(),
    )
    .unwrap();
    Harness {
        llm,
        search,
        fetcher,
        workflow,
    }
}

fn research_llm(rerank_reply: &str) -> ScriptedLlm {
    ScriptedLlm::new()
        .on(CLASSIFY, "research")
        .on(PLANNER, FIVE_QUERIES)
        .on(RERANK, rerank_reply)
        .on(FORMULATE, REPORT)
        .on(SUMMARIZE, "User is researching async Rust.")
}

fn fetcher_with_pages() -> MockFetcher {
    MockFetcher::new()
        .with_page("https://tokio.rs/docs", "Tokio is an asynchronous runtime.")
        .with_error("https://gone.example/page", "HTTP Error 404: Not Found")
        .with_page(
            "https://rust-lang.github.io/async-book",
            "Futures are lazy state machines.",
        )
}

fn new_state(query: &str) -> ResearchState {
    ResearchState::new(SessionId::from_string("test-session"), query)
}

#[tokio::test]
async fn general_question_takes_the_short_path() {
    let llm = ScriptedLlm::new()
        .on(CLASSIFY, "general")
        .on(GENERAL, "I can't check live weather, but I can research climate data.");
    let h = harness(llm, MockSearch::new(), MockFetcher::new());

    let result = h.workflow.run(new_state("What's the weather?")).await.unwrap();

    assert_eq!(result.visited(), ["classify", "general", "summarize"]);
    assert!(!result.state.response.as_deref().unwrap_or("").is_empty());
    assert!(result.state.retrieved_docs().is_empty());
    assert_eq!(h.llm.calls_matching(GENERAL), 1);
    // Empty history: the summarizer answers without a model call.
    assert_eq!(h.llm.calls_matching(SUMMARIZE), 0);
    assert_eq!(result.state.turn_summary.as_deref(), Some(" "));
    assert!(h.search.queries().is_empty());
}

#[tokio::test]
async fn research_query_runs_the_full_pipeline() {
    let h = harness(research_llm(RERANKED), MockSearch::new(), fetcher_with_pages());

    let state = new_state("How does async Rust work?").with_history(sample_history());
    let result = h.workflow.run(state).await.unwrap();
    let state = &result.state;

    assert_eq!(
        result.visited(),
        ["classify", "planner", "search", "rerank", "formulate", "summarize"]
    );

    match &state.generated_queries {
        GeneratedQueries::Decoded(queries) => assert_eq!(queries.len(), 5),
        other => panic!("queries not decoded: {:?}", other),
    }
    assert_eq!(state.retrieved_docs().len(), 5);
    assert_eq!(state.retrieved_docs()[0].query, "rust async overview");
    assert_eq!(h.search.queries().len(), 5);

    assert_eq!(
        h.fetcher.requested(),
        [
            "https://tokio.rs/docs",
            "https://gone.example/page",
            "https://rust-lang.github.io/async-book"
        ]
    );

    let formulate_prompt = h
        .llm
        .calls()
        .into_iter()
        .find(|c| c.prompt.contains(FORMULATE))
        .unwrap()
        .prompt;
    assert!(formulate_prompt
        .contains("Source: https://tokio.rs/docs\nTokio is an asynchronous runtime."));
    assert!(formulate_prompt.contains("Futures are lazy state machines."));
    assert!(!formulate_prompt.contains("gone.example"));

    assert_eq!(state.research_result.as_deref(), Some(REPORT));
    assert_eq!(state.response, state.research_result);
    assert_eq!(
        state.turn_summary.as_deref(),
        Some("User is researching async Rust.")
    );
    // The summary is reported, not fed back into this turn.
    assert_eq!(state.chat_summary, "");
}

#[tokio::test]
async fn failing_search_query_is_isolated() {
    let search = MockSearch::new().failing_on("tokio internals");
    let h = harness(research_llm(RERANKED), search, fetcher_with_pages());

    let result = h.workflow.run(new_state("async rust")).await.unwrap();
    let batches = result.state.retrieved_docs();

    assert_eq!(batches.len(), 5);
    assert_eq!(batches[1].query, "tokio internals");
    assert!(batches[1].hits.is_empty());
    assert!(batches[1].error.as_deref().unwrap_or("").contains("HTTP 500"));
    assert!(batches[2].error.is_none());
    assert!(result.state.response.is_some());
}

#[tokio::test]
async fn prose_rerank_output_still_produces_a_report() {
    let h = harness(
        research_llm("Sorry, none of these results look useful."),
        MockSearch::new(),
        fetcher_with_pages(),
    );

    let result = h.workflow.run(new_state("obscure topic")).await.unwrap();

    assert!(h.fetcher.requested().is_empty());
    let formulate_calls: Vec<_> = h
        .llm
        .calls()
        .into_iter()
        .filter(|c| c.prompt.contains(FORMULATE))
        .collect();
    assert_eq!(formulate_calls.len(), 1);
    assert!(formulate_calls[0].prompt.contains(NO_CONTENT));
    assert_eq!(result.state.response.as_deref(), Some(REPORT));
}

#[tokio::test]
async fn unparsable_plan_becomes_a_single_query() {
    let llm = ScriptedLlm::new()
        .on(PLANNER, "search for async rust tutorials")
        .on(CLASSIFY, "research")
        .on(RERANK, RERANKED)
        .on(FORMULATE, REPORT);
    let h = harness(llm, MockSearch::new(), fetcher_with_pages());

    let result = h.workflow.run(new_state("teach me async")).await.unwrap();

    assert_eq!(
        result.state.generated_queries,
        GeneratedQueries::Decoded(vec!["search for async rust tutorials".to_string()])
    );
    assert_eq!(result.state.retrieved_docs().len(), 1);
}

#[tokio::test]
async fn follow_up_ends_without_summarizing() {
    let llm = ScriptedLlm::new()
        .on(CLASSIFY, "follow-up")
        .on(FOLLOW_UP, "As covered earlier, Tokio uses a work-stealing scheduler.")
        .on(SUMMARIZE, "should not be used");
    let h = harness(llm, MockSearch::new(), MockFetcher::new());

    let state = new_state("Which scheduler did Tokio use?")
        .with_history(sample_history())
        .with_summary("User asked about Tokio.");
    let result = h.workflow.run(state).await.unwrap();

    assert_eq!(result.visited(), ["classify", "follow_up"]);
    assert_eq!(h.llm.calls_matching(SUMMARIZE), 0);
    assert!(result.state.turn_summary.is_none());
    assert!(result.state.response.unwrap().contains("work-stealing"));
}

#[tokio::test]
async fn unknown_label_routes_to_general() {
    let llm = ScriptedLlm::new()
        .on(CLASSIFY, "Banana.")
        .on(GENERAL, "Hello!");
    let h = harness(llm, MockSearch::new(), MockFetcher::new());

    let outcome = h
        .workflow
        .run_turn(SessionId::new(), "hi", vec![], "")
        .await
        .unwrap();

    assert_eq!(outcome.response, "Hello!");
    assert_eq!(
        outcome.classification,
        Some(Classification::Unrecognized("Banana.".into()))
    );
    let visited: Vec<_> = outcome.path.iter().map(|r| r.node_id.as_str()).collect();
    assert_eq!(visited, ["classify", "general", "summarize"]);
}

#[tokio::test]
async fn model_failure_aborts_the_turn() {
    let llm = ScriptedLlm::new()
        .fail_on(RERANK, "HTTP 401: invalid key")
        .on(CLASSIFY, "research")
        .on(PLANNER, FIVE_QUERIES)
        .on(FORMULATE, REPORT);
    let h = harness(llm, MockSearch::new(), fetcher_with_pages());

    let err = h
        .workflow
        .run_turn(SessionId::new(), "async rust", vec![], "")
        .await
        .unwrap_err();

    match err {
        DelverError::Node { node, .. } => assert_eq!(node, "rerank"),
        other => panic!("expected node error, got {}", other),
    }
    assert_eq!(h.llm.calls_matching(FORMULATE), 0);
    assert!(h.fetcher.requested().is_empty());
}

#[tokio::test]
async fn summary_with_history_is_returned_to_caller() {
    let llm = ScriptedLlm::new()
        .on(CLASSIFY, "general")
        .on(GENERAL, "Sure.")
        .on(SUMMARIZE, "  User likes Tokio.  ");
    let h = harness(llm, MockSearch::new(), MockFetcher::new());

    let outcome = h
        .workflow
        .run_turn(SessionId::new(), "thanks", sample_history(), "prior summary")
        .await
        .unwrap();

    assert_eq!(outcome.turn_summary.as_deref(), Some("User likes Tokio."));
    let summarize_prompt = h
        .llm
        .calls()
        .into_iter()
        .find(|c| c.prompt.contains(SUMMARIZE))
        .unwrap()
        .prompt;
    assert!(summarize_prompt.contains("user: Tell me about Rust async runtimes"));
}
