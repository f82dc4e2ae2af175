use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use delver_core::error::{DelverError, Result};

use super::edge::Edge;
use super::node::Node;

const DEFAULT_MAX_STEPS: usize = 32;

/// Timing of a single node run.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRun {
    pub node_id: String,
    pub elapsed_ms: u64,
}

/// Result of driving a graph to a terminal node.
#[derive(Debug, Clone)]
pub struct ExecutionResult<S> {
    /// The state as the terminal node left it.
    pub state: S,
    /// Nodes in the order they ran.
    pub path: Vec<NodeRun>,
    pub total_elapsed_ms: u64,
}

impl<S> ExecutionResult<S> {
    /// Node ids in execution order.
    pub fn visited(&self) -> Vec<&str> {
        self.path.iter().map(|r| r.node_id.as_str()).collect()
    }
}

/// Collects nodes and edges, then validates them into a [`GraphExecutor`].
pub struct GraphBuilder<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
    max_steps: usize,
    problems: Vec<String>,
}

impl<S: Send + 'static> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Send + 'static> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            max_steps: DEFAULT_MAX_STEPS,
            problems: Vec::new(),
        }
    }

    pub fn add_node(mut self, id: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        let id = id.into();
        if self.nodes.insert(id.clone(), Arc::new(node)).is_some() {
            self.problems.push(format!("node '{}' registered twice", id));
        }
        self
    }

    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.insert_edge(from.into(), Edge::Next(to.into()))
    }

    /// Route out of `from` by the label `selector` returns for the state.
    pub fn add_conditional_edges<F, I, K, V>(self, from: impl Into<String>, selector: F, routes: I) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let routes = routes
            .into_iter()
            .map(|(label, to)| (label.into(), to.into()))
            .collect();
        self.insert_edge(from.into(), Edge::conditional(selector, routes))
    }

    pub fn set_entry_point(mut self, id: impl Into<String>) -> Self {
        self.entry = Some(id.into());
        self
    }

    /// Abort execution after this many node runs.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn insert_edge(mut self, from: String, edge: Edge<S>) -> Self {
        if self.edges.contains_key(&from) {
            self.problems.push(format!("node '{}' has more than one outgoing edge", from));
        } else {
            self.edges.insert(from, edge);
        }
        self
    }

    /// Check the wiring and produce an executor.
    pub fn compile(self) -> Result<GraphExecutor<S>> {
        let mut problems = self.problems;

        let entry = match self.entry {
            Some(entry) if self.nodes.contains_key(&entry) => entry,
            Some(entry) => {
                problems.push(format!("entry point '{}' is not a node", entry));
                entry
            }
            None => {
                problems.push("no entry point set".to_string());
                String::new()
            }
        };

        let mut sources: Vec<&String> = self.edges.keys().collect();
        sources.sort();
        for from in sources {
            if !self.nodes.contains_key(from) {
                problems.push(format!("edge from unknown node '{}'", from));
            }
            for to in self.edges[from].targets() {
                if !self.nodes.contains_key(to) {
                    problems.push(format!("edge '{}' -> '{}' targets an unknown node", from, to));
                }
            }
        }

        if self.max_steps == 0 {
            problems.push("max_steps must be at least 1".to_string());
        }

        if !problems.is_empty() {
            return Err(DelverError::Graph(problems.join("; ")));
        }

        Ok(GraphExecutor {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            max_steps: self.max_steps,
        })
    }
}

/// A validated graph, ready to run any number of independent executions.
pub struct GraphExecutor<S> {
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    edges: HashMap<String, Edge<S>>,
    entry: String,
    max_steps: usize,
}

impl<S: Send + 'static> GraphExecutor<S> {
    pub fn entry_point(&self) -> &str {
        &self.entry
    }

    /// Nodes with no outgoing edge.
    pub fn terminal_nodes(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .nodes
            .keys()
            .filter(|id| !self.edges.contains_key(*id))
            .map(String::as_str)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Run from the entry point until a terminal node returns.
    ///
    /// A node error stops execution and is returned wrapped with the node id;
    /// the partially updated state is dropped.
    pub async fn execute(&self, mut state: S) -> Result<ExecutionResult<S>> {
        let started = Instant::now();
        let mut path: Vec<NodeRun> = Vec::new();
        let mut current = self.entry.clone();

        loop {
            if path.len() >= self.max_steps {
                return Err(DelverError::Graph(format!(
                    "step limit of {} reached before '{}'",
                    self.max_steps, current
                )));
            }

            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| DelverError::Graph(format!("node '{}' not found", current)))?;

            info!(node_id = %current, step = path.len() + 1, "Running node");
            let node_started = Instant::now();

            if let Err(e) = node.run(&mut state).await {
                error!(node_id = %current, error = %e, "Node failed");
                return Err(DelverError::in_node(current, e));
            }

            let elapsed_ms = node_started.elapsed().as_millis() as u64;
            debug!(node_id = %current, elapsed_ms, "Node complete");
            path.push(NodeRun {
                node_id: current.clone(),
                elapsed_ms,
            });

            match self.edges.get(&current) {
                Some(edge) => current = edge.resolve(&state)?.to_string(),
                None => break,
            }
        }

        let total_elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(steps = path.len(), total_elapsed_ms, "Graph complete");

        Ok(ExecutionResult {
            state,
            path,
            total_elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;

    #[derive(Default)]
    struct Counter {
        value: i64,
        log: Vec<String>,
    }

    struct Add(i64);

    impl Node<Counter> for Add {
        fn run<'a>(&'a self, state: &'a mut Counter) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                state.value += self.0;
                state.log.push(format!("add{}", self.0));
                Ok(())
            })
        }
    }

    struct Fail;

    impl Node<Counter> for Fail {
        fn run<'a>(&'a self, _state: &'a mut Counter) -> BoxFuture<'a, Result<()>> {
            Box::pin(async { Err(DelverError::LlmRequest("HTTP 500".into())) })
        }
    }

    fn sign(state: &Counter) -> String {
        if state.value >= 0 { "pos" } else { "neg" }.to_string()
    }

    fn branching() -> GraphBuilder<Counter> {
        GraphBuilder::new()
            .add_node("start", Add(0))
            .add_node("up", Add(10))
            .add_node("down", Add(-10))
            .set_entry_point("start")
            .add_conditional_edges("start", sign, [("pos", "up"), ("neg", "down")])
    }

    #[tokio::test]
    async fn test_conditional_routing() {
        let graph = branching().compile().unwrap();

        let result = graph.execute(Counter::default()).await.unwrap();
        assert_eq!(result.visited(), ["start", "up"]);
        assert_eq!(result.state.value, 10);

        let result = graph
            .execute(Counter {
                value: -1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.visited(), ["start", "down"]);
    }

    #[tokio::test]
    async fn test_linear_chain_runs_in_order() {
        let graph = GraphBuilder::new()
            .add_node("a", Add(1))
            .add_node("b", Add(2))
            .add_node("c", Add(3))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .set_entry_point("a")
            .compile()
            .unwrap();

        let result = graph.execute(Counter::default()).await.unwrap();
        assert_eq!(result.state.log, ["add1", "add2", "add3"]);
        assert_eq!(graph.terminal_nodes(), ["c"]);
    }

    #[tokio::test]
    async fn test_node_error_aborts_with_node_id() {
        let graph = GraphBuilder::new()
            .add_node("a", Add(1))
            .add_node("boom", Fail)
            .add_node("never", Add(100))
            .add_edge("a", "boom")
            .add_edge("boom", "never")
            .set_entry_point("a")
            .compile()
            .unwrap();

        match graph.execute(Counter::default()).await {
            Err(DelverError::Node { node, source }) => {
                assert_eq!(node, "boom");
                assert!(matches!(*source, DelverError::LlmRequest(_)));
            }
            other => panic!("expected node error, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_cycle_hits_step_limit() {
        let graph = GraphBuilder::new()
            .add_node("a", Add(1))
            .add_node("b", Add(1))
            .add_edge("a", "b")
            .add_edge("b", "a")
            .set_entry_point("a")
            .with_max_steps(5)
            .compile()
            .unwrap();

        let err = graph.execute(Counter::default()).await.err().unwrap();
        assert!(err.to_string().contains("step limit of 5"));
    }

    #[tokio::test]
    async fn test_unmapped_label_is_error() {
        let graph = GraphBuilder::new()
            .add_node("start", Add(0))
            .add_node("up", Add(1))
            .add_conditional_edges("start", sign, [("pos", "up")])
            .set_entry_point("start")
            .compile()
            .unwrap();

        let result = graph
            .execute(Counter {
                value: -5,
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(DelverError::Graph(m)) if m.contains("neg")));
    }

    #[test]
    fn test_compile_rejects_bad_wiring() {
        let missing_entry = GraphBuilder::<Counter>::new().add_node("a", Add(1)).compile();
        assert!(missing_entry.is_err());

        let unknown_target = GraphBuilder::new()
            .add_node("a", Add(1))
            .add_edge("a", "ghost")
            .set_entry_point("a")
            .compile();
        assert!(matches!(unknown_target, Err(DelverError::Graph(m)) if m.contains("ghost")));

        let double_edge = GraphBuilder::new()
            .add_node("a", Add(1))
            .add_node("b", Add(1))
            .add_edge("a", "b")
            .add_edge("a", "a")
            .set_entry_point("a")
            .compile();
        assert!(double_edge.is_err());

        let duplicate_node = branching().add_node("up", Add(1)).compile();
        assert!(duplicate_node.is_err());
    }
}
