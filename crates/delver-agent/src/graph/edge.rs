use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use delver_core::error::{DelverError, Result};

/// Picks a route label from the current state.
pub type Selector<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// The outgoing transition of a node.
pub enum Edge<S> {
    /// Always continue with the named node.
    Next(String),
    /// Ask the selector for a label and continue with the node it maps to.
    Conditional {
        selector: Selector<S>,
        routes: HashMap<String, String>,
    },
}

impl<S> Edge<S> {
    pub fn next(to: impl Into<String>) -> Self {
        Edge::Next(to.into())
    }

    pub fn conditional<F>(selector: F, routes: HashMap<String, String>) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        Edge::Conditional {
            selector: Arc::new(selector),
            routes,
        }
    }

    /// Resolve the successor for `state`.
    pub fn resolve(&self, state: &S) -> Result<&str> {
        match self {
            Edge::Next(to) => Ok(to.as_str()),
            Edge::Conditional { selector, routes } => {
                let label = selector(state);
                routes.get(&label).map(String::as_str).ok_or_else(|| {
                    DelverError::Graph(format!("selector returned unknown route '{}'", label))
                })
            }
        }
    }

    /// Every node this edge can lead to.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Edge::Next(to) => vec![to.as_str()],
            Edge::Conditional { routes, .. } => routes.values().map(String::as_str).collect(),
        }
    }
}

impl<S> Clone for Edge<S> {
    fn clone(&self) -> Self {
        match self {
            Edge::Next(to) => Edge::Next(to.clone()),
            Edge::Conditional { selector, routes } => Edge::Conditional {
                selector: selector.clone(),
                routes: routes.clone(),
            },
        }
    }
}

impl<S> fmt::Debug for Edge<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Next(to) => f.debug_tuple("Next").field(to).finish(),
            Edge::Conditional { routes, .. } => f
                .debug_struct("Conditional")
                .field("routes", routes)
                .finish_non_exhaustive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routes() -> HashMap<String, String> {
        [("even", "double"), ("odd", "stop")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_next_edge() {
        let edge: Edge<u32> = Edge::next("b");
        assert_eq!(edge.resolve(&0).unwrap(), "b");
        assert_eq!(edge.targets(), ["b"]);
    }

    #[test]
    fn test_conditional_edge() {
        let edge: Edge<u32> = Edge::conditional(
            |n: &u32| if n % 2 == 0 { "even".into() } else { "odd".into() },
            routes(),
        );
        assert_eq!(edge.resolve(&4).unwrap(), "double");
        assert_eq!(edge.resolve(&3).unwrap(), "stop");
        assert_eq!(edge.targets().len(), 2);
    }

    #[test]
    fn test_unknown_label_is_error() {
        let edge: Edge<u32> = Edge::conditional(|_: &u32| "prime".to_string(), routes());
        assert!(matches!(edge.resolve(&7), Err(DelverError::Graph(_))));
    }
}
