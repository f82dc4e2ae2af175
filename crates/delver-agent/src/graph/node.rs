use futures::future::BoxFuture;

use delver_core::error::Result;

/// One step of a state graph.
///
/// A node reads what it needs from the state, does its work (usually one
/// gateway call) and writes its outputs back. It cannot keep the state
/// beyond the returned future.
pub trait Node<S>: Send + Sync {
    fn run<'a>(&'a self, state: &'a mut S) -> BoxFuture<'a, Result<()>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Push(&'static str);

    impl Node<Vec<&'static str>> for Push {
        fn run<'a>(&'a self, state: &'a mut Vec<&'static str>) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                state.push(self.0);
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_node_mutates_state() {
        let mut state = Vec::new();
        Push("a").run(&mut state).await.unwrap();
        Push("b").run(&mut state).await.unwrap();
        assert_eq!(state, ["a", "b"]);
    }
}
