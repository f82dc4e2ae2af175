//! Test doubles for the gateways plus small fixtures.

pub mod fixtures;
pub mod mock_fetch;
pub mod mock_llm;
pub mod mock_search;

pub use fixtures::*;
pub use mock_fetch::MockFetcher;
pub use mock_llm::ScriptedLlm;
pub use mock_search::MockSearch;
