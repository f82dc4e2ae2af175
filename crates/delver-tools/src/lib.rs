pub mod fetch;
pub mod search;

pub use fetch::HttpFetcher;
pub use search::{create_search_provider, SerperSearch, TavilySearch};
