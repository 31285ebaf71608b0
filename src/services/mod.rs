pub mod database; // Dialect strategies, selector and executor seam
pub mod invocation_cache; // Per-request memoization
pub mod query_builder;
pub mod sequence_service;

pub use invocation_cache::{memoized, CacheStats, InvocationKey, RequestCache};
pub use query_builder::*;
pub use sequence_service::*;
