pub mod connection_pool;
pub mod database; // SQL execution against PostgreSQL
pub mod history; // Fire-and-forget query audit trail
pub mod llm_service;
pub mod pagination;
pub mod prompt_cache; // Generated SQL cache keyed by normalized prompt
pub mod query_service;
pub mod sql_fixer;

pub use connection_pool::*;
pub use history::*;
pub use llm_service::*;
pub use pagination::*;
pub use prompt_cache::*;
pub use query_service::*;
pub use sql_fixer::*;
