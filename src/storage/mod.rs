//! SQL generation and schema bootstrap for the Postgres-backed store.

pub mod query;
pub mod schema;

pub use query::{build_count_query, build_page_query, page_window, resolve_sort, SortSpec};
pub use schema::{connect_pool, ensure_schema};
